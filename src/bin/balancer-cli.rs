use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "balancer-cli")]
#[command(about = "Management CLI for edge-balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend state, metrics and the active strategy
    Stats,
    /// Register a backend (http://host:port or unix:///path)
    AddBackend {
        target: String,
        #[arg(short, long, default_value_t = 1)]
        weight: u32,
        /// Request timeout, e.g. "5s"
        #[arg(short, long)]
        timeout: Option<String>,
    },
    /// Remove a backend by id
    RemoveBackend { id: String },
    /// Switch the scheduling strategy
    Strategy {
        #[arg(value_parser = ["round_robin", "weighted_round_robin", "fastest_first"])]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Stats => client.get(format!("{}/admin/stats", base)).send().await?,
        Commands::AddBackend { target, weight, timeout } => {
            let mut body = json!({ "url": target, "weight": weight });
            if let Some(timeout) = timeout {
                body["timeout"] = Value::String(timeout);
            }
            client
                .post(format!("{}/admin/backend", base))
                .json(&body)
                .send()
                .await?
        }
        Commands::RemoveBackend { id } => {
            client
                .delete(format!("{}/admin/backend", base))
                .query(&[("id", id)])
                .send()
                .await?
        }
        Commands::Strategy { name } => {
            client
                .post(format!("{}/admin/strategy", base))
                .query(&[("strategy", name)])
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
