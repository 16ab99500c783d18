//! User-agent and country filters.

use axum::http::{header, HeaderMap};

use crate::config::SecurityConfig;

/// Why a request was filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    UserAgent(String),
    Country(String),
}

/// Static request filters built from the security configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Lowercased substrings.
    blocked_agents: Vec<String>,
    /// Uppercased ISO country codes.
    blocked_countries: Vec<String>,
    country_header: Option<String>,
}

impl RequestFilter {
    pub fn new(config: &SecurityConfig) -> Self {
        let ua = &config.user_agent_blocking;
        let geo = &config.geo_blocking;

        let blocked_agents = if ua.enabled {
            ua.blocked_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_ascii_lowercase())
                .collect()
        } else {
            Vec::new()
        };

        let (blocked_countries, country_header) = if geo.enabled {
            (
                geo.blocked_countries
                    .iter()
                    .map(|c| c.trim().to_ascii_uppercase())
                    .collect(),
                Some(geo.country_header.clone()),
            )
        } else {
            (Vec::new(), None)
        };

        Self {
            blocked_agents,
            blocked_countries,
            country_header,
        }
    }

    /// Returns the reason if the request must be rejected.
    pub fn check(&self, headers: &HeaderMap) -> Option<FilterReason> {
        if !self.blocked_agents.is_empty() {
            let agent = headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_ascii_lowercase();
            if let Some(pattern) = self.blocked_agents.iter().find(|p| agent.contains(p.as_str())) {
                return Some(FilterReason::UserAgent(pattern.clone()));
            }
        }

        if let Some(name) = &self.country_header {
            let country = headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_ascii_uppercase());
            if let Some(country) = country {
                if self.blocked_countries.contains(&country) {
                    return Some(FilterReason::Country(country));
                }
            }
        }

        None
    }
}
