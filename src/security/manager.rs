//! Security manager: bans, rate limiting, signatures and challenges.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SecurityConfig;
use crate::security::challenge::JsChallenge;
use crate::security::filters::{FilterReason, RequestFilter};
use crate::security::rate_limit::RateLimitEntry;
use crate::security::signature::HmacVerifier;

/// Per-IP request policing shared by every request handler.
#[derive(Debug)]
pub struct SecurityManager {
    banned: RwLock<HashMap<String, Instant>>,
    limiters: RwLock<HashMap<String, RateLimitEntry>>,
    ddos_threshold: usize,
    dos_threshold: usize,
    ban_duration: Duration,
    window_size: Duration,
    max_tracked_ips: usize,
    challenge_secret: String,
    verifier: HmacVerifier,
    filter: RequestFilter,
}

impl SecurityManager {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            banned: RwLock::new(HashMap::new()),
            limiters: RwLock::new(HashMap::new()),
            ddos_threshold: config.ddos_threshold,
            dos_threshold: config.dos_threshold,
            ban_duration: config.ban_duration,
            window_size: config.window_size,
            max_tracked_ips: config.max_tracked_ips.max(1),
            challenge_secret: config.js_challenge_secret.clone(),
            verifier: HmacVerifier::from_secrets(config.hmac_secret.as_deref(), &config.js_challenge_secret),
            filter: RequestFilter::new(config),
        }
    }

    /// True while the IP's ban is younger than the ban duration.
    /// Expired bans are removed on the way out.
    pub fn is_blocked(&self, ip: &str) -> bool {
        let now = Instant::now();
        {
            let banned = self.banned.read().expect("ban table lock poisoned");
            match banned.get(ip) {
                None => return false,
                Some(&at) if now.saturating_duration_since(at) < self.ban_duration => return true,
                Some(_) => {}
            }
        }

        let mut banned = self.banned.write().expect("ban table lock poisoned");
        // Re-check: another request may have re-banned the IP in between.
        if let Some(&at) = banned.get(ip) {
            if now.saturating_duration_since(at) < self.ban_duration {
                return true;
            }
            banned.remove(ip);
            tracing::info!(client_ip = %ip, "Ban expired");
        }
        false
    }

    /// Sliding-window check. Records the request and bans the IP when the
    /// window holds more than the DDoS threshold. Returns true if banned now.
    pub fn check_ddos(&self, ip: &str) -> bool {
        let now = Instant::now();
        let count = {
            let mut limiters = self.limiters.write().expect("rate limiter lock poisoned");
            if !limiters.contains_key(ip) && limiters.len() >= self.max_tracked_ips {
                evict_stalest(&mut limiters);
            }
            let entry = limiters.entry(ip.to_string()).or_default();
            entry.prune(now, self.window_size);
            entry.record(now)
        };

        if count > self.ddos_threshold {
            self.banned
                .write()
                .expect("ban table lock poisoned")
                .insert(ip.to_string(), now);
            tracing::warn!(client_ip = %ip, requests = count, "DDoS threshold exceeded, IP banned");
            return true;
        }
        false
    }

    /// Sub-second burst gate. Within one second of the last recorded request
    /// the IP is rejected if its window holds more than the DoS threshold;
    /// otherwise the last-request time moves forward.
    pub fn check_dos(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut limiters = self.limiters.write().expect("rate limiter lock poisoned");
        if !limiters.contains_key(ip) && limiters.len() >= self.max_tracked_ips {
            evict_stalest(&mut limiters);
        }
        let entry = limiters.entry(ip.to_string()).or_default();

        if let Some(last) = entry.last_request() {
            if now.saturating_duration_since(last) < Duration::from_secs(1) {
                return entry.len() > self.dos_threshold;
            }
        }
        entry.touch(now);
        false
    }

    /// Verify a hex HMAC-SHA256 signature over `data`.
    pub fn verify_hmac(&self, data: &[u8], signature: &str) -> bool {
        self.verifier.verify(data, signature)
    }

    pub fn generate_js_challenge(&self) -> JsChallenge {
        JsChallenge::generate(&self.challenge_secret)
    }

    /// User-agent and country filters.
    pub fn filter(&self, headers: &axum::http::HeaderMap) -> Option<FilterReason> {
        self.filter.check(headers)
    }

    /// Drop rate-limit entries idle for longer than `max_idle`. Returns how many went.
    pub fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut limiters = self.limiters.write().expect("rate limiter lock poisoned");
        let before = limiters.len();
        limiters.retain(|_, entry| !entry.is_idle(now, max_idle));
        before - limiters.len()
    }

    /// Drop bans older than the ban duration. Returns how many went.
    pub fn purge_expired_bans(&self) -> usize {
        let now = Instant::now();
        let mut banned = self.banned.write().expect("ban table lock poisoned");
        let before = banned.len();
        banned.retain(|_, at| now.saturating_duration_since(*at) < self.ban_duration);
        before - banned.len()
    }

    pub fn tracked_ips(&self) -> usize {
        self.limiters.read().expect("rate limiter lock poisoned").len()
    }

    pub fn banned_ips(&self) -> usize {
        self.banned.read().expect("ban table lock poisoned").len()
    }
}

/// Evict the entry with the oldest last request; entries never touched go first.
fn evict_stalest(limiters: &mut HashMap<String, RateLimitEntry>) {
    let stalest = limiters
        .iter()
        .min_by_key(|(_, entry)| entry.last_request())
        .map(|(ip, _)| ip.clone());
    if let Some(ip) = stalest {
        limiters.remove(&ip);
        tracing::debug!(client_ip = %ip, "Evicted rate limit entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn manager(ddos: usize, dos: usize, window: Duration) -> SecurityManager {
        SecurityManager::new(&SecurityConfig {
            ddos_threshold: ddos,
            dos_threshold: dos,
            window_size: window,
            ban_duration: Duration::from_secs(300),
            ..SecurityConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ddos_bans_after_threshold_and_ban_expires() {
        let sm = manager(100, 1000, Duration::from_secs(1));
        assert!(!sm.is_blocked("1.2.3.4"));

        for _ in 0..100 {
            assert!(!sm.check_ddos("1.2.3.4"));
        }
        assert!(sm.check_ddos("1.2.3.4"));
        assert!(sm.is_blocked("1.2.3.4"));
        assert!(!sm.is_blocked("5.6.7.8"));

        advance(Duration::from_secs(299)).await;
        assert!(sm.is_blocked("1.2.3.4"));

        advance(Duration::from_secs(1)).await;
        assert!(!sm.is_blocked("1.2.3.4"));
        assert_eq!(sm.banned_ips(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let sm = manager(3, 1000, Duration::from_secs(1));
        for _ in 0..3 {
            assert!(!sm.check_ddos("ip"));
        }
        advance(Duration::from_secs(1)).await;
        for _ in 0..3 {
            assert!(!sm.check_ddos("ip"));
        }
        assert!(sm.check_ddos("ip"));
    }

    #[tokio::test(start_paused = true)]
    async fn dos_gate_rejects_sub_second_bursts() {
        let sm = manager(1000, 2, Duration::from_secs(60));

        // First check only stamps the last-request time.
        sm.check_ddos("ip");
        assert!(!sm.check_dos("ip"));

        sm.check_ddos("ip");
        assert!(!sm.check_dos("ip"));
        sm.check_ddos("ip");
        assert!(sm.check_dos("ip"));

        advance(Duration::from_secs(1)).await;
        sm.check_ddos("ip");
        assert!(!sm.check_dos("ip"));
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_prefers_untouched_then_oldest() {
        let sm = SecurityManager::new(&SecurityConfig {
            max_tracked_ips: 2,
            ..SecurityConfig::default()
        });

        sm.check_dos("a");
        advance(Duration::from_secs(2)).await;
        sm.check_ddos("b"); // never touched by the DoS gate
        sm.check_ddos("c");
        assert_eq!(sm.tracked_ips(), 2);

        // "b" had no last request and went first; now "a" is the stalest.
        sm.check_dos("c");
        sm.check_ddos("d");
        assert_eq!(sm.tracked_ips(), 2);
        assert_eq!(sm.cleanup_idle(Duration::from_secs(600)), 1);
        assert_eq!(sm.tracked_ips(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_drops_idle_entries() {
        let sm = manager(100, 50, Duration::from_secs(60));
        sm.check_dos("old");
        advance(Duration::from_secs(500)).await;
        sm.check_dos("fresh");
        advance(Duration::from_secs(200)).await;

        assert_eq!(sm.cleanup_idle(Duration::from_secs(600)), 1);
        assert_eq!(sm.tracked_ips(), 1);
    }

    #[test]
    fn hmac_uses_configured_secret() {
        let sm = SecurityManager::new(&SecurityConfig {
            hmac_secret: Some("k".into()),
            ..SecurityConfig::default()
        });
        let sig = HmacVerifier::new("k").sign(b"payload");
        assert!(sm.verify_hmac(b"payload", &sig));
        assert!(!sm.verify_hmac(b"payload", "zz"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_bans_are_swept_without_a_revisit() {
        let sm = manager(1, 1000, Duration::from_secs(60));
        for ip in ["10.0.0.1", "10.0.0.2"] {
            sm.check_ddos(ip);
            assert!(sm.check_ddos(ip));
        }
        advance(Duration::from_secs(200)).await;
        sm.check_ddos("10.0.0.3");
        assert!(sm.check_ddos("10.0.0.3"));
        assert_eq!(sm.purge_expired_bans(), 0);

        advance(Duration::from_secs(100)).await;
        assert_eq!(sm.purge_expired_bans(), 2);
        assert_eq!(sm.banned_ips(), 1);
        assert!(sm.is_blocked("10.0.0.3"));
    }
}
