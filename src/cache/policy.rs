//! Which requests are cached, and under what key.

use std::time::Duration;

use axum::http::{Method, Uri};

/// Lifetime of every cached response.
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// GET requests outside `/api/` and `/admin` are cacheable.
pub fn is_cacheable(method: &Method, uri: &Uri) -> bool {
    let path = uri.path();
    method == Method::GET && !path.contains("/api/") && !path.contains("/admin")
}

/// `METHOD:path?query`
pub fn cache_key(method: &Method, uri: &Uri) -> String {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}:{}", method, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cacheability() {
        let uri = |s: &str| s.parse::<Uri>().unwrap();
        assert!(is_cacheable(&Method::GET, &uri("/static/app.js")));
        assert!(!is_cacheable(&Method::POST, &uri("/static/app.js")));
        assert!(!is_cacheable(&Method::GET, &uri("/v1/api/users")));
        assert!(!is_cacheable(&Method::GET, &uri("/admin/stats")));
    }

    #[test]
    fn key_includes_query() {
        let uri: Uri = "http://lb.local/page?x=1".parse().unwrap();
        assert_eq!(cache_key(&Method::GET, &uri), "GET:/page?x=1");
    }
}
