//! Rejecting requests for host names this server doesn't serve.

use actix_web::{
    HttpRequest,
    HttpResponse,
    middleware::{Middleware, Started},
    error::Result,
};

/// Answers `400 Bad Request` to requests whose `Host` is not allowed.
///
/// Patterns are matched case-insensitively against the host with its port
/// removed. A pattern starting with a dot (`.example.com`) matches that domain
/// and all its subdomains, and `*` matches any host.
pub struct AllowedHosts {
    patterns: Vec<String>,
}

impl AllowedHosts {
    pub fn new<I, T>(patterns: I) -> AllowedHosts
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        AllowedHosts {
            patterns: patterns.into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Is `host` (a `Host` header value) allowed?
    pub fn is_allowed(&self, host: &str) -> bool {
        let host = strip_port(host).trim_end_matches('.').to_lowercase();

        if host.is_empty() {
            return false;
        }

        self.patterns.iter().any(|pattern| {
            if pattern == "*" {
                true
            } else if pattern.starts_with('.') {
                host == pattern[1..] || host.ends_with(pattern.as_str())
            } else {
                host == *pattern
            }
        })
    }
}

impl<S> Middleware<S> for AllowedHosts {
    fn start(&self, req: &HttpRequest<S>) -> Result<Started> {
        let host = req.connection_info().host().to_string();

        if self.is_allowed(&host) {
            Ok(Started::Done)
        } else {
            warn!("Invalid Host header {:?}", host);
            Ok(Started::Response(HttpResponse::BadRequest()
                .body("Invalid Host header")))
        }
    }
}

/// Remove port from a host, taking care of bracketed IPv6 addresses.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..end + 1],
            None => host,
        };
    }

    match host.rfind(':') {
        Some(inx) => &host[..inx],
        None => host,
    }
}
