use axum::http::HeaderMap;
use std::collections::HashSet;

/// Headers that must not cross the relay hop, in either direction.
///
/// Hop-by-hop headers are meaningless or harmful once relayed; `host` and
/// `content-length` are recomputed by the outbound client; `authorization`
/// and `x-target-authorization` carry credentials that must never reach the
/// upstream under their original names.
const DENYLIST: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "authorization",
    "x-target-authorization",
    "content-length",
    "accept-encoding",
    // Platform-injected identity and trace headers
    "cf-connecting-ip",
    "cf-ray",
    "cf-visitor",
    "true-client-ip",
    "x-forwarded-for",
    "x-real-ip",
];

/// Immutable set of header names excluded from forwarding.
///
/// Built once at startup; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct HeaderDenylist {
    names: HashSet<&'static str>,
}

impl Default for HeaderDenylist {
    fn default() -> Self {
        Self {
            names: DENYLIST.iter().copied().collect(),
        }
    }
}

impl HeaderDenylist {
    /// Check whether a header name is excluded from forwarding
    pub fn contains(&self, name: &str) -> bool {
        // HeaderName values from the http crate are already lowercase, but
        // callers may pass arbitrary strings.
        if self.names.contains(name) {
            return true;
        }
        self.names.contains(name.to_ascii_lowercase().as_str())
    }

    /// Copy a header map, dropping every denylisted entry.
    ///
    /// Repeated values of a kept header are all preserved.
    pub fn sanitize(&self, headers: &HeaderMap) -> HeaderMap {
        let mut sanitized = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            if !self.contains(name.as_str()) {
                sanitized.append(name.clone(), value.clone());
            }
        }
        sanitized
    }
}
