use crate::auth::{AuthPolicy, BearerValidator, CredentialForwarding};
use crate::config::RelayConfig;
use crate::cors;
use crate::error::{RelayError, Result};
use crate::headers::HeaderDenylist;
use axum::{
    body::Body,
    extract::State,
    http::{
        header::{HeaderName, HeaderValue, AUTHORIZATION},
        HeaderMap, Method, Request, Response,
    },
};
use bytes::Bytes;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Inbound header carrying the credential destined for the upstream target
const TARGET_AUTH_HEADER: HeaderName = HeaderName::from_static("x-target-authorization");

/// Response header identifying which relay instance served the request
const ATTRIBUTION_HEADER: HeaderName = HeaderName::from_static("x-proxied-by");

/// Upstream redirects are resolved by the relay, never exposed to the caller
const MAX_REDIRECTS: usize = 10;

/// Relay handler state, shared across requests
#[derive(Clone)]
pub struct RelayState {
    pub client: reqwest::Client,
    pub config: Arc<RelayConfig>,
    pub denylist: Arc<HeaderDenylist>,
    validator: Option<BearerValidator>,
}

impl RelayState {
    /// Create relay state from validated configuration
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let validator = match config.auth.policy {
            AuthPolicy::RequireBearer => {
                let token = config.auth.token.clone().ok_or_else(|| {
                    RelayError::Config("Bearer auth policy requires a token".to_string())
                })?;
                Some(BearerValidator::new(token))
            }
            AuthPolicy::Open => None,
        };

        Ok(Self {
            client,
            config: Arc::new(config),
            denylist: Arc::new(HeaderDenylist::default()),
            validator,
        })
    }
}

/// Main relay handler: authenticate, sanitize, forward, relay back.
///
/// Total over all inputs — every failure path maps to an error response
/// with CORS headers attached, never an uncaught fault.
pub async fn relay_handler(
    State(state): State<RelayState>,
    req: Request<Body>,
) -> Result<Response<Body>> {
    let method = req.method().clone();

    // Preflight is answered before anything else, auth included
    if method == Method::OPTIONS {
        debug!("CORS preflight");
        return Ok(cors::preflight_response());
    }

    if let Some(validator) = &state.validator {
        if let Err(e) = validator.authenticate(req.headers()) {
            warn!(method = %method, error = %e, "Authentication failed");
            return Err(e);
        }
    }

    let target = resolve_target(req.uri().query())?;

    info!(method = %method, target = %target, "Forwarding request");

    let outbound_headers =
        build_outbound_headers(req.headers(), &state.denylist, state.config.auth.forwarding);

    // GET/HEAD never carry a body upstream, regardless of what arrived
    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        let bytes = req
            .into_body()
            .collect()
            .await
            .map_err(|e| RelayError::Internal(format!("Failed to read request body: {}", e)))?
            .to_bytes();
        Some(bytes)
    };

    let target_display = target.to_string();
    match send_upstream(&state, method, outbound_headers, body, target).await {
        Ok(response) => {
            info!(status = %response.status(), target = %target_display, "Relay completed");
            Ok(response)
        }
        Err(e) => {
            warn!(error = %e, target = %target_display, "Upstream dispatch failed");
            Err(e)
        }
    }
}

/// Resolve the absolute target URL from the `url` query parameter
fn resolve_target(query: Option<&str>) -> Result<Url> {
    let raw = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(name, _)| name == "url")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty())
        .ok_or(RelayError::MissingTarget)?;

    let target =
        Url::parse(&raw).map_err(|e| RelayError::InvalidTarget(format!("{}: {}", raw, e)))?;

    if target.scheme() != "http" && target.scheme() != "https" {
        return Err(RelayError::InvalidTarget(format!(
            "unsupported scheme '{}'",
            target.scheme()
        )));
    }

    Ok(target)
}

/// Build the outbound header set: denylist filtering plus credential
/// substitution.
///
/// The relay's own bearer token is always stripped; the only credential
/// that can reach the upstream is the caller's `X-Target-Authorization`
/// value, and only under the override-header forwarding policy.
fn build_outbound_headers(
    inbound: &HeaderMap,
    denylist: &HeaderDenylist,
    forwarding: CredentialForwarding,
) -> HeaderMap {
    let mut outbound = denylist.sanitize(inbound);

    if forwarding == CredentialForwarding::OverrideHeader {
        if let Some(target_auth) = inbound.get(TARGET_AUTH_HEADER) {
            outbound.insert(AUTHORIZATION, target_auth.clone());
        }
    }

    outbound
}

/// Issue the outbound request and rebuild the upstream response for the
/// caller: status verbatim, headers filtered, CORS and attribution added,
/// body bytes untouched.
async fn send_upstream(
    state: &RelayState,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
    target: Url,
) -> Result<Response<Body>> {
    let mut upstream_req = state.client.request(method, target).headers(headers);
    if let Some(bytes) = body {
        upstream_req = upstream_req.body(bytes);
    }

    let upstream = upstream_req.send().await.map_err(|e| {
        if e.is_timeout() {
            RelayError::Timeout(format!("upstream request timed out: {}", e))
        } else {
            RelayError::Upstream(e.to_string())
        }
    })?;

    let status = upstream.status();
    let mut relayed_headers = state.denylist.sanitize(upstream.headers());
    cors::apply(&mut relayed_headers);
    relayed_headers.insert(
        ATTRIBUTION_HEADER,
        HeaderValue::from_str(&state.config.server.instance_name)
            .map_err(|e| RelayError::Config(format!("Invalid instance name: {}", e)))?,
    );

    let body_bytes = upstream
        .bytes()
        .await
        .map_err(|e| RelayError::Upstream(format!("failed to read upstream response: {}", e)))?;

    let mut response = Response::new(Body::from(body_bytes));
    *response.status_mut() = status;
    *response.headers_mut() = relayed_headers;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.auth.token = Some(SecretString::new("relay-secret".to_string()));
        config
    }

    #[test]
    fn test_relay_state_creation() {
        let state = RelayState::new(test_config()).unwrap();
        assert!(state.validator.is_some());
    }

    #[test]
    fn test_relay_state_open_policy_has_no_validator() {
        let config = RelayConfig::from_yaml("auth:\n  policy: open\n").unwrap();
        let state = RelayState::new(config).unwrap();
        assert!(state.validator.is_none());
    }

    #[test]
    fn test_relay_state_bearer_policy_requires_token() {
        let config = RelayConfig::default();
        assert!(matches!(
            RelayState::new(config),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_target_valid() {
        let target = resolve_target(Some("url=https://example.test/echo")).unwrap();
        assert_eq!(target.as_str(), "https://example.test/echo");
    }

    #[test]
    fn test_resolve_target_percent_encoded() {
        let target =
            resolve_target(Some("url=https%3A%2F%2Fexample.test%2Fpath%3Fa%3D1")).unwrap();
        assert_eq!(target.as_str(), "https://example.test/path?a=1");
    }

    #[test]
    fn test_resolve_target_missing_query() {
        assert!(matches!(
            resolve_target(None),
            Err(RelayError::MissingTarget)
        ));
    }

    #[test]
    fn test_resolve_target_missing_param() {
        assert!(matches!(
            resolve_target(Some("other=1")),
            Err(RelayError::MissingTarget)
        ));
    }

    #[test]
    fn test_resolve_target_empty_param() {
        assert!(matches!(
            resolve_target(Some("url=")),
            Err(RelayError::MissingTarget)
        ));
    }

    #[test]
    fn test_resolve_target_relative_url() {
        assert!(matches!(
            resolve_target(Some("url=/not-absolute")),
            Err(RelayError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_resolve_target_unsupported_scheme() {
        assert!(matches!(
            resolve_target(Some("url=ftp://example.test/file")),
            Err(RelayError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_outbound_headers_substitute_target_auth() {
        let denylist = HeaderDenylist::default();
        let mut inbound = HeaderMap::new();
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer relay-secret"));
        inbound.insert(
            "x-target-authorization",
            HeaderValue::from_static("Bearer upstream-secret"),
        );
        inbound.insert("content-type", HeaderValue::from_static("application/json"));

        let outbound =
            build_outbound_headers(&inbound, &denylist, CredentialForwarding::OverrideHeader);
        assert_eq!(outbound.get(AUTHORIZATION).unwrap(), "Bearer upstream-secret");
        assert!(outbound.get("x-target-authorization").is_none());
        assert_eq!(outbound.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_outbound_headers_without_override_carry_no_credential() {
        let denylist = HeaderDenylist::default();
        let mut inbound = HeaderMap::new();
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer relay-secret"));

        let outbound =
            build_outbound_headers(&inbound, &denylist, CredentialForwarding::OverrideHeader);
        assert!(outbound.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_strip_policy_ignores_target_auth() {
        let denylist = HeaderDenylist::default();
        let mut inbound = HeaderMap::new();
        inbound.insert(
            "x-target-authorization",
            HeaderValue::from_static("Bearer upstream-secret"),
        );

        let outbound = build_outbound_headers(&inbound, &denylist, CredentialForwarding::Strip);
        assert!(outbound.get(AUTHORIZATION).is_none());
        assert!(outbound.is_empty());
    }
}
