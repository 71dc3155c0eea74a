//! Per-request CORS origin authorization.
//!
//! An origin is allowed when it matches the server-wide allow-list, or when the
//! request identifies a client (Basic credentials or an introspected bearer
//! token) whose `allowed_cors_origins` match it.
//!
//! Patterns are matched segment by segment: scheme and effective port must be
//! equal, and hosts are compared label by label. A `*` label matches exactly
//! one host label, a `**` label matches one or more labels, a bare `*` host
//! matches any host, and the pattern `*` matches every origin.

use base64::prelude::*;
use http::HeaderMap;
use std::sync::Arc;

use crate::oauth::clients::bearer_token;
use crate::oauth::introspection::TokenIntrospector;
use crate::storage::traits::OAuthStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Exact(String),
    /// `*`
    Single,
    /// `**`
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Labels(Vec<Label>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    /// Matches every origin
    Any,
    Origin {
        scheme: String,
        host: HostPattern,
        port: Option<u16>,
    },
}

/// Parsed CORS origin pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPattern {
    kind: PatternKind,
}

/// Concrete origin from an `Origin` request header
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestOrigin {
    scheme: String,
    labels: Vec<String>,
    port: Option<u16>,
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Split `scheme://host[:port]` into lowercase scheme, lowercase host and effective port.
fn split_origin(value: &str) -> Option<(String, String, Option<u16>)> {
    let (scheme, rest) = value.trim().split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    let scheme = scheme.to_ascii_lowercase();

    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() || rest.contains(['/', '?', '#', '@', ' ']) {
        return None;
    }

    let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (address, remainder) = bracketed.split_once(']')?;
        let port = match remainder {
            "" => None,
            remainder => Some(remainder.strip_prefix(':')?.parse::<u16>().ok()?),
        };
        (format!("[{}]", address), port)
    } else {
        match rest.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), Some(port.parse::<u16>().ok()?)),
            None => (rest.to_string(), None),
        }
    };

    if host.is_empty() {
        return None;
    }
    let port = port.or_else(|| default_port(&scheme));
    Some((scheme, host.to_ascii_lowercase(), port))
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '[' | ']' | ':'))
}

impl OriginPattern {
    /// Parse a configured or client-registered origin pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.trim() == "*" {
            return Some(Self {
                kind: PatternKind::Any,
            });
        }
        let (scheme, host, port) = split_origin(pattern)?;

        let host = if host == "*" {
            HostPattern::Any
        } else if host.starts_with('[') {
            HostPattern::Labels(vec![Label::Exact(host)])
        } else {
            let labels = host
                .split('.')
                .map(|label| match label {
                    "*" => Some(Label::Single),
                    "**" => Some(Label::Multi),
                    label if valid_label(label) => Some(Label::Exact(label.to_string())),
                    _ => None,
                })
                .collect::<Option<Vec<Label>>>()?;
            HostPattern::Labels(labels)
        };

        Some(Self {
            kind: PatternKind::Origin { scheme, host, port },
        })
    }

    /// Whether `origin` (an `Origin` header value) matches this pattern.
    pub fn matches(&self, origin: &str) -> bool {
        match RequestOrigin::parse(origin) {
            Some(origin) => self.matches_origin(&origin),
            None => false,
        }
    }

    fn matches_origin(&self, origin: &RequestOrigin) -> bool {
        match &self.kind {
            PatternKind::Any => true,
            PatternKind::Origin { scheme, host, port } => {
                scheme == &origin.scheme
                    && port == &origin.port
                    && match host {
                        HostPattern::Any => true,
                        HostPattern::Labels(labels) => match_labels(labels, &origin.labels),
                    }
            }
        }
    }
}

/// Whether `origin` is a well-formed `Origin` header value.
pub fn is_valid_origin(origin: &str) -> bool {
    RequestOrigin::parse(origin).is_some()
}

/// Canonical `scheme://host[:port]` form of a client-registered origin.
///
/// Only `http` and `https` origins without userinfo, path, query or fragment
/// are accepted; a single trailing `/` is tolerated. Default ports are dropped.
pub fn canonicalize_origin(value: &str) -> Option<String> {
    OriginPattern::parse(value)?;
    let (scheme, host, port) = split_origin(value)?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    match port {
        Some(port) if Some(port) != default_port(&scheme) => {
            Some(format!("{}://{}:{}", scheme, host, port))
        }
        _ => Some(format!("{}://{}", scheme, host)),
    }
}

impl RequestOrigin {
    fn parse(value: &str) -> Option<Self> {
        let (scheme, host, port) = split_origin(value)?;
        let labels = if host.starts_with('[') {
            vec![host]
        } else {
            host.split('.').map(|label| label.to_string()).collect()
        };
        if !labels.iter().all(|label| valid_label(label)) {
            return None;
        }
        Some(Self {
            scheme,
            labels,
            port,
        })
    }
}

fn match_labels(pattern: &[Label], host: &[String]) -> bool {
    match pattern.split_first() {
        None => host.is_empty(),
        Some((Label::Multi, rest)) => (1..=host.len()).any(|n| match_labels(rest, &host[n..])),
        Some((Label::Single, rest)) => !host.is_empty() && match_labels(rest, &host[1..]),
        Some((Label::Exact(expected), rest)) => {
            host.first() == Some(expected) && match_labels(rest, &host[1..])
        }
    }
}

/// Outcome of authorizing an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsDecision {
    /// CORS handling is switched off; the request passes through untouched
    Disabled,
    Allow,
    Deny,
}

/// Decides per request whether a cross-origin caller may use the public API.
pub struct CorsAuthorizer {
    enabled: bool,
    allowed_origins: Vec<OriginPattern>,
    storage: Arc<dyn OAuthStorage>,
    introspector: Arc<dyn TokenIntrospector>,
}

impl CorsAuthorizer {
    pub fn new(
        enabled: bool,
        allowed_origins: Vec<OriginPattern>,
        storage: Arc<dyn OAuthStorage>,
        introspector: Arc<dyn TokenIntrospector>,
    ) -> Self {
        Self {
            enabled,
            allowed_origins,
            storage,
            introspector,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Authorize `origin` for a request carrying `headers`.
    pub async fn authorize(&self, origin: &str, headers: &HeaderMap) -> CorsDecision {
        if !self.enabled {
            return CorsDecision::Disabled;
        }

        if self
            .allowed_origins
            .iter()
            .any(|pattern| pattern.matches(origin))
        {
            return CorsDecision::Allow;
        }

        let Some(client_id) = self.resolve_client_id(headers).await else {
            tracing::debug!(origin, "cors origin rejected: no client identity");
            return CorsDecision::Deny;
        };

        let client = match self.storage.get_client(&client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                tracing::debug!(origin, client_id, "cors origin rejected: unknown client");
                return CorsDecision::Deny;
            }
            Err(e) => {
                tracing::warn!(error = ?e, client_id, "cors client lookup failed");
                return CorsDecision::Deny;
            }
        };

        let allowed = client
            .allowed_cors_origins
            .iter()
            .filter_map(|pattern| OriginPattern::parse(pattern))
            .any(|pattern| pattern.matches(origin));

        if allowed {
            CorsDecision::Allow
        } else {
            tracing::debug!(origin, client_id, "cors origin not registered for client");
            CorsDecision::Deny
        }
    }

    /// Client ID from Basic credentials, or from introspecting a bearer token.
    async fn resolve_client_id(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(token) = bearer_token(headers) {
            return match self.introspector.introspect(token).await {
                Ok(introspection) => Some(introspection.client_id),
                Err(e) => {
                    tracing::debug!(error = %e, "cors bearer token introspection failed");
                    None
                }
            };
        }

        basic_username(headers)
    }
}

/// Username from `Authorization: Basic <base64(username:password)>`.
fn basic_username(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, _) = decoded.split_once(':')?;
    (!username.is_empty()).then(|| username.to_string())
}
