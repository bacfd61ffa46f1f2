//! Origin allow-list for WebSocket upgrades.
//!
//! Requests without an `Origin` header pass. A present origin must match one
//! entry of the allow-list, otherwise the request is answered with 403 before
//! any upstream work happens.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::ORIGIN,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use url::Url;

use crate::errors::RelayError;
use crate::state::AppState;

/// Origin sent by sandboxed frames and `file://` pages
const NULL_ORIGIN: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginRule {
    /// The literal `null` origin
    Null,
    /// `scheme://host[:port]`, compared after normalization
    Exact(String),
    /// Bare host name, any scheme and port
    Host(String),
    /// `*.example.com`, subdomains only
    Subdomain(String),
}

impl OriginRule {
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if entry.eq_ignore_ascii_case(NULL_ORIGIN) {
            return Some(OriginRule::Null);
        }
        if entry.contains("://") {
            return match Url::parse(entry) {
                Ok(url) => Some(OriginRule::Exact(url.origin().ascii_serialization())),
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Ignoring invalid allowed origin");
                    None
                }
            };
        }
        if let Some(domain) = entry.strip_prefix("*.") {
            return Some(OriginRule::Subdomain(domain.to_ascii_lowercase()));
        }
        Some(OriginRule::Host(entry.to_ascii_lowercase()))
    }

    fn matches(&self, origin: &str, parsed: Option<&Url>) -> bool {
        match (self, parsed) {
            (OriginRule::Null, _) => origin == NULL_ORIGIN,
            (OriginRule::Exact(expected), Some(url)) => {
                url.origin().ascii_serialization() == *expected
            }
            (OriginRule::Host(host), Some(url)) => url.host_str() == Some(host.as_str()),
            (OriginRule::Subdomain(domain), Some(url)) => url
                .host_str()
                .and_then(|host| host.strip_suffix(domain.as_str()))
                .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.')),
            (_, None) => false,
        }
    }
}

/// Compiled origin allow-list
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    rules: Vec<OriginRule>,
}

impl OriginPolicy {
    /// Build a policy from allow-list entries.
    ///
    /// Entries may be an exact origin (`https://guide.example`), a bare host
    /// (`localhost`), a subdomain wildcard (`*.example.com`) or `null`.
    /// Invalid entries are skipped with a warning.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        Self {
            rules: entries
                .iter()
                .filter_map(|entry| OriginRule::parse(entry.as_ref()))
                .collect(),
        }
    }

    /// Whether a request with this `Origin` header may upgrade.
    ///
    /// An absent header is allowed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        let origin = origin.trim();
        let parsed = Url::parse(origin).ok();
        self.rules
            .iter()
            .any(|rule| rule.matches(origin, parsed.as_ref()))
    }
}

/// Reject upgrades from origins outside the allow-list
///
/// Runs before the relay handler, so a rejected request never reaches the
/// secret check or the upstream dial.
pub async fn origin_guard_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let origin = match request.headers().get(ORIGIN) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(origin) => Some(origin.to_string()),
            Err(_) => return Err(RelayError::OriginNotAllowed("<non-ascii>".to_string())),
        },
    };

    if !state.origin_policy.allows(origin.as_deref()) {
        return Err(RelayError::OriginNotAllowed(origin.unwrap_or_default()));
    }

    debug!(origin = ?origin, "Origin accepted");
    Ok(next.run(request).await)
}
