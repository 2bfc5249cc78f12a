//! Post-callback redirect allow-listing
//!
//! The client's declared redirect target is validated only at redirect
//! time, right before the browser is sent there with a live authorization
//! code in the query string. Anything that is not explicitly approved
//! falls back to the configured default URI; this function never fails.
//!
//! An allow-list entry is either an exact URI or a bare
//! `scheme://host[:port]` origin, which admits every path under it.
//! Loopback targets (localhost, 127.0.0.1, [::1]) are admitted on any
//! port and path, but only when the BRIDGE_ALLOW_LOOPBACK gate is set —
//! native-app development convenience, off in production.

use tracing::warn;
use url::Url;

/// Pick the redirect target for a completed callback.
pub fn resolve_redirect(
    candidate: Option<&str>,
    allowed: &[String],
    default_uri: &str,
    allow_loopback: bool,
) -> String {
    let Some(candidate) = candidate else {
        return default_uri.to_string();
    };

    let Ok(parsed) = Url::parse(candidate) else {
        warn!(redirect_uri = candidate, "malformed redirect target, using default");
        return default_uri.to_string();
    };

    if allow_loopback && is_loopback_host(&parsed) {
        return candidate.to_string();
    }

    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{port}", parsed.scheme(), parsed.host_str().unwrap_or("")),
        None => format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or("")),
    };

    for entry in allowed {
        if entry == candidate || entry == &origin {
            return candidate.to_string();
        }
    }

    warn!(redirect_uri = candidate, "unapproved redirect target, using default");
    default_uri.to_string()
}

fn is_loopback_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}
