//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Secrets (the upstream client secret and the state sealing secret) are
//! loaded from env vars or `*_file` paths, never stored in the TOML
//! directly to avoid leaking them.

use common::Secret;
use serde::Deserialize;
use spotify_auth::CALLBACK_PATH;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub redirects: RedirectConfig,
}

/// HTTP listener and public identity
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally reachable base URL of this service; used as the OAuth
    /// issuer and to build the upstream callback URL
    pub public_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(skip)]
    pub state_secret: Option<Secret<String>>,
    /// Path to a file containing the state sealing secret (alternative to
    /// the BRIDGE_STATE_SECRET env var)
    #[serde(default)]
    pub state_secret_file: Option<PathBuf>,
}

/// Upstream identity provider settings
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// SPOTIFY_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Post-callback redirect policy
#[derive(Debug, Deserialize)]
pub struct RedirectConfig {
    /// Where to send the client when it declared no redirect_uri or an
    /// unapproved one
    pub default_uri: String,
    /// Exact URIs or bare scheme://host origins
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(skip)]
    pub allow_loopback: bool,
}

fn default_max_connections() -> usize {
    1000
}

fn default_authorize_endpoint() -> String {
    spotify_auth::SPOTIFY_AUTHORIZE_ENDPOINT.into()
}

fn default_token_endpoint() -> String {
    spotify_auth::SPOTIFY_TOKEN_ENDPOINT.into()
}

fn default_scopes() -> String {
    spotify_auth::DEFAULT_SCOPES.into()
}

fn default_timeout() -> u64 {
    30
}

/// Read a trimmed secret from a file, empty content yielding `None`.
fn read_secret_file(path: &Path, what: &str) -> common::Result<Option<Secret<String>>> {
    let value = std::fs::read_to_string(path).map_err(|e| {
        common::Error::Config(format!("failed to read {what} {}: {e}", path.display()))
    })?;
    let value = value.trim().to_owned();
    Ok(if value.is_empty() {
        None
    } else {
        Some(Secret::new(value))
    })
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, for each secret:
    /// 1. env var (SPOTIFY_CLIENT_SECRET / BRIDGE_STATE_SECRET)
    /// 2. `*_file` path from config
    ///
    /// BRIDGE_ALLOW_LOOPBACK=1 (or "true") additionally admits loopback
    /// redirect targets; there is no TOML equivalent so production configs
    /// cannot enable it by accident.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.server.public_url.starts_with("http://")
            && !config.server.public_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "public_url must start with http:// or https://, got: {}",
                config.server.public_url
            )));
        }
        // Normalized so path concatenation never produces "//"
        while config.server.public_url.ends_with('/') {
            config.server.public_url.pop();
        }

        if !config.redirects.default_uri.starts_with("http://")
            && !config.redirects.default_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "default_uri must start with http:// or https://, got: {}",
                config.redirects.default_uri
            )));
        }

        if config.upstream.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            config.upstream.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.upstream.client_secret_file {
            config.upstream.client_secret = read_secret_file(secret_file, "client_secret_file")?;
        }
        if config.upstream.client_secret.is_none() {
            return Err(common::Error::Config(
                "no upstream client secret: set SPOTIFY_CLIENT_SECRET or client_secret_file".into(),
            ));
        }

        // Resolve state sealing secret the same way
        if let Ok(secret) = std::env::var("BRIDGE_STATE_SECRET") {
            config.server.state_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.server.state_secret_file {
            config.server.state_secret = read_secret_file(secret_file, "state_secret_file")?;
        }
        if config.server.state_secret.is_none() {
            return Err(common::Error::Config(
                "no state secret: set BRIDGE_STATE_SECRET or state_secret_file".into(),
            ));
        }

        config.redirects.allow_loopback = matches!(
            std::env::var("BRIDGE_ALLOW_LOOPBACK").as_deref(),
            Ok("1") | Ok("true")
        );

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("spotify-auth-bridge.toml")
    }

    /// The callback URL registered with the upstream provider.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.server.public_url, CALLBACK_PATH)
    }
}
