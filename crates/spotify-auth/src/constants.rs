//! Spotify accounts-service constants
//!
//! Default endpoints for the upstream provider. These are configuration
//! defaults, not hard-wired values — operators can point the bridge at a
//! different provider (or a mock) through the TOML config. The actual
//! secrets (client secret, tokens) never appear here.

/// Authorization endpoint where the resource owner approves the grant
pub const SPOTIFY_AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for code exchange and token refresh
pub const SPOTIFY_TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Scopes requested from the upstream provider by default.
/// Playback read/control plus private playlist access — what the music
/// tool layer downstream of this bridge actually calls.
pub const DEFAULT_SCOPES: &str =
    "user-read-playback-state user-modify-playback-state playlist-read-private";

/// Path on this service the upstream provider redirects back to
pub const CALLBACK_PATH: &str = "/spotify/callback";

/// The only PKCE challenge method this service accepts
pub const CODE_CHALLENGE_METHOD: &str = "S256";
