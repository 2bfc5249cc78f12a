//! Common types for the Spotify OAuth bridge

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
