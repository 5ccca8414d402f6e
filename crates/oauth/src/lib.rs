//! OAuth Lifecycle Manager (C4, spec §4.4): acquires and keeps valid
//! tokens for OAuth-backed providers, serializes concurrent refresh
//! attempts per token record, and persists tokens under the
//! `{providerType}-oauth-{sequence}-{alias}.json` naming convention.
//!
//! No teacher crate implements OAuth directly; this is authored fresh
//! using the teacher's established idioms (`reqwest::Client` builder,
//! `secrecy::SecretString`, `thiserror::Error`, atomic write-then-rename
//! via `tempfile`, and `axum` handlers in the teacher's style).

mod device_code;
mod error;
mod manager;
pub mod portal;
mod record;
mod refresh;
mod state;

pub use error::OAuthError;
pub use manager::{AccessToken, OAuthManager, TokenRef};
pub use record::TokenRecord;
pub use state::TokenState;
