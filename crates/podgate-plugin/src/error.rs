//! Plugin construction error types.

use thiserror::Error;

/// Errors raised while building or registering a plugin.
///
/// Stage outcomes never use this type; they report through
/// [`crate::Status`].
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("configuration error: {0}")]
    Config(#[from] podgate_core::ConfigError),

    #[error("no plugin registered under name: {0}")]
    UnknownPlugin(String),

    #[error("plugin already registered: {0}")]
    DuplicatePlugin(String),
}

pub type PluginResult<T> = Result<T, PluginError>;
