// Configuration errors.
//
// The engine's runtime paths never fail: bad commands are ignored and
// out-of-range values are clamped. Loading an `EngineConfig` from disk is the
// one fallible surface, and it reports through `ConfigError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
