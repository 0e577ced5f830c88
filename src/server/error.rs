// Server error module
// Everything that can stop the server from starting or running

use std::net::AddrParseError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid server address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        source: AddrParseError,
    },

    #[error("invalid route #{index}: {reason}")]
    InvalidRoute { index: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
