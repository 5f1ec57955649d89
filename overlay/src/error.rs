//! Error types for the overlay library

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("unable to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse config file {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {field} - {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("unable to encode packet for host")]
    Encode(#[from] bincode::Error),
    #[error("host bridge socket error")]
    Socket(#[from] io::Error),
}

/// Failure reported by an audio output. The music scheduler swallows these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("playback rejected by host: {0}")]
    Rejected(String),
    #[error("audio output unavailable")]
    Unavailable,
}
