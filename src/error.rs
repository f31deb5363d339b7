use thiserror::Error;

/// Errors surfaced by the crate's fallible constructors and persistence paths
///
/// Nothing on the tick path returns one of these; the simulation catches and logs
/// persistence failures instead of propagating them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("checkpoint encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("checkpoint decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("record error: {0}")]
    Record(String),

    #[error("checkpoint dimension {found} does not match live estimator dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
