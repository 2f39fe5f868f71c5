use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Signature request declined by wallet")]
    UserDeclined,

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Permission oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Permission propagation timed out")]
    PropagationTimeout,

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("No storage configured for room")]
    NoStorageConfigured,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    NostrKey(#[from] nostr::key::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
