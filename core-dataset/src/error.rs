use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset storage error: {0}")]
    Storage(#[from] bridge_traits::BridgeError),

    #[error("Dataset serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
