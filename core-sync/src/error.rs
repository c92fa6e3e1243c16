use bridge_traits::error::BridgeError;
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Malformed upstream data: {0}")]
    MalformedUpstreamData(String),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Podcast has no subscribe URL")]
    MissingSubscribeUrl,

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Invalid transaction ID: {0}")]
    InvalidTransactionId(String),

    #[error("Invalid transaction status: {0}")]
    InvalidStatus(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Batch {metadata_batch} was rejected by the store")]
    Rejected { metadata_batch: u64 },

    #[error("Stopped reading after {limit} batches")]
    TooManyBatches { limit: usize },
}

pub type Result<T> = std::result::Result<T, SyncError>;
