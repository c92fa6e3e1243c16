//! # Podcast Sync Module
//!
//! Moves podcast metadata between feeds, the local cache and the batch store.
//!
//! ## Overview
//!
//! This module handles:
//! - Encoding batches as store tags and (optionally gzipped) JSON payloads
//! - Reading every stored batch of a podcast back into one canonical record
//! - Diffing a feed snapshot against that record and posting the difference
//! - Tracking each posted batch through its transaction lifecycle
//!
//! ## Components
//!
//! - **Codec** (`codec`): Tag and payload encoding with lenient decoding
//! - **Batch Reader** (`reader`): Sequential fetch and merge of stored batches
//! - **Transaction State Machine** (`transaction`): Validated batch lifecycle
//! - **Feed Source** (`feed`): Host-provided feed snapshots
//! - **Sync Coordinator** (`coordinator`): Diff, partition, post, report

pub mod codec;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod reader;
pub mod transaction;

pub use codec::{decode_payload, encode_payload, TagCodec};
pub use coordinator::{
    OutgoingBatch, PodcastUpdate, SyncCoordinator, SyncFailure, SyncOutcome, SyncReport,
};
pub use error::{Result, SyncError};
pub use feed::FeedSource;
pub use reader::{BatchReader, FetchedPodcast};
pub use transaction::{SyncTransaction, TransactionId, TransactionStatus};
