//! Append-Only Batch Storage Abstraction
//!
//! Podcast metadata is stored as immutable, content-addressed records. Each
//! record carries a compressed payload plus a list of indexed name/value tags
//! that the store can be queried by. Records are never updated or deleted;
//! newer state is expressed by posting additional records.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single indexed name/value tag attached to a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A record as returned by a tag query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBatch {
    /// Store-assigned identifier of the transaction that created the record
    pub id: String,
    /// All tags attached to the record, in posting order
    pub tags: Vec<Tag>,
    /// Raw payload bytes (possibly compressed)
    pub payload: Bytes,
}

/// Receipt returned after a record was accepted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    /// Store-assigned transaction identifier
    pub id: String,
}

/// Outcome of a confirmation request for a posted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The record is durably stored
    Confirmed,
    /// The record is still propagating
    Pending,
    /// The store dropped or refused the record
    Rejected,
}

/// Tag-queryable append-only store
///
/// Implementations wrap the transaction client that creates, signs and posts
/// records. Retry and backpressure policy belong to the implementation.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{BatchStore, Tag};
///
/// async fn first_batch(store: &dyn BatchStore, url: &str) -> Result<()> {
///     let query = vec![Tag::new("subscribeUrl", url), Tag::new("metadataBatch", "0")];
///     if let Some(batch) = store.find_batch(&query).await? {
///         println!("found {}", batch.id);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Find the most recent record whose tags contain every tag in `query`
    ///
    /// Returns `Ok(None)` when no record matches.
    async fn find_batch(&self, query: &[Tag]) -> Result<Option<StoredBatch>>;

    /// Create, sign and post a new record
    async fn post_batch(&self, tags: Vec<Tag>, payload: Bytes) -> Result<PostReceipt>;

    /// Ask the store whether a previously posted record is durable
    async fn confirm(&self, id: &str) -> Result<Confirmation>;
}
