//! # Batch Reader
//!
//! Rebuilds a podcast's canonical state from the batches in the store.
//!
//! ## Workflow
//!
//! 1. Query batch 0, 1, 2, ... by `Kind`, `subscribeUrl` and `metadataBatch`
//! 2. Stop at the first number with no record
//! 3. Decode each record's tags and payload; a payload that cannot be decoded
//!    contributes only its tags and is reported in [`FetchedPodcast::errors`]
//! 4. Merge everything with the special-tag policy
//!
//! Fetching is sequential: whether batch `n + 1` is queried depends on batch
//! `n` existing. A configurable cap bounds the scan.

use std::sync::Arc;

use bridge_traits::storage::BatchStore;
use core_metadata::{merge_batch_metadata, merge_batch_tags, MergePolicy, Podcast, TagSet};
use core_runtime::logging::redact_url;
use tracing::{debug, instrument, warn};

use crate::codec::{decode_payload, TagCodec};
use crate::error::{Result, SyncError};

/// Canonical state of one podcast as read from the store
///
/// A batch whose payload cannot be decoded still contributes its tags, so its
/// `metadataBatch` and episode date bounds count towards the next number.
/// Only the payload content is lost; the decoding error is kept in `errors`.
#[derive(Debug)]
pub struct FetchedPodcast {
    /// Merged payloads and tags of every batch read
    pub podcast: Podcast,
    /// Merged tags of every batch read
    pub tags: TagSet,
    pub batches_read: usize,
    /// Problems that did not stop the read
    pub errors: Vec<SyncError>,
}

impl FetchedPodcast {
    /// True when the scan hit the batch cap, so later batches may be missing
    pub fn is_truncated(&self) -> bool {
        self.errors
            .iter()
            .any(|error| matches!(error, SyncError::TooManyBatches { .. }))
    }
}

/// Sequential reader over the batches of one store
pub struct BatchReader {
    store: Arc<dyn BatchStore>,
    codec: TagCodec,
    max_fetch_batches: usize,
}

impl BatchReader {
    pub fn new(store: Arc<dyn BatchStore>, codec: TagCodec, max_fetch_batches: usize) -> Self {
        Self {
            store,
            codec,
            max_fetch_batches,
        }
    }

    /// Read and merge every stored batch of a podcast
    ///
    /// # Errors
    ///
    /// Store failures abort the read: a partial scan could hide the latest
    /// batch number.
    #[instrument(skip(self), fields(subscribe_url = %redact_url(subscribe_url)))]
    pub async fn fetch_podcast(&self, subscribe_url: &str) -> Result<FetchedPodcast> {
        let mut batches = Vec::new();
        let mut tag_sets = Vec::new();
        let mut errors = Vec::new();

        for number in 0..self.max_fetch_batches as u64 {
            let query = self.codec.batch_query(subscribe_url, number);
            let Some(stored) = self.store.find_batch(&query).await? else {
                debug!(metadata_batch = number, "No more batches");
                break;
            };

            let tags = self.codec.decode(&stored.tags);
            let payload = match decode_payload(&stored.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(
                        metadata_batch = number,
                        batch_id = %stored.id,
                        "Ignoring unreadable batch payload: {}",
                        e
                    );
                    errors.push(e);
                    Podcast::default()
                }
            };

            // Tags are authoritative for the batch's identity and bounds
            let tag_podcast = Podcast::from(tags.clone());
            batches.push(merge_batch_metadata(
                [&payload, &tag_podcast],
                MergePolicy::Override,
            ));
            tag_sets.push(tags);
        }

        let batches_read = batches.len();
        if batches_read == self.max_fetch_batches {
            warn!(limit = self.max_fetch_batches, "Batch cap reached");
            errors.push(SyncError::TooManyBatches {
                limit: self.max_fetch_batches,
            });
        }

        debug!(batches_read, errors = errors.len(), "Fetched podcast");

        Ok(FetchedPodcast {
            podcast: merge_batch_metadata(&batches, MergePolicy::MergeSpecialTags),
            tags: merge_batch_tags(&tag_sets),
            batches_read,
            errors,
        })
    }
}
