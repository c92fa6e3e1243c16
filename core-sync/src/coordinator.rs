//! # Sync Coordinator
//!
//! Turns a podcast update into numbered metadata batches and posts them.
//!
//! ## Overview
//!
//! The `SyncCoordinator` ties the pure metadata engines to the store:
//! - Read the canonical state of a podcast through the [`BatchReader`]
//! - Diff a pending snapshot against it and partition the result
//! - Encode every batch into tags and a payload
//! - Post batches in ascending order, tracking each with a [`SyncTransaction`]
//!
//! ## Workflow
//!
//! ### Single podcast
//! 1. `rightDiff(cached, pending)`; nothing to do when the diff is empty
//! 2. Partition the diff into batches numbered after the cached batch
//! 3. Number a batch without episodes `cached + 1` and let it inherit the
//!    cached episode date bounds
//! 4. Post each batch, confirming it when configured
//! 5. Stop at the first failure so no number is posted past a gap
//!
//! ### Many podcasts
//! Podcasts are synced one after another. A failure is recorded against its
//! podcast and the pass continues.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//! use core_runtime::CoreConfig;
//! use bridge_traits::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn bridge_traits::BatchStore>, feed: &dyn core_sync::FeedSource) -> core_sync::Result<()> {
//! let coordinator = SyncCoordinator::new(CoreConfig::default(), store, Arc::new(SystemClock))?;
//!
//! let outcome = coordinator
//!     .refresh_from_feed(feed, "https://example.com/feed.xml")
//!     .await?;
//! println!("Posted {} batches", outcome.transactions.len());
//! # Ok(())
//! # }
//! ```

use std::iter;
use std::sync::Arc;

use bridge_traits::storage::{BatchStore, Confirmation, Tag};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_metadata::{
    merge_batch_metadata, partition_metadata_batches, right_diff, sort_newest_first, HasMetadata,
    MergePolicy, MetadataError, Podcast, TagSet, ValuePresent, DEFAULT_PERSISTENT_FIELDS,
};
use core_runtime::logging::redact_url;
use core_runtime::CoreConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{encode_payload, TagCodec};
use crate::feed::FeedSource;
use crate::reader::{BatchReader, FetchedPodcast};
use crate::transaction::SyncTransaction;
use crate::{Result, SyncError};

// ============================================================================
// Types
// ============================================================================

/// A batch ready to be posted
#[derive(Debug, Clone)]
pub struct OutgoingBatch {
    pub metadata_batch: u64,
    /// Complete tag list, including the standard store tags
    pub tags: Vec<Tag>,
    /// Encoded payload
    pub payload: Bytes,
    /// The batch before encoding
    pub metadata: Podcast,
}

/// Result of syncing one podcast
///
/// A pass that fails part way still reports what reached the store: every
/// attempted transaction, and `canonical` advanced past the accepted batches.
#[derive(Debug)]
pub struct SyncOutcome {
    pub subscribe_url: String,
    /// One transaction per attempted batch, in posting order; a failed batch
    /// is last and is `Errored` or `Rejected`
    pub transactions: Vec<SyncTransaction>,
    /// Cached state merged with every accepted batch
    pub canonical: Podcast,
    /// Why posting stopped early
    pub failure: Option<SyncError>,
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Number of the last batch the store accepted in this pass
    pub fn last_accepted_batch(&self) -> Option<u64> {
        self.transactions
            .iter()
            .filter(|tx| tx.status.is_accepted())
            .map(|tx| tx.metadata_batch)
            .max()
    }
}

/// Cached and pending state of one podcast
#[derive(Debug, Clone)]
pub struct PodcastUpdate {
    pub cached: Podcast,
    pub pending: Podcast,
}

/// A podcast whose sync failed
#[derive(Debug)]
pub struct SyncFailure {
    pub subscribe_url: Option<String>,
    pub error: SyncError,
    /// Transactions attempted before the failure, the failed one last
    pub transactions: Vec<SyncTransaction>,
    /// Cached state advanced past the accepted batches, when posting started
    pub canonical: Option<Podcast>,
}

/// Result of a multi-podcast sync pass
#[derive(Debug, Default)]
pub struct SyncReport {
    pub succeeded: Vec<SyncOutcome>,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct SyncCoordinator {
    config: CoreConfig,
    store: Arc<dyn BatchStore>,
    clock: Arc<dyn Clock>,
    codec: TagCodec,
    reader: BatchReader,
}

impl SyncCoordinator {
    /// Create a coordinator over `store`
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `config` does not validate.
    pub fn new(config: CoreConfig, store: Arc<dyn BatchStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let codec = TagCodec::new(config.tags.clone());
        let reader = BatchReader::new(Arc::clone(&store), codec.clone(), config.max_fetch_batches);

        info!(
            app_name = %config.tags.app_name,
            max_episodes_per_batch = config.batching.max_episodes_per_batch,
            max_batches = config.batching.max_batches,
            "Sync coordinator ready"
        );

        Ok(Self {
            config,
            store,
            clock,
            codec,
            reader,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Canonical state of a podcast as stored
    pub async fn fetch_podcast(&self, subscribe_url: &str) -> Result<FetchedPodcast> {
        self.reader.fetch_podcast(subscribe_url).await
    }

    /// Split what `pending` adds to `cached` into encoded, numbered batches
    ///
    /// Returns no batches when there is nothing new.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingSubscribeUrl`] if neither record names the podcast
    /// - [`SyncError::Metadata`] if a batch cannot be numbered
    pub fn prepare_batches(&self, cached: &Podcast, pending: &Podcast) -> Result<Vec<OutgoingBatch>> {
        let subscribe_url = subscribe_url_of(cached, pending)?;

        let diff = right_diff(cached, pending, DEFAULT_PERSISTENT_FIELDS);
        // A new episode may carry nothing but its publication date
        if diff.episodes.is_empty() && !diff.has_metadata() {
            debug!(subscribe_url = %redact_url(&subscribe_url), "Nothing new to sync");
            return Ok(Vec::new());
        }

        let limits = &self.config.batching;
        let batches = partition_metadata_batches(
            cached,
            &diff,
            limits.max_episodes_per_batch,
            limits.max_batches,
        )?;

        batches
            .into_iter()
            .map(|mut batch| {
                if !batch.subscribe_url.is_present() {
                    batch.subscribe_url = Some(subscribe_url.clone());
                }
                if batch.episodes.is_empty() {
                    batch.metadata_batch = Some(next_batch_number(cached)?);
                    batch.first_episode_date = cached.first_episode_date;
                    batch.last_episode_date = cached.last_episode_date;
                }
                self.encode_batch(batch)
            })
            .collect()
    }

    /// Post everything `pending` adds to `cached`
    ///
    /// Posting stops at the first batch the store fails or rejects. That is
    /// reported in [`SyncOutcome::failure`] alongside the batches already
    /// accepted, which stay posted.
    ///
    /// # Errors
    ///
    /// Fails without posting anything if the batches cannot be prepared.
    #[instrument(skip(self, cached, pending))]
    pub async fn sync_podcast(&self, cached: &Podcast, pending: &Podcast) -> Result<SyncOutcome> {
        let subscribe_url = subscribe_url_of(cached, pending)?;
        let batches = self.prepare_batches(cached, pending)?;

        info!(
            subscribe_url = %redact_url(&subscribe_url),
            batches = batches.len(),
            "Syncing podcast"
        );

        let mut transactions = Vec::with_capacity(batches.len());
        let mut posted = Vec::with_capacity(batches.len());

        let mut failure = None;

        for batch in batches {
            let tx = SyncTransaction::new(&subscribe_url, batch.metadata_batch, self.clock.as_ref());
            let (tx, error) = self.submit(tx, &batch).await?;
            transactions.push(tx);
            if let Some(e) = error {
                failure = Some(e);
                break;
            }
            posted.push(batch.metadata);
        }

        let canonical = merge_batch_metadata(
            iter::once(cached).chain(posted.iter()),
            MergePolicy::MergeSpecialTags,
        );

        Ok(SyncOutcome {
            subscribe_url,
            transactions,
            canonical,
            failure,
        })
    }

    /// Sync every update in turn, collecting failures instead of stopping
    #[instrument(skip(self, updates), fields(podcasts = updates.len()))]
    pub async fn sync_all(&self, updates: &[PodcastUpdate]) -> SyncReport {
        let mut report = SyncReport::default();

        for update in updates {
            let failure = match self.sync_podcast(&update.cached, &update.pending).await {
                Ok(SyncOutcome {
                    subscribe_url,
                    transactions,
                    canonical,
                    failure: Some(error),
                }) => SyncFailure {
                    subscribe_url: Some(subscribe_url),
                    error,
                    transactions,
                    canonical: Some(canonical),
                },
                Ok(outcome) => {
                    report.succeeded.push(outcome);
                    continue;
                }
                Err(error) => SyncFailure {
                    subscribe_url: subscribe_url_of(&update.cached, &update.pending).ok(),
                    error,
                    transactions: Vec::new(),
                    canonical: None,
                },
            };

            error!(
                subscribe_url = %failure.subscribe_url.as_deref().map(redact_url).unwrap_or_default(),
                posted = failure.transactions.iter().filter(|tx| tx.status.is_accepted()).count(),
                "Podcast sync failed: {}",
                failure.error
            );
            report.failed.push(failure);
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Sync pass complete"
        );

        report
    }

    /// Read a podcast from the store, fetch its feed and post the difference
    ///
    /// # Errors
    ///
    /// Refuses to post with [`SyncError::TooManyBatches`] when the stored
    /// batches could not all be read, since the next number is unknown.
    #[instrument(skip(self, feed), fields(subscribe_url = %redact_url(subscribe_url)))]
    pub async fn refresh_from_feed(
        &self,
        feed: &dyn FeedSource,
        subscribe_url: &str,
    ) -> Result<SyncOutcome> {
        let fetched = self.reader.fetch_podcast(subscribe_url).await?;
        if fetched.is_truncated() {
            return Err(SyncError::TooManyBatches {
                limit: self.config.max_fetch_batches,
            });
        }
        for problem in &fetched.errors {
            warn!("Stored batch skipped: {}", problem);
        }

        let mut snapshot = feed.fetch_feed(subscribe_url).await?;
        if !snapshot.subscribe_url.is_present() {
            snapshot.subscribe_url = Some(subscribe_url.to_string());
        }
        sort_newest_first(&mut snapshot.episodes);

        self.sync_podcast(&fetched.podcast, &snapshot).await
    }

    fn encode_batch(&self, batch: Podcast) -> Result<OutgoingBatch> {
        let metadata_batch = batch
            .metadata_batch
            .ok_or_else(|| MetadataError::UnsupportedOperation("unnumbered batch".to_string()))?;

        let compress = self.config.compress_payloads;
        let tags = self.codec.encode(&TagSet::from(&batch), compress);
        let payload = encode_payload(&batch, compress)?;

        Ok(OutgoingBatch {
            metadata_batch,
            tags,
            payload,
            metadata: batch,
        })
    }

    /// Post one batch and drive its transaction to a resting state
    ///
    /// Store failures come back next to the transaction they ended; the outer
    /// error is reserved for invalid transitions.
    async fn submit(
        &self,
        tx: SyncTransaction,
        batch: &OutgoingBatch,
    ) -> Result<(SyncTransaction, Option<SyncError>)> {
        let clock = self.clock.as_ref();

        let receipt = match self
            .store
            .post_batch(batch.tags.clone(), batch.payload.clone())
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                let tx = tx.fail(e.to_string(), clock)?;
                error!(
                    transaction_id = %tx.id,
                    metadata_batch = batch.metadata_batch,
                    "Failed to post batch: {}",
                    e
                );
                return Ok((tx, Some(e.into())));
            }
        };

        let tx = tx.post(receipt.id, clock)?;
        debug!(
            transaction_id = %tx.id,
            metadata_batch = batch.metadata_batch,
            bytes = batch.payload.len(),
            "Posted batch"
        );

        if !self.config.confirm_transactions {
            return Ok((tx, None));
        }

        let remote_id = tx.remote_id.clone().unwrap_or_default();
        match self.store.confirm(&remote_id).await {
            Ok(Confirmation::Confirmed) => Ok((tx.confirm(clock)?, None)),
            Ok(Confirmation::Pending) => {
                debug!(transaction_id = %tx.id, "Batch confirmation pending");
                Ok((tx, None))
            }
            Ok(Confirmation::Rejected) => {
                let tx = tx.reject(clock)?;
                warn!(
                    transaction_id = %tx.id,
                    metadata_batch = batch.metadata_batch,
                    "Store rejected batch"
                );
                let error = SyncError::Rejected {
                    metadata_batch: batch.metadata_batch,
                };
                Ok((tx, Some(error)))
            }
            Err(e) => {
                let tx = tx.fail(e.to_string(), clock)?;
                error!(transaction_id = %tx.id, "Failed to confirm batch: {}", e);
                Ok((tx, Some(e.into())))
            }
        }
    }
}

fn subscribe_url_of(cached: &Podcast, pending: &Podcast) -> Result<String> {
    pending
        .subscribe_url
        .as_ref()
        .filter(|url| url.is_present())
        .or_else(|| cached.subscribe_url.as_ref().filter(|url| url.is_present()))
        .cloned()
        .ok_or(SyncError::MissingSubscribeUrl)
}

/// Number for a batch that carries no episodes
fn next_batch_number(cached: &Podcast) -> Result<u64> {
    match cached.metadata_batch.filter(|_| cached.has_metadata()) {
        None => Ok(0),
        Some(current) => current.checked_add(1).ok_or_else(|| {
            MetadataError::UnsupportedOperation("metadata batch number overflow".to_string())
                .into()
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::{PostReceipt, StoredBatch};
    use bridge_traits::time::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_metadata::Episode;
    use mockall::mock;

    use crate::codec::decode_payload;
    use crate::transaction::TransactionStatus;

    mock! {
        Store {}

        #[async_trait]
        impl BatchStore for Store {
            async fn find_batch(&self, query: &[Tag]) -> BridgeResult<Option<StoredBatch>>;
            async fn post_batch(&self, tags: Vec<Tag>, payload: Bytes) -> BridgeResult<PostReceipt>;
            async fn confirm(&self, id: &str) -> BridgeResult<Confirmation>;
        }
    }

    const URL: &str = "https://example.com/feed.xml";

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset)
    }

    fn feed(count: i64) -> Podcast {
        Podcast {
            title: Some("Show".to_string()),
            description: Some("About the show".to_string()),
            episodes: (1..=count)
                .rev()
                .map(|n| Episode::new(day(n)).with_title(format!("Ep{n}")))
                .collect(),
            ..Podcast::new(URL)
        }
    }

    fn coordinator(store: MockStore, config: CoreConfig) -> SyncCoordinator {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        SyncCoordinator::new(config, Arc::new(store), Arc::new(clock)).unwrap()
    }

    fn small_batches() -> CoreConfig {
        CoreConfig::builder()
            .max_episodes_per_batch(2)
            .max_batches(10)
            .build()
            .unwrap()
    }

    fn tag<'a>(tags: &'a [Tag], name: &str) -> Vec<&'a str> {
        tags.iter()
            .filter(|tag| tag.name == name)
            .map(|tag| tag.value.as_str())
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = CoreConfig {
            max_fetch_batches: 0,
            ..CoreConfig::default()
        };
        let clock = FixedClock(day(0));
        let result = SyncCoordinator::new(config, Arc::new(MockStore::new()), Arc::new(clock));

        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_prepare_first_sync() {
        let coordinator = coordinator(MockStore::new(), small_batches());

        let batches = coordinator.prepare_batches(&Podcast::default(), &feed(5)).unwrap();

        let numbers: Vec<u64> = batches.iter().map(|batch| batch.metadata_batch).collect();
        assert_eq!(numbers, vec![0, 1, 2]);

        // Oldest episode lands in batch 0
        assert_eq!(batches[0].metadata.episodes.len(), 2);
        assert_eq!(batches[0].metadata.episodes[1].title.as_deref(), Some("Ep1"));
        assert_eq!(batches[2].metadata.episodes.len(), 1);

        assert_eq!(tag(&batches[0].tags, "metadataBatch"), vec!["0"]);
        assert_eq!(tag(&batches[2].tags, "subscribeUrl"), vec![URL]);

        let decoded = decode_payload(&batches[1].payload).unwrap();
        assert_eq!(decoded, batches[1].metadata);
    }

    #[test]
    fn test_prepare_nothing_new() {
        let coordinator = coordinator(MockStore::new(), small_batches());
        let cached = merge_batch_metadata(
            coordinator
                .prepare_batches(&Podcast::default(), &feed(3))
                .unwrap()
                .iter()
                .map(|batch| &batch.metadata),
            MergePolicy::MergeSpecialTags,
        );

        let batches = coordinator.prepare_batches(&cached, &feed(3)).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_prepare_scalar_change_inherits_bounds() {
        let coordinator = coordinator(MockStore::new(), small_batches());
        let cached = Podcast {
            first_episode_date: Some(day(1)),
            last_episode_date: Some(day(3)),
            metadata_batch: Some(1),
            ..feed(3)
        };
        let pending = Podcast {
            description: Some("A new description".to_string()),
            ..feed(3)
        };

        let batches = coordinator.prepare_batches(&cached, &pending).unwrap();

        assert_eq!(batches.len(), 1);
        let batch = &batches[0].metadata;
        assert_eq!(batches[0].metadata_batch, 2);
        assert!(batch.episodes.is_empty());
        assert_eq!(batch.description.as_deref(), Some("A new description"));
        assert_eq!(batch.subscribe_url.as_deref(), Some(URL));
        assert_eq!(batch.first_episode_date, Some(day(1)));
        assert_eq!(batch.last_episode_date, Some(day(3)));
    }

    #[test]
    fn test_prepare_requires_subscribe_url() {
        let coordinator = coordinator(MockStore::new(), small_batches());
        let pending = Podcast {
            subscribe_url: None,
            ..feed(1)
        };

        let result = coordinator.prepare_batches(&Podcast::default(), &pending);
        assert!(matches!(result, Err(SyncError::MissingSubscribeUrl)));
    }

    #[test]
    fn test_prepare_backfill_is_unsupported() {
        let coordinator = coordinator(MockStore::new(), small_batches());
        let cached = Podcast {
            first_episode_date: Some(day(10)),
            last_episode_date: Some(day(20)),
            metadata_batch: Some(4),
            ..Podcast::new(URL)
        };

        let result = coordinator.prepare_batches(&cached, &feed(3));
        assert!(matches!(
            result,
            Err(SyncError::Metadata(MetadataError::UnsupportedOperation(_)))
        ));
    }

    #[tokio::test]
    async fn test_sync_podcast_posts_in_order() {
        let mut store = MockStore::new();
        let mut sequence = mockall::Sequence::new();
        for number in 0..3u64 {
            store
                .expect_post_batch()
                .withf(move |tags, _| {
                    tags.iter()
                        .any(|tag| tag.name == "metadataBatch" && tag.value == number.to_string())
                })
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |_, _| Ok(PostReceipt { id: format!("remote-{number}") }));
        }
        store
            .expect_confirm()
            .times(3)
            .returning(|_| Ok(Confirmation::Confirmed));

        let coordinator = coordinator(store, small_batches());
        let outcome = coordinator
            .sync_podcast(&Podcast::default(), &feed(5))
            .await
            .unwrap();

        assert_eq!(outcome.subscribe_url, URL);
        assert_eq!(outcome.transactions.len(), 3);
        assert!(outcome
            .transactions
            .iter()
            .all(|tx| tx.status == TransactionStatus::Confirmed));
        assert_eq!(outcome.transactions[2].remote_id.as_deref(), Some("remote-2"));
        assert_eq!(outcome.canonical.metadata_batch, Some(2));
        assert_eq!(outcome.canonical.episodes.len(), 5);
    }

    #[tokio::test]
    async fn test_sync_podcast_without_confirmation() {
        let mut store = MockStore::new();
        store
            .expect_post_batch()
            .times(1)
            .returning(|_, _| Ok(PostReceipt { id: "remote-0".to_string() }));
        store.expect_confirm().never();

        let config = CoreConfig::builder().confirm_transactions(false).build().unwrap();
        let coordinator = coordinator(store, config);
        let outcome = coordinator
            .sync_podcast(&Podcast::default(), &feed(2))
            .await
            .unwrap();

        assert_eq!(outcome.transactions[0].status, TransactionStatus::Posted);
    }

    #[tokio::test]
    async fn test_pending_confirmation_leaves_batch_posted() {
        let mut store = MockStore::new();
        store
            .expect_post_batch()
            .returning(|_, _| Ok(PostReceipt { id: "remote-0".to_string() }));
        store
            .expect_confirm()
            .withf(|id| id.to_string() == "remote-0")
            .returning(|_| Ok(Confirmation::Pending));

        let coordinator = coordinator(store, CoreConfig::default());
        let outcome = coordinator
            .sync_podcast(&Podcast::default(), &feed(2))
            .await
            .unwrap();

        assert_eq!(outcome.transactions[0].status, TransactionStatus::Posted);
    }

    #[tokio::test]
    async fn test_post_failure_stops_sync() {
        let mut store = MockStore::new();
        store
            .expect_post_batch()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("502 Bad Gateway".to_string())));

        let coordinator = coordinator(store, small_batches());
        let outcome = coordinator
            .sync_podcast(&Podcast::default(), &feed(5))
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert!(matches!(outcome.failure, Some(SyncError::Storage(_))));
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].status, TransactionStatus::Errored);
        assert_eq!(outcome.last_accepted_batch(), None);
        assert!(outcome.canonical.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_batch_stops_sync() {
        let mut store = MockStore::new();
        store
            .expect_post_batch()
            .times(1)
            .returning(|_, _| Ok(PostReceipt { id: "remote-0".to_string() }));
        store
            .expect_confirm()
            .times(1)
            .returning(|_| Ok(Confirmation::Rejected));

        let coordinator = coordinator(store, small_batches());
        let outcome = coordinator
            .sync_podcast(&Podcast::default(), &feed(5))
            .await
            .unwrap();

        assert!(matches!(
            outcome.failure,
            Some(SyncError::Rejected { metadata_batch: 0 })
        ));
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].status, TransactionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_partial_failure_reports_accepted_batches() {
        let mut store = MockStore::new();
        let mut sequence = mockall::Sequence::new();
        store
            .expect_post_batch()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(PostReceipt { id: "remote-0".to_string() }));
        store
            .expect_post_batch()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(BridgeError::OperationFailed("connection reset".to_string())));
        store
            .expect_confirm()
            .times(1)
            .returning(|_| Ok(Confirmation::Confirmed));

        let coordinator = coordinator(store, small_batches());
        let updates = vec![PodcastUpdate {
            cached: Podcast::default(),
            pending: feed(5),
        }];

        let report = coordinator.sync_all(&updates).await;

        assert!(report.succeeded.is_empty());
        let failure = &report.failed[0];
        assert_eq!(failure.subscribe_url.as_deref(), Some(URL));
        assert!(matches!(failure.error, SyncError::Storage(_)));

        assert_eq!(failure.transactions.len(), 2);
        assert_eq!(failure.transactions[0].metadata_batch, 0);
        assert_eq!(failure.transactions[0].status, TransactionStatus::Confirmed);
        assert_eq!(failure.transactions[1].metadata_batch, 1);
        assert_eq!(failure.transactions[1].status, TransactionStatus::Errored);

        let canonical = failure.canonical.as_ref().unwrap();
        assert_eq!(canonical.metadata_batch, Some(0));
        assert_eq!(canonical.episodes.len(), 2);

        // Retrying from the advanced state continues after the stored batch
        let retry = coordinator.prepare_batches(canonical, &feed(5)).unwrap();
        let numbers: Vec<u64> = retry.iter().map(|batch| batch.metadata_batch).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_prepare_date_only_episode() {
        let coordinator = coordinator(MockStore::new(), small_batches());
        let cached = merge_batch_metadata(
            coordinator
                .prepare_batches(&Podcast::default(), &feed(1))
                .unwrap()
                .iter()
                .map(|batch| &batch.metadata),
            MergePolicy::MergeSpecialTags,
        );

        let mut pending = feed(1);
        pending.episodes.insert(0, Episode::new(day(5)));

        let batches = coordinator.prepare_batches(&cached, &pending).unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].metadata_batch, 1);
        let episodes = &batches[0].metadata.episodes;
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].published_at, day(5));
        assert!(episodes[0].title.is_none());
        assert_eq!(batches[0].metadata.last_episode_date, Some(day(5)));
    }

    #[tokio::test]
    async fn test_sync_all_isolates_failures() {
        let mut store = MockStore::new();
        store
            .expect_post_batch()
            .returning(|_, _| Ok(PostReceipt { id: "remote".to_string() }));
        store
            .expect_confirm()
            .returning(|_| Ok(Confirmation::Confirmed));

        let coordinator = coordinator(store, small_batches());
        let backfill = Podcast {
            first_episode_date: Some(day(10)),
            last_episode_date: Some(day(20)),
            metadata_batch: Some(4),
            ..Podcast::new("https://example.com/other.xml")
        };
        let updates = vec![
            PodcastUpdate {
                cached: backfill,
                pending: Podcast {
                    subscribe_url: Some("https://example.com/other.xml".to_string()),
                    ..feed(2)
                },
            },
            PodcastUpdate {
                cached: Podcast::default(),
                pending: feed(2),
            },
        ];

        let report = coordinator.sync_all(&updates).await;

        assert!(!report.is_success());
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].subscribe_url, URL);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed[0].subscribe_url.as_deref(),
            Some("https://example.com/other.xml")
        );
        assert!(matches!(report.failed[0].error, SyncError::Metadata(_)));
    }
}
