//! Feed snapshot source
//!
//! Fetching and parsing RSS/Atom feeds is the host's job. The sync layer only
//! needs the parsed result shaped like a metadata batch: no tags and no batch
//! number.

use async_trait::async_trait;
use core_metadata::Podcast;

use crate::error::Result;

/// Source of current feed snapshots
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `subscribe_url`
    ///
    /// Episodes must be sorted newest first. Failures should be reported as
    /// [`SyncError::Feed`](crate::SyncError::Feed).
    async fn fetch_feed(&self, subscribe_url: &str) -> Result<Podcast>;
}
