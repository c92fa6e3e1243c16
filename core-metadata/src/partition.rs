//! # Batch Partitioning
//!
//! Splits an outgoing update into size-bounded batches and numbers them.
//!
//! ## Overview
//!
//! Episodes arrive newest-first. Partitioning starts from the oldest end so
//! that batch numbers grow with publication time: the lowest new number always
//! holds the oldest unsynced episodes.
//!
//! Each batch only repeats the scalar fields that changed since the previous
//! batch, plus `subscribeUrl` and `title`. Its date bounds come from its own
//! episode slice and its number from [`get_metadata_batch_number`] against the
//! cached state merged with every batch emitted before it.

use std::iter;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::diff::right_diff;
use crate::error::{MetadataError, Result};
use crate::merge::{merge_batch_metadata, MergePolicy};
use crate::models::{episode_date_bounds, Podcast, PodcastField};
use crate::value::{is_valid_date, HasMetadata};

/// Fields repeated in every batch of one partition
const BATCH_PERSISTENT_FIELDS: &[PodcastField] = &[PodcastField::SubscribeUrl, PodcastField::Title];

/// Split `new` into numbered batches relative to `cached`
///
/// Without episodes `new` is returned as the only batch, unnumbered. At most
/// `max_batches` batches of `max_episodes_per_batch` episodes are produced;
/// newer episodes beyond that are left for a later pass.
///
/// # Errors
///
/// Fails if numbering a batch fails (see [`get_metadata_batch_number`]).
pub fn partition_metadata_batches(
    cached: &Podcast,
    new: &Podcast,
    max_episodes_per_batch: usize,
    max_batches: usize,
) -> Result<Vec<Podcast>> {
    if new.episodes.is_empty() {
        return Ok(vec![new.clone()]);
    }

    let template = Podcast {
        episodes: Vec::new(),
        ..new.clone()
    };

    let mut previous = Podcast::default();
    let mut emitted: Vec<Podcast> = Vec::new();

    for slice in new
        .episodes
        .rchunks(max_episodes_per_batch.max(1))
        .take(max_batches)
    {
        let current = Podcast {
            episodes: slice.to_vec(),
            ..template.clone()
        };

        let mut batch = right_diff(&previous, &current, BATCH_PERSISTENT_FIELDS);

        let prior = merge_batch_metadata(
            iter::once(cached).chain(emitted.iter()),
            MergePolicy::MergeSpecialTags,
        );
        let (first, last) = episode_date_bounds(slice);
        let number = get_metadata_batch_number(&prior, first, last)?;

        debug!(
            metadata_batch = number,
            episodes = slice.len(),
            first_episode_date = ?first,
            last_episode_date = ?last,
            "Prepared metadata batch"
        );

        batch.first_episode_date = first;
        batch.last_episode_date = last;
        batch.metadata_batch = Some(number);

        emitted.push(batch);
        previous = current;
    }

    emitted.retain(HasMetadata::has_metadata);
    Ok(emitted)
}

/// Sequence number for a batch following `cached`
///
/// The first batch of a podcast is numbered 0; every later batch is the
/// cached number plus one.
///
/// # Errors
///
/// - [`MetadataError::InvalidDate`] if either bound is missing or invalid.
/// - [`MetadataError::UnsupportedOperation`] if the cached state already
///   reaches past `last`, i.e. the batch would be inserted retroactively.
pub fn get_metadata_batch_number(
    cached: &Podcast,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
) -> Result<u64> {
    let (Some(_), Some(last)) = (first.filter(is_valid_date), last.filter(is_valid_date)) else {
        return Err(MetadataError::InvalidDate {
            first: format_bound(first),
            last: format_bound(last),
        });
    };

    let Some(current) = cached.metadata_batch.filter(|_| cached.has_metadata()) else {
        return Ok(0);
    };

    if let Some(cached_last) = cached.last_episode_date.filter(is_valid_date) {
        if cached_last > last {
            return Err(MetadataError::UnsupportedOperation(format!(
                "supplementing existing metadata: batch ending {} precedes stored episodes up to {}",
                last.to_rfc3339(),
                cached_last.to_rfc3339()
            )));
        }
    }

    current.checked_add(1).ok_or_else(|| {
        MetadataError::UnsupportedOperation("metadata batch number overflow".to_string())
    })
}

fn format_bound(bound: Option<DateTime<Utc>>) -> String {
    bound.map_or_else(|| "missing".to_string(), |date| date.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Episode;
    use chrono::{Duration, TimeZone};

    fn at(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    /// Podcast with `count` episodes, newest first, on days `count..=1`
    fn podcast_with_episodes(count: i64) -> Podcast {
        let mut podcast = Podcast::new("https://example.com/feed");
        podcast.title = Some("Show".to_string());
        podcast.description = Some("About the show".to_string());
        podcast.episodes = (1..=count)
            .rev()
            .map(|day| Episode::new(at(day)).with_title(format!("Ep{day}")))
            .collect();
        podcast
    }

    #[test]
    fn test_batch_number_for_empty_cache() {
        assert_eq!(
            get_metadata_batch_number(&Podcast::default(), Some(at(1)), Some(at(2))),
            Ok(0)
        );
    }

    #[test]
    fn test_batch_number_without_cached_number() {
        let mut cached = Podcast::new("https://example.com/feed");
        cached.title = Some("Show".to_string());
        assert_eq!(get_metadata_batch_number(&cached, Some(at(1)), Some(at(2))), Ok(0));
    }

    #[test]
    fn test_batch_number_increments() {
        let cached = Podcast {
            metadata_batch: Some(3),
            last_episode_date: Some(at(5)),
            ..Podcast::default()
        };
        assert_eq!(get_metadata_batch_number(&cached, Some(at(5)), Some(at(9))), Ok(4));
    }

    #[test]
    fn test_batch_number_rejects_retroactive_insert() {
        let cached = Podcast {
            metadata_batch: Some(3),
            last_episode_date: Some(at(10)),
            ..Podcast::default()
        };

        let result = get_metadata_batch_number(&cached, Some(at(1)), Some(at(4)));
        assert!(matches!(result, Err(MetadataError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_batch_number_rejects_invalid_dates() {
        let epoch = Utc.timestamp_millis_opt(0).unwrap();

        for (first, last) in [(None, Some(at(1))), (Some(at(1)), None), (Some(epoch), Some(at(1)))] {
            let result = get_metadata_batch_number(&Podcast::default(), first, last);
            assert!(matches!(result, Err(MetadataError::InvalidDate { .. })));
        }
    }

    #[test]
    fn test_partition_without_episodes_is_single_batch() {
        let mut new = Podcast::new("https://example.com/feed");
        new.description = Some("Updated".to_string());

        let batches = partition_metadata_batches(&Podcast::default(), &new, 2, 10).unwrap();
        assert_eq!(batches, vec![new]);
    }

    #[test]
    fn test_partition_from_oldest_end() {
        let new = podcast_with_episodes(5);
        let batches = partition_metadata_batches(&Podcast::default(), &new, 2, 10).unwrap();

        assert_eq!(batches.len(), 3);

        let numbers: Vec<_> = batches.iter().map(|batch| batch.metadata_batch).collect();
        assert_eq!(numbers, vec![Some(0), Some(1), Some(2)]);

        let titles = |batch: &Podcast| -> Vec<String> {
            batch
                .episodes
                .iter()
                .filter_map(|episode| episode.title.clone())
                .collect()
        };
        assert_eq!(titles(&batches[0]), vec!["Ep2", "Ep1"]);
        assert_eq!(titles(&batches[1]), vec!["Ep4", "Ep3"]);
        assert_eq!(titles(&batches[2]), vec!["Ep5"]);

        assert_eq!(batches[0].first_episode_date, Some(at(1)));
        assert_eq!(batches[0].last_episode_date, Some(at(2)));
        assert_eq!(batches[2].first_episode_date, Some(at(5)));
        assert_eq!(batches[2].last_episode_date, Some(at(5)));
    }

    #[test]
    fn test_partition_repeats_only_identity_scalars() {
        let new = podcast_with_episodes(4);
        let batches = partition_metadata_batches(&Podcast::default(), &new, 2, 10).unwrap();

        assert_eq!(batches[0].description.as_deref(), Some("About the show"));
        assert!(batches[1].description.is_none());
        assert_eq!(batches[1].title.as_deref(), Some("Show"));
        assert_eq!(batches[1].subscribe_url.as_deref(), Some("https://example.com/feed"));
    }

    #[test]
    fn test_partition_respects_max_batches() {
        let new = podcast_with_episodes(7);
        let batches = partition_metadata_batches(&Podcast::default(), &new, 2, 2).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].last_episode_date, Some(at(4)));
    }

    #[test]
    fn test_partition_continues_cached_numbering() {
        let cached = Podcast {
            subscribe_url: Some("https://example.com/feed".to_string()),
            title: Some("Show".to_string()),
            first_episode_date: Some(at(-20)),
            last_episode_date: Some(at(0)),
            metadata_batch: Some(6),
            ..Podcast::default()
        };
        let new = podcast_with_episodes(3);

        let batches = partition_metadata_batches(&cached, &new, 2, 10).unwrap();
        let numbers: Vec<_> = batches.iter().map(|batch| batch.metadata_batch).collect();
        assert_eq!(numbers, vec![Some(7), Some(8)]);
    }

    #[test]
    fn test_partition_rejects_episodes_older_than_cache() {
        let cached = Podcast {
            title: Some("Show".to_string()),
            last_episode_date: Some(at(30)),
            metadata_batch: Some(2),
            ..Podcast::default()
        };
        let new = podcast_with_episodes(3);

        let result = partition_metadata_batches(&cached, &new, 2, 10);
        assert!(matches!(result, Err(MetadataError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_partition_does_not_mutate_inputs() {
        let cached = Podcast::default();
        let new = podcast_with_episodes(3);
        let snapshot = new.clone();

        let _ = partition_metadata_batches(&cached, &new, 1, 10).unwrap();

        assert_eq!(new, snapshot);
        assert!(cached.is_empty());
    }
}
