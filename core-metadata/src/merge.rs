//! # Batch Merging
//!
//! Folds the partial records stored as separate batches back into one
//! canonical podcast.
//!
//! ## Overview
//!
//! Batches are folded left to right. Two policies exist:
//!
//! - [`MergePolicy::Override`]: every present value of a later batch replaces
//!   the accumulated one. Absent or blank values never overwrite.
//! - [`MergePolicy::MergeSpecialTags`]: the fields that describe the batch
//!   sequence follow the tag rules instead. `firstEpisodeDate` keeps the
//!   earliest value, `lastEpisodeDate` the latest, `metadataBatch` the highest,
//!   and the string lists are unioned case-insensitively. Everything else
//!   still overrides.
//!
//! Episodes are merged separately through
//! [`merge_episode_batches`](crate::episodes::merge_episode_batches) and
//! attached to the result under either policy.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::merge::{merge_batch_metadata, MergePolicy};
//!
//! let canonical = merge_batch_metadata(&batches, MergePolicy::MergeSpecialTags);
//! ```

use chrono::{DateTime, Utc};

use crate::episodes::merge_episode_batches;
use crate::models::{Podcast, PodcastField, PodcastList, TagSet};
use crate::value::{merge_arrays_case_insensitive, HasMetadata, ValuePresent};

/// How special batch fields combine across batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Later present values win for every field
    #[default]
    Override,
    /// Date bounds, batch number and string lists aggregate across batches
    MergeSpecialTags,
}

/// Merge an ordered sequence of batches into one podcast record
///
/// Returns the empty record when no batch carries metadata. Inputs are only
/// borrowed.
pub fn merge_batch_metadata<'a, I>(batches: I, policy: MergePolicy) -> Podcast
where
    I: IntoIterator<Item = &'a Podcast>,
{
    let batches: Vec<&Podcast> = batches.into_iter().collect();
    if !batches.iter().any(|batch| batch.has_metadata()) {
        return Podcast::default();
    }

    let episodes = merge_episode_batches(batches.iter().map(|batch| batch.episodes.as_slice()));

    let mut merged = batches
        .iter()
        .fold(Podcast::default(), |mut merged, batch| {
            fold_batch(&mut merged, batch, policy);
            merged
        });

    merged.episodes = episodes;
    merged
}

/// Merge the tag sets of an ordered sequence of batches
///
/// Date bounds take the earliest/latest value, `metadata_batch` the highest
/// and the lists are unioned, so those fields do not depend on input order.
/// The remaining fields are last-write-wins.
pub fn merge_batch_tags(tag_batches: &[TagSet]) -> TagSet {
    let mut merged = TagSet::default();

    for tags in tag_batches {
        for field in TagSet::FIELDS {
            if let (Some(value), Some(slot)) = (tags.field(field), merged.field_mut(field)) {
                override_if_present(slot, value);
            }
        }

        for list in PodcastList::ALL {
            union_if_present(merged.list_mut(list), tags.list(list));
        }

        earliest(&mut merged.first_episode_date, tags.first_episode_date);
        latest(&mut merged.last_episode_date, tags.last_episode_date);
        highest(&mut merged.metadata_batch, tags.metadata_batch);
    }

    merged
}

fn fold_batch(merged: &mut Podcast, batch: &Podcast, policy: MergePolicy) {
    for field in PodcastField::ALL {
        override_if_present(merged.field_mut(field), batch.field(field));
    }
    override_if_present(&mut merged.last_build_date, &batch.last_build_date);

    match policy {
        MergePolicy::Override => {
            for list in PodcastList::ALL {
                let values = batch.list(list);
                if values.is_present() {
                    merged.list_mut(list).clone_from(values);
                }
            }
            override_if_present(&mut merged.first_episode_date, &batch.first_episode_date);
            override_if_present(&mut merged.last_episode_date, &batch.last_episode_date);
            if batch.metadata_batch.is_some() {
                merged.metadata_batch = batch.metadata_batch;
            }
        }
        MergePolicy::MergeSpecialTags => {
            for list in PodcastList::ALL {
                union_if_present(merged.list_mut(list), batch.list(list));
            }
            earliest(&mut merged.first_episode_date, batch.first_episode_date);
            latest(&mut merged.last_episode_date, batch.last_episode_date);
            highest(&mut merged.metadata_batch, batch.metadata_batch);
        }
    }
}

fn override_if_present<T: Clone + ValuePresent>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_present() {
        slot.clone_from(value);
    }
}

fn union_if_present(slot: &mut Vec<String>, values: &[String]) {
    if values.is_present() {
        *slot = merge_arrays_case_insensitive(slot.as_slice(), values);
    }
}

fn earliest(slot: &mut Option<DateTime<Utc>>, value: Option<DateTime<Utc>>) {
    if let Some(date) = value.filter(ValuePresent::is_present) {
        *slot = Some(slot.map_or(date, |current| current.min(date)));
    }
}

fn latest(slot: &mut Option<DateTime<Utc>>, value: Option<DateTime<Utc>>) {
    if let Some(date) = value.filter(ValuePresent::is_present) {
        *slot = Some(slot.map_or(date, |current| current.max(date)));
    }
}

fn highest(slot: &mut Option<u64>, value: Option<u64>) {
    if let Some(number) = value {
        *slot = Some(slot.map_or(number, |current| current.max(number)));
    }
}
