//! Episode list merging
//!
//! Merges episode lists that are each sorted newest-first into one sorted,
//! de-duplicated list. Episodes are matched by publication instant.
//!
//! ## Precedence
//!
//! Of the two lists, the one whose newest episode is more recent is the
//! "newer" list. When an episode appears in both, present values from the
//! newer list win, list fields are unioned case-insensitively, and absent
//! values fall back to the older list.
//!
//! ## Fast path
//!
//! When the two lists cover disjoint time windows no pairwise comparison is
//! needed and the result is simply `newer ++ older`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Episode, EpisodeField, EpisodeList};
use crate::value::{merge_arrays_case_insensitive, ValuePresent};

/// Merge two newest-first episode lists
///
/// Neither input is modified. If either list is empty the other is returned
/// as-is.
pub fn merge_episodes(old: &[Episode], new: &[Episode]) -> Vec<Episode> {
    if old.is_empty() {
        return new.to_vec();
    }
    if new.is_empty() {
        return old.to_vec();
    }

    let (older, newer) = order_by_recency(old, new);
    let (newer_oldest, _) = date_range(newer);
    let (_, older_newest) = date_range(older);

    if older_newest < newer_oldest {
        return newer.iter().chain(older).cloned().collect();
    }

    let mut index: HashMap<i64, usize> = HashMap::with_capacity(newer.len());
    for (position, episode) in newer.iter().enumerate() {
        index.entry(episode.key()).or_insert(position);
    }

    let mut consumed = vec![false; newer.len()];
    let mut merged_older = Vec::with_capacity(older.len());
    let mut scanning = true;

    for episode in older {
        // Lists are newest-first: once below the newer window, nothing else can match
        if scanning && episode.published_at < newer_oldest {
            scanning = false;
        }

        let matched = if scanning {
            index.get(&episode.key()).copied()
        } else {
            None
        };

        match matched {
            Some(position) => {
                consumed[position] = true;
                merged_older.push(merge_episode(episode, &newer[position]));
            }
            None => merged_older.push(episode.clone()),
        }
    }

    let mut merged: Vec<Episode> = newer
        .iter()
        .zip(&consumed)
        .filter(|(_, consumed)| !**consumed)
        .map(|(episode, _)| episode.clone())
        .chain(merged_older)
        .collect();

    sort_newest_first(&mut merged);
    merged
}

/// Left-fold [`merge_episodes`] over a sequence of batches
///
/// Zero batches yield an empty list; a single batch is returned unchanged.
pub fn merge_episode_batches<'a, I>(batches: I) -> Vec<Episode>
where
    I: IntoIterator<Item = &'a [Episode]>,
{
    let mut batches = batches.into_iter();
    let Some(first) = batches.next() else {
        return Vec::new();
    };

    batches.fold(first.to_vec(), |merged, batch| merge_episodes(&merged, batch))
}

/// Stable sort by publication instant, newest first
pub fn sort_newest_first(episodes: &mut [Episode]) {
    episodes.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Merge two copies of the same episode, `newer` taking precedence
fn merge_episode(older: &Episode, newer: &Episode) -> Episode {
    let mut merged = older.clone();

    for field in EpisodeField::ALL {
        let value = newer.field(field);
        if value.is_present() {
            merged.field_mut(field).clone_from(value);
        }
    }

    for list in EpisodeList::ALL {
        let values = newer.list(list);
        if values.is_present() {
            *merged.list_mut(list) = merge_arrays_case_insensitive(older.list(list), values);
        }
    }

    merged
}

/// Returns `(older, newer)` by comparing the newest episode of each list
///
/// Ties keep the caller's roles.
fn order_by_recency<'a>(
    old: &'a [Episode],
    new: &'a [Episode],
) -> (&'a [Episode], &'a [Episode]) {
    let (_, old_newest) = date_range(old);
    let (_, new_newest) = date_range(new);

    if old_newest > new_newest {
        (new, old)
    } else {
        (old, new)
    }
}

/// `(oldest, newest)` publication instants of a non-empty list
fn date_range(episodes: &[Episode]) -> (DateTime<Utc>, DateTime<Utc>) {
    let mut dates = episodes.iter().map(|episode| episode.published_at);
    let first = dates.next().unwrap_or_default();

    dates.fold((first, first), |(oldest, newest), date| {
        (oldest.min(date), newest.max(date))
    })
}
