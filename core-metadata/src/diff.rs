//! # Right Diff
//!
//! Computes what a newer snapshot adds on top of an older one, so only that
//! part needs to be uploaded.
//!
//! ## Rules
//!
//! - Scalars are kept when present in `new` and different from `old`.
//! - `lastBuildDate` is kept when its timestamp differs.
//! - Lists keep only the elements `old` does not already contain, compared
//!   case-insensitively.
//! - Episodes are matched by publication instant. Matching episodes are
//!   diffed field by field and kept only when something changed; unmatched
//!   episodes are kept whole.
//! - `firstEpisodeDate`, `lastEpisodeDate` and `metadataBatch` are derived
//!   per batch and never diffed.
//!
//! Identity fields named in `persistent` are re-attached to any non-empty
//! diff, so a batch can always be traced back to its podcast.

use std::collections::{HashMap, HashSet};

use crate::episodes::sort_newest_first;
use crate::models::{Episode, EpisodeField, EpisodeList, Podcast, PodcastField, PodcastList};
use crate::value::{HasMetadata, ValuePresent};

/// Fields re-attached to every non-empty diff by default
pub const DEFAULT_PERSISTENT_FIELDS: &[PodcastField] = &[PodcastField::SubscribeUrl];

/// Everything in `new` that `old` does not already say
///
/// If `old` carries no metadata the whole of `new` is returned; if `new`
/// carries none the result is the empty record. Neither input is modified.
///
/// List elements (podcast and episode categories and keywords) are compared
/// after trimming and lower-casing, so `"News"` in `new` is not reported when
/// `old` holds `"news"`. Stored lists are lower-cased on merge, and an exact
/// comparison would report every mixed-case feed value again. Blank elements
/// are never reported.
pub fn right_diff(old: &Podcast, new: &Podcast, persistent: &[PodcastField]) -> Podcast {
    if !old.has_metadata() {
        return new.clone();
    }
    if !new.has_metadata() {
        return Podcast::default();
    }

    let mut diff = Podcast::default();

    for field in PodcastField::ALL {
        if let Some(value) = changed_scalar(old.field(field), new.field(field)) {
            *diff.field_mut(field) = Some(value);
        }
    }

    if new.last_build_date.is_present()
        && old.last_build_date.map(|date| date.timestamp_millis())
            != new.last_build_date.map(|date| date.timestamp_millis())
    {
        diff.last_build_date = new.last_build_date;
    }

    for list in PodcastList::ALL {
        *diff.list_mut(list) = added_elements(old.list(list), new.list(list));
    }

    diff.episodes = diff_episodes(&old.episodes, &new.episodes);

    if !diff.is_empty() {
        for field in persistent {
            let value = if new.field(*field).is_present() {
                new.field(*field)
            } else {
                old.field(*field)
            };
            diff.field_mut(*field).clone_from(value);
        }
    }

    diff
}

/// Episode-level diff, newest first
fn diff_episodes(old: &[Episode], new: &[Episode]) -> Vec<Episode> {
    let by_key: HashMap<i64, &Episode> = old.iter().map(|episode| (episode.key(), episode)).collect();

    let mut diff: Vec<Episode> = new
        .iter()
        .filter_map(|episode| match by_key.get(&episode.key()) {
            Some(previous) => diff_episode(previous, episode),
            None => Some(episode.clone()),
        })
        .collect();

    sort_newest_first(&mut diff);
    diff
}

fn diff_episode(old: &Episode, new: &Episode) -> Option<Episode> {
    let mut diff = Episode::new(new.published_at);

    for field in EpisodeField::ALL {
        if let Some(value) = changed_scalar(old.field(field), new.field(field)) {
            *diff.field_mut(field) = Some(value);
        }
    }

    for list in EpisodeList::ALL {
        *diff.list_mut(list) = added_elements(old.list(list), new.list(list));
    }

    diff.has_metadata().then_some(diff)
}

fn changed_scalar(old: &Option<String>, new: &Option<String>) -> Option<String> {
    match new {
        Some(value) if value.is_present() && old.as_ref() != Some(value) => Some(value.clone()),
        _ => None,
    }
}

fn added_elements(old: &[String], new: &[String]) -> Vec<String> {
    let known: HashSet<String> = old.iter().map(|value| normalize(value)).collect();

    new.iter()
        .filter(|value| value.is_present() && !known.contains(&normalize(value)))
        .cloned()
        .collect()
}

// Stored lists are lower-cased by the merge, so compare the same way
fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
