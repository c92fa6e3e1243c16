//! # Podcast Metadata Engine
//!
//! Batches, diffs and merges podcast metadata stored as immutable batches.
//!
//! ## Overview
//!
//! This crate handles:
//! - The podcast, episode and tag-set data model
//! - Merging sorted episode lists with field-level precedence
//! - Folding stored batches and their tags into one canonical podcast
//! - Right diffs between two snapshots for minimal re-upload
//! - Partitioning an update into numbered, size-bounded batches
//!
//! Every operation is a pure function over borrowed inputs. Storage and feed
//! access live in `core-sync`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{partition_metadata_batches, right_diff, DEFAULT_PERSISTENT_FIELDS};
//!
//! let pending = right_diff(&cached, &feed_snapshot, DEFAULT_PERSISTENT_FIELDS);
//! let batches = partition_metadata_batches(&cached, &pending, 50, 10)?;
//! ```

pub mod diff;
pub mod episodes;
pub mod error;
pub mod merge;
pub mod models;
pub mod partition;
pub mod value;

pub use diff::{right_diff, DEFAULT_PERSISTENT_FIELDS};
pub use episodes::{merge_episode_batches, merge_episodes, sort_newest_first};
pub use error::{MetadataError, Result};
pub use merge::{merge_batch_metadata, merge_batch_tags, MergePolicy};
pub use models::{Episode, EpisodeField, EpisodeList, Podcast, PodcastField, PodcastList, TagSet};
pub use partition::{get_metadata_batch_number, partition_metadata_batches};
pub use value::{
    is_valid_date, merge_arrays_case_insensitive, parse_date, value_present, HasMetadata,
    ValuePresent,
};
