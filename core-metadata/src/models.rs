//! Podcast domain models
//!
//! Explicit, optional-field records for everything that flows through the
//! merge and diff engines. A default-constructed [`Podcast`] is the empty
//! record (`{}`): every engine returns it when there is nothing to say.
//!
//! Field names serialize in camelCase so stored payloads keep the same shape
//! as the tags that index them (`subscribeUrl`, `publishedAt`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{is_valid_date, HasMetadata, ValuePresent};

// =============================================================================
// Field enumerations
// =============================================================================

/// Scalar text fields of a [`Podcast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PodcastField {
    SubscribeUrl,
    Title,
    Subtitle,
    Description,
    Summary,
    Author,
    OwnerName,
    OwnerEmail,
    Language,
    Copyright,
    Explicit,
    ImageUrl,
    ImageTitle,
    FeedType,
}

impl PodcastField {
    pub const ALL: [PodcastField; 14] = [
        PodcastField::SubscribeUrl,
        PodcastField::Title,
        PodcastField::Subtitle,
        PodcastField::Description,
        PodcastField::Summary,
        PodcastField::Author,
        PodcastField::OwnerName,
        PodcastField::OwnerEmail,
        PodcastField::Language,
        PodcastField::Copyright,
        PodcastField::Explicit,
        PodcastField::ImageUrl,
        PodcastField::ImageTitle,
        PodcastField::FeedType,
    ];

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            PodcastField::SubscribeUrl => "subscribeUrl",
            PodcastField::Title => "title",
            PodcastField::Subtitle => "subtitle",
            PodcastField::Description => "description",
            PodcastField::Summary => "summary",
            PodcastField::Author => "author",
            PodcastField::OwnerName => "ownerName",
            PodcastField::OwnerEmail => "ownerEmail",
            PodcastField::Language => "language",
            PodcastField::Copyright => "copyright",
            PodcastField::Explicit => "explicit",
            PodcastField::ImageUrl => "imageUrl",
            PodcastField::ImageTitle => "imageTitle",
            PodcastField::FeedType => "feedType",
        }
    }
}

impl fmt::Display for PodcastField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String-list fields of a [`Podcast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodcastList {
    Categories,
    Keywords,
    EpisodesKeywords,
}

impl PodcastList {
    pub const ALL: [PodcastList; 3] = [
        PodcastList::Categories,
        PodcastList::Keywords,
        PodcastList::EpisodesKeywords,
    ];
}

/// Scalar text fields of an [`Episode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeField {
    Title,
    Url,
    Subtitle,
    Summary,
    ContentType,
    ContentLength,
    Duration,
    ImageUrl,
    Explicit,
}

impl EpisodeField {
    pub const ALL: [EpisodeField; 9] = [
        EpisodeField::Title,
        EpisodeField::Url,
        EpisodeField::Subtitle,
        EpisodeField::Summary,
        EpisodeField::ContentType,
        EpisodeField::ContentLength,
        EpisodeField::Duration,
        EpisodeField::ImageUrl,
        EpisodeField::Explicit,
    ];
}

/// String-list fields of an [`Episode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeList {
    Categories,
    Keywords,
}

impl EpisodeList {
    pub const ALL: [EpisodeList; 2] = [EpisodeList::Categories, EpisodeList::Keywords];
}

// =============================================================================
// Episode
// =============================================================================

/// A single podcast episode
///
/// `published_at` is the identity of an episode: two episodes with the same
/// publication instant (millisecond resolution) are the same episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub published_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Enclosure URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Enclosure MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Enclosure size in bytes, as published by the feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl Episode {
    /// Create an episode carrying only its identity
    pub fn new(published_at: DateTime<Utc>) -> Self {
        Self {
            published_at,
            title: None,
            url: None,
            subtitle: None,
            summary: None,
            content_type: None,
            content_length: None,
            duration: None,
            image_url: None,
            explicit: None,
            categories: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Identity key used for duplicate detection
    pub fn key(&self) -> i64 {
        self.published_at.timestamp_millis()
    }

    pub fn field(&self, field: EpisodeField) -> &Option<String> {
        match field {
            EpisodeField::Title => &self.title,
            EpisodeField::Url => &self.url,
            EpisodeField::Subtitle => &self.subtitle,
            EpisodeField::Summary => &self.summary,
            EpisodeField::ContentType => &self.content_type,
            EpisodeField::ContentLength => &self.content_length,
            EpisodeField::Duration => &self.duration,
            EpisodeField::ImageUrl => &self.image_url,
            EpisodeField::Explicit => &self.explicit,
        }
    }

    pub fn field_mut(&mut self, field: EpisodeField) -> &mut Option<String> {
        match field {
            EpisodeField::Title => &mut self.title,
            EpisodeField::Url => &mut self.url,
            EpisodeField::Subtitle => &mut self.subtitle,
            EpisodeField::Summary => &mut self.summary,
            EpisodeField::ContentType => &mut self.content_type,
            EpisodeField::ContentLength => &mut self.content_length,
            EpisodeField::Duration => &mut self.duration,
            EpisodeField::ImageUrl => &mut self.image_url,
            EpisodeField::Explicit => &mut self.explicit,
        }
    }

    pub fn list(&self, list: EpisodeList) -> &Vec<String> {
        match list {
            EpisodeList::Categories => &self.categories,
            EpisodeList::Keywords => &self.keywords,
        }
    }

    pub fn list_mut(&mut self, list: EpisodeList) -> &mut Vec<String> {
        match list {
            EpisodeList::Categories => &mut self.categories,
            EpisodeList::Keywords => &mut self.keywords,
        }
    }
}

impl ValuePresent for Episode {
    fn is_present(&self) -> bool {
        self.has_metadata()
    }
}

impl HasMetadata for Episode {
    fn has_metadata(&self) -> bool {
        EpisodeField::ALL
            .iter()
            .any(|field| self.field(*field).is_present())
            || EpisodeList::ALL
                .iter()
                .any(|list| self.list(*list).is_present())
    }
}

// =============================================================================
// Podcast
// =============================================================================

/// Podcast metadata: a stored batch, a feed snapshot or a merge result
///
/// All fields are optional so the same record can describe a partial batch,
/// a diff, or the canonical podcast. `subscribe_url` is the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Podcast {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_title: Option<String>,
    /// Feed flavour reported by the parser (e.g. "rss2", "atom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_type: Option<String>,

    /// Channel `lastBuildDate` as published by the feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Keywords collected from all episodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes_keywords: Vec<String>,

    /// Episodes, newest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<Episode>,

    // Derived batch bookkeeping. Never diffed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_episode_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_episode_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_batch: Option<u64>,
}

impl Podcast {
    /// Create a record carrying only its primary key
    pub fn new(subscribe_url: impl Into<String>) -> Self {
        Self {
            subscribe_url: Some(subscribe_url.into()),
            ..Self::default()
        }
    }

    /// True for the empty record
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn field(&self, field: PodcastField) -> &Option<String> {
        match field {
            PodcastField::SubscribeUrl => &self.subscribe_url,
            PodcastField::Title => &self.title,
            PodcastField::Subtitle => &self.subtitle,
            PodcastField::Description => &self.description,
            PodcastField::Summary => &self.summary,
            PodcastField::Author => &self.author,
            PodcastField::OwnerName => &self.owner_name,
            PodcastField::OwnerEmail => &self.owner_email,
            PodcastField::Language => &self.language,
            PodcastField::Copyright => &self.copyright,
            PodcastField::Explicit => &self.explicit,
            PodcastField::ImageUrl => &self.image_url,
            PodcastField::ImageTitle => &self.image_title,
            PodcastField::FeedType => &self.feed_type,
        }
    }

    pub fn field_mut(&mut self, field: PodcastField) -> &mut Option<String> {
        match field {
            PodcastField::SubscribeUrl => &mut self.subscribe_url,
            PodcastField::Title => &mut self.title,
            PodcastField::Subtitle => &mut self.subtitle,
            PodcastField::Description => &mut self.description,
            PodcastField::Summary => &mut self.summary,
            PodcastField::Author => &mut self.author,
            PodcastField::OwnerName => &mut self.owner_name,
            PodcastField::OwnerEmail => &mut self.owner_email,
            PodcastField::Language => &mut self.language,
            PodcastField::Copyright => &mut self.copyright,
            PodcastField::Explicit => &mut self.explicit,
            PodcastField::ImageUrl => &mut self.image_url,
            PodcastField::ImageTitle => &mut self.image_title,
            PodcastField::FeedType => &mut self.feed_type,
        }
    }

    pub fn list(&self, list: PodcastList) -> &Vec<String> {
        match list {
            PodcastList::Categories => &self.categories,
            PodcastList::Keywords => &self.keywords,
            PodcastList::EpisodesKeywords => &self.episodes_keywords,
        }
    }

    pub fn list_mut(&mut self, list: PodcastList) -> &mut Vec<String> {
        match list {
            PodcastList::Categories => &mut self.categories,
            PodcastList::Keywords => &mut self.keywords,
            PodcastList::EpisodesKeywords => &mut self.episodes_keywords,
        }
    }

    /// Earliest and latest valid publication dates among the episodes
    pub fn episode_date_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        episode_date_bounds(&self.episodes)
    }
}

/// Earliest and latest valid publication dates in an episode slice
pub fn episode_date_bounds(
    episodes: &[Episode],
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let dates = episodes
        .iter()
        .map(|episode| episode.published_at)
        .filter(is_valid_date);

    dates.fold((None, None), |(first, last), date| {
        (
            Some(first.map_or(date, |first: DateTime<Utc>| first.min(date))),
            Some(last.map_or(date, |last: DateTime<Utc>| last.max(date))),
        )
    })
}

impl HasMetadata for Podcast {
    fn has_metadata(&self) -> bool {
        if self.title.is_present() || self.episodes.is_present() {
            return true;
        }

        PodcastField::ALL
            .iter()
            .filter(|field| **field != PodcastField::SubscribeUrl)
            .any(|field| self.field(*field).is_present())
            || PodcastList::ALL
                .iter()
                .any(|list| self.list(*list).is_present())
            || self.last_build_date.is_present()
            || self.first_episode_date.is_present()
            || self.last_episode_date.is_present()
            || self.metadata_batch.is_some()
    }
}

// =============================================================================
// Tag set
// =============================================================================

/// Out-of-band indexed metadata attached to a stored batch
///
/// Tags are the only part of a batch the store can be queried by, so they
/// carry the identity (`subscribe_url`, `metadata_batch`) and a summary of
/// the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes_keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_episode_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_episode_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_batch: Option<u64>,
}

impl TagSet {
    /// Scalar podcast fields mirrored into tags
    pub const FIELDS: [PodcastField; 5] = [
        PodcastField::SubscribeUrl,
        PodcastField::Title,
        PodcastField::Description,
        PodcastField::Author,
        PodcastField::Language,
    ];

    /// Returns `None` for podcast fields that are not mirrored into tags
    pub fn field(&self, field: PodcastField) -> Option<&Option<String>> {
        match field {
            PodcastField::SubscribeUrl => Some(&self.subscribe_url),
            PodcastField::Title => Some(&self.title),
            PodcastField::Description => Some(&self.description),
            PodcastField::Author => Some(&self.author),
            PodcastField::Language => Some(&self.language),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, field: PodcastField) -> Option<&mut Option<String>> {
        match field {
            PodcastField::SubscribeUrl => Some(&mut self.subscribe_url),
            PodcastField::Title => Some(&mut self.title),
            PodcastField::Description => Some(&mut self.description),
            PodcastField::Author => Some(&mut self.author),
            PodcastField::Language => Some(&mut self.language),
            _ => None,
        }
    }

    pub fn list(&self, list: PodcastList) -> &Vec<String> {
        match list {
            PodcastList::Categories => &self.categories,
            PodcastList::Keywords => &self.keywords,
            PodcastList::EpisodesKeywords => &self.episodes_keywords,
        }
    }

    pub fn list_mut(&mut self, list: PodcastList) -> &mut Vec<String> {
        match list {
            PodcastList::Categories => &mut self.categories,
            PodcastList::Keywords => &mut self.keywords,
            PodcastList::EpisodesKeywords => &mut self.episodes_keywords,
        }
    }
}

impl HasMetadata for TagSet {
    fn has_metadata(&self) -> bool {
        TagSet::FIELDS
            .iter()
            .filter(|field| **field != PodcastField::SubscribeUrl)
            .any(|field| self.field(*field).is_some_and(|value| value.is_present()))
            || PodcastList::ALL
                .iter()
                .any(|list| self.list(*list).is_present())
            || self.first_episode_date.is_present()
            || self.last_episode_date.is_present()
            || self.metadata_batch.is_some()
    }
}

impl From<&Podcast> for TagSet {
    /// Summarize a batch payload into the tags that index it
    fn from(podcast: &Podcast) -> Self {
        let mut tags = TagSet {
            categories: podcast.categories.clone(),
            keywords: podcast.keywords.clone(),
            episodes_keywords: podcast.episodes_keywords.clone(),
            first_episode_date: podcast.first_episode_date,
            last_episode_date: podcast.last_episode_date,
            metadata_batch: podcast.metadata_batch,
            ..TagSet::default()
        };

        for field in TagSet::FIELDS {
            if let Some(slot) = tags.field_mut(field) {
                slot.clone_from(podcast.field(field));
            }
        }

        tags
    }
}

impl From<TagSet> for Podcast {
    fn from(tags: TagSet) -> Self {
        Podcast {
            subscribe_url: tags.subscribe_url,
            title: tags.title,
            description: tags.description,
            author: tags.author,
            language: tags.language,
            categories: tags.categories,
            keywords: tags.keywords,
            episodes_keywords: tags.episodes_keywords,
            first_episode_date: tags.first_episode_date,
            last_episode_date: tags.last_episode_date,
            metadata_batch: tags.metadata_batch,
            ..Podcast::default()
        }
    }
}
