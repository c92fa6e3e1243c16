//! # Tag & Payload Codec
//!
//! Converts between the typed metadata model and what the store holds: a
//! list of string tags plus an opaque payload.
//!
//! ## Tags
//!
//! Metadata tags are named after their field (`subscribeUrl`, `title`,
//! `metadataBatch`, ...) behind the configured prefix. List fields produce one
//! tag per value, named in the singular (`category`, `keyword`,
//! `episodesKeyword`). Dates are written as RFC 3339 and numbers in decimal.
//!
//! `App-Name`, `App-Version`, `Content-Type` and `Content-Encoding` are
//! standard store tags and are never prefixed.
//!
//! Decoding is lenient: unknown tags are ignored and values that do not parse
//! are dropped, since tags are written by other clients too.
//!
//! ## Payloads
//!
//! Payloads are the camelCase JSON form of a [`Podcast`], optionally gzipped.
//! Decoding detects gzip by its magic bytes.

use std::io::{Read, Write};

use bridge_traits::error::BridgeError;
use bridge_traits::storage::Tag;
use bytes::Bytes;
use chrono::SecondsFormat;
use core_metadata::{parse_date, Podcast, PodcastField, PodcastList, TagSet, ValuePresent};
use core_runtime::TagConfig;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, SyncError};

pub const APP_NAME_TAG: &str = "App-Name";
pub const APP_VERSION_TAG: &str = "App-Version";
pub const CONTENT_TYPE_TAG: &str = "Content-Type";
pub const CONTENT_ENCODING_TAG: &str = "Content-Encoding";

/// Marks a record as a podcast metadata batch
pub const KIND_FIELD: &str = "Kind";
pub const KIND_METADATA: &str = "metadata";

const CONTENT_TYPE_JSON: &str = "application/json";
const ENCODING_GZIP: &str = "gzip";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const FIRST_EPISODE_DATE: &str = "firstEpisodeDate";
const LAST_EPISODE_DATE: &str = "lastEpisodeDate";
const METADATA_BATCH: &str = "metadataBatch";

fn list_tag_field(list: PodcastList) -> &'static str {
    match list {
        PodcastList::Categories => "category",
        PodcastList::Keywords => "keyword",
        PodcastList::EpisodesKeywords => "episodesKeyword",
    }
}

/// Encodes and decodes batch tags under one [`TagConfig`]
#[derive(Debug, Clone, Default)]
pub struct TagCodec {
    config: TagConfig,
}

impl TagCodec {
    pub fn new(config: TagConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// Full tag list for a batch about to be posted
    pub fn encode(&self, tags: &TagSet, compressed: bool) -> Vec<Tag> {
        let mut encoded = vec![
            Tag::new(APP_NAME_TAG, self.config.app_name.as_str()),
            Tag::new(APP_VERSION_TAG, self.config.app_version.as_str()),
            Tag::new(CONTENT_TYPE_TAG, CONTENT_TYPE_JSON),
        ];
        if compressed {
            encoded.push(Tag::new(CONTENT_ENCODING_TAG, ENCODING_GZIP));
        }
        encoded.push(self.tag(KIND_FIELD, KIND_METADATA));

        for field in TagSet::FIELDS {
            if let Some(Some(value)) = tags.field(field) {
                if value.is_present() {
                    encoded.push(self.tag(field.as_str(), value.trim()));
                }
            }
        }

        for list in PodcastList::ALL {
            let name = list_tag_field(list);
            encoded.extend(
                tags.list(list)
                    .iter()
                    .filter(|value| value.is_present())
                    .map(|value| self.tag(name, value.trim())),
            );
        }

        let dates = [
            (FIRST_EPISODE_DATE, tags.first_episode_date),
            (LAST_EPISODE_DATE, tags.last_episode_date),
        ];
        for (name, date) in dates {
            if let Some(date) = date.filter(|date| date.is_present()) {
                encoded.push(self.tag(name, date.to_rfc3339_opts(SecondsFormat::Millis, true)));
            }
        }

        if let Some(number) = tags.metadata_batch {
            encoded.push(self.tag(METADATA_BATCH, number.to_string()));
        }

        encoded
    }

    /// Recover a tag set from stored tags
    ///
    /// Later occurrences of a scalar tag win; list tags accumulate in order.
    pub fn decode(&self, tags: &[Tag]) -> TagSet {
        let mut decoded = TagSet::default();

        for tag in tags {
            let Some(field) = self.config.field_name(&tag.name) else {
                continue;
            };
            let value = tag.value.trim();
            if value.is_empty() {
                continue;
            }

            if let Some(scalar) = TagSet::FIELDS.iter().find(|scalar| scalar.as_str() == field) {
                if let Some(slot) = decoded.field_mut(*scalar) {
                    *slot = Some(value.to_string());
                }
                continue;
            }

            if let Some(list) = PodcastList::ALL
                .into_iter()
                .find(|list| list_tag_field(*list) == field)
            {
                decoded.list_mut(list).push(value.to_string());
                continue;
            }

            match field {
                FIRST_EPISODE_DATE => decoded.first_episode_date = parse_date(value),
                LAST_EPISODE_DATE => decoded.last_episode_date = parse_date(value),
                METADATA_BATCH => decoded.metadata_batch = value.parse().ok(),
                _ => {}
            }
        }

        decoded
    }

    /// Query locating batch `metadata_batch` of a podcast
    pub fn batch_query(&self, subscribe_url: &str, metadata_batch: u64) -> Vec<Tag> {
        vec![
            self.tag(KIND_FIELD, KIND_METADATA),
            self.tag(PodcastField::SubscribeUrl.as_str(), subscribe_url),
            self.tag(METADATA_BATCH, metadata_batch.to_string()),
        ]
    }

    fn tag(&self, field: &str, value: impl Into<String>) -> Tag {
        Tag::new(self.config.tag_name(field), value)
    }
}

/// Serialize a batch payload, gzipping it when `compress` is set
pub fn encode_payload(podcast: &Podcast, compress: bool) -> Result<Bytes> {
    let json = serde_json::to_vec(podcast).map_err(BridgeError::from)?;
    if !compress {
        return Ok(Bytes::from(json));
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(BridgeError::from)?;
    let compressed = encoder.finish().map_err(BridgeError::from)?;
    Ok(Bytes::from(compressed))
}

/// Parse a stored payload, decompressing it first if it is gzipped
///
/// # Errors
///
/// Every failure is reported as [`SyncError::MalformedUpstreamData`].
pub fn decode_payload(payload: &[u8]) -> Result<Podcast> {
    if payload.starts_with(&GZIP_MAGIC) {
        let mut json = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut json)
            .map_err(|e| SyncError::MalformedUpstreamData(format!("gzip: {}", e)))?;
        return parse_json(&json);
    }

    parse_json(payload)
}

fn parse_json(json: &[u8]) -> Result<Podcast> {
    serde_json::from_slice(json).map_err(|e| SyncError::MalformedUpstreamData(format!("json: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_metadata::Episode;

    fn prefixed() -> TagCodec {
        TagCodec::new(TagConfig {
            prefix: "pod-".to_string(),
            app_name: "podsync".to_string(),
            app_version: "1.2.3".to_string(),
        })
    }

    fn sample_tags() -> TagSet {
        TagSet {
            subscribe_url: Some("https://example.com/feed".to_string()),
            title: Some("Show".to_string()),
            categories: vec!["tech".to_string(), "news".to_string()],
            keywords: vec!["rust".to_string()],
            first_episode_date: Some(Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap()),
            last_episode_date: Some(Utc.with_ymd_and_hms(2023, 2, 2, 3, 4, 5).unwrap()),
            metadata_batch: Some(4),
            ..TagSet::default()
        }
    }

    fn value<'a>(tags: &'a [Tag], name: &str) -> Vec<&'a str> {
        tags.iter()
            .filter(|tag| tag.name == name)
            .map(|tag| tag.value.as_str())
            .collect()
    }

    #[test]
    fn test_encode_tags() {
        let tags = prefixed().encode(&sample_tags(), true);

        assert_eq!(value(&tags, "App-Name"), vec!["podsync"]);
        assert_eq!(value(&tags, "App-Version"), vec!["1.2.3"]);
        assert_eq!(value(&tags, "Content-Type"), vec!["application/json"]);
        assert_eq!(value(&tags, "Content-Encoding"), vec!["gzip"]);
        assert_eq!(value(&tags, "pod-Kind"), vec!["metadata"]);
        assert_eq!(value(&tags, "pod-subscribeUrl"), vec!["https://example.com/feed"]);
        assert_eq!(value(&tags, "pod-category"), vec!["tech", "news"]);
        assert_eq!(value(&tags, "pod-firstEpisodeDate"), vec!["2023-01-02T03:04:05.000Z"]);
        assert_eq!(value(&tags, "pod-metadataBatch"), vec!["4"]);
        assert!(value(&tags, "pod-description").is_empty());
    }

    #[test]
    fn test_encode_uncompressed_omits_encoding() {
        let tags = TagCodec::default().encode(&sample_tags(), false);
        assert!(value(&tags, "Content-Encoding").is_empty());
        assert_eq!(value(&tags, "subscribeUrl"), vec!["https://example.com/feed"]);
    }

    #[test]
    fn test_decode_reverses_encode() {
        let codec = prefixed();
        let tags = sample_tags();
        assert_eq!(codec.decode(&codec.encode(&tags, true)), tags);
    }

    #[test]
    fn test_decode_is_lenient() {
        let codec = TagCodec::default();
        let decoded = codec.decode(&[
            Tag::new("subscribeUrl", "https://example.com/feed"),
            Tag::new("metadataBatch", "three"),
            Tag::new("firstEpisodeDate", "yesterday"),
            Tag::new("lastEpisodeDate", "1672628645000"),
            Tag::new("category", "  "),
            Tag::new("somethingElse", "ignored"),
        ]);

        assert_eq!(decoded.subscribe_url.as_deref(), Some("https://example.com/feed"));
        assert_eq!(decoded.metadata_batch, None);
        assert_eq!(decoded.first_episode_date, None);
        assert_eq!(
            decoded.last_episode_date,
            Some(Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap())
        );
        assert!(decoded.categories.is_empty());
    }

    #[test]
    fn test_decode_ignores_other_prefixes() {
        let decoded = prefixed().decode(&[
            Tag::new("subscribeUrl", "https://example.com/other"),
            Tag::new("pod-title", "Mine"),
        ]);

        assert!(decoded.subscribe_url.is_none());
        assert_eq!(decoded.title.as_deref(), Some("Mine"));
    }

    #[test]
    fn test_batch_query() {
        let query = prefixed().batch_query("https://example.com/feed", 2);
        assert_eq!(
            query,
            vec![
                Tag::new("pod-Kind", "metadata"),
                Tag::new("pod-subscribeUrl", "https://example.com/feed"),
                Tag::new("pod-metadataBatch", "2"),
            ]
        );
    }

    #[test]
    fn test_payload_compressed_and_plain() {
        let mut podcast = Podcast::new("https://example.com/feed");
        podcast.episodes = vec![Episode::new(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
            .with_title("Pilot")];

        let compressed = encode_payload(&podcast, true).unwrap();
        assert!(compressed.starts_with(&GZIP_MAGIC));
        assert_eq!(decode_payload(&compressed).unwrap(), podcast);

        let plain = encode_payload(&podcast, false).unwrap();
        assert_eq!(plain[0], b'{');
        assert_eq!(decode_payload(&plain).unwrap(), podcast);
    }

    #[test]
    fn test_decode_malformed_payload() {
        assert!(matches!(
            decode_payload(b"not json"),
            Err(SyncError::MalformedUpstreamData(_))
        ));
        assert!(matches!(
            decode_payload(&[0x1f, 0x8b, 0x00, 0x01]),
            Err(SyncError::MalformedUpstreamData(_))
        ));
    }
}
