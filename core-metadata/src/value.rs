//! Array and scalar helpers shared by the merge and diff engines
//!
//! Every merge decision in this crate bottoms out in one of two questions:
//! "does this value say anything?" ([`ValuePresent`]) and "does this record
//! say anything beyond its identity?" ([`HasMetadata`]).

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;

/// Whether a value carries information
///
/// Absent values, blank strings, invalid dates and lists whose every element
/// is itself not present are all "not present". Merges never let a value that
/// is not present overwrite one that is.
pub trait ValuePresent {
    fn is_present(&self) -> bool;
}

impl ValuePresent for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl ValuePresent for String {
    fn is_present(&self) -> bool {
        self.as_str().is_present()
    }
}

impl ValuePresent for DateTime<Utc> {
    fn is_present(&self) -> bool {
        is_valid_date(self)
    }
}

impl ValuePresent for u64 {
    fn is_present(&self) -> bool {
        true
    }
}

impl ValuePresent for f64 {
    fn is_present(&self) -> bool {
        !self.is_nan()
    }
}

impl<T: ValuePresent> ValuePresent for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(ValuePresent::is_present)
    }
}

impl<T: ValuePresent> ValuePresent for [T] {
    fn is_present(&self) -> bool {
        self.iter().any(ValuePresent::is_present)
    }
}

impl<T: ValuePresent> ValuePresent for Vec<T> {
    fn is_present(&self) -> bool {
        self.as_slice().is_present()
    }
}

/// Free-function form of [`ValuePresent::is_present`]
pub fn value_present<T: ValuePresent + ?Sized>(value: &T) -> bool {
    value.is_present()
}

/// Whether a record carries anything beyond its identity fields
pub trait HasMetadata {
    fn has_metadata(&self) -> bool;
}

/// A date is valid when its timestamp is non-zero
///
/// Zero-epoch dates are what unparseable or defaulted inputs collapse to, so
/// they are treated as missing.
pub fn is_valid_date(date: &DateTime<Utc>) -> bool {
    date.timestamp_millis() != 0
}

/// Parse a date as it appears in tags, feeds or payloads
///
/// Accepts RFC 3339 (tags and payloads), RFC 2822 (RSS `pubDate`) and bare
/// epoch-millisecond numerals. Returns `None` for anything else, including
/// dates that parse to the zero epoch.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            raw.parse::<i64>()
                .ok()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        });

    parsed.filter(is_valid_date)
}

/// Union of two string lists, case-insensitively
///
/// Every element is trimmed and lower-cased before de-duplication; blank
/// entries are dropped. Elements of `a` come first in their original order,
/// followed by the elements of `b` that `a` did not already contain.
pub fn merge_arrays_case_insensitive<A, B>(a: &[A], b: &[B]) -> Vec<String>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(a.len() + b.len());

    let values = a
        .iter()
        .map(AsRef::as_ref)
        .chain(b.iter().map(AsRef::as_ref));

    for value in values {
        let normalized = value.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            merged.push(normalized);
        }
    }

    merged
}
