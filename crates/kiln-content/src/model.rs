//! Content item model for the CMS REST API.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::{OffsetDateTime, PrimitiveDateTime};

/// A content collection exposed by the CMS (`posts`, `pages`, or a custom type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKind(String);

impl ContentKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentKind {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UTC instant used across the fetch/render/store cycle.
///
/// Stored and compared as [`OffsetDateTime`]; serialized as RFC 3339 so the
/// manifest stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

// WordPress `modified_gmt` carries no offset suffix; it is naive UTC.
const NAIVE_UTC: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse a CMS timestamp: RFC 3339 first, then naive `YYYY-MM-DDTHH:MM:SS`
    /// assumed UTC.
    pub fn parse_cms(raw: &str) -> Result<Self, time::error::Parse> {
        if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(Self(ts));
        }
        let naive = PrimitiveDateTime::parse(raw, NAIVE_UTC)?;
        Ok(Self(naive.assume_utc()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

fn deserialize_cms_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Timestamp::parse_cms(&raw).map_err(serde::de::Error::custom)
}

/// A text field the CMS ships pre-rendered (`{"rendered": "..."}`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RenderedField {
    #[serde(default)]
    pub rendered: String,
}

/// A single content item fetched from the CMS.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    pub id: u64,

    /// URL slug of the item.
    pub slug: String,

    /// Canonical permalink as the CMS reports it.
    #[serde(default)]
    pub link: Option<String>,

    /// Last-modified instant, UTC.
    #[serde(rename = "modified_gmt", deserialize_with = "deserialize_cms_timestamp")]
    pub modified: Timestamp,

    #[serde(default)]
    pub title: Option<RenderedField>,

    /// Collection this item came from. Not part of the API payload; the
    /// client stamps it after decoding.
    #[serde(skip)]
    pub kind: ContentKind,
}

impl ContentItem {
    /// Stable identity of the item. CMS ids are only unique per collection,
    /// so the kind is part of the key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_naive_cms_timestamp_as_utc() {
        let ts = Timestamp::parse_cms("2024-01-15T10:30:00").unwrap();

        assert_eq!(ts, Timestamp(datetime!(2024-01-15 10:30:00 UTC)));
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        let ts = Timestamp::parse_cms("2024-01-15T10:30:00+02:00").unwrap();

        assert_eq!(ts, Timestamp(datetime!(2024-01-15 08:30:00 UTC)));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(Timestamp::parse_cms("not a date").is_err());
    }

    #[test]
    fn deserializes_api_payload() {
        let json = r#"{
            "id": 42,
            "slug": "hello-world",
            "link": "https://example.com/hello-world/",
            "modified_gmt": "2024-01-15T10:30:00",
            "title": {"rendered": "Hello World"}
        }"#;

        let mut item: ContentItem = serde_json::from_str(json).unwrap();
        item.kind = ContentKind::from("posts");

        assert_eq!(item.id, 42);
        assert_eq!(item.slug, "hello-world");
        assert_eq!(item.key(), "posts/42");
        assert_eq!(item.title.unwrap().rendered, "Hello World");
    }

    #[test]
    fn timestamps_round_trip_through_serde() {
        let ts = Timestamp(datetime!(2024-06-01 12:00:00 UTC));

        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();

        assert_eq!(json, "\"2024-06-01T12:00:00Z\"");
        assert_eq!(back, ts);
    }
}
