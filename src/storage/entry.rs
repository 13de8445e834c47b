//! Entry records and the typed media records that update them

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Embedded video providers the harvester knows how to record
///
/// Anything else means the extractor met markup it does not understand yet.
pub const KNOWN_PROVIDERS: &[&str] = &["instagram", "coub", "play_large", "vine"];

/// Returns true if `provider` is one of [`KNOWN_PROVIDERS`]
pub fn is_known_provider(provider: &str) -> bool {
    KNOWN_PROVIDERS.contains(&provider)
}

/// Kind of media an item page carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Gif,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Image, Self::Gif, Self::Video]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered item and its harvest status
///
/// `kind == None` is the unknown-pending state before the detail page has
/// been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Relative reference of the item page; unique and immutable
    pub key: String,

    /// Ordering value used to name the media file
    pub index: i64,

    /// Set once the media file is fully written
    #[serde(default)]
    pub downloaded: bool,

    /// Cursor of the listing batch that produced this entry
    #[serde(default)]
    pub batch_ref: Option<String>,

    #[serde(default)]
    pub kind: Option<MediaKind>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub media_locator: Option<String>,

    #[serde(default)]
    pub media_provider: Option<String>,

    #[serde(default)]
    pub media_provider_location: Option<String>,
}

impl Entry {
    /// Creates a fresh, unknown-pending entry
    pub fn new(key: impl Into<String>, index: i64, batch_ref: Option<String>) -> Self {
        Self {
            key: key.into(),
            index,
            downloaded: false,
            batch_ref,
            kind: None,
            tags: Vec::new(),
            media_locator: None,
            media_provider: None,
            media_provider_location: None,
        }
    }

    /// Returns true until the detail page has been classified
    pub fn is_pending(&self) -> bool {
        self.kind.is_none()
    }
}

/// Fields shared by every media record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBase {
    pub locator: Url,
    pub tags: Vec<String>,
}

/// A classified detail page, validated at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRecord {
    Image(MediaBase),
    Gif(MediaBase),
    Video {
        base: MediaBase,
        provider: String,
        provider_location: Option<String>,
    },
}

impl MediaRecord {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Gif(_) => MediaKind::Gif,
            Self::Video { .. } => MediaKind::Video,
        }
    }

    pub fn base(&self) -> &MediaBase {
        match self {
            Self::Image(base) | Self::Gif(base) => base,
            Self::Video { base, .. } => base,
        }
    }

    pub fn locator(&self) -> &Url {
        &self.base().locator
    }
}

/// Partial update merged into an entry by [`EntryStore::assign`](super::EntryStore::assign)
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub downloaded: Option<bool>,
    pub kind: Option<MediaKind>,
    pub tags: Option<Vec<String>>,
    pub media_locator: Option<String>,
    pub media_provider: Option<String>,
    pub media_provider_location: Option<String>,
}

impl EntryUpdate {
    /// Update that marks the media as written
    pub fn downloaded() -> Self {
        Self {
            downloaded: Some(true),
            ..Self::default()
        }
    }
}

impl From<&MediaRecord> for EntryUpdate {
    fn from(record: &MediaRecord) -> Self {
        let base = record.base();
        let mut update = Self {
            kind: Some(record.kind()),
            tags: Some(base.tags.clone()),
            media_locator: Some(base.locator.to_string()),
            ..Self::default()
        };
        if let MediaRecord::Video {
            provider,
            provider_location,
            ..
        } = record
        {
            update.media_provider = Some(provider.clone());
            update.media_provider_location = provider_location.clone();
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(locator: &str) -> MediaBase {
        MediaBase {
            locator: Url::parse(locator).unwrap(),
            tags: vec!["cats".to_string()],
        }
    }

    #[test]
    fn test_known_providers() {
        assert!(is_known_provider("instagram"));
        assert!(is_known_provider("coub"));
        assert!(is_known_provider("play_large"));
        assert!(is_known_provider("vine"));
        assert!(!is_known_provider("some-unknown-cdn"));
        assert!(!is_known_provider(""));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let mut entry = Entry::new("/p/1", 7, Some("cursor".to_string()));
        entry.kind = Some(MediaKind::Gif);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["key"], "/p/1");
        assert_eq!(json["index"], 7);
        assert_eq!(json["batchRef"], "cursor");
        assert_eq!(json["kind"], "gif");
        assert_eq!(json["mediaLocator"], serde_json::Value::Null);
    }

    #[test]
    fn test_new_entry_is_pending() {
        let entry = Entry::new("/p/1", 1, None);
        assert!(entry.is_pending());
        assert!(!entry.downloaded);
    }

    #[test]
    fn test_update_from_image_record() {
        let record = MediaRecord::Image(base("https://cdn.example.com/a.png"));
        let update = EntryUpdate::from(&record);

        assert_eq!(update.kind, Some(MediaKind::Image));
        assert_eq!(
            update.media_locator.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(update.media_provider, None);
        assert_eq!(update.downloaded, None);
    }

    #[test]
    fn test_update_from_video_record() {
        let record = MediaRecord::Video {
            base: base("https://cdn.example.com/v.mp4"),
            provider: "coub".to_string(),
            provider_location: Some("https://coub.com/view/x".to_string()),
        };
        let update = EntryUpdate::from(&record);

        assert_eq!(update.kind, Some(MediaKind::Video));
        assert_eq!(update.media_provider.as_deref(), Some("coub"));
        assert_eq!(
            update.media_provider_location.as_deref(),
            Some("https://coub.com/view/x")
        );
    }
}
