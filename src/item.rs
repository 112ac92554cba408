//! Item abstraction consumed by the pipeline.
//!
//! The pipeline never depends on a concrete item type: anything exposing
//! named fields through [`MediaItem`] can flow through it. A ready-made
//! [`Item`] wrapper over a JSON object is provided for callers that do not
//! carry their own item types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field access contract for scraped items.
///
/// The pipeline reads the configured URLs field through `get_field` and
/// writes the result descriptors back through `set_field`. Implementations
/// decide how fields are actually stored.
pub trait MediaItem: Send {
    /// Returns the value of a named field, if present.
    fn get_field(&self, name: &str) -> Option<&Value>;

    /// Sets a named field, replacing any previous value.
    fn set_field(&mut self, name: &str, value: Value);
}

/// A plain JSON-object item.
///
/// # Example
///
/// ```
/// use media_pipeline::item::{Item, MediaItem};
/// use serde_json::json;
///
/// let mut item = Item::new();
/// item.set_field("file_urls", json!(["http://example.com/a.pdf"]));
/// assert!(item.get_field("file_urls").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item(Map<String, Value>);

impl Item {
    /// Creates an empty item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Item {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl MediaItem for Item {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn set_field(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }
}

/// Download status of a persisted file, as decided by the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// The store had no prior record; first download.
    New,
    /// An existing stored copy was fresh enough to skip the fetch.
    Uptodate,
    /// An existing stored copy was stale and has been re-downloaded.
    Expired,
}

impl FileStatus {
    /// Stable counter label for the metrics sink.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Uptodate => "uptodate",
            Self::Expired => "expired",
        }
    }
}

/// Descriptor of a successfully resolved resource, attached to items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// The originally requested URL.
    pub url: String,
    /// Storage key the object was persisted under (e.g. `full/<hash>.pdf`).
    pub path: String,
    /// Hex SHA-256 checksum of the stored content, when known.
    pub checksum: Option<String>,
    /// How this result was obtained.
    pub status: FileStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_get_set_roundtrip() {
        let mut item = Item::new();
        assert!(item.get_field("file_urls").is_none());

        item.set_field("file_urls", json!(["http://x/a.pdf", "http://x/b.pdf"]));
        let urls = item.get_field("file_urls").unwrap();
        assert_eq!(urls.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_item_set_field_replaces() {
        let mut item = Item::new();
        item.set_field("files", json!([1]));
        item.set_field("files", json!([1, 2]));
        assert_eq!(item.get_field("files").unwrap(), &json!([1, 2]));
    }

    #[test]
    fn test_file_status_labels() {
        assert_eq!(FileStatus::New.as_str(), "new");
        assert_eq!(FileStatus::Uptodate.as_str(), "uptodate");
        assert_eq!(FileStatus::Expired.as_str(), "expired");
    }

    #[test]
    fn test_file_info_serializes_with_lowercase_status() {
        let info = FileInfo {
            url: "http://x/a.pdf".to_string(),
            path: "full/abc.pdf".to_string(),
            checksum: Some("deadbeef".to_string()),
            status: FileStatus::Uptodate,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["status"], json!("uptodate"));
        assert_eq!(value["path"], json!("full/abc.pdf"));
    }
}
