use crate::models::{Direction, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of `GET {API_URL}/hentai/{id}/read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderResponse {
    pub content: ContentMeta,
    /// Page index → page entry. Indices are decimal strings.
    #[serde(default)]
    pub pages: BTreeMap<String, PageEntry>,
    #[serde(default)]
    pub spreads: Vec<Vec<i64>>,
    #[serde(default)]
    pub key_hash: Option<String>,
    #[serde(default)]
    pub key_data: Option<String>,
}

impl ReaderResponse {
    pub fn source_kind(&self) -> SourceKind {
        if self.key_hash.is_some() {
            SourceKind::Scrambled
        } else {
            SourceKind::Unscrambled
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_label(self.content.content_direction.as_deref())
    }

    /// Declared page count, falling back to the number of page entries.
    pub fn page_count(&self) -> usize {
        self.content
            .content_pages
            .map(|n| n as usize)
            .filter(|&n| n > 0)
            .unwrap_or(self.pages.len())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub page: u32,
    pub image: String,
    #[serde(default)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMeta {
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub content_name: String,
    #[serde(default)]
    pub content_artists: Vec<Attribute>,
    #[serde(default)]
    pub content_series: Vec<Attribute>,
    #[serde(default)]
    pub content_publishers: Option<Vec<Attribute>>,
    #[serde(default)]
    pub content_tags: Vec<Attribute>,
    #[serde(default)]
    pub content_language: Option<String>,
    #[serde(default)]
    pub content_pages: Option<u32>,
    #[serde(default)]
    pub content_description: Option<String>,
    #[serde(default)]
    pub content_direction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "content": {
            "content_url": "https://www.fakku.net/hentai/sample-title",
            "content_name": "Sample Title",
            "content_artists": [{"attribute": "Artist A"}],
            "content_series": [{"attribute": "Original Work"}],
            "content_tags": [{"attribute": "Full Color"}],
            "content_language": "English",
            "content_pages": 3,
            "content_description": "desc",
            "content_direction": "Left to Right"
        },
        "pages": {
            "1": {"page": 1, "image": "https://t.example/1.jpg", "thumb": "https://t.example/t1.jpg"},
            "2": {"page": 2, "image": "https://t.example/2.jpg"},
            "3": {"page": 3, "image": "https://t.example/3.jpg"}
        },
        "spreads": [[1, 1], [2, 3]],
        "key_hash": "abc",
        "key_data": "AAAA"
    }"#;

    #[test]
    fn test_parse_reader_response() {
        let resp: ReaderResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(resp.pages.len(), 3);
        assert_eq!(resp.pages["2"].page, 2);
        assert_eq!(resp.spreads, vec![vec![1, 1], vec![2, 3]]);
        assert_eq!(resp.source_kind(), SourceKind::Scrambled);
        assert_eq!(resp.direction(), Direction::LeftToRight);
        assert_eq!(resp.page_count(), 3);
        assert!(resp.content.content_publishers.is_none());
    }

    #[test]
    fn test_defaults_for_unscrambled_gallery() {
        let resp: ReaderResponse = serde_json::from_str(
            r#"{"content": {"content_name": "x"}, "pages": {"1": {"page": 1, "image": "u"}}}"#,
        )
        .unwrap();
        assert_eq!(resp.source_kind(), SourceKind::Unscrambled);
        assert_eq!(resp.direction(), Direction::RightToLeft);
        assert!(resp.spreads.is_empty());
        assert_eq!(resp.page_count(), 1);
    }
}
