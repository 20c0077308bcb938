//! Gallery metadata: `info.json` and `ComicInfo.xml`.

use crate::config::language_iso;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use descramble_rs::ReaderResponse;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryMetadata {
    pub url: String,
    pub title: String,
    pub artists: Vec<String>,
    pub parodies: Vec<String>,
    pub publishers: Option<Vec<String>>,
    pub language: Option<String>,
    pub pages: usize,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub thumbs: Vec<String>,
    pub direction: String,
}

impl GalleryMetadata {
    pub fn from_reader(data: &ReaderResponse) -> Self {
        let content = &data.content;
        let names = |attrs: &[descramble_rs::reader::Attribute]| -> Vec<String> {
            attrs.iter().map(|a| a.attribute.clone()).collect()
        };

        Self {
            url: content.content_url.clone(),
            title: content.content_name.clone(),
            artists: names(&content.content_artists),
            parodies: names(&content.content_series),
            publishers: content.content_publishers.as_deref().map(names),
            language: content.content_language.clone(),
            pages: data.page_count(),
            description: content.content_description.clone(),
            tags: names(&content.content_tags),
            thumbs: data.pages.values().filter_map(|p| p.thumb.clone()).collect(),
            direction: data.direction().as_str().to_string(),
        }
    }

    /// Keys sorted, single-element lists flattened to their value.
    pub fn to_info_json(&self, downloaded: DateTime<Utc>) -> Value {
        let mut map = Map::new();
        let mut insert_list = |key: &str, values: &[String]| {
            let value = match values {
                [single] => Value::String(single.clone()),
                _ => Value::from(values.to_vec()),
            };
            map.insert(key.to_string(), value);
        };

        insert_list("Artist", &self.artists);
        insert_list("Parody", &self.parodies);
        insert_list("Tags", &self.tags);
        insert_list("Thumb", &self.thumbs);
        if let Some(publishers) = &self.publishers {
            insert_list("Publisher", publishers);
        }

        map.insert("URL".into(), Value::from(self.url.clone()));
        map.insert("Title".into(), Value::from(self.title.clone()));
        map.insert("Language".into(), Value::from(self.language.clone()));
        map.insert("Pages".into(), Value::from(self.pages));
        map.insert("Description".into(), Value::from(self.description.clone()));
        map.insert("Direction".into(), Value::from(self.direction.clone()));
        map.insert("Downloaded".into(), Value::from(downloaded.to_rfc3339()));

        Value::Object(map)
    }

    pub fn comic_info_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let pages = self.pages.to_string();
        let artist = self.artists.join(", ");
        let genre = self.tags.join(", ");
        let publisher = self.publishers.as_ref().map(|p| p.join(", "));
        let language = self.language.as_deref().and_then(language_iso);
        let full_color = self.tags.iter().any(|t| t == "Full Color");
        let adult = self.tags.iter().any(|t| t == "Hentai" || t == "Ecchi");

        writer
            .create_element("ComicInfo")
            .write_inner_content(|w| {
                text_element(w, "Title", &self.title)?;
                text_element(w, "Penciller", &artist)?;
                if let Some(description) = &self.description {
                    text_element(w, "Summary", description)?;
                }
                if let Some(language) = language {
                    text_element(w, "LanguageISO", language)?;
                }
                text_element(w, "PageCount", &pages)?;
                text_element(w, "Web", &self.url)?;
                text_element(w, "Genre", &genre)?;
                if let Some(publisher) = &publisher {
                    text_element(w, "Publisher", publisher)?;
                }
                text_element(w, "Manga", "Yes")?;
                text_element(w, "BlackAndWhite", if full_color { "No" } else { "Yes" })?;
                if adult {
                    text_element(w, "AgeRating", "R18+")?;
                }
                Ok::<(), quick_xml::Error>(())
            })?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).context("ComicInfo.xml is not UTF-8")
    }
}

fn text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> quick_xml::Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// JSON with four-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Write `info.json` and `ComicInfo.xml` into the gallery folder.
pub async fn write_metadata(dir: &Path, metadata: &GalleryMetadata) -> Result<()> {
    tracing::debug!("Dumping metadata in info.json/ComicInfo.xml file");

    let info = to_pretty_json(&metadata.to_info_json(Utc::now()))?;
    tokio::fs::write(dir.join("info.json"), info)
        .await
        .context("Failed to write info.json")?;

    let xml = metadata.comic_info_xml()?;
    tokio::fs::write(dir.join("ComicInfo.xml"), xml)
        .await
        .context("Failed to write ComicInfo.xml")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> GalleryMetadata {
        GalleryMetadata {
            url: "https://www.fakku.net/hentai/sample".into(),
            title: "Sample & Title".into(),
            artists: vec!["Artist A".into()],
            parodies: vec!["Original Work".into()],
            publishers: None,
            language: Some("English".into()),
            pages: 24,
            description: Some("desc".into()),
            tags: vec!["Full Color".into(), "Hentai".into()],
            thumbs: vec!["t1".into(), "t2".into()],
            direction: "Right to Left".into(),
        }
    }

    #[test]
    fn test_info_json_flattens_single_lists() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let info = sample().to_info_json(ts);

        assert_eq!(info["Artist"], Value::from("Artist A"));
        assert_eq!(info["Tags"], Value::from(vec!["Full Color", "Hentai"]));
        assert_eq!(info["Pages"], Value::from(24));
        assert!(info.get("Publisher").is_none());
        assert_eq!(info["Downloaded"], Value::from("2024-01-02T03:04:05+00:00"));

        let keys: Vec<&String> = info.as_object().unwrap().keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_comic_info_xml() {
        let xml = sample().comic_info_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Title>Sample &amp; Title</Title>"));
        assert!(xml.contains("<Penciller>Artist A</Penciller>"));
        assert!(xml.contains("<LanguageISO>en</LanguageISO>"));
        assert!(xml.contains("<PageCount>24</PageCount>"));
        assert!(xml.contains("<BlackAndWhite>No</BlackAndWhite>"));
        assert!(xml.contains("<AgeRating>R18+</AgeRating>"));
        assert!(!xml.contains("<Publisher>"));
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let out = to_pretty_json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n    \"a\": 1\n}");
    }
}
