//! Reader service: endpoints, response models and the HTTP client.

pub mod api;
pub mod models;

use crate::error::Result;
use async_trait::async_trait;

pub use api::ReaderApi;
pub use models::{Attribute, ContentMeta, PageEntry, ReaderResponse};

pub const BASE_URL: &str = "https://www.fakku.net";
pub const API_URL: &str = "https://reader.fakku.net";
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:141.0) Gecko/20100101 Firefox/141.0";
/// Cookie carrying the session id used to derive page keys.
pub const SESSION_COOKIE: &str = "fakku_zid";
/// Marker text on the read page when the account does not own the gallery.
pub const NO_ACCESS_MARKER: &str = "You do not have access to this content.";

/// Anything that can hand out page image bytes by URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Vec<u8>>;
}

/// Gallery slug from a gallery URL, e.g. `sample-title` from
/// `https://www.fakku.net/hentai/sample-title/read`.
pub fn chapter_id(url: &str) -> Option<String> {
    let start = url.find("/hentai/")? + "/hentai/".len();
    let slug: String = url[start..]
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#'))
        .collect();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Canonical gallery URL for a slug.
pub fn gallery_url(chapter_id: &str) -> String {
    format!("{}/hentai/{}", BASE_URL, chapter_id)
}
