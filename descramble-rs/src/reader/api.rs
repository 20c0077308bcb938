use super::models::ReaderResponse;
use super::{PageSource, API_URL, BASE_URL, NO_ACCESS_MARKER, SESSION_COOKIE, USER_AGENT};
use crate::error::{DescrambleError, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{Client, Proxy, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub struct ReaderApi {
    client: Client,
    jar: Arc<Jar>,
}

impl ReaderApi {
    pub fn new(jar: Arc<Jar>, timeout: Duration, proxy: Option<&str>) -> Result<Self> {
        info!("Initializing reader API client");

        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static(BASE_URL));
        headers.insert(REFERER, HeaderValue::from_static("https://www.fakku.net/"));
        headers.insert("DNT", HeaderValue::from_static("1"));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .timeout(timeout);

        if let Some(proxy) = proxy {
            debug!("Using proxy: {}", proxy);
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            jar,
        })
    }

    /// Value of the session cookie for the storefront, if the jar has one.
    pub fn session_id(&self) -> Option<String> {
        let url = Url::parse(BASE_URL).ok()?;
        let header = self.jar.cookies(&url)?;
        let header = header.to_str().ok()?;
        find_cookie(header, SESSION_COOKIE)
    }

    /// Load the read page, which also refreshes session cookies, and fail if
    /// the account cannot open the gallery.
    #[instrument(skip(self), fields(service = "reader"))]
    pub async fn check_access(&self, gallery_url: &str) -> Result<()> {
        let url = format!("{}/read", gallery_url.trim_end_matches('/'));
        let text = self
            .client
            .get(&url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(REFERER, gallery_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if text.contains(NO_ACCESS_MARKER) {
            return Err(DescrambleError::AccessDenied(gallery_url.to_string()));
        }
        Ok(())
    }

    /// Reader metadata, page list and key data for a gallery.
    #[instrument(skip(self), fields(service = "reader"))]
    pub async fn reader_data(&self, chapter_id: &str) -> Result<ReaderResponse> {
        let url = format!("{}/hentai/{}/read", API_URL, chapter_id);
        info!("Fetching reader data for {}", chapter_id);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DescrambleError::NotFound(chapter_id.to_string()));
        }

        let text = response.error_for_status()?.text().await?;
        debug!("Reader response received, length: {} bytes", text.len());

        let data: ReaderResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse reader response: {}", e);
            DescrambleError::Api(format!("Failed to parse reader response: {}", e))
        })?;

        info!(
            "Gallery has {} pages, {} spread entries, scrambled: {}",
            data.pages.len(),
            data.spreads.len(),
            data.key_hash.is_some()
        );
        Ok(data)
    }

    /// Raw image bytes for one page.
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let bytes = self
            .client
            .get(url)
            .header(
                ACCEPT,
                "image/avif,image/webp,image/png,image/svg+xml,image/*;q=0.8,*/*;q=0.5",
            )
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PageSource for ReaderApi {
    async fn fetch_page(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_image(url).await
    }
}

/// Pick one cookie out of a `Cookie:` header value.
fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
