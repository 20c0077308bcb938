//! Gallery download pipeline.
//!
//! For each url: check access, load reader data, decrypt the page keys, then
//! fetch and descramble pages on a bounded pool. Spreads are joined once every
//! page is on disk, followed by optimization and metadata.

use crate::config::DownloaderConfig;
use crate::cookies::load_cookie_jar;
use crate::metadata::{GalleryMetadata, write_metadata};
use crate::naming;
use crate::optimize::Optimizer;
use crate::urls::UrlList;
use anyhow::{Context, Result};
use descramble_rs::reader::{self, PageEntry};
use descramble_rs::{
    DescrambleError, Direction, KeyTable, PageSource, ReaderApi, ReaderResponse, SourceKind,
    SpreadPair, decrypt_key_table, descramble_page, encode_png, spread_pairs,
};
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Where and how one gallery is written.
#[derive(Debug, Clone)]
pub struct GallerySettings {
    pub manga_dir: PathBuf,
    pub response_dir: PathBuf,
    pub keep_response: bool,
    pub save_metadata: bool,
    pub optimizer: Option<Optimizer>,
    pub concurrency: usize,
    pub retries: u32,
}

#[derive(Debug, Default)]
pub struct GalleryReport {
    /// Page index → file on disk
    pub saved: BTreeMap<String, PathBuf>,
    /// Page index → failure reason
    pub skipped: BTreeMap<String, String>,
    /// Spreads joined
    pub spreads: usize,
}

impl GalleryReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug)]
pub enum GalleryOutcome {
    Downloaded(GalleryReport),
    /// The url redirects to a gallery that is already done.
    AlreadyDone,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub completed: usize,
    pub incomplete: usize,
    pub failed: usize,
}

/// Decrypt the page keys of a gallery. Unscrambled galleries get an empty
/// table; scrambled ones need the session id.
pub fn gallery_keys(data: &ReaderResponse, session_id: Option<&str>) -> descramble_rs::Result<KeyTable> {
    let Some(key_hash) = data.key_hash.as_deref() else {
        return Ok(KeyTable::default());
    };
    let session_id = session_id.ok_or_else(|| {
        DescrambleError::KeyDerivation(format!(
            "failed to retrieve {} cookie for descrambling pages",
            reader::SESSION_COOKIE
        ))
    })?;
    let key_data = data
        .key_data
        .as_deref()
        .ok_or_else(|| DescrambleError::KeyDerivation("reader response has no key_data".to_string()))?;

    decrypt_key_table(key_hash, key_data, session_id)
}

/// Fetch a page, retrying transport errors with exponential backoff.
pub async fn fetch_with_retry(
    source: &dyn PageSource,
    url: &str,
    retries: u32,
) -> descramble_rs::Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        match source.fetch_page(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e @ DescrambleError::Fetch(_)) if attempt < retries => {
                let delay = backoff(attempt);
                tracing::warn!("Fetching {} failed ({}), retrying in {:?}", url, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let base = 500u64 << attempt.min(6);
    let jitter = rand::thread_rng().gen_range(0..250);
    Duration::from_millis(base + jitter)
}

async fn download_page(
    source: &dyn PageSource,
    idx: &str,
    page: &PageEntry,
    keys: &KeyTable,
    padding: usize,
    settings: &GallerySettings,
) -> Result<PathBuf> {
    let key = keys.key_for(idx)?;
    let raw = fetch_with_retry(source, &page.image, settings.retries).await?;

    let image = tokio::task::spawn_blocking(move || descramble_page(raw, key))
        .await
        .context("Descramble task panicked")??;

    if settings.keep_response {
        let raw_path = settings
            .response_dir
            .join(naming::page_file_name(page.page, padding, image.raw_ext));
        tokio::fs::write(&raw_path, &image.raw)
            .await
            .with_context(|| format!("Failed to write {}", raw_path.display()))?;
    }

    let dest = settings
        .manga_dir
        .join(naming::page_file_name(page.page, padding, image.ext));
    tokio::fs::write(&dest, &image.bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(dest)
}

/// Download every page with at most `settings.concurrency` in flight.
/// Failed pages are recorded in the report; the others carry on.
pub async fn download_pages(
    source: &dyn PageSource,
    pages: &BTreeMap<String, PageEntry>,
    keys: &KeyTable,
    padding: usize,
    settings: &GallerySettings,
) -> GalleryReport {
    let total = pages.len();
    let finished = AtomicUsize::new(0);

    let results: Vec<(String, Result<PathBuf>)> = stream::iter(pages.iter())
        .map(|(idx, page)| {
            let finished = &finished;
            async move {
                let result = download_page(source, idx, page, keys, padding, settings).await;
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                match &result {
                    Ok(path) => tracing::info!("[{}/{}] page {} saved to {}", done, total, idx, path.display()),
                    Err(e) => tracing::warn!("[{}/{}] page {} skipped: {:#}", done, total, idx, e),
                }
                (idx.clone(), result)
            }
        })
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await;

    let mut report = GalleryReport::default();
    for (idx, result) in results {
        match result {
            Ok(path) => {
                report.saved.insert(idx, path);
            }
            Err(e) => {
                report.skipped.insert(idx, format!("{:#}", e));
            }
        }
    }
    report
}

fn stem_and_ext(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (stem, ext)
}

fn join_one(
    left_path: &Path,
    right_path: &Path,
    manga_dir: &Path,
    direction: Direction,
    source_kind: SourceKind,
) -> Result<(PathBuf, PathBuf)> {
    let load = |path: &Path| -> Result<image::DynamicImage> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        image::load_from_memory(&bytes).with_context(|| format!("Failed to decode {}", path.display()))
    };
    let left = load(left_path)?;
    let right = load(right_path)?;

    let combo = descramble_rs::join(&left, &right, direction, source_kind);

    let (left_stem, left_ext) = stem_and_ext(left_path);
    let (right_stem, right_ext) = stem_and_ext(right_path);

    let dest = manga_dir.join(naming::spread_file_name(&left_stem, &right_stem));
    std::fs::write(&dest, encode_png(&combo)?)
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    let new_left = manga_dir.join(naming::spread_left_name(&left_stem, &left_ext));
    let new_right = manga_dir.join(naming::spread_right_name(&right_stem, &right_ext));
    std::fs::rename(left_path, &new_left)
        .with_context(|| format!("Failed to rename {}", left_path.display()))?;
    if let Err(e) = std::fs::rename(right_path, &new_right) {
        // Put the left page back so the saved paths stay valid.
        if let Err(undo) = std::fs::rename(&new_left, left_path) {
            tracing::warn!("Failed to restore {}: {}", left_path.display(), undo);
        }
        if let Err(undo) = std::fs::remove_file(&dest) {
            tracing::warn!("Failed to remove {}: {}", dest.display(), undo);
        }
        return Err(e).with_context(|| format!("Failed to rename {}", right_path.display()));
    }
    Ok((new_left, new_right))
}

/// Join spread pairs from saved pages. Constituents are renamed to their
/// "used in spread" names and `saved` is updated to match.
pub fn join_spreads(
    pairs: &BTreeMap<String, SpreadPair>,
    saved: &mut BTreeMap<String, PathBuf>,
    manga_dir: &Path,
    direction: Direction,
    source_kind: SourceKind,
) -> usize {
    let mut joined = 0;
    for pair in pairs.values() {
        let (Some(left_path), Some(right_path)) =
            (saved.get(&pair.left).cloned(), saved.get(&pair.right).cloned())
        else {
            tracing::warn!(
                "Requested to join non-existent pages ({}, {}), ignoring",
                pair.left,
                pair.right
            );
            continue;
        };

        match join_one(&left_path, &right_path, manga_dir, direction, source_kind) {
            Ok((new_left, new_right)) => {
                saved.insert(pair.left.clone(), new_left);
                saved.insert(pair.right.clone(), new_right);
                joined += 1;
            }
            Err(e) => tracing::warn!("Failed to join spread {}-{}: {:#}", pair.left, pair.right, e),
        }
    }
    joined
}

/// Everything after the reader data and keys are known: pages, spreads,
/// optimization and metadata.
pub async fn save_gallery(
    source: &dyn PageSource,
    data: &ReaderResponse,
    keys: &KeyTable,
    settings: &GallerySettings,
) -> Result<GalleryReport> {
    tokio::fs::create_dir_all(&settings.manga_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.manga_dir.display()))?;

    if settings.keep_response {
        tokio::fs::create_dir_all(&settings.response_dir)
            .await
            .with_context(|| format!("Failed to create {}", settings.response_dir.display()))?;
        let api_json = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(settings.response_dir.join("api.json"), api_json)
            .await
            .context("Failed to write api.json")?;
    }

    let padding = naming::page_padding(data.page_count());
    let mut report = download_pages(source, &data.pages, keys, padding, settings).await;

    let pairs = spread_pairs(&data.spreads);
    if !pairs.is_empty() {
        let mut saved = std::mem::take(&mut report.saved);
        let manga_dir = settings.manga_dir.clone();
        let direction = data.direction();
        let source_kind = data.source_kind();

        let (saved, joined) = tokio::task::spawn_blocking(move || {
            let joined = join_spreads(&pairs, &mut saved, &manga_dir, direction, source_kind);
            (saved, joined)
        })
        .await
        .context("Spread task panicked")?;

        tracing::info!("Joined {} spreads", joined);
        report.saved = saved;
        report.spreads = joined;
    }

    if let Some(optimizer) = settings.optimizer {
        if let Err(e) = optimizer.run(&settings.manga_dir).await {
            tracing::warn!("Optimization failed: {:#}", e);
        }
    }

    if settings.save_metadata {
        write_metadata(&settings.manga_dir, &GalleryMetadata::from_reader(data)).await?;
    }

    Ok(report)
}

pub struct Downloader {
    config: DownloaderConfig,
    api: Arc<ReaderApi>,
    urls: UrlList,
    optimizer: Option<Optimizer>,
}

impl Downloader {
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        let urls = UrlList::load(&config.urls_file, &config.done_file)?;
        let jar = load_cookie_jar(&config.cookies_file)?;
        let api = ReaderApi::new(jar, config.timeout, config.proxy.as_deref())
            .context("Failed to build HTTP client")?;

        let optimizer = if config.optimize {
            let found = Optimizer::detect();
            if found.is_none() {
                tracing::warn!("Pingo/ECT not found, disabling optimization");
            }
            found
        } else {
            None
        };

        Ok(Self {
            config,
            api: Arc::new(api),
            urls,
            optimizer,
        })
    }

    pub fn pending(&self) -> &[String] {
        &self.urls.urls
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let urls = self.urls.urls.clone();
        if urls.is_empty() {
            tracing::info!("Nothing to rip");
            return Ok(summary);
        }

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .context("Failed to create output directory")?;

        for url in &urls {
            tracing::info!("{}", url);
            match self.download_gallery(url).await {
                Ok(GalleryOutcome::AlreadyDone) => {
                    tracing::info!("URL redirects to a done gallery, marking it done");
                    self.urls.mark_done(url)?;
                }
                Ok(GalleryOutcome::Downloaded(report)) if report.is_complete() => {
                    tracing::info!("Finished {} ({} pages, {} spreads)", url, report.saved.len(), report.spreads);
                    self.urls.mark_done(url)?;
                    summary.completed += 1;
                }
                Ok(GalleryOutcome::Downloaded(report)) => {
                    tracing::warn!(
                        "{} pages skipped for {}, leaving it for the next run",
                        report.skipped.len(),
                        url
                    );
                    summary.incomplete += 1;
                }
                Err(e) => {
                    match e.downcast_ref::<DescrambleError>() {
                        Some(DescrambleError::AccessDenied(_)) => {
                            tracing::info!("You do not have access to this content: {}", url)
                        }
                        Some(err) if !err.is_page_local() => {
                            tracing::error!("Skipping gallery {}: {}", url, err)
                        }
                        _ => tracing::error!("Failed to download {}: {:#}", url, e),
                    }
                    summary.failed += 1;
                }
            }
            summary.processed += 1;
            tokio::time::sleep(self.config.wait).await;
        }

        tracing::info!("Urls processed: {}", summary.processed);
        Ok(summary)
    }

    async fn download_gallery(&self, url: &str) -> Result<GalleryOutcome> {
        let chapter_id = reader::chapter_id(url)
            .with_context(|| format!("No gallery id in {}", url))?;

        let canonical = reader::gallery_url(&chapter_id);
        if canonical != url && self.urls.is_done(&canonical) {
            return Ok(GalleryOutcome::AlreadyDone);
        }

        tracing::info!("Downloading \"{}\" manga.", chapter_id);
        self.api.check_access(url).await?;
        let data = self.api.reader_data(&chapter_id).await?;
        let keys = gallery_keys(&data, self.api.session_id().as_deref())?;

        let metadata = GalleryMetadata::from_reader(&data);
        let title = naming::folder_title(&metadata.artists, &metadata.title);
        tracing::debug!("Folder: {}", title);

        let settings = GallerySettings {
            manga_dir: self.config.output_dir.join(&title),
            response_dir: self.config.response_dir.join(&title),
            keep_response: self.config.keep_response,
            save_metadata: self.config.save_metadata,
            optimizer: self.optimizer,
            concurrency: self.config.concurrency,
            retries: self.config.retries,
        };

        let report = save_gallery(self.api.as_ref(), &data, &keys, &settings).await?;
        Ok(GalleryOutcome::Downloaded(report))
    }
}
