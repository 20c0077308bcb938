//! Defaults and the downloader configuration.

use std::path::PathBuf;
use std::time::Duration;

/// File with gallery urls, one per line
pub const URLS_FILE: &str = "urls.txt";
/// File with finished gallery urls
pub const DONE_FILE: &str = "done.txt";
/// Netscape-format cookie export
pub const COOKIES_FILE: &str = "cookies.txt";
/// Root directory for downloaded galleries
pub const ROOT_MANGA_DIR: &str = "manga";
/// Root directory for raw server responses
pub const ROOT_RESPONSE_DIR: &str = "response";

pub const TIMEOUT_SECS: u64 = 10;
pub const WAIT_SECS: f64 = 0.1;
pub const CONCURRENCY: usize = 5;
pub const RETRIES: u32 = 3;

/// ISO 639-1 codes for the languages the storefront publishes in.
pub fn language_iso(language: &str) -> Option<&'static str> {
    match language {
        "English" => Some("en"),
        "Spanish" => Some("es"),
        "Japanese" => Some("ja"),
        "Chinese" => Some("zh"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub urls_file: PathBuf,
    pub done_file: PathBuf,
    pub cookies_file: PathBuf,
    pub output_dir: PathBuf,
    pub response_dir: PathBuf,
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause between galleries
    pub wait: Duration,
    pub proxy: Option<String>,
    /// Keep raw page bytes and `api.json`
    pub keep_response: bool,
    pub save_metadata: bool,
    pub optimize: bool,
    /// Pages processed at once per gallery
    pub concurrency: usize,
    /// Extra attempts for a failed page fetch
    pub retries: u32,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            urls_file: PathBuf::from(URLS_FILE),
            done_file: PathBuf::from(DONE_FILE),
            cookies_file: PathBuf::from(COOKIES_FILE),
            output_dir: PathBuf::from(ROOT_MANGA_DIR),
            response_dir: PathBuf::from(ROOT_RESPONSE_DIR),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            wait: Duration::from_secs_f64(WAIT_SECS),
            proxy: None,
            keep_response: false,
            save_metadata: true,
            optimize: true,
            concurrency: CONCURRENCY,
            retries: RETRIES,
        }
    }
}
