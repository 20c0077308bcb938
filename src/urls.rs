//! Url list and done-file bookkeeping.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static GALLERY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fakku\.net/hentai/").unwrap());

/// Pending gallery urls plus the set of finished ones.
#[derive(Debug)]
pub struct UrlList {
    pub urls: Vec<String>,
    done: HashSet<String>,
    done_file: PathBuf,
}

impl UrlList {
    /// Read both files. A missing done file is created empty.
    pub fn load(urls_file: &Path, done_file: &Path) -> Result<Self> {
        tracing::debug!("Parsing list of urls");

        if !done_file.is_file() {
            std::fs::File::create(done_file)
                .with_context(|| format!("Failed to create {}", done_file.display()))?;
        }

        let done_text = std::fs::read_to_string(done_file)
            .with_context(|| format!("Failed to read {}", done_file.display()))?;
        let done = parse_done(&done_text);
        tracing::debug!("Done: {}", done.len());

        let urls_text = std::fs::read_to_string(urls_file)
            .with_context(|| format!("Failed to read {}", urls_file.display()))?;
        let urls = parse_urls(&urls_text, &done);
        tracing::debug!("Urls: {}", urls.len());

        Ok(Self {
            urls,
            done,
            done_file: done_file.to_path_buf(),
        })
    }

    pub fn is_done(&self, url: &str) -> bool {
        self.done.contains(url)
    }

    /// Record a finished gallery in memory and append it to the done file.
    pub fn mark_done(&mut self, url: &str) -> Result<()> {
        if !self.done.insert(url.to_string()) {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.done_file)
            .with_context(|| format!("Failed to open {}", self.done_file.display()))?;
        writeln!(file, "{}", url)?;
        Ok(())
    }
}

pub fn parse_done(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Gallery urls from a url list, in file order.
///
/// Lines that are comments, not gallery urls, already done or repeated are
/// dropped; a trailing `#...` is cut off.
pub fn parse_urls(text: &str, done: &HashSet<String>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if !GALLERY_URL.is_match(line) || line.starts_with('#') {
            continue;
        }
        let url = match line.split_once('#') {
            Some((before, _)) => before.trim(),
            None => line,
        };
        if url.is_empty() || done.contains(url) || urls.iter().any(|u| u == url) {
            continue;
        }
        urls.push(url.to_string());
    }
    urls
}
