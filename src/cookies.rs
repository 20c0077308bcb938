//! Netscape `cookies.txt` loading into a reqwest cookie jar.

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::cookie::Jar;
use std::path::Path;
use std::sync::Arc;

/// Browser exports mark HttpOnly cookies by prefixing the domain.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetscapeCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp; 0 for session cookies.
    pub expires: i64,
    pub name: String,
    pub value: String,
    pub http_only: bool,
}

impl NetscapeCookie {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires < now
    }

    /// Url the cookie is registered against.
    pub fn url(&self) -> Option<Url> {
        let host = self.domain.trim_start_matches('.');
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{}://{}{}", scheme, host, self.path)).ok()
    }

    /// `Set-Cookie` form understood by [`Jar::add_cookie_str`].
    pub fn set_cookie_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.include_subdomains {
            header.push_str(&format!("; Domain={}", self.domain.trim_start_matches('.')));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// Parse the tab-separated Netscape format. Malformed lines are skipped.
pub fn parse_netscape(text: &str) -> Vec<NetscapeCookie> {
    let mut cookies = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            tracing::debug!("Skipping malformed cookie line with {} fields", fields.len());
            continue;
        }

        cookies.push(NetscapeCookie {
            domain: fields[0].to_string(),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            expires: fields[4].parse().unwrap_or(0),
            name: fields[5].to_string(),
            value: fields[6].to_string(),
            http_only,
        });
    }
    cookies
}

/// Build a jar from parsed cookies, dropping expired ones. Returns the jar
/// and the number of cookies added.
pub fn build_jar(cookies: &[NetscapeCookie], now: i64) -> (Arc<Jar>, usize) {
    let jar = Jar::default();
    let mut added = 0;
    for cookie in cookies {
        if cookie.is_expired(now) {
            tracing::debug!("Skipping expired cookie {}", cookie.name);
            continue;
        }
        let Some(url) = cookie.url() else {
            tracing::warn!("Skipping cookie {} with bad domain {}", cookie.name, cookie.domain);
            continue;
        };
        jar.add_cookie_str(&cookie.set_cookie_header(), &url);
        added += 1;
    }
    (Arc::new(jar), added)
}

pub fn load_cookie_jar(path: &Path) -> Result<Arc<Jar>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookies from {}", path.display()))?;
    let cookies = parse_netscape(&text);
    let (jar, added) = build_jar(&cookies, chrono::Utc::now().timestamp());
    tracing::info!("Loaded {} cookies from {}", added, path.display());
    Ok(jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    const SAMPLE: &str = "# Netscape HTTP Cookie File\n\
.fakku.net\tTRUE\t/\tTRUE\t0\tfakku_zid\tzid-value\n\
#HttpOnly_.fakku.net\tTRUE\t/\tTRUE\t4102444800\tfakku_sid\tsid-value\n\
www.fakku.net\tFALSE\t/\tFALSE\t1000\told\tgone\n\
broken line\n";

    #[test]
    fn test_parse_netscape() {
        let cookies = parse_netscape(SAMPLE);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[0].name, "fakku_zid");
        assert!(cookies[0].include_subdomains);
        assert!(!cookies[0].http_only);
        assert!(cookies[1].http_only);
        assert_eq!(cookies[1].expires, 4102444800);
        assert!(cookies[2].is_expired(2000));
        assert!(!cookies[0].is_expired(2000));
    }

    #[test]
    fn test_build_jar_sends_cookies_to_subdomains() {
        let cookies = parse_netscape(SAMPLE);
        let (jar, added) = build_jar(&cookies, 2000);
        assert_eq!(added, 2);

        let url = Url::parse("https://reader.fakku.net/hentai/x/read").unwrap();
        let header = jar.cookies(&url).unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("fakku_zid=zid-value"));
        assert!(header.contains("fakku_sid=sid-value"));
        assert!(!header.contains("old=gone"));
    }
}
