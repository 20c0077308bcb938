//! Gallery Station - a downloader for reader galleries with page descrambling
//!
//! This library provides the download pipeline around the `descramble-rs`
//! core: url bookkeeping, cookie loading, file naming, metadata and the
//! concurrent page downloader.

pub mod config;
pub mod cookies;
pub mod downloader;
pub mod metadata;
pub mod naming;
pub mod optimize;
pub mod urls;
