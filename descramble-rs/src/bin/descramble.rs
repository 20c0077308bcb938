use anyhow::{bail, Context};
use clap::Parser;
use descramble_rs::{decrypt_key_table, descramble_page, KeyArray};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Page Descrambler
///
/// Rebuild a single scrambled reader page saved to disk.
#[derive(Parser, Debug)]
#[command(name = "descramble")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scrambled image file
    input: PathBuf,

    /// Where to write the PNG (default: `<input stem>.descrambled.png`)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Key array as comma-separated integers
    #[arg(short, long, value_name = "INTS", conflicts_with_all = ["key_hash", "key_data"])]
    key: Option<String>,

    /// `key_hash` from the reader response
    #[arg(long, value_name = "HASH", requires_all = ["key_data", "page"])]
    key_hash: Option<String>,

    /// `key_data` from the reader response, or `@file` to read it from a file
    #[arg(long, value_name = "DATA")]
    key_data: Option<String>,

    /// Session cookie value
    #[arg(long, env = "DESCRAMBLE_ZID", value_name = "ZID")]
    zid: Option<String>,

    /// Page index in the key table
    #[arg(short, long, value_name = "PAGE")]
    page: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_key(text: &str) -> anyhow::Result<KeyArray> {
    let values = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|v| v.trim().parse::<i64>().with_context(|| format!("'{}' is not an integer", v.trim())))
        .collect::<anyhow::Result<Vec<i64>>>()?;
    Ok(KeyArray::try_from(values)?)
}

fn resolve_key(args: &Args) -> anyhow::Result<Option<KeyArray>> {
    if let Some(key) = &args.key {
        return parse_key(key).map(Some);
    }

    let (Some(key_hash), Some(key_data), Some(page)) = (&args.key_hash, &args.key_data, &args.page) else {
        return Ok(None);
    };
    let Some(zid) = &args.zid else {
        bail!("--zid (or DESCRAMBLE_ZID) is required to decrypt key data");
    };

    let key_data = match key_data.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading key data from {}", path))?,
        None => key_data.clone(),
    };

    let table = decrypt_key_table(key_hash, &key_data, zid)?;
    Ok(table.key_for(page)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let key = resolve_key(&args)?;
    if key.is_none() {
        info!("No key for this page, output will be the input unchanged");
    }

    let raw = fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let page = descramble_page(raw, key)?;

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        args.input.with_file_name(format!("{}.descrambled.{}", stem, page.ext))
    });

    fs::write(&output, &page.bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("Saved {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        let key = parse_key("[1, 2, 3, 4]").unwrap();
        assert_eq!(key.as_slice(), &[1, 2, 3, 4]);
        assert!(parse_key("1,2").is_err());
        assert!(parse_key("1,x,3,4").is_err());
    }
}
