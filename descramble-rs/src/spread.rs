//! Two-page spread compositing.

use crate::models::{Direction, SourceKind, SpreadPair};
use image::{imageops, ColorType, DynamicImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use tracing::debug;

/// Vertical placement of a page shorter than the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Top-aligned, no centering.
    #[default]
    None,
    Center,
    Bottom,
}

/// Join two pages side by side using the spread defaults (top-aligned).
pub fn join(
    left: &DynamicImage,
    right: &DynamicImage,
    direction: Direction,
    source_kind: SourceKind,
) -> DynamicImage {
    join_with(left, right, direction, source_kind, Alignment::None)
}

/// Join two pages side by side.
///
/// Pages are placed in reading order: for right-to-left galleries the pair is
/// reversed so the later page sits on the left of the canvas.
pub fn join_with(
    left: &DynamicImage,
    right: &DynamicImage,
    direction: Direction,
    source_kind: SourceKind,
    alignment: Alignment,
) -> DynamicImage {
    let pages = if direction == Direction::LeftToRight {
        [left, right]
    } else {
        [right, left]
    };

    let width: u32 = pages.iter().map(|p| p.width()).sum();
    let height = pages.iter().map(|p| p.height()).max().unwrap_or(0);
    debug!("Joining spread into {}x{} ({:?}, {:?})", width, height, direction, source_kind);

    let y_for = |page: &DynamicImage| -> i64 {
        match alignment {
            Alignment::None => 0,
            Alignment::Center => ((height - page.height()) / 2) as i64,
            Alignment::Bottom => (height - page.height()) as i64,
        }
    };

    let grayscale = pages.iter().all(|p| p.color() == ColorType::L8);

    match (source_kind, grayscale) {
        (SourceKind::Scrambled, _) => {
            // Alpha keeps any unfilled tile padding transparent-capable.
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
            let mut x = 0i64;
            for page in pages {
                imageops::replace(&mut canvas, &page.to_rgba8(), x, y_for(page));
                x += page.width() as i64;
            }
            DynamicImage::ImageRgba8(canvas)
        }
        (SourceKind::Unscrambled, true) => {
            let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));
            let mut x = 0i64;
            for page in pages {
                imageops::replace(&mut canvas, &page.to_luma8(), x, y_for(page));
                x += page.width() as i64;
            }
            DynamicImage::ImageLuma8(canvas)
        }
        (SourceKind::Unscrambled, false) => {
            let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
            let mut x = 0i64;
            for page in pages {
                imageops::replace(&mut canvas, &page.to_rgb8(), x, y_for(page));
                x += page.width() as i64;
            }
            DynamicImage::ImageRgb8(canvas)
        }
    }
}

/// Spread pairs from the reader's spread table, keyed by end page.
///
/// Each entry lists the pages of one spread; only its first and last page
/// matter. Entries whose ends coincide are single pages.
pub fn spread_pairs(spreads: &[Vec<i64>]) -> BTreeMap<String, SpreadPair> {
    let mut pairs = BTreeMap::new();
    for spread in spreads {
        let (Some(first), Some(last)) = (spread.first(), spread.last()) else {
            continue;
        };
        if first == last {
            continue;
        }
        let right = last.to_string();
        pairs.insert(
            right.clone(),
            SpreadPair {
                left: first.to_string(),
                right,
            },
        );
    }
    pairs
}
