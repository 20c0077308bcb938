//! Tile reassembly for scrambled reader pages.
//!
//! The reader serves pages cut into 128×128 tiles and shuffled by a seeded
//! permutation. The page's key array carries the true size (XOR-obfuscated)
//! and the seeds needed to rebuild the tile order.

use crate::error::{DescrambleError, Result};
use crate::models::KeyArray;
use crate::prng::{permute, scatter};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

pub const TILE_SIZE: u32 = 128;

/// Largest page edge a key may decode to.
pub const MAX_EDGE: u32 = 1 << 15;

/// Largest page area a key may decode to.
pub const MAX_PIXELS: u64 = 1 << 27;

/// Tile layout of a page, derived from its true dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub width_pieces: u32,
    pub height_pieces: u32,
    pub is_horizontal: bool,
    /// Shift applied to the last tile row (horizontal pages) or column.
    pub offset: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let is_horizontal = width > height;
        let smaller_edge = if is_horizontal { height } else { width };
        let offset = (TILE_SIZE - smaller_edge % TILE_SIZE) % TILE_SIZE;

        Self {
            width,
            height,
            width_pieces: width.div_ceil(TILE_SIZE),
            height_pieces: height.div_ceil(TILE_SIZE),
            is_horizontal,
            offset,
        }
    }

    pub fn tile_count(&self) -> u64 {
        self.width_pieces as u64 * self.height_pieces as u64
    }

    /// Top-left pixel of the scrambled tile `slot`.
    pub fn source_origin(&self, slot: u32) -> (i64, i64) {
        let x = slot % self.width_pieces;
        let y = (slot - x) / self.width_pieces;
        (x as i64 * TILE_SIZE as i64, y as i64 * TILE_SIZE as i64)
    }

    /// Top-left pixel of destination tile `slot`, with the short-axis shift
    /// applied to the last row or column. May be negative.
    pub fn destination_origin(&self, slot: u32) -> (i64, i64) {
        let x_piece = slot % self.width_pieces;
        let y_piece = (slot - x_piece) / self.width_pieces;

        let last_piece = if self.is_horizontal {
            y_piece == self.height_pieces - 1
        } else {
            x_piece == self.width_pieces - 1
        };

        let mut dx = x_piece as i64 * TILE_SIZE as i64;
        let mut dy = y_piece as i64 * TILE_SIZE as i64;
        if last_piece {
            if self.is_horizontal {
                dy -= self.offset as i64;
            } else {
                dx -= self.offset as i64;
            }
        }
        (dx, dy)
    }
}

/// Recovered geometry of a scrambled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGeometry {
    pub grid: TileGrid,
    /// Seed of the tile order, also the XOR mask of the dimensions.
    pub xor: i64,
}

/// Recover width, height and the tile seed from a key array.
///
/// The trailing element is popped as the shuffle seed and the remaining
/// control values are reordered with it before anything is read from them.
/// Sizes beyond [`MAX_EDGE`] or [`MAX_PIXELS`] are rejected before any
/// canvas is allocated.
pub fn page_geometry(key: KeyArray) -> Result<PageGeometry> {
    let (control, shuffle_seed) = key.pop_seed();
    let reordered = scatter(&control, shuffle_seed);

    if reordered.len() < 3 {
        return Err(DescrambleError::MalformedKey(format!(
            "need 3 control values after the seed, got {}",
            reordered.len()
        )));
    }

    let xor = reordered[2];
    let width = reordered[0] ^ xor;
    let height = reordered[1] ^ xor;

    if width <= 0
        || height <= 0
        || width > MAX_EDGE as i64
        || height > MAX_EDGE as i64
        || (width * height) as u64 > MAX_PIXELS
    {
        return Err(DescrambleError::InvalidDimensions { width, height });
    }

    Ok(PageGeometry {
        grid: TileGrid::new(width as u32, height as u32),
        xor,
    })
}

/// Rebuild the unscrambled page.
pub fn descramble(image: &DynamicImage, key: KeyArray) -> Result<RgbImage> {
    let PageGeometry { grid, xor } = page_geometry(key)?;
    debug!(
        "Image: {}x{}, seed {}, {}x{} tiles, offset {}",
        grid.width, grid.height, xor, grid.width_pieces, grid.height_pieces, grid.offset
    );

    let slots: Vec<u32> = (0..grid.tile_count() as u32).collect();
    let piece_order = permute(&slots, xor);

    let source = image.to_rgb8();
    let mut canvas = RgbImage::new(grid.width, grid.height);

    for (index, &value) in piece_order.iter().enumerate() {
        let (sx, sy) = grid.source_origin(value);
        let (dx, dy) = grid.destination_origin(index as u32);
        copy_tile(&source, &mut canvas, (sx, sy), (dx, dy));
    }

    Ok(canvas)
}

/// Copy one tile, clipped to the source image and to the canvas.
fn copy_tile(source: &RgbImage, canvas: &mut RgbImage, src: (i64, i64), dst: (i64, i64)) {
    let tile = TILE_SIZE as i64;
    let (sw, sh) = (source.width() as i64, source.height() as i64);
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);

    // Intersection of the tile with the source bounds, in tile coordinates.
    let x0 = 0i64.max(-src.0).max(-dst.0);
    let y0 = 0i64.max(-src.1).max(-dst.1);
    let x1 = tile.min(sw - src.0).min(cw - dst.0);
    let y1 = tile.min(sh - src.1).min(ch - dst.1);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for ty in y0..y1 {
        for tx in x0..x1 {
            let pixel = *source.get_pixel((src.0 + tx) as u32, (src.1 + ty) as u32);
            canvas.put_pixel((dst.0 + tx) as u32, (dst.1 + ty) as u32, pixel);
        }
    }
}

/// A fetched page, before and after descrambling.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Bytes as served.
    pub raw: Vec<u8>,
    pub raw_ext: &'static str,
    /// Bytes to store: re-encoded PNG when descrambled, `raw` otherwise.
    pub bytes: Vec<u8>,
    pub ext: &'static str,
}

impl PageImage {
    pub fn was_descrambled(&self) -> bool {
        self.raw_ext != self.ext || self.raw != self.bytes
    }
}

/// File extension for a served image format.
pub fn extension_for(format: Option<ImageFormat>) -> &'static str {
    match format {
        Some(ImageFormat::Jpeg) => "jpg",
        Some(ImageFormat::Png) => "png",
        Some(ImageFormat::WebP) => "webp",
        Some(ImageFormat::Gif) => "gif",
        Some(ImageFormat::Bmp) => "bmp",
        Some(other) => other.extensions_str().first().copied().unwrap_or("bin"),
        None => "bin",
    }
}

/// Decode a served page and descramble it when it has a key.
///
/// Pages without a key are returned byte-for-byte; descrambled pages are
/// always re-encoded as PNG.
pub fn descramble_page(raw: Vec<u8>, key: Option<KeyArray>) -> Result<PageImage> {
    let format = image::guess_format(&raw).ok();
    let raw_ext = extension_for(format);

    let image = image::load_from_memory(&raw)?;
    let (width, height) = image.dimensions();

    let Some(key) = key else {
        debug!("Page {}x{} is not scrambled", width, height);
        return Ok(PageImage {
            bytes: raw.clone(),
            raw,
            raw_ext,
            ext: raw_ext,
        });
    };

    let canvas = descramble(&image, key)?;
    let bytes = encode_png(&DynamicImage::ImageRgb8(canvas))?;

    Ok(PageImage {
        raw,
        raw_ext,
        bytes,
        ext: "png",
    })
}

/// Lossless PNG encoding.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| DescrambleError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Build a key array that decodes to the given geometry.
    fn make_key(width: i64, height: i64, xor: i64, shuffle_seed: i64) -> KeyArray {
        let wanted = [width ^ xor, height ^ xor, xor];
        let order = permute(&[0usize, 1, 2], shuffle_seed);
        let mut control: Vec<i64> = order.iter().map(|&slot| wanted[slot]).collect();
        control.push(shuffle_seed);
        KeyArray::try_from(control).unwrap()
    }

    /// Forward scramble: place each true tile at its source slot.
    fn scramble(original: &RgbImage, xor: i64) -> RgbImage {
        let grid = TileGrid::new(original.width(), original.height());
        let slots: Vec<u32> = (0..grid.tile_count() as u32).collect();
        let order = permute(&slots, xor);

        let mut out = RgbImage::new(grid.width_pieces * TILE_SIZE, grid.height_pieces * TILE_SIZE);
        for (index, &value) in order.iter().enumerate() {
            let (sx, sy) = grid.source_origin(value);
            let (dx, dy) = grid.destination_origin(index as u32);
            for ty in 0..TILE_SIZE as i64 {
                for tx in 0..TILE_SIZE as i64 {
                    let (ox, oy) = (dx + tx, dy + ty);
                    if ox < 0 || oy < 0 || ox >= original.width() as i64 || oy >= original.height() as i64 {
                        continue;
                    }
                    let pixel = *original.get_pixel(ox as u32, oy as u32);
                    out.put_pixel((sx + tx) as u32, (sy + ty) as u32, pixel);
                }
            }
        }
        out
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, ((x * 7 + y * 13) % 256) as u8])
        })
    }

    #[test]
    fn test_key_geometry_round_trip() {
        let geometry = page_geometry(make_key(1100, 1600, 912_345, 77)).unwrap();
        assert_eq!(geometry.xor, 912_345);
        assert_eq!(geometry.grid.width, 1100);
        assert_eq!(geometry.grid.height, 1600);
        assert!(!geometry.grid.is_horizontal);
    }

    #[test]
    fn test_descramble_256_square_reproduces_original() {
        let original = gradient(256, 256);
        let scrambled = scramble(&original, 31337);
        assert_ne!(scrambled, original);

        let key = make_key(256, 256, 31337, 5);
        let restored = descramble(&DynamicImage::ImageRgb8(scrambled), key).unwrap();
        assert_eq!(restored.as_raw(), original.as_raw());
    }

    #[test]
    fn test_descramble_multi_tile_portrait() {
        let original = gradient(300, 500);
        let scrambled = scramble(&original, 4096);
        let restored = descramble(&DynamicImage::ImageRgb8(scrambled), make_key(300, 500, 4096, 12)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_boundary_offset_130_by_100() {
        let grid = TileGrid::new(130, 100);
        assert!(grid.is_horizontal);
        assert_eq!(grid.offset, 28);
        assert_eq!(grid.width_pieces, 2);
        assert_eq!(grid.height_pieces, 1);
        // Only the last row is shifted, and only vertically.
        assert_eq!(grid.destination_origin(0), (0, -28));
        assert_eq!(grid.destination_origin(1), (128, -28));

        let original = gradient(130, 100);
        let scrambled = scramble(&original, 99);
        let restored = descramble(&DynamicImage::ImageRgb8(scrambled), make_key(130, 100, 99, 3)).unwrap();
        assert_eq!(restored.dimensions(), (130, 100));
        assert_eq!(restored, original);
    }

    #[test]
    fn test_vertical_offset_shifts_last_column() {
        let grid = TileGrid::new(200, 300);
        assert!(!grid.is_horizontal);
        assert_eq!(grid.offset, 56);
        assert_eq!(grid.destination_origin(1), (72, 0));
        assert_eq!(grid.destination_origin(2), (0, 128));
        assert_eq!(grid.destination_origin(5), (72, 256));
    }

    #[test]
    fn test_invalid_dimensions() {
        let key = make_key(0, 100, 55, 1);
        assert!(matches!(
            page_geometry(key),
            Err(DescrambleError::InvalidDimensions { width: 0, height: 100 })
        ));
        let key = make_key(-5, 100, 55, 1);
        assert!(matches!(page_geometry(key), Err(DescrambleError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let max = u32::MAX as i64;
        let key = make_key(max, max, 5, 1);
        assert!(matches!(
            page_geometry(key),
            Err(DescrambleError::InvalidDimensions { width, height }) if width == max && height == max
        ));

        // Each edge fits but the area does not.
        let key = make_key(20_000, 20_000, 7, 2);
        assert!(matches!(page_geometry(key), Err(DescrambleError::InvalidDimensions { .. })));

        let key = make_key(MAX_EDGE as i64 + 1, 100, 9, 3);
        assert!(matches!(page_geometry(key), Err(DescrambleError::InvalidDimensions { .. })));

        let geometry = page_geometry(make_key(MAX_EDGE as i64, 1024, 11, 4)).unwrap();
        assert_eq!(geometry.grid.width_pieces, 256);
    }

    #[test]
    fn test_grid_arithmetic_at_u32_bounds() {
        let grid = TileGrid::new(u32::MAX, u32::MAX - 1);
        assert!(grid.is_horizontal);
        assert_eq!(grid.offset, 2);
        assert_eq!(grid.tile_count(), (1u64 << 25) * (1u64 << 25));
    }

    #[test]
    fn test_page_without_key_is_unchanged() {
        let bytes = encode_png(&DynamicImage::ImageRgb8(gradient(40, 30))).unwrap();
        let page = descramble_page(bytes.clone(), None).unwrap();
        assert_eq!(page.bytes, bytes);
        assert_eq!(page.ext, "png");
        assert!(!page.was_descrambled());
    }

    #[test]
    fn test_page_with_key_is_png() {
        let original = gradient(256, 256);
        let scrambled = scramble(&original, 8);
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(scrambled)
            .write_to(&mut encoded, ImageFormat::Bmp)
            .unwrap();

        let page = descramble_page(encoded.into_inner(), Some(make_key(256, 256, 8, 2))).unwrap();
        assert_eq!(page.raw_ext, "bmp");
        assert_eq!(page.ext, "png");
        let decoded = image::load_from_memory(&page.bytes).unwrap().to_rgb8();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_undecodable_bytes() {
        let result = descramble_page(b"definitely not an image".to_vec(), None);
        assert!(matches!(result, Err(DescrambleError::Decode(_))));
    }
}
