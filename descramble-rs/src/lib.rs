pub mod cipher;
pub mod descramble;
pub mod error;
pub mod models;
pub mod prng;
pub mod reader;
pub mod spread;

pub use cipher::{decrypt_key_table, derive_key, xor_decrypt, KeyTable};
pub use descramble::{descramble, descramble_page, encode_png, page_geometry, PageImage, TileGrid, TILE_SIZE};
pub use error::{DescrambleError, Result};
pub use models::*;
pub use prng::{permute, scatter, Mash, Seed, Uheprng};
pub use reader::{PageSource, ReaderApi, ReaderResponse};
pub use spread::{join, join_with, spread_pairs, Alignment};
