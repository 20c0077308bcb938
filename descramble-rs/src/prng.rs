//! Seeded permutations.
//!
//! The reader scrambles pages in the browser with a seeded generator, so the permutation
//! for a given seed has to come out identical here. Each call builds its own
//! [`Uheprng`]; nothing is cached or shared between calls.

pub mod mash;
pub mod uheprng;

pub use mash::Mash;
pub use uheprng::Uheprng;

use std::fmt;

/// Value hashed into the generator state. Numbers are hashed through their
/// decimal rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    Number(i64),
    Text(String),
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{}", n),
            Seed::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Seed {
    fn from(value: i64) -> Self {
        Seed::Number(value)
    }
}

impl From<i32> for Seed {
    fn from(value: i32) -> Self {
        Seed::Number(value as i64)
    }
}

impl From<u32> for Seed {
    fn from(value: u32) -> Self {
        Seed::Number(value as i64)
    }
}

impl From<&str> for Seed {
    fn from(value: &str) -> Self {
        Seed::Text(value.to_string())
    }
}

impl From<String> for Seed {
    fn from(value: String) -> Self {
        Seed::Text(value)
    }
}

/// Fisher-Yates shuffle driven by a freshly seeded generator.
///
/// Indices run strictly from `len` down to 1; the draw for position `i - 1`
/// is taken from `[0, i)`.
pub fn permute<T: Clone>(items: &[T], seed: impl Into<Seed>) -> Vec<T> {
    let mut prng = Uheprng::new(seed);
    let mut out = items.to_vec();

    let mut i = out.len();
    while i > 0 {
        let target = prng.next_in_range(i as u64) as usize;
        i -= 1;
        out.swap(i, target);
    }
    out
}

/// Inverse placement of [`permute`]: item `i` lands at `permute(0..len)[i]`.
pub fn scatter<T: Clone>(items: &[T], seed: impl Into<Seed>) -> Vec<T> {
    let indices: Vec<usize> = (0..items.len()).collect();
    let order = permute(&indices, seed);

    let mut out = items.to_vec();
    for (i, &target) in order.iter().enumerate() {
        out[target] = items[i].clone();
    }
    out
}
