//! Accumulator hash used to seed the generator state.
//!
//! Every operation here runs on `f64`, including the unsigned 32-bit wrap.

/// Initial accumulator value.
const MASH_SEED: f64 = 4_022_871_197.0; // 0xEFC8249D
const MULTIPLIER: f64 = 0.02519603282416938;
pub(crate) const TWO_POW_32: f64 = 4_294_967_296.0;
/// 2^-32
pub(crate) const NORM_32: f64 = 2.3283064365386963e-10;

/// Truncate and wrap to an unsigned 32-bit value, staying in `f64`.
#[inline]
pub(crate) fn to_uint32(x: f64) -> f64 {
    let t = x.trunc();
    t - (t / TWO_POW_32).floor() * TWO_POW_32
}

#[derive(Debug, Clone)]
pub struct Mash {
    n: f64,
}

impl Default for Mash {
    fn default() -> Self {
        Self::new()
    }
}

impl Mash {
    pub fn new() -> Self {
        Self { n: MASH_SEED }
    }

    pub fn reset(&mut self) {
        self.n = MASH_SEED;
    }

    /// Fold `data` into the accumulator and return a value in `[0, 1)`.
    ///
    /// Empty input counts as "no input": the accumulator is reset and `None`
    /// is returned.
    pub fn masher(&mut self, data: &str) -> Option<f64> {
        if data.is_empty() {
            self.reset();
            return None;
        }

        let mut n = self.n;
        for c in data.chars() {
            n += c as u32 as f64;
            let mut h = MULTIPLIER * n;
            n = to_uint32(h);
            h -= n;
            h *= n;
            n = to_uint32(h);
            h -= n;
            n += h * TWO_POW_32;
        }
        self.n = n;

        Some(to_uint32(n) * NORM_32)
    }

    /// Numbers are hashed through their decimal string form.
    pub fn masher_number(&mut self, value: u32) -> f64 {
        // A decimal rendering is never empty.
        self.masher(&value.to_string()).unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn accumulator(&self) -> f64 {
        self.n
    }
}
