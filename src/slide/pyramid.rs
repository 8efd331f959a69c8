//! Pyramid levels synthesized from the base image.
//!
//! The vendor library renders any scale on demand, so the adapter invents the
//! level structure itself: up to [`MAX_LEVELS`] power-of-two levels derived
//! purely from the base dimensions. Nothing here calls into the vendor.

/// Upper bound on the number of synthesized levels.
pub const MAX_LEVELS: usize = 6;

/// Power-of-two level model over a base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pyramid {
    width: u32,
    height: u32,
    level_count: usize,
}

impl Pyramid {
    /// Derive the level model for a `width` x `height` base image.
    ///
    /// The level count is `min(6, floor(log2(max(width, height))))`, and 0 for
    /// an empty image.
    pub fn new(width: u32, height: u32) -> Self {
        let longest = width.max(height);
        let level_count = match longest.checked_ilog2() {
            Some(log) => (log as usize).min(MAX_LEVELS),
            None => 0,
        };

        Self {
            width,
            height,
            level_count,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of levels. Valid levels are `0..level_count()`.
    pub fn level_count(&self) -> usize {
        self.level_count
    }

    fn contains(&self, level: usize) -> bool {
        level < self.level_count
    }

    /// Downsample factor `2^level`, or `None` for an out-of-range level.
    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.contains(level).then(|| (1u64 << level) as f64)
    }

    /// Dimensions `(width >> level, height >> level)`, or `None` for an
    /// out-of-range level.
    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.contains(level)
            .then(|| (self.width >> level, self.height >> level))
    }

    /// Pick the level to read for a requested downsample factor.
    ///
    /// Targets below 1 map to level 0. Otherwise this is the first level `i`
    /// with `2^(i+1) > target`, falling back to the last level. Returns `None`
    /// only when a target of at least 1 meets a pyramid with no levels.
    pub fn best_level_for_downsample(&self, target: f64) -> Option<usize> {
        if target < 1.0 {
            return Some(0);
        }

        (0..self.level_count)
            .find(|&i| (1u64 << (i + 1)) as f64 > target)
            .or_else(|| self.level_count.checked_sub(1))
    }
}
