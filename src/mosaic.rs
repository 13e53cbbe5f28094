//! Mosaic (color filter array) sampling.
//!
//! A mosaiced sensor stores exactly one color channel per pixel, repeating a
//! 2x2 pattern across the grid. This module is the single point of truth for
//! that layout; nothing else in the crate hardcodes a filter arrangement.

/// A 2x2 repeating color filter pattern.
///
/// `cells` holds the channel index (0, 1 or 2) for the four positions of the
/// repeating tile, addressed as `cells[(x & 1) + 2 * (y & 1)]`. The same
/// addressing dcraw uses for its `FC()` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfaPattern {
    cells: [usize; 4],
}

impl CfaPattern {
    /// Standard Bayer layout: red top-left, green on the diagonal, blue
    /// bottom-right.
    pub const RGGB: CfaPattern = CfaPattern {
        cells: [0, 1, 1, 2],
    };

    /// Build a pattern from an explicit 2x2 tile, row-major
    /// `[top-left, top-right, bottom-left, bottom-right]`.
    ///
    /// Returns `None` if any cell names a channel outside 0..3.
    pub fn new(cells: [usize; 4]) -> Option<Self> {
        if cells.iter().all(|&c| c < 3) {
            Some(Self { cells })
        } else {
            None
        }
    }

    /// The one channel physically present at `(x, y)`. Pure and total.
    #[inline]
    pub fn channel_at(&self, x: usize, y: usize) -> usize {
        self.cells[(x & 1) + 2 * (y & 1)]
    }

    /// How many of the four tile cells carry `channel`. For Bayer layouts the
    /// green channel appears twice; the similarity kernel weights it
    /// accordingly.
    pub fn channel_frequency(&self, channel: usize) -> usize {
        self.cells.iter().filter(|&&c| c == channel).count()
    }
}

impl Default for CfaPattern {
    fn default() -> Self {
        Self::RGGB
    }
}
