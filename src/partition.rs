//! Fixed-length range partitioning.
//!
//! Two flavours are provided:
//! - [`partition`] tiles a sequence into Coordinates. Full windows are emitted until
//!   the remainder is shorter than two windows; a remainder longer than one window is
//!   then split into two halves, so no tile ends up tiny.
//! - [`Stepper`] chunks one Coordinate for numerification. Every chunk is `by` long
//!   except the final remainder.
//!
//! Both are pure, lazy and restartable (`Clone` the iterator or call again).

/// Plain chunking of `[0, end)` into steps of `by`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stepper {
    at: u32,
    end: u32,
    by: u32,
}

impl Stepper {
    pub fn new(end: u32, by: u32) -> Self {
        assert!(by > 0, "Stepper requires a step size > 0");
        Self { at: 0, end, by }
    }

    /// Number of steps the stepper yields from the beginning.
    pub fn count_steps(end: u32, by: u32) -> usize {
        assert!(by > 0, "Stepper requires a step size > 0");
        ((end as u64 + by as u64 - 1) / by as u64) as usize
    }
}

impl Iterator for Stepper {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.end {
            return None;
        }
        let prev = self.at;
        let new = if (self.end - prev) > self.by {
            prev + self.by
        } else {
            self.end
        };
        self.at = new;
        Some((prev, new))
    }
}

/// Balanced tiling of `[0, length)` into windows of `window`.
///
/// ```
/// use gene_tiler::partition::partition;
///
/// let tiles: Vec<_> = partition(52, 10).collect();
/// assert_eq!(tiles.len(), 6);
/// assert_eq!(tiles[4], (40, 46));
/// assert_eq!(tiles[5], (46, 52));
/// ```
pub fn partition(length: u32, window: u32) -> Partition {
    assert!(window > 0, "partition requires a window > 0");
    Partition {
        at: 0,
        end: length,
        window,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    at: u32,
    end: u32,
    window: u32,
}

impl Iterator for Partition {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.end {
            return None;
        }
        let prev = self.at;
        let remaining = (self.end - prev) as u64;
        let window = self.window as u64;

        let step = if remaining <= window || remaining >= 2 * window {
            remaining.min(window)
        } else {
            // one window < remaining < two windows: halve it
            remaining / 2
        };

        self.at = prev + step as u32;
        Some((prev, self.at))
    }
}
