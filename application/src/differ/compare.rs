//! Pixel-level three-way comparison: target vs. current canvas vs. the
//! previous snapshot.

use domain::history::DiffStatus;
use domain::palette::{PaletteImage, TRANSPARENT};

/// Counters from one comparison. Target pixels of index 0 carry no
/// requirement and are skipped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffCounts {
    /// Non-transparent pixels in the target.
    pub total_target: u64,
    /// Target pixels the current canvas satisfies.
    pub matched: u64,
    /// Pixels matching now that did not match before.
    pub delta_progress: i64,
    /// Pixels matching before that no longer do.
    pub delta_regress: i64,
}

impl DiffCounts {
    #[must_use]
    pub fn completion_percent(&self) -> f64 {
        if self.total_target == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total_target as f64
    }

    #[must_use]
    pub fn pixels_remaining(&self) -> i64 {
        (self.total_target - self.matched) as i64
    }

    #[must_use]
    pub fn status(&self) -> DiffStatus {
        DiffStatus::from_counts(self.matched, self.total_target)
    }

    /// Nothing moved since the last snapshot; the diff is discarded.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.delta_progress == 0 && self.delta_regress == 0
    }
}

/// Compare three equally-sized rasters. The caller guarantees matching
/// dimensions; stray pixels beyond the shortest buffer are ignored.
#[must_use]
pub fn compare(
    target: &PaletteImage,
    current: &PaletteImage,
    previous: &PaletteImage,
) -> DiffCounts {
    let mut counts = DiffCounts {
        total_target: 0,
        matched: 0,
        delta_progress: 0,
        delta_regress: 0,
    };

    for ((&want, &now), &before) in target
        .pixels()
        .iter()
        .zip(current.pixels())
        .zip(previous.pixels())
    {
        if want == TRANSPARENT {
            continue;
        }
        counts.total_target += 1;
        let matches_now = now == want;
        let matched_before = before == want;
        if matches_now {
            counts.matched += 1;
        }
        if matches_now && !matched_before {
            counts.delta_progress += 1;
        }
        if matched_before && !matches_now {
            counts.delta_regress += 1;
        }
    }

    counts
}
