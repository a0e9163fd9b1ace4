//! Per-task configuration and the search-budget calibrator
//!
//! Configuration is an explicit value handed to each task; there is no
//! process-wide state. The calibrator turns user-facing brute-force
//! budgets into concrete frame widths so the expected operation count is
//! comparable across checksum methods and block sizes.

use crate::checksum::ChecksumMethod;
use crate::error::{Result, TaskError};
use crate::scoring::{DistanceKind, DistancePolicy};

/// Brute-force budgets: hard caps on checksum computations per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub repair: u64,
    pub restore: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            repair: 100_000,
            restore: 100_000,
        }
    }
}

/// Configuration for one task invocation.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    pub method: ChecksumMethod,
    /// Redundancy `R`: block bytes per digest byte. Must be a power of two.
    pub redundancy: u32,
    pub budgets: Budgets,
    /// Checksum penalty `P` in the distance function.
    pub penalty: u64,
    pub distance: DistanceKind,
}

impl TaskConfig {
    pub fn new(method: ChecksumMethod, redundancy: u32) -> Self {
        Self {
            method,
            redundancy,
            budgets: Budgets::default(),
            penalty: 1,
            distance: DistanceKind::Linear,
        }
    }

    /// Block size in bytes: `digest bytes × redundancy`.
    pub fn block_bytes(&self) -> u32 {
        self.method.digest_bytes() * self.redundancy
    }

    /// Reject redundancies that break the power-of-two block invariant.
    pub fn validate(&self) -> Result<()> {
        if !self.redundancy.is_power_of_two() {
            return Err(TaskError::BadRedundancy(self.redundancy));
        }
        Ok(())
    }

    pub fn policy(&self) -> DistancePolicy {
        DistancePolicy {
            kind: self.distance,
            penalty: self.penalty,
            redundancy: u64::from(self.redundancy),
        }
    }

    pub fn calibrate(&self) -> SearchParams {
        SearchParams::calibrate(self.method, self.block_bytes(), self.budgets)
    }
}

/// Search knobs for tasks that take their method and block size from a
/// sidecar header instead of the command line.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub budgets: Budgets,
    pub penalty: u64,
    pub distance: DistanceKind,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            budgets: Budgets::default(),
            penalty: 1,
            distance: DistanceKind::Linear,
        }
    }
}

impl SearchOptions {
    /// Combine with a resolved sidecar header into a full task
    /// configuration.
    pub fn for_header(&self, header: &crate::sidecar::SidecarHeader) -> TaskConfig {
        TaskConfig {
            method: header.method,
            redundancy: header.redundancy(),
            budgets: self.budgets,
            penalty: self.penalty,
            distance: self.distance,
        }
    }
}

/// Derived search-width parameters for the repair and restore engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Checksum-distance tolerance `L_c = K/16` bits.
    pub tolerance: u64,
    /// Maximum dither frame width for repair.
    pub repair_width: u32,
    /// Maximum divergent-bit count restore will enumerate.
    pub restore_width: u32,
    pub budgets: Budgets,
}

impl SearchParams {
    /// Pick frame widths so the worst-case operation count meets the
    /// budgets regardless of block size or checksum width.
    ///
    /// `cost_factor = (B·8)/4096` normalizes to MD5 at redundancy 32.
    /// Repair: smallest `w ≥ 1` with `2^(w−1) · B·8 · cost_factor` at or
    /// above the repair budget. Restore: smallest `w ≥ 1` with
    /// `2^w · cost_factor` at or above the restore budget.
    pub fn calibrate(method: ChecksumMethod, block_bytes: u32, budgets: Budgets) -> SearchParams {
        let block_bits = f64::from(block_bytes) * 8.0;
        let cost_factor = block_bits / 4096.0;

        let repair_width = (1u32..=64)
            .find(|w| exp2(w - 1) * block_bits * cost_factor >= budgets.repair as f64)
            .unwrap_or(64);
        let restore_width = (1u32..=64)
            .find(|w| exp2(*w) * cost_factor >= budgets.restore as f64)
            .unwrap_or(64);

        SearchParams {
            tolerance: u64::from(method.digest_bits() >> 4),
            repair_width,
            restore_width,
            budgets,
        }
    }
}

#[inline]
fn exp2(w: u32) -> f64 {
    f64::from(2u32).powi(w as i32)
}
