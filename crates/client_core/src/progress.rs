//! Maps per-phase transfer counters onto one 0..=100 progress scale.
//!
//! The upload owns the lower half of the bar and the response (which spans the
//! remote processing window) owns the upper half.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Upload,
    Processing,
}

impl TransferPhase {
    pub fn floor(self) -> u8 {
        match self {
            TransferPhase::Upload => 0,
            TransferPhase::Processing => 50,
        }
    }

    pub fn ceiling(self) -> u8 {
        match self {
            TransferPhase::Upload => 50,
            TransferPhase::Processing => 100,
        }
    }
}

/// Linear remap of `done / total` into the phase's range, rounded to nearest.
/// An unknown or zero total stays at the floor.
pub fn blend(phase: TransferPhase, done: u64, total: Option<u64>) -> u8 {
    let floor = phase.floor();
    let Some(total) = total.filter(|total| *total > 0) else {
        return floor;
    };
    let span = u128::from(phase.ceiling() - floor);
    let done = u128::from(done.min(total));
    let total = u128::from(total);
    let offset = (done * span * 2 + total) / (total * 2);
    floor + offset as u8
}
