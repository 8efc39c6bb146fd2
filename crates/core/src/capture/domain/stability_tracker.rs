use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DWELL_THRESHOLD_MS, DEFAULT_MOVEMENT_TOLERANCE_PERCENT};
use crate::shared::normalized_rect::NormalizedRect;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// An edge moving by this many percentage points or more counts as movement.
    pub movement_tolerance_percent: i32,
    /// Minimum length of a still run before frames are accepted.
    pub dwell_threshold_ms: i64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            movement_tolerance_percent: DEFAULT_MOVEMENT_TOLERANCE_PERCENT,
            dwell_threshold_ms: DEFAULT_DWELL_THRESHOLD_MS,
        }
    }
}

/// Last evaluated rect and the start of the current still run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StabilityState {
    pub rect: NormalizedRect,
    pub last_movement_ms: i64,
}

/// Dwell-time hysteresis over a face's position.
///
/// Every call stores the incoming rect. A call whose rect moved by at least
/// the tolerance on any edge restarts the dwell clock and is rejected; a still
/// call is accepted once the clock has run for the dwell threshold. Accepting
/// does not restart the clock, so every still frame past the threshold is
/// accepted.
#[derive(Debug, Default)]
pub struct StabilityTracker {
    config: StabilityConfig,
    state: StabilityState,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
        }
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    pub fn assess(&mut self, rect: NormalizedRect, timestamp_ms: i64) -> bool {
        let delta = rect.max_edge_delta(&self.state.rect);
        let is_still = delta < self.config.movement_tolerance_percent;
        let dwell_ms = timestamp_ms - self.state.last_movement_ms;

        log::debug!(
            "in: {rect:?}, max edge delta {delta} -> still: {is_still}, dwell: {dwell_ms}ms"
        );

        self.state.rect = rect;
        if is_still {
            dwell_ms >= self.config.dwell_threshold_ms
        } else {
            self.state.last_movement_ms = timestamp_ms;
            false
        }
    }

    /// Forgets the tracked face; the next face must dwell from scratch.
    pub fn reset(&mut self) {
        self.state = StabilityState::default();
    }
}
