//! Battery manager: monotonic depletion plus recovery, driving the drone's
//! operating mode.
//!
//! The mode gates connection admission and summary forwarding. It only moves
//! downward (NORMAL -> LOW -> RETURNING) as the level falls; a recovery event
//! jumps straight back to NORMAL at full charge.

use tracing::{info, warn};

/// Operating mode derived from the battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Level above the low threshold; everything runs normally
    Normal,

    /// Level at or below the low threshold; still admitting and forwarding
    Low,

    /// Level at or below the critical threshold; new links refused, forwarding
    /// subject to the returning policy
    Returning,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Normal => write!(f, "NORMAL"),
            Mode::Low => write!(f, "LOW"),
            Mode::Returning => write!(f, "RETURNING"),
        }
    }
}

/// The process-wide battery state. Mutated only by the coordinator's battery
/// tick or an explicit recovery event.
#[derive(Debug)]
pub struct BatteryManager {
    level_percent: f64,
    mode: Mode,
    depletion_rate: f64,
    low_threshold: f64,
    critical_threshold: f64,
}

impl BatteryManager {
    /// Create a battery manager at full charge in NORMAL mode.
    pub fn new(depletion_rate: f64, low_threshold: f64, critical_threshold: f64) -> Self {
        Self {
            level_percent: 100.0,
            mode: Mode::Normal,
            depletion_rate,
            low_threshold,
            critical_threshold,
        }
    }

    pub fn level(&self) -> f64 {
        self.level_percent
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Apply one depletion tick.
    ///
    /// The level drops by the configured rate, clamped at 0. Returns the new
    /// mode if the tick crossed a threshold, `None` otherwise.
    pub fn tick(&mut self) -> Option<Mode> {
        self.level_percent = (self.level_percent - self.depletion_rate).max(0.0);

        let new_mode = self.mode_for_level();
        if new_mode != self.mode {
            warn!(
                level = self.level_percent,
                from = %self.mode,
                to = %new_mode,
                "Battery mode transition"
            );
            self.mode = new_mode;
            Some(new_mode)
        } else {
            None
        }
    }

    /// Recharge at base: level back to full, mode back to NORMAL.
    ///
    /// Returns the new mode if this changed it.
    pub fn recover(&mut self) -> Option<Mode> {
        self.level_percent = 100.0;
        if self.mode != Mode::Normal {
            info!(from = %self.mode, "Battery recovered, back to NORMAL");
            self.mode = Mode::Normal;
            Some(Mode::Normal)
        } else {
            None
        }
    }

    fn mode_for_level(&self) -> Mode {
        if self.level_percent > self.low_threshold {
            Mode::Normal
        } else if self.level_percent > self.critical_threshold {
            Mode::Low
        } else {
            Mode::Returning
        }
    }
}
