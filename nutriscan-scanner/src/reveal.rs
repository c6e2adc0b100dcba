//! Timed score reveal: counting, flashing, done
//!
//! The sequencer is a plain state machine advanced one tick at a time; the
//! digit shown at any tick is a pure function of the seed and tick number.
//! [`RevealSequencer::run`] drives it off the tokio clock.

use crate::config::ScannerConfig;
use nutriscan_core::analysis::score_digit;
use nutriscan_core::{AnalysisResult, HealthCategory};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Counting,
    Flashing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealTiming {
    pub tick: Duration,
    pub counting_ticks: u32,
    pub flash: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(60),
            counting_ticks: 26,
            flash: Duration::from_millis(1500),
        }
    }
}

impl From<&ScannerConfig> for RevealTiming {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            tick: config.reveal_tick(),
            counting_ticks: config.reveal_counting_ticks.max(1),
            flash: config.reveal_flash(),
        }
    }
}

/// What the reveal shows at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealFrame {
    pub tick: u32,
    pub phase: RevealPhase,
    pub digit: u8,
}

/// Final state handed back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealOutcome {
    pub category: HealthCategory,
    pub digit: u8,
    /// Only the healthiest tier earns the celebration effect
    pub celebrate: bool,
}

/// Digit displayed at `tick` (1-based). Ticks before the last counting tick
/// show noise; from the last counting tick on, the true digit.
pub fn digit_at(seed: u64, tick: u32, counting_ticks: u32, final_digit: u8) -> u8 {
    if tick == 0 {
        return 0;
    }
    if tick >= counting_ticks {
        return final_digit;
    }
    let mut rng = StdRng::seed_from_u64(seed ^ (tick as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    rng.gen_range(0..10)
}

/// Phase after `tick` counting ticks, before the flash dwell has elapsed
pub fn phase_at(tick: u32, counting_ticks: u32) -> RevealPhase {
    if tick >= counting_ticks {
        RevealPhase::Flashing
    } else {
        RevealPhase::Counting
    }
}

pub struct RevealSequencer {
    category: HealthCategory,
    final_digit: u8,
    seed: u64,
    timing: RevealTiming,
    tick: u32,
    phase: RevealPhase,
}

impl RevealSequencer {
    pub fn new(result: &AnalysisResult, timing: RevealTiming) -> Self {
        Self::with_seed(result.health_score, result.score_value, timing, rand::random())
    }

    pub fn with_seed(category: HealthCategory, explicit_score: Option<f64>, timing: RevealTiming, seed: u64) -> Self {
        Self {
            category,
            final_digit: score_digit(category, explicit_score),
            seed,
            timing,
            tick: 0,
            phase: RevealPhase::Counting,
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn final_digit(&self) -> u8 {
        self.final_digit
    }

    pub fn category(&self) -> HealthCategory {
        self.category
    }

    pub fn displayed(&self) -> u8 {
        digit_at(self.seed, self.tick, self.timing.counting_ticks, self.final_digit)
    }

    pub fn frame(&self) -> RevealFrame {
        RevealFrame {
            tick: self.tick,
            phase: self.phase,
            digit: self.displayed(),
        }
    }

    /// One counting tick. No effect outside the counting phase.
    pub fn advance(&mut self) -> RevealFrame {
        if self.phase == RevealPhase::Counting {
            self.tick += 1;
            self.phase = phase_at(self.tick, self.timing.counting_ticks);
        }
        self.frame()
    }

    /// End the flash dwell
    pub fn finish(&mut self) -> RevealOutcome {
        if self.phase == RevealPhase::Flashing {
            self.phase = RevealPhase::Done;
        }
        self.outcome()
    }

    pub fn outcome(&self) -> RevealOutcome {
        RevealOutcome {
            category: self.category,
            digit: self.final_digit,
            celebrate: self.phase == RevealPhase::Done && self.category.is_healthiest(),
        }
    }

    /// Play the whole sequence in real time, reporting every frame
    pub async fn run<F>(mut self, mut on_frame: F) -> RevealOutcome
    where
        F: FnMut(RevealFrame) + Send,
    {
        on_frame(self.frame());
        let mut interval = tokio::time::interval(self.timing.tick);
        interval.tick().await;
        while self.phase == RevealPhase::Counting {
            interval.tick().await;
            on_frame(self.advance());
        }

        tokio::time::sleep(self.timing.flash).await;
        let outcome = self.finish();
        on_frame(self.frame());
        debug!("Reveal done: {} {}", outcome.category, outcome.digit);
        outcome
    }
}
