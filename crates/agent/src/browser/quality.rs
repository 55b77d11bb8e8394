//! Adaptive Quality Controller (C3): sliding-window latency average drives
//! a JPEG quality stepper for the screencast stream.

use std::collections::VecDeque;

const WINDOW: usize = 5;
const MIN_QUALITY: u8 = 20;
const MAX_QUALITY: u8 = 80;
const INITIAL_QUALITY: u8 = 70;
const DEGRADE_THRESHOLD_MS: f64 = 200.0;
const UPGRADE_THRESHOLD_MS: f64 = 80.0;
const DEGRADE_STEP: u8 = 10;
const UPGRADE_STEP: u8 = 5;

pub struct AdaptiveQuality {
    quality: u8,
    latencies: VecDeque<f64>,
    changed: bool,
}

impl Default for AdaptiveQuality {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveQuality {
    pub fn new() -> Self {
        Self { quality: INITIAL_QUALITY, latencies: VecDeque::with_capacity(WINDOW), changed: false }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Push a latency sample (ms). Once the window is full, recompute the
    /// mean and apply the step rules, then clear the window for the next
    /// round.
    pub fn sample(&mut self, latency_ms: f64) {
        self.latencies.push_back(latency_ms);
        if self.latencies.len() < WINDOW {
            return;
        }

        let average: f64 = self.latencies.iter().sum::<f64>() / self.latencies.len() as f64;
        self.latencies.clear();

        let before = self.quality;
        if average > DEGRADE_THRESHOLD_MS {
            self.quality = self.quality.saturating_sub(DEGRADE_STEP).max(MIN_QUALITY);
        } else if average < UPGRADE_THRESHOLD_MS {
            self.quality = self.quality.saturating_add(UPGRADE_STEP).min(MAX_QUALITY);
        }

        if self.quality != before {
            self.changed = true;
        }
    }

    /// Take-once flag: reading it clears it.
    pub fn should_restart(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
#[path = "quality_tests.rs"]
mod tests;
