//! Navigation overlay progress model

use std::time::Duration;

use serde::Serialize;

/// What the overlay currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayView {
    pub label: String,
    /// 0..=100
    pub progress: u8,
}

impl OverlayView {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            progress: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }
}

/// Fixed-duration progress animation, advanced in discrete ticks
#[derive(Debug, Clone, Copy)]
pub struct OverlayTimeline {
    duration: Duration,
    tick: Duration,
}

impl OverlayTimeline {
    pub fn new(duration: Duration, tick: Duration) -> Self {
        Self {
            duration,
            tick: if tick.is_zero() {
                Duration::from_millis(1)
            } else {
                tick
            },
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Number of ticks needed to reach 100%; at least one
    pub fn steps(&self) -> u32 {
        let ticks = self.duration.as_millis().div_ceil(self.tick.as_millis().max(1));
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }

    pub fn progress_at(&self, step: u32) -> u8 {
        let steps = self.steps();
        let pct = (u64::from(step.min(steps)) * 100) / u64::from(steps);
        pct as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reaches_100() {
        let timeline = OverlayTimeline::new(Duration::from_millis(1000), Duration::from_millis(100));
        assert_eq!(timeline.steps(), 10);
        assert_eq!(timeline.progress_at(0), 0);
        assert_eq!(timeline.progress_at(5), 50);
        assert_eq!(timeline.progress_at(10), 100);
        assert_eq!(timeline.progress_at(42), 100);
    }

    #[test]
    fn test_zero_duration_has_one_step() {
        let timeline = OverlayTimeline::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(timeline.steps(), 1);
        assert_eq!(timeline.progress_at(1), 100);
    }
}
