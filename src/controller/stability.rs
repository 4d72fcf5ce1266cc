//! Health stability tracking
//!
//! Any health delta beyond epsilon counts as active engagement and restarts
//! the clock. Only a plateau that outlasts the threshold is reported as
//! stable, which the controller reads as "target out of range".

use std::time::{Duration, Instant};

/// Default plateau duration before a target counts as far
pub const DEFAULT_STABLE_THRESHOLD: Duration = Duration::from_secs(2);

/// Default noise tolerance on health readings (percent points)
pub const DEFAULT_CHANGE_EPSILON: f64 = 0.01;

/// Last significant health reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Health percent at the last significant change
    pub value: f64,
    /// When that change was observed
    pub changed_at: Instant,
}

/// Tracks whether a live target's health has stopped changing
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    baseline: Option<Baseline>,
    stable_threshold: Duration,
    epsilon: f64,
}

impl StabilityTracker {
    /// Create a tracker with the given threshold and epsilon
    pub fn new(stable_threshold: Duration, epsilon: f64) -> Self {
        Self {
            baseline: None,
            stable_threshold,
            epsilon,
        }
    }

    /// Feed one health reading and report whether health is stable
    pub fn observe(&mut self, health_percent: f64, now: Instant) -> bool {
        let Some(baseline) = self.baseline else {
            self.rebase(health_percent, now);
            return false;
        };

        if (health_percent - baseline.value).abs() > self.epsilon {
            log::debug!(
                "HP changed {:.2} -> {:.2}, resetting baseline",
                baseline.value,
                health_percent
            );
            self.rebase(health_percent, now);
            return false;
        }

        let stable_for = now.saturating_duration_since(baseline.changed_at);
        log::debug!(
            "HP stable for {:.2}s (threshold {:.2}s)",
            stable_for.as_secs_f64(),
            self.stable_threshold.as_secs_f64()
        );
        stable_for >= self.stable_threshold
    }

    /// Start tracking from a fresh reading
    pub fn rebase(&mut self, health_percent: f64, now: Instant) {
        self.baseline = Some(Baseline {
            value: health_percent,
            changed_at: now,
        });
    }

    /// Drop the baseline; the next reading starts a new window
    pub fn clear(&mut self) {
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    pub fn is_tracking(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn stable_threshold(&self) -> Duration {
        self.stable_threshold
    }

    pub fn set_stable_threshold(&mut self, threshold: Duration) {
        self.stable_threshold = threshold;
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_THRESHOLD, DEFAULT_CHANGE_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_first_reading_sets_baseline() {
        let base = Instant::now();
        let mut tracker = StabilityTracker::default();

        assert!(!tracker.observe(80.0, base));
        let baseline = tracker.baseline().unwrap();
        assert_eq!(baseline.value, 80.0);
        assert_eq!(baseline.changed_at, base);
    }

    #[test]
    fn test_plateau_becomes_stable() {
        let base = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_secs(2), 0.01);

        assert!(!tracker.observe(50.0, base));
        assert!(!tracker.observe(50.0, at(base, 1.0)));
        assert!(!tracker.observe(50.005, at(base, 1.9)));
        assert!(tracker.observe(50.0, at(base, 2.0)));
        assert!(tracker.observe(50.0, at(base, 5.0)));
    }

    #[test]
    fn test_change_resets_clock() {
        let base = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_secs(2), 0.01);

        tracker.observe(50.0, base);
        assert!(!tracker.observe(45.0, at(base, 1.5)));
        assert_eq!(tracker.baseline().unwrap().changed_at, at(base, 1.5));

        // Only 1.0s since the last change
        assert!(!tracker.observe(45.0, at(base, 2.5)));
        assert!(tracker.observe(45.0, at(base, 3.5)));
    }

    #[test]
    fn test_clear_restarts_tracking() {
        let base = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_secs(1), 0.01);

        tracker.observe(30.0, base);
        tracker.clear();
        assert!(!tracker.is_tracking());

        // Would be stable against the old baseline, but tracking restarted
        assert!(!tracker.observe(30.0, at(base, 3.0)));
        assert_eq!(tracker.baseline().unwrap().changed_at, at(base, 3.0));
    }

    #[test]
    fn test_out_of_order_timestamp_is_not_stable() {
        let base = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_secs(1), 0.01);

        tracker.observe(30.0, at(base, 5.0));
        assert!(!tracker.observe(30.0, base));
    }
}
