//! Advisory memory ceilings
//!
//! `MemoryBounds::check_bounds` is a pure evaluator. It never rejects anything
//! itself; callers decide what to do with a `BoundsCheck` that is over limit.

use serde::{Deserialize, Serialize};

/// Default warning threshold as a fraction of the ceiling
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Memory bounds configuration for a session (or for the whole process)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryBounds {
    /// Maximum tracked memory in MB
    pub max_memory_mb: u64,
    /// Maximum state size in KB
    pub max_state_size_kb: u64,
    /// Fraction of a ceiling above which a warning is reported
    pub warning_threshold: f64,
    /// Whether a policy layer should refuse writes once over the ceiling.
    /// Carried as data only; nothing in the core consults it.
    pub enforce_hard_limit: bool,
}

impl Default for MemoryBounds {
    fn default() -> Self {
        Self {
            max_memory_mb: 100,
            max_state_size_kb: 1024,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            enforce_hard_limit: true,
        }
    }
}

/// Result of evaluating usage figures against a `MemoryBounds`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsCheck {
    pub within_bounds: bool,
    pub memory_ok: bool,
    pub state_ok: bool,
    pub memory_warning: bool,
    pub state_warning: bool,
    pub memory_usage_percent: f64,
    pub state_usage_percent: f64,
}

impl MemoryBounds {
    /// Create bounds with the default warning threshold
    pub fn new(max_memory_mb: u64, max_state_size_kb: u64) -> Self {
        Self {
            max_memory_mb,
            max_state_size_kb,
            ..Default::default()
        }
    }

    /// Bounds used by the process-wide aggregator (1 GB / 100 MB of state)
    pub fn global() -> Self {
        Self::new(1024, 100 * 1024)
    }

    /// Set the warning threshold
    pub fn with_warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Evaluate current usage against the configured ceilings
    pub fn check_bounds(&self, current_memory_mb: f64, current_state_kb: f64) -> BoundsCheck {
        let max_memory = self.max_memory_mb as f64;
        let max_state = self.max_state_size_kb as f64;

        let memory_ok = current_memory_mb <= max_memory;
        let state_ok = current_state_kb <= max_state;

        BoundsCheck {
            within_bounds: memory_ok && state_ok,
            memory_ok,
            state_ok,
            memory_warning: current_memory_mb > max_memory * self.warning_threshold,
            state_warning: current_state_kb > max_state * self.warning_threshold,
            memory_usage_percent: usage_percent(current_memory_mb, max_memory),
            state_usage_percent: usage_percent(current_state_kb, max_state),
        }
    }
}

fn usage_percent(current: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 {
        current / ceiling * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_bounds() {
        let bounds = MemoryBounds::new(100, 1024);
        let check = bounds.check_bounds(50.0, 512.0);
        assert!(check.within_bounds);
        assert!(!check.memory_warning);
        assert!(!check.state_warning);
        assert!((check.memory_usage_percent - 50.0).abs() < f64::EPSILON);
        assert!((check.state_usage_percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_warning_threshold_crossed() {
        let bounds = MemoryBounds::new(100, 1000);
        let check = bounds.check_bounds(85.0, 900.0);
        assert!(check.within_bounds);
        assert!(check.memory_warning);
        assert!(check.state_warning);
    }

    #[test]
    fn test_over_ceiling_is_reported_for_any_ceiling() {
        for ceiling in [1_u64, 7, 100, 4096] {
            let bounds = MemoryBounds::new(ceiling, ceiling);
            let over = ceiling as f64 + 0.5;
            let check = bounds.check_bounds(over, 0.0);
            assert!(!check.memory_ok, "ceiling {ceiling}");
            assert!(!check.within_bounds);
            assert!(check.memory_usage_percent > 100.0);
            assert!(check.state_ok);
        }
    }

    #[test]
    fn test_zero_ceiling_reports_zero_percent() {
        let bounds = MemoryBounds::new(0, 0);
        let check = bounds.check_bounds(0.0, 0.0);
        assert!(check.within_bounds);
        assert_eq!(check.memory_usage_percent, 0.0);
    }

    #[test]
    fn test_custom_threshold() {
        let bounds = MemoryBounds::new(100, 100).with_warning_threshold(0.5);
        assert!(bounds.check_bounds(60.0, 10.0).memory_warning);
        assert!(!bounds.check_bounds(40.0, 10.0).memory_warning);
    }
}
