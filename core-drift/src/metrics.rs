//! Drift observability counters.

/// A point-in-time copy of the accumulated counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    /// Sum of all measured drift magnitudes, in seconds.
    pub drift_sum: f64,
    /// Number of drift samples taken.
    pub sample_count: u64,
    /// Largest single drift observed, in seconds.
    pub max_drift: f64,
    /// Number of corrective seeks issued.
    pub correction_count: u64,
}

impl MetricsSnapshot {
    /// Mean drift across all samples; `0.0` before the first sample.
    pub fn average_drift(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.drift_sum / self.sample_count as f64
    }
}

/// Accumulates drift samples and correction counts over the loop's
/// lifetime. Resettable on demand for diagnostics sessions.
#[derive(Debug, Default)]
pub struct DriftMetrics {
    current: MetricsSnapshot,
}

impl DriftMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&mut self, drift_seconds: f64) {
        self.current.drift_sum += drift_seconds;
        self.current.sample_count += 1;
        if drift_seconds > self.current.max_drift {
            self.current.max_drift = drift_seconds;
        }
    }

    pub fn record_correction(&mut self) {
        self.current.correction_count += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.current
    }

    pub fn average_drift(&self) -> f64 {
        self.current.average_drift()
    }

    pub fn reset(&mut self) {
        self.current = MetricsSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_samples_and_corrections() {
        let mut metrics = DriftMetrics::new();
        metrics.record_sample(0.2);
        metrics.record_sample(0.6);
        metrics.record_correction();

        let snap = metrics.snapshot();
        assert_eq!(snap.sample_count, 2);
        assert_eq!(snap.max_drift, 0.6);
        assert_eq!(snap.correction_count, 1);
        assert!((snap.average_drift() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn average_is_zero_before_first_sample() {
        assert_eq!(DriftMetrics::new().average_drift(), 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut metrics = DriftMetrics::new();
        metrics.record_sample(1.0);
        metrics.record_correction();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
