use std::time::{Duration, Instant};

/// Releases buffers at the rate real hardware would complete them.
pub(crate) struct Pacer {
    period: Duration,
    started: Option<Instant>,
    released: u64,
}

impl Pacer {
    /// `samples_per_buffer` complex samples at `sample_rate` samples/s.
    /// Rates that are not finite and positive, or periods too long for a
    /// `Duration`, leave the source unpaced.
    pub fn new(samples_per_buffer: usize, sample_rate: f64) -> Self {
        let secs = if sample_rate.is_finite() && sample_rate > 0.0 {
            samples_per_buffer as f64 / sample_rate
        } else {
            0.0
        };
        Self {
            period: Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO),
            started: None,
            released: 0,
        }
    }

    pub fn reset(&mut self) {
        self.started = Some(Instant::now());
        self.released = 0;
    }

    /// True when the next buffer is due; counts it as released.
    pub fn try_release(&mut self) -> bool {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + self.period.mul_f64(self.released as f64);
        if Instant::now() >= due {
            self.released += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_buffer_immediate() {
        let mut pacer = Pacer::new(1024, 1_000.0);
        pacer.reset();
        assert!(pacer.try_release());
        // next one is due in ~1 s
        assert!(!pacer.try_release());
    }

    #[test]
    fn test_degenerate_rates_do_not_panic() {
        for rate in [f64::NAN, f64::INFINITY, -5.0, 1e-300] {
            let mut pacer = Pacer::new(1024, rate);
            assert!(pacer.try_release());
            assert!(pacer.try_release());
        }
    }

    #[test]
    fn test_zero_rate_unpaced() {
        let mut pacer = Pacer::new(1024, 0.0);
        for _ in 0..10 {
            assert!(pacer.try_release());
        }
    }
}
