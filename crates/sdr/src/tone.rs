// Copyright 2025-2026 CEMAXECUTER LLC

use std::f64::consts::PI;

use crate::pacer::Pacer;
use crate::{DmaTransport, SdrError, SdrResult, DMA_BUFFER_WORDS};

/// Full scale of the 12-bit RFIC samples
pub const TONE_FULL_SCALE: f64 = 2047.0;

pub(crate) fn default_amplitude() -> f64 {
    1.0
}

/// Synthetic transport producing a complex tone, laid out the way the
/// hardware interleaves sub-channels: every I/Q pair slot of a sample group
/// carries the same tone, any leftover odd word is zero.
pub struct ToneTransport {
    device: String,
    stride: usize,
    amplitude: f64,
    omega: f64,
    phi: f64,
    armed: bool,
    pacer: Pacer,
    words: Vec<i16>,
}

impl ToneTransport {
    pub fn new(frequency: f64, sample_rate: f64, amplitude: f64, stride: usize) -> SdrResult<Self> {
        if stride < 2 {
            return Err(SdrError::InvalidConfig(format!(
                "tone stride must be at least 2 (got {})",
                stride
            )));
        }
        if !(sample_rate.is_finite() && sample_rate >= 1.0) {
            return Err(SdrError::InvalidConfig(format!(
                "tone sample rate must be at least 1 S/s (got {})",
                sample_rate
            )));
        }
        let groups = DMA_BUFFER_WORDS / stride;
        Ok(Self {
            device: format!("tone:{}Hz", frequency),
            stride,
            amplitude: amplitude.clamp(0.0, 1.0),
            omega: 2.0 * PI * frequency / sample_rate,
            phi: 0.0,
            armed: false,
            pacer: Pacer::new(groups, sample_rate),
            words: vec![0; groups * stride],
        })
    }

    /// Same generator without pacing, for offline use.
    pub fn unpaced(
        frequency: f64,
        sample_rate: f64,
        amplitude: f64,
        stride: usize,
    ) -> SdrResult<Self> {
        let mut tone = Self::new(frequency, sample_rate, amplitude, stride)?;
        tone.pacer = Pacer::new(0, 0.0);
        Ok(tone)
    }

    fn fill(&mut self) {
        let pairs = self.stride / 2;
        for group in self.words.chunks_exact_mut(self.stride) {
            let i = (self.phi.cos() * self.amplitude * TONE_FULL_SCALE) as i16;
            let q = (self.phi.sin() * self.amplitude * TONE_FULL_SCALE) as i16;
            for p in 0..pairs {
                group[2 * p] = i;
                group[2 * p + 1] = q;
            }
            self.phi = (self.phi + self.omega).rem_euclid(2.0 * PI);
        }
    }
}

impl DmaTransport for ToneTransport {
    fn start(&mut self) -> SdrResult<()> {
        self.phi = 0.0;
        self.armed = true;
        self.pacer.reset();
        Ok(())
    }

    fn poll_next_buffer(&mut self) -> Option<&[i16]> {
        if !self.armed || !self.pacer.try_release() {
            return None;
        }
        self.fill();
        Some(&self.words)
    }

    fn stop(&mut self) {
        self.armed = false;
    }

    fn device(&self) -> &str {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_layout() {
        let mut t = ToneTransport::unpaced(1000.0, 1_000_000.0, 1.0, 4).unwrap();
        t.start().unwrap();
        let buf = t.poll_next_buffer().unwrap();
        assert_eq!(buf.len(), DMA_BUFFER_WORDS);
        // first group: phi = 0 -> I = full scale, Q = 0, replicated on TX2
        assert_eq!(&buf[..4], &[2047, 0, 2047, 0]);
        for group in buf.chunks_exact(4) {
            assert_eq!(group[0], group[2]);
            assert_eq!(group[1], group[3]);
        }
    }

    #[test]
    fn test_odd_stride_pads_zero() {
        let mut t = ToneTransport::unpaced(1000.0, 1_000_000.0, 0.5, 3).unwrap();
        t.start().unwrap();
        let buf = t.poll_next_buffer().unwrap();
        assert!(buf.chunks_exact(3).all(|g| g[2] == 0));
    }

    #[test]
    fn test_rejects_bad_stride() {
        assert!(ToneTransport::new(1.0, 1.0, 1.0, 1).is_err());
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        for rate in [0.0, -1.0, 1e-300, f64::NAN, f64::INFINITY] {
            match ToneTransport::new(1000.0, rate, 1.0, 2) {
                Err(SdrError::InvalidConfig(_)) => {}
                other => panic!("rate {} accepted: {:?}", rate, other.map(|_| ())),
            }
        }
        assert!(ToneTransport::new(1000.0, 1.0, 1.0, 2).is_ok());
    }

    #[test]
    fn test_not_armed_before_start() {
        let mut t = ToneTransport::unpaced(1000.0, 1_000_000.0, 1.0, 2).unwrap();
        assert!(t.poll_next_buffer().is_none());
        t.start().unwrap();
        assert!(t.poll_next_buffer().is_some());
        t.stop();
        assert!(t.poll_next_buffer().is_none());
    }
}
