use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::SpectrumError;

/// Supported transform lengths
pub const FFT_LENGTHS: [usize; 14] = [
    128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144, 524288, 1048576,
];

/// A transform length taken from [`FFT_LENGTHS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct FftLength(usize);

impl FftLength {
    pub const DEFAULT: FftLength = FftLength(1024);

    pub fn new(n: usize) -> Result<Self, SpectrumError> {
        if FFT_LENGTHS.contains(&n) {
            Ok(FftLength(n))
        } else {
            Err(SpectrumError::UnsupportedLength(n))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn menu() -> impl Iterator<Item = FftLength> {
        FFT_LENGTHS.iter().map(|&n| FftLength(n))
    }
}

impl Default for FftLength {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for FftLength {
    type Error = SpectrumError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        FftLength::new(n)
    }
}

impl From<FftLength> for usize {
    fn from(len: FftLength) -> usize {
        len.0
    }
}

/// Forward FFT magnitude processor.
///
/// Owns exactly one plan at a time; the plan is rebuilt only when a
/// different transform length arrives. No window is applied.
pub struct SpectralProcessor {
    fft: Option<Arc<dyn Fft<f32>>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
    magnitudes: Vec<f32>,
    plans_built: u64,
}

impl SpectralProcessor {
    pub fn new() -> Self {
        Self {
            fft: None,
            buffer: Vec::new(),
            scratch: Vec::new(),
            magnitudes: Vec::new(),
            plans_built: 0,
        }
    }

    /// Length of the currently cached plan, if any.
    pub fn plan_len(&self) -> Option<usize> {
        self.fft.as_ref().map(|f| f.len())
    }

    /// Number of plans built so far
    pub fn plans_built(&self) -> u64 {
        self.plans_built
    }

    fn ensure_plan(&mut self, n: usize) {
        if self.plan_len() == Some(n) {
            return;
        }
        // Drop the old plan before building the new one
        self.fft = None;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        self.scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        self.buffer = vec![Complex32::new(0.0, 0.0); n];
        self.magnitudes = vec![0.0; n];
        self.fft = Some(fft);
        self.plans_built += 1;
    }

    /// Forward transform of `I + jQ`, returning `sqrt(re² + im²)` per bin.
    pub fn compute(&mut self, i: &[f32], q: &[f32]) -> Result<&[f32], SpectrumError> {
        if i.len() != q.len() {
            return Err(SpectrumError::LengthMismatch {
                i: i.len(),
                q: q.len(),
            });
        }
        let n = FftLength::new(i.len())?.get();
        self.ensure_plan(n);

        for ((dst, &re), &im) in self.buffer.iter_mut().zip(i).zip(q) {
            *dst = Complex32::new(re, im);
        }

        if let Some(fft) = &self.fft {
            fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        }

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = (c.re * c.re + c.im * c.im).sqrt();
        }
        Ok(&self.magnitudes)
    }
}

impl Default for SpectralProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Element-wise `|I + jQ|`, for streams whose samples are already FFT bins.
pub fn magnitudes(i: &[f32], q: &[f32], out: &mut Vec<f32>) -> Result<(), SpectrumError> {
    if i.len() != q.len() {
        return Err(SpectrumError::LengthMismatch {
            i: i.len(),
            q: q.len(),
        });
    }
    out.clear();
    out.extend(i.iter().zip(q).map(|(&re, &im)| (re * re + im * im).sqrt()));
    Ok(())
}

/// Index and value of the largest element
pub fn peak(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
}
