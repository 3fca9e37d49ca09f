pub mod palette;
pub mod spectrum;
pub mod waterfall;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpectrumError {
    #[error("unsupported FFT length {0} (power of two from 128 to 1048576)")]
    UnsupportedLength(usize),

    #[error("I/Q length mismatch: {i} I samples, {q} Q samples")]
    LengthMismatch { i: usize, q: usize },
}
