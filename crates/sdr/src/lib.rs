// Copyright 2025-2026 CEMAXECUTER LLC

pub mod error;
pub mod file;
pub mod fir;
pub mod regs;
pub mod tone;

#[cfg(feature = "litepcie")]
pub mod litepcie;

mod pacer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use error::{SdrError, SdrResult};

/// Size in bytes of one LitePCIe DMA buffer.
pub const DMA_BUFFER_SIZE: usize = 8192;

/// Number of 16-bit words in one DMA buffer.
pub const DMA_BUFFER_WORDS: usize = DMA_BUFFER_SIZE / 2;

/// One hardware transport session: a DMA-capable handle to a single device.
///
/// Opening happens in the backend constructor, closing in `Drop`.
/// Everything else must return promptly: the ingestion worker calls
/// `poll_next_buffer` in a tight loop.
pub trait DmaTransport: Send {
    /// Arm the transport for continuous transfer.
    fn start(&mut self) -> SdrResult<()>;

    /// Return the next completed buffer of interleaved int16 words, or `None`
    /// when no buffer is ready yet.
    ///
    /// The slice is only valid until the next call.
    fn poll_next_buffer(&mut self) -> Option<&[i16]>;

    /// Disarm the transport and release in-flight buffers.
    fn stop(&mut self);

    /// Device identifier, for logging
    fn device(&self) -> &str;
}

/// Something that can open a fresh transport session on demand.
///
/// The ingestion worker opens a new session each time its stream is enabled.
pub trait TransportOpener: Send + Sync {
    fn open(&self) -> SdrResult<Box<dyn DmaTransport>>;

    fn describe(&self) -> String;
}

impl<F> TransportOpener for F
where
    F: Fn() -> SdrResult<Box<dyn DmaTransport>> + Send + Sync,
{
    fn open(&self) -> SdrResult<Box<dyn DmaTransport>> {
        self()
    }

    fn describe(&self) -> String {
        "custom transport".to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_pair_stride() -> usize {
    2
}

/// Serializable description of a transport backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// LitePCIe DMA writer channel (e.g. `/dev/m2sdr0`)
    Litepcie {
        device: String,
        #[serde(default)]
        zero_copy: bool,
    },
    /// Replay of a recorded IQ capture
    File {
        path: PathBuf,
        #[serde(default)]
        format: file::SampleFormat,
        sample_rate: u32,
        #[serde(default = "default_true")]
        looped: bool,
    },
    /// Synthetic complex tone
    Tone {
        frequency: f64,
        sample_rate: f64,
        #[serde(default = "tone::default_amplitude")]
        amplitude: f64,
        #[serde(default = "default_pair_stride")]
        stride: usize,
    },
}

impl TransportOpener for TransportConfig {
    fn open(&self) -> SdrResult<Box<dyn DmaTransport>> {
        match self {
            TransportConfig::Litepcie { device, zero_copy } => open_litepcie(device, *zero_copy),
            TransportConfig::File {
                path,
                format,
                sample_rate,
                looped,
            } => {
                let source = file::FileTransport::open(path, *format, *sample_rate, *looped)?;
                Ok(Box::new(source))
            }
            TransportConfig::Tone {
                frequency,
                sample_rate,
                amplitude,
                stride,
            } => {
                let source =
                    tone::ToneTransport::new(*frequency, *sample_rate, *amplitude, *stride)?;
                Ok(Box::new(source))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            TransportConfig::Litepcie { device, zero_copy } => {
                format!("litepcie {} (zero_copy={})", device, zero_copy)
            }
            TransportConfig::File { path, format, .. } => {
                format!("file {} ({:?})", path.display(), format)
            }
            TransportConfig::Tone {
                frequency,
                sample_rate,
                ..
            } => format!("tone {} Hz @ {} S/s", frequency, sample_rate),
        }
    }
}

#[cfg(feature = "litepcie")]
fn open_litepcie(device: &str, zero_copy: bool) -> SdrResult<Box<dyn DmaTransport>> {
    Ok(Box::new(litepcie::LitePcieTransport::open(device, zero_copy)?))
}

#[cfg(not(feature = "litepcie"))]
fn open_litepcie(device: &str, _zero_copy: bool) -> SdrResult<Box<dyn DmaTransport>> {
    Err(SdrError::DeviceUnavailable {
        device: device.to_string(),
        reason: "built without litepcie support".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_json() {
        let cfg: TransportConfig = serde_json::from_str(
            r#"{"kind": "tone", "frequency": 1000.0, "sample_rate": 1000000.0}"#,
        )
        .unwrap();
        assert_eq!(
            cfg,
            TransportConfig::Tone {
                frequency: 1000.0,
                sample_rate: 1_000_000.0,
                amplitude: 1.0,
                stride: 2,
            }
        );

        let cfg: TransportConfig =
            serde_json::from_str(r#"{"kind": "litepcie", "device": "/dev/m2sdr0"}"#).unwrap();
        assert_eq!(
            cfg,
            TransportConfig::Litepcie {
                device: "/dev/m2sdr0".to_string(),
                zero_copy: false,
            }
        );
    }

    #[cfg(not(feature = "litepcie"))]
    #[test]
    fn test_litepcie_unavailable_without_feature() {
        let cfg = TransportConfig::Litepcie {
            device: "/dev/m2sdr0".to_string(),
            zero_copy: false,
        };
        match cfg.open() {
            Err(SdrError::DeviceUnavailable { device, .. }) => assert_eq!(device, "/dev/m2sdr0"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("open should fail without litepcie support"),
        }
    }

    #[test]
    fn test_closure_opener() {
        let opener = || -> SdrResult<Box<dyn DmaTransport>> {
            Err(SdrError::InvalidConfig("nope".to_string()))
        };
        assert!(opener.open().is_err());
        assert_eq!(opener.describe(), "custom transport");
    }
}
