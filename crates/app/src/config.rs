use std::collections::HashSet;
use std::path::Path;

use iq_dsp::palette::Palette;
use iq_dsp::spectrum::FftLength;
use iq_dsp::waterfall::{Orientation, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use iq_sdr::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::queue::DrainPolicy;

/// Default per-channel queue capacity in samples.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 21;

/// What the presentation loop does with a drained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Plot I and Q directly
    RawIq,
    #[default]
    Spectrum,
}

/// Where spectrum magnitudes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumSource {
    /// Forward FFT computed on the host
    #[default]
    Software,
    /// Samples are already FFT bins from the gateware; only |I + jQ| is taken
    Hardware,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallConfig {
    pub enabled: bool,
    pub width: usize,
    pub height: usize,
    /// Frames between appended rows
    pub every: u32,
    pub orientation: Orientation,
    /// Magnitude mapped to the top of the palette
    pub reference_max: f32,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            every: 1,
            orientation: Orientation::NewestAtBottom,
            reference_max: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub transport: TransportConfig,
    /// Interleaved 16-bit words per sample group
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Divisor applied to each raw word
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: DisplayMode,
    #[serde(default)]
    pub source: SpectrumSource,
    #[serde(default)]
    pub drain: DrainPolicy,
    #[serde(default = "default_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub fft_length: FftLength,
    /// Fixed plot ceiling; when unset the running peak plus 10 is used
    #[serde(default)]
    pub plot_max: Option<f32>,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub waterfall: WaterfallConfig,
}

fn default_stride() -> usize {
    2
}

fn default_scale() -> f32 {
    1.0
}

fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Slowest accepted presentation rate, one frame every 1000 s.
pub const MIN_FPS: f64 = 1e-3;

fn default_fps() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default = "default_fps")]
    pub fps: f64,
    pub streams: Vec<StreamConfig>,
}

impl Default for ScopeConfig {
    /// Raw I/Q from the first DMA channel and hardware FFT bins from the second.
    fn default() -> Self {
        Self {
            fps: default_fps(),
            streams: vec![
                StreamConfig {
                    name: "raw".to_string(),
                    transport: TransportConfig::Litepcie {
                        device: "/dev/m2sdr0".to_string(),
                        zero_copy: false,
                    },
                    stride: 4,
                    scale: 2047.0,
                    enabled: false,
                    mode: DisplayMode::RawIq,
                    source: SpectrumSource::Software,
                    drain: DrainPolicy::DiscardAll,
                    queue_capacity: DEFAULT_QUEUE_CAPACITY,
                    fft_length: FftLength::DEFAULT,
                    plot_max: Some(500.0),
                    palette: Palette::Grayscale,
                    waterfall: WaterfallConfig::default(),
                },
                StreamConfig {
                    name: "fft".to_string(),
                    transport: TransportConfig::Litepcie {
                        device: "/dev/m2sdr1".to_string(),
                        zero_copy: false,
                    },
                    stride: 2,
                    scale: 1.0,
                    enabled: false,
                    mode: DisplayMode::Spectrum,
                    source: SpectrumSource::Hardware,
                    drain: DrainPolicy::WholeWindows,
                    queue_capacity: DEFAULT_QUEUE_CAPACITY,
                    fft_length: FftLength::DEFAULT,
                    plot_max: None,
                    palette: Palette::Grayscale,
                    waterfall: WaterfallConfig::default(),
                },
            ],
        }
    }
}

impl ScopeConfig {
    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let config: ScopeConfig = serde_json::from_str(&text)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.fps.is_finite() && self.fps >= MIN_FPS) {
            return Err(format!("fps must be at least {}, got {}", MIN_FPS, self.fps));
        }
        if self.streams.is_empty() {
            return Err("no streams configured".to_string());
        }
        let mut names = HashSet::new();
        for s in &self.streams {
            if !names.insert(s.name.as_str()) {
                return Err(format!("duplicate stream name '{}'", s.name));
            }
            if s.stride < 2 {
                return Err(format!("stream '{}': stride must be at least 2", s.name));
            }
            if !(s.scale.is_finite() && s.scale != 0.0) {
                return Err(format!("stream '{}': scale must be finite and non-zero", s.name));
            }
            if s.queue_capacity < s.fft_length.get() {
                return Err(format!(
                    "stream '{}': queue capacity {} is smaller than FFT length {}",
                    s.name,
                    s.queue_capacity,
                    s.fft_length.get()
                ));
            }
            if s.waterfall.width == 0 || s.waterfall.height == 0 {
                return Err(format!("stream '{}': waterfall dimensions must be non-zero", s.name));
            }
        }
        Ok(())
    }

    /// Replace every transport with a synthetic tone, keeping each stream's stride.
    ///
    /// Streams get distinct tone frequencies so their spectra are easy to tell apart.
    pub fn simulate(&mut self, sample_rate: f64) {
        for (idx, s) in self.streams.iter_mut().enumerate() {
            let frequency = sample_rate / 16.0 * (idx + 1) as f64;
            s.transport = TransportConfig::Tone {
                frequency,
                sample_rate,
                amplitude: 0.5,
                stride: s.stride,
            };
        }
    }

    pub fn stream_mut(&mut self, name: &str) -> Option<&mut StreamConfig> {
        self.streams.iter_mut().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_layout() {
        let cfg = ScopeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.streams.len(), 2);

        let raw = &cfg.streams[0];
        assert_eq!(raw.stride, 4);
        assert_eq!(raw.scale, 2047.0);
        assert_eq!(raw.drain, DrainPolicy::DiscardAll);
        assert_eq!(raw.mode, DisplayMode::RawIq);

        let fft = &cfg.streams[1];
        assert_eq!(fft.stride, 2);
        assert_eq!(fft.scale, 1.0);
        assert_eq!(fft.source, SpectrumSource::Hardware);
        assert_eq!(fft.drain, DrainPolicy::WholeWindows);
    }

    #[test]
    fn test_parse_minimal() {
        let cfg: ScopeConfig = serde_json::from_str(
            r#"{
                "streams": [
                    {
                        "name": "a",
                        "transport": {"kind": "tone", "frequency": 1000.0, "sample_rate": 48000.0},
                        "fft_length": 2048,
                        "palette": "magma",
                        "waterfall": {"every": 3, "orientation": "newest_at_top"}
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.fps, 60.0);
        let s = &cfg.streams[0];
        assert_eq!(s.stride, 2);
        assert_eq!(s.fft_length.get(), 2048);
        assert_eq!(s.palette, Palette::Magma);
        assert_eq!(s.waterfall.every, 3);
        assert_eq!(s.waterfall.orientation, Orientation::NewestAtTop);
        assert_eq!(s.waterfall.height, DEFAULT_HEIGHT);
        assert_eq!(s.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_rejects_bad_fft_length() {
        let res: Result<ScopeConfig, _> = serde_json::from_str(
            r#"{"streams": [{"name": "a", "transport": {"kind": "litepcie", "device": "/dev/x"}, "fft_length": 1000}]}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_validate() {
        let mut cfg = ScopeConfig::default();
        cfg.streams[1].name = "raw".to_string();
        assert!(cfg.validate().unwrap_err().contains("duplicate"));

        let mut cfg = ScopeConfig::default();
        cfg.streams[0].stride = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = ScopeConfig::default();
        cfg.streams[0].queue_capacity = 100;
        assert!(cfg.validate().is_err());

        let mut cfg = ScopeConfig::default();
        cfg.fps = 0.0;
        assert!(cfg.validate().is_err());

        cfg.fps = 1e-300;
        assert!(cfg.validate().is_err());
        cfg.fps = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.fps = MIN_FPS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_simulate_keeps_stride() {
        let mut cfg = ScopeConfig::default();
        cfg.simulate(1_000_000.0);
        match &cfg.streams[0].transport {
            TransportConfig::Tone { stride, .. } => assert_eq!(*stride, 4),
            other => panic!("expected tone transport, got {:?}", other),
        }
        match &cfg.streams[1].transport {
            TransportConfig::Tone { stride, frequency, .. } => {
                assert_eq!(*stride, 2);
                assert_eq!(*frequency, 125_000.0);
            }
            other => panic!("expected tone transport, got {:?}", other),
        }
    }

    #[test]
    fn test_load_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&ScopeConfig::default()).unwrap();
        f.write_all(json.as_bytes()).unwrap();
        let cfg = ScopeConfig::load(f.path()).unwrap();
        assert_eq!(cfg, ScopeConfig::default());

        assert!(ScopeConfig::load(Path::new("/nonexistent/scope.json")).is_err());
    }
}
