use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use iq_dsp::palette::{self, Palette, Rgb};
use iq_dsp::spectrum::{self, FftLength, SpectralProcessor};
use iq_dsp::waterfall::{Cadence, Orientation, Waterfall};
use iq_dsp::SpectrumError;

use crate::config::{DisplayMode, SpectrumSource, StreamConfig, MIN_FPS};
use crate::control::ScopeCommand;
use crate::ingest::{StreamControl, StreamState, StreamStats};
use crate::queue::{DrainPolicy, SampleQueue};

/// Per-stream presentation state, owned by the presentation thread.
pub struct StreamView {
    name: String,
    control: Arc<StreamControl>,
    queue: Arc<SampleQueue>,
    mode: DisplayMode,
    source: SpectrumSource,
    drain: DrainPolicy,
    fft_length: FftLength,
    plot_max: Option<f32>,
    palette: Palette,
    i: Vec<f32>,
    q: Vec<f32>,
    spectrum: Vec<f32>,
    processor: SpectralProcessor,
    waterfall: Waterfall,
    waterfall_enabled: bool,
    waterfall_max: f32,
    orientation: Orientation,
    cadence: Cadence,
    fresh: bool,
    peak: Option<(usize, f32)>,
}

impl StreamView {
    pub fn new(
        config: &StreamConfig,
        control: Arc<StreamControl>,
        queue: Arc<SampleQueue>,
    ) -> Self {
        let n = config.fft_length.get();
        let wf = &config.waterfall;
        Self {
            name: config.name.clone(),
            control,
            queue,
            mode: config.mode,
            source: config.source,
            drain: config.drain,
            fft_length: config.fft_length,
            plot_max: config.plot_max,
            palette: config.palette,
            i: vec![0.0; n],
            q: vec![0.0; n],
            spectrum: vec![0.0; n],
            processor: SpectralProcessor::new(),
            waterfall: Waterfall::new(wf.width, wf.height),
            waterfall_enabled: wf.enabled,
            waterfall_max: wf.reference_max,
            orientation: wf.orientation,
            cadence: Cadence::new(wf.every),
            fresh: false,
            peak: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control(&self) -> &Arc<StreamControl> {
        &self.control
    }

    pub fn waterfall(&self) -> &Waterfall {
        &self.waterfall
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    pub fn fft_length(&self) -> FftLength {
        self.fft_length
    }

    /// Resize the working arrays; previous data is discarded.
    pub fn set_fft_length(&mut self, length: FftLength) {
        if length == self.fft_length {
            return;
        }
        let n = length.get();
        self.fft_length = length;
        self.i = vec![0.0; n];
        self.q = vec![0.0; n];
        self.spectrum = vec![0.0; n];
        self.peak = None;
    }

    /// Drain one window and refresh the spectrum and waterfall.
    pub fn update(&mut self) -> Result<(), SpectrumError> {
        self.fresh = false;
        if !self.control.is_enabled() {
            return Ok(());
        }

        let n = self.fft_length.get();
        self.fresh = self.queue.drain_window(n, self.drain, &mut self.i, &mut self.q);

        if self.mode != DisplayMode::Spectrum {
            return Ok(());
        }

        if self.fresh {
            match self.source {
                SpectrumSource::Software => {
                    let mags = self.processor.compute(&self.i, &self.q)?;
                    self.spectrum.copy_from_slice(mags);
                }
                SpectrumSource::Hardware => {
                    spectrum::magnitudes(&self.i, &self.q, &mut self.spectrum)?;
                }
            }
            self.peak = spectrum::peak(&self.spectrum);
        }

        if self.waterfall_enabled && self.cadence.tick() {
            self.waterfall.append(&self.spectrum);
        }
        Ok(())
    }

    /// Plot ceiling: fixed when configured, else running peak plus 10.
    pub fn reference_max(&self) -> f32 {
        match self.plot_max {
            Some(max) => max,
            None => self.peak.map(|(_, v)| v).unwrap_or(0.0) + 10.0,
        }
    }

    pub fn apply(&mut self, cmd: &ScopeCommand) {
        match cmd {
            ScopeCommand::Enable { .. } => self.control.enable(),
            ScopeCommand::Disable { .. } => self.control.disable(),
            ScopeCommand::SetFftLength { length, .. } => self.set_fft_length(*length),
            ScopeCommand::SetPalette { palette, .. } => self.palette = *palette,
            ScopeCommand::SetMode { mode, .. } => self.mode = *mode,
            ScopeCommand::SetWaterfall { enabled, .. } => self.waterfall_enabled = *enabled,
            ScopeCommand::SetCadence { every, .. } => self.cadence.set_every(*every),
            ScopeCommand::ClearWaterfall { .. } => self.waterfall.clear(),
            ScopeCommand::Quit => {}
        }
    }

    pub fn frame(&self) -> Frame<'_> {
        let spectrum_mode = self.mode == DisplayMode::Spectrum;
        Frame {
            name: &self.name,
            state: self.control.state(),
            enabled: self.control.is_enabled(),
            fresh: self.fresh,
            mode: self.mode,
            i: &self.i,
            q: &self.q,
            spectrum: if spectrum_mode { &self.spectrum[..] } else { &[] },
            peak: if spectrum_mode { self.peak } else { None },
            reference_max: self.reference_max(),
            waterfall: if spectrum_mode && self.waterfall_enabled {
                Some(&self.waterfall)
            } else {
                None
            },
            waterfall_max: self.waterfall_max,
            orientation: self.orientation,
            palette: self.palette,
            queued: self.queue.len(),
            stats: self.control.stats(),
        }
    }
}

/// Everything the renderer needs for one stream in one frame.
pub struct Frame<'a> {
    pub name: &'a str,
    pub state: StreamState,
    pub enabled: bool,
    /// True when this frame drained new samples
    pub fresh: bool,
    pub mode: DisplayMode,
    pub i: &'a [f32],
    pub q: &'a [f32],
    pub spectrum: &'a [f32],
    pub peak: Option<(usize, f32)>,
    pub reference_max: f32,
    pub waterfall: Option<&'a Waterfall>,
    pub waterfall_max: f32,
    pub orientation: Orientation,
    pub palette: Palette,
    pub queued: usize,
    pub stats: StreamStats,
}

impl Frame<'_> {
    /// Waterfall as screen-ordered RGB rows, `height * width` pixels.
    pub fn waterfall_pixels(&self, out: &mut Vec<Rgb>) {
        out.clear();
        let Some(wf) = self.waterfall else {
            return;
        };
        let mut row_rgb = Vec::with_capacity(wf.width());
        for y in 0..wf.height() {
            if let Some(row) = wf.screen_row(y, self.orientation) {
                palette::map_row(row, self.waterfall_max, self.palette, &mut row_rgb);
                out.extend_from_slice(&row_rgb);
            }
        }
    }
}

/// Rendering collaborator.
pub trait FrameSink {
    fn present(&mut self, frame_no: u64, frames: &[Frame<'_>]);
}

/// Logs a one-line summary per stream every `every` frames.
pub struct LogSink {
    every: u64,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1) }
    }
}

impl FrameSink for LogSink {
    fn present(&mut self, frame_no: u64, frames: &[Frame<'_>]) {
        if frame_no % self.every != 0 {
            return;
        }
        for f in frames {
            let peak = match f.peak {
                Some((bin, mag)) => format!("peak bin {} mag {:.1}", bin, mag),
                None => "no spectrum".to_string(),
            };
            log::info!(
                "[{}] {:?} fresh={} {} queued={} buffers={} dropped={} rows={}",
                f.name,
                f.state,
                f.fresh,
                peak,
                f.queued,
                f.stats.buffers,
                f.stats.dropped,
                f.waterfall.map(|w| w.filled()).unwrap_or(0),
            );
        }
    }
}

/// Single-threaded frame loop over all stream views.
pub struct Scope {
    views: Vec<StreamView>,
    commands: Option<Receiver<ScopeCommand>>,
    frame_period: Duration,
    frames: u64,
    quit: bool,
}

impl Scope {
    pub fn new(views: Vec<StreamView>, fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps.max(MIN_FPS) } else { 60.0 };
        Self {
            views,
            commands: None,
            frame_period: Duration::from_secs_f64(1.0 / fps),
            frames: 0,
            quit: false,
        }
    }

    pub fn with_commands(mut self, rx: Receiver<ScopeCommand>) -> Self {
        self.commands = Some(rx);
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn view(&self, name: &str) -> Option<&StreamView> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn apply(&mut self, cmd: ScopeCommand) -> Result<(), String> {
        let Some(target) = cmd.stream() else {
            self.quit = true;
            return Ok(());
        };
        let view = self
            .views
            .iter_mut()
            .find(|v| v.name == target)
            .ok_or_else(|| format!("unknown stream '{}'", target))?;
        log::debug!("{}: {:?}", view.name, cmd);
        view.apply(&cmd);
        Ok(())
    }

    fn drain_commands(&mut self) {
        let pending: Vec<ScopeCommand> = match &self.commands {
            Some(rx) => rx.try_iter().collect(),
            None => return,
        };
        for cmd in pending {
            if let Err(e) = self.apply(cmd) {
                log::warn!("control: {}", e);
            }
        }
    }

    /// One frame: apply commands, update every view, present.
    pub fn step(&mut self, sink: &mut dyn FrameSink) {
        self.drain_commands();
        for view in &mut self.views {
            if let Err(e) = view.update() {
                log::warn!("{}: {}", view.name, e);
            }
        }
        self.frames += 1;
        let frames: Vec<Frame<'_>> = self.views.iter().map(|v| v.frame()).collect();
        sink.present(self.frames, &frames);
    }

    /// Run until shutdown, a quit command, or `max_frames`.
    pub fn run(
        &mut self,
        sink: &mut dyn FrameSink,
        shutdown: &AtomicBool,
        max_frames: Option<u64>,
    ) {
        let mut next = Instant::now();
        while !shutdown.load(Ordering::SeqCst) && !self.quit {
            if max_frames.is_some_and(|m| self.frames >= m) {
                break;
            }
            self.step(sink);

            next += self.frame_period;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                // Fell behind; don't try to catch up
                next = now;
            }
        }
        log::info!("presentation loop done after {} frames", self.frames);
    }
}
