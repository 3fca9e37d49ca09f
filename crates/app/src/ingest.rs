// Copyright 2025-2026 CEMAXECUTER LLC

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use iq_sdr::{DmaTransport, SdrResult, TransportOpener};

use crate::queue::SampleQueue;

/// How often a disabled worker checks its enable flag.
pub const ENABLE_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Idle = 0,
    WaitingForEnable = 1,
    Acquiring = 2,
    Failed = 3,
    ShuttingDown = 4,
    Stopped = 5,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StreamState::WaitingForEnable,
            2 => StreamState::Acquiring,
            3 => StreamState::Failed,
            4 => StreamState::ShuttingDown,
            5 => StreamState::Stopped,
            _ => StreamState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub buffers: u64,
    pub samples: u64,
    pub dropped: u64,
    pub open_failures: u64,
}

/// Shared per-stream state. The presentation side flips `enabled`; the
/// worker publishes its state and counters.
pub struct StreamControl {
    name: String,
    enabled: AtomicBool,
    state: AtomicU8,
    buffers: AtomicU64,
    samples: AtomicU64,
    dropped: AtomicU64,
    open_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl StreamControl {
    pub fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enabled: AtomicBool::new(enabled),
            state: AtomicU8::new(StreamState::Idle as u8),
            buffers: AtomicU64::new(0),
            samples: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            buffers: self.buffers.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record_buffer(&self, samples: usize, dropped: usize) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    /// Open or start failure: mark failed and require a fresh enable.
    fn fail(&self, reason: String) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason);
        self.disable();
        self.set_state(StreamState::Failed);
    }
}

/// Splits interleaved int16 words into normalized I and Q.
///
/// Word `stride * k` is I and `stride * k + 1` is Q; the other words of each
/// group belong to other sub-channels and are skipped.
pub struct Demux {
    stride: usize,
    scale: f32,
    i: Vec<f32>,
    q: Vec<f32>,
}

impl Demux {
    pub fn new(stride: usize, scale: f32) -> Self {
        Self {
            stride: stride.max(2),
            scale,
            i: Vec::new(),
            q: Vec::new(),
        }
    }

    pub fn process(&mut self, words: &[i16]) -> (&[f32], &[f32]) {
        self.i.clear();
        self.q.clear();
        for group in words.chunks_exact(self.stride) {
            self.i.push(group[0] as f32 / self.scale);
            self.q.push(group[1] as f32 / self.scale);
        }
        (&self.i, &self.q)
    }
}

/// One acquisition thread bound to one stream.
pub struct IngestWorker {
    control: Arc<StreamControl>,
    queue: Arc<SampleQueue>,
    opener: Box<dyn TransportOpener>,
    demux: Demux,
    enable_poll: Duration,
}

impl IngestWorker {
    pub fn new(
        control: Arc<StreamControl>,
        queue: Arc<SampleQueue>,
        opener: Box<dyn TransportOpener>,
        stride: usize,
        scale: f32,
    ) -> Self {
        Self {
            control,
            queue,
            opener,
            demux: Demux::new(stride, scale),
            enable_poll: ENABLE_POLL,
        }
    }

    pub fn with_enable_poll(mut self, interval: Duration) -> Self {
        self.enable_poll = interval;
        self
    }

    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        let name = format!("ingest-{}", self.control.name());
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run(&shutdown))
    }

    fn open_started(&self) -> SdrResult<Box<dyn DmaTransport>> {
        let mut transport = self.opener.open()?;
        transport.start()?;
        Ok(transport)
    }

    fn run(mut self, shutdown: &AtomicBool) {
        let control = self.control.clone();
        control.set_state(StreamState::WaitingForEnable);

        while !shutdown.load(Ordering::SeqCst) {
            if !control.is_enabled() {
                thread::sleep(self.enable_poll);
                continue;
            }

            // Stale samples from an earlier session are useless
            self.queue.clear();

            let mut transport = match self.open_started() {
                Ok(t) => t,
                Err(e) => {
                    log::error!(
                        "{}: could not open {}: {}",
                        control.name(),
                        self.opener.describe(),
                        e
                    );
                    control.fail(e.to_string());
                    continue;
                }
            };

            control.set_state(StreamState::Acquiring);
            log::info!("{}: acquiring from {}", control.name(), transport.device());

            while control.is_enabled() && !shutdown.load(Ordering::SeqCst) {
                match transport.poll_next_buffer() {
                    Some(words) => {
                        let (i, q) = self.demux.process(words);
                        let dropped = self.queue.push(i, q);
                        control.record_buffer(i.len(), dropped);
                    }
                    None => std::hint::spin_loop(),
                }
            }

            if shutdown.load(Ordering::SeqCst) {
                control.set_state(StreamState::ShuttingDown);
            }
            transport.stop();
            log::info!("{}: stopped {}", control.name(), transport.device());
            drop(transport);

            if control.state() != StreamState::ShuttingDown {
                control.set_state(StreamState::WaitingForEnable);
            }
        }

        control.set_state(StreamState::Stopped);
        log::debug!("{}: worker exiting", control.name());
    }
}
