use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel;
use iq_sdr::TransportOpener;

use crate::config::ScopeConfig;
use crate::control;
use crate::ingest::{IngestWorker, StreamControl};
use crate::queue::SampleQueue;
use crate::scope::{FrameSink, Scope, StreamView};

pub struct RunOptions {
    /// Stop after this many frames
    pub frames: Option<u64>,
    /// Accept JSON-lines commands on stdin
    pub stdin_control: bool,
}

/// Spawn one ingestion worker per stream and drive the presentation loop
/// until shutdown. Workers are joined before returning.
pub fn run(
    config: &ScopeConfig,
    opts: &RunOptions,
    sink: &mut dyn FrameSink,
    shutdown: Arc<AtomicBool>,
) -> Result<(), String> {
    config.validate()?;

    let mut views = Vec::with_capacity(config.streams.len());
    let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(config.streams.len());

    for s in &config.streams {
        log::info!(
            "stream {}: {} stride={} scale={} N={} enabled={}",
            s.name,
            s.transport.describe(),
            s.stride,
            s.scale,
            s.fft_length.get(),
            s.enabled
        );
        let control = Arc::new(StreamControl::new(&s.name, s.enabled));
        let queue = Arc::new(SampleQueue::new(s.queue_capacity));
        let worker = IngestWorker::new(
            control.clone(),
            queue.clone(),
            Box::new(s.transport.clone()),
            s.stride,
            s.scale,
        );
        match worker.spawn(shutdown.clone()) {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                shutdown.store(true, Ordering::SeqCst);
                join_all(workers);
                return Err(format!("failed to spawn worker for {}: {}", s.name, e));
            }
        }
        views.push(StreamView::new(s, control, queue));
    }

    let mut scope = Scope::new(views, config.fps);
    if opts.stdin_control {
        let (tx, rx) = channel::bounded(64);
        match control::spawn_stdin_reader(tx, shutdown.clone()) {
            Ok(_) => scope = scope.with_commands(rx),
            Err(e) => log::warn!("control: stdin reader unavailable: {}", e),
        }
    }

    scope.run(sink, &shutdown, opts.frames);

    shutdown.store(true, Ordering::SeqCst);
    join_all(workers);
    Ok(())
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        if handle.join().is_err() {
            log::error!("ingestion worker panicked");
        }
    }
}
