// Copyright 2025-2026 CEMAXECUTER LLC

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Sender, TrySendError};
use iq_dsp::palette::Palette;
use iq_dsp::spectrum::FftLength;
use serde::Deserialize;

use crate::config::DisplayMode;

/// Configuration changes applied by the presentation loop between frames.
///
/// Arrives as one JSON object per line, e.g.
/// `{"cmd": "set_fft_length", "stream": "raw", "length": 4096}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ScopeCommand {
    Enable { stream: String },
    Disable { stream: String },
    SetFftLength { stream: String, length: FftLength },
    SetPalette { stream: String, palette: Palette },
    SetMode { stream: String, mode: DisplayMode },
    SetWaterfall { stream: String, enabled: bool },
    SetCadence { stream: String, every: u32 },
    ClearWaterfall { stream: String },
    Quit,
}

impl ScopeCommand {
    /// Target stream, if the command addresses one.
    pub fn stream(&self) -> Option<&str> {
        match self {
            ScopeCommand::Enable { stream }
            | ScopeCommand::Disable { stream }
            | ScopeCommand::SetFftLength { stream, .. }
            | ScopeCommand::SetPalette { stream, .. }
            | ScopeCommand::SetMode { stream, .. }
            | ScopeCommand::SetWaterfall { stream, .. }
            | ScopeCommand::SetCadence { stream, .. }
            | ScopeCommand::ClearWaterfall { stream } => Some(stream),
            ScopeCommand::Quit => None,
        }
    }
}

pub fn parse_command(line: &str) -> Result<ScopeCommand, String> {
    serde_json::from_str(line).map_err(|e| format!("bad command: {}", e))
}

/// Read commands line by line until EOF, a closed channel, or shutdown.
/// Returns the number of commands forwarded.
pub fn read_commands<R: BufRead>(
    reader: R,
    tx: &Sender<ScopeCommand>,
    shutdown: &AtomicBool,
) -> usize {
    let mut forwarded = 0;
    for line in reader.lines() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("control: read error: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_command(line) {
            Ok(cmd) => match tx.try_send(cmd) {
                Ok(()) => forwarded += 1,
                Err(TrySendError::Full(cmd)) => {
                    log::warn!("control: command queue full, dropped {:?}", cmd);
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
            Err(e) => log::warn!("control: {}", e),
        }
    }
    forwarded
}

/// Spawn a detached thread feeding commands from stdin.
pub fn spawn_stdin_reader(
    tx: Sender<ScopeCommand>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("control-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let n = read_commands(stdin.lock(), &tx, &shutdown);
            log::debug!("control: stdin closed after {} commands", n);
        })
}
