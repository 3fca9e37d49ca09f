use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use iq_dsp::palette::Palette;
use iq_dsp::spectrum::FftLength;

use iqscope::config::ScopeConfig;
use iqscope::pipeline::{self, RunOptions};
use iqscope::scope::LogSink;
use iqscope::tone::{ToneProcess, ToneSettings};

#[derive(Parser, Debug)]
#[command(name = "iqscope")]
#[command(about = "Live IQ scope for LitePCIe SDR boards: raw I/Q, FFT spectrum and waterfall")]
struct Cli {
    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire and display streams until Ctrl-C
    Run(RunArgs),
    /// Print the default scope configuration as JSON
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON scope configuration (defaults to the two-stream M2SDR layout)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace every transport with a synthetic tone
    #[arg(long)]
    simulate: bool,

    /// Sample rate for --simulate
    #[arg(long, default_value = "1000000")]
    sim_rate: f64,

    /// Enable a stream at startup (repeatable); "all" enables every stream
    #[arg(short = 'e', long = "enable")]
    enable: Vec<String>,

    /// FFT length for every stream
    #[arg(short = 'n', long)]
    fft_len: Option<usize>,

    /// Waterfall palette for every stream
    #[arg(long)]
    palette: Option<Palette>,

    /// Frames per second (overrides the configuration)
    #[arg(long)]
    fps: Option<f64>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Log a status line every N frames
    #[arg(long, default_value = "60")]
    log_every: u64,

    /// Ignore JSON commands on stdin
    #[arg(long)]
    no_control: bool,

    #[command(flatten)]
    tone: ToneArgs,
}

#[derive(Args, Debug)]
struct ToneArgs {
    /// Start the external tone generator alongside the scope
    #[arg(long)]
    tone: bool,

    /// Tone generator executable
    #[arg(long, default_value = "m2sdr_tone")]
    tone_program: String,

    /// Board number passed to the tone generator
    #[arg(long)]
    tone_device: Option<u32>,

    /// Tone frequency in Hz
    #[arg(long, default_value = "1000")]
    tone_freq: i64,

    /// Tone sample rate in S/s
    #[arg(long, default_value = "30720000")]
    tone_rate: i64,

    /// Tone amplitude, 0.0 to 1.0
    #[arg(long, default_value = "1.0")]
    tone_amplitude: f64,

    /// Zero-copy DMA for the tone generator
    #[arg(long)]
    tone_zero_copy: bool,
}

impl ToneArgs {
    fn settings(&self) -> ToneSettings {
        ToneSettings {
            program: self.tone_program.clone(),
            device: self.tone_device,
            frequency: self.tone_freq,
            sample_rate: self.tone_rate,
            amplitude: self.tone_amplitude,
            zero_copy: self.tone_zero_copy,
        }
    }
}

fn build_config(args: &RunArgs) -> Result<ScopeConfig, String> {
    let mut config = match &args.config {
        Some(path) => ScopeConfig::load(path)?,
        None => ScopeConfig::default(),
    };

    if args.simulate {
        config.simulate(args.sim_rate);
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(n) = args.fft_len {
        let len = FftLength::new(n).map_err(|e| e.to_string())?;
        for s in &mut config.streams {
            s.fft_length = len;
        }
    }
    if let Some(palette) = args.palette {
        for s in &mut config.streams {
            s.palette = palette;
        }
    }
    for name in &args.enable {
        if name == "all" {
            config.streams.iter_mut().for_each(|s| s.enabled = true);
            continue;
        }
        match config.stream_mut(name) {
            Some(s) => s.enabled = true,
            None => return Err(format!("unknown stream '{}'", name)),
        }
    }

    config.validate()?;
    Ok(config)
}

fn run(args: RunArgs) -> Result<(), String> {
    let config = build_config(&args)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| format!("failed to install Ctrl-C handler: {}", e))?;
    }

    // Held for the lifetime of the scope; killed on drop
    let _tone = if args.tone.tone {
        Some(ToneProcess::start(&args.tone.settings())?)
    } else {
        None
    };

    let opts = RunOptions {
        frames: args.frames,
        stdin_control: !args.no_control,
    };
    let mut sink = LogSink::new(args.log_every);
    pipeline::run(&config, &opts, &mut sink, shutdown)
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Config => serde_json::to_string_pretty(&ScopeConfig::default())
            .map(|json| println!("{}", json))
            .map_err(|e| format!("failed to serialize configuration: {}", e)),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
