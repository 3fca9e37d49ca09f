// Copyright 2025-2026 CEMAXECUTER LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iq_sdr::fir::{self, FirConfig};
use iq_sdr::regs::{FirRegisterMap, RecordingRegisters, RegisterIo};
use iq_sdr::{SdrError, SdrResult};

#[derive(Parser, Debug)]
#[command(name = "fir-util")]
#[command(about = "Load FIR coefficients and configure the FIR stage of a LitePCIe board")]
struct Cli {
    /// Board number, selects /dev/litepcie<N>
    #[arg(short = 'c', long = "device-num", default_value = "0")]
    device_num: u32,

    /// LiteX csr.json describing the FIR registers
    #[arg(long, conflicts_with = "csr_base")]
    csr_json: Option<PathBuf>,

    /// Address of the first FIR register (hex with 0x prefix or decimal)
    #[arg(long, value_parser = parse_address)]
    csr_base: Option<u32>,

    /// Print register writes instead of touching the device
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: FirCommand,
}

#[derive(Subcommand, Debug)]
enum FirCommand {
    /// Upload a file of raw 32-bit coefficient words
    Coefficients {
        filename: PathBuf,
    },
    /// Set decimation and operation count
    Configuration {
        /// Decimation factor
        #[arg(short = 'd', long)]
        decimation: u32,

        /// Operations per output sample
        #[arg(short = 'o', long)]
        operations: u32,

        /// Odd number of operations
        #[arg(short = 'O', long)]
        odd_operations: bool,
    },
}

fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn register_map(cli: &Cli) -> SdrResult<FirRegisterMap> {
    match (&cli.csr_json, cli.csr_base) {
        (Some(path), _) => FirRegisterMap::from_csr_json(path),
        (None, Some(base)) => Ok(FirRegisterMap::from_base(base)),
        (None, None) if cli.dry_run => Ok(FirRegisterMap::from_base(0)),
        (None, None) => Err(SdrError::InvalidConfig(
            "FIR register addresses unknown: pass --csr-json or --csr-base".to_string(),
        )),
    }
}

fn execute<R: RegisterIo + ?Sized>(
    regs: &mut R,
    map: &FirRegisterMap,
    command: &FirCommand,
    coeffs: Option<&[u32]>,
) -> SdrResult<()> {
    match command {
        FirCommand::Coefficients { filename } => {
            let coeffs = coeffs.unwrap_or_default();
            let n = fir::upload_coefficients(regs, map, coeffs)?;
            println!("{} coefficients written from {}", n, filename.display());
        }
        FirCommand::Configuration {
            decimation,
            operations,
            odd_operations,
        } => {
            let config = FirConfig {
                decimation: *decimation,
                operations: *operations,
                odd_operations: *odd_operations,
            };
            fir::apply_configuration(regs, map, &config)?;
            println!(
                "decimation={} operations={} odd_operations={}",
                decimation, operations, odd_operations
            );
        }
    }
    Ok(())
}

#[cfg(feature = "litepcie")]
fn open_registers(device: &str) -> SdrResult<Box<dyn RegisterIo>> {
    Ok(Box::new(iq_sdr::litepcie::LitePcieRegisters::open(device)?))
}

#[cfg(not(feature = "litepcie"))]
fn open_registers(device: &str) -> SdrResult<Box<dyn RegisterIo>> {
    Err(SdrError::unavailable(device, "built without litepcie support"))
}

fn run(cli: &Cli) -> SdrResult<()> {
    let map = register_map(cli)?;

    // Validate inputs before the first register write
    let coeffs = match &cli.command {
        FirCommand::Coefficients { filename } => Some(fir::load_coefficients(filename)?),
        FirCommand::Configuration { .. } => None,
    };

    if cli.dry_run {
        let mut regs = RecordingRegisters::default();
        execute(&mut regs, &map, &cli.command, coeffs.as_deref())?;
        for (addr, value) in &regs.writes {
            println!("0x{:08x} <- 0x{:08x}", addr, value);
        }
        return Ok(());
    }

    let device = format!("/dev/litepcie{}", cli.device_num);
    let mut regs = open_registers(&device)?;
    execute(regs.as_mut(), &map, &cli.command, coeffs.as_deref())
}

fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_level(cli.verbose)),
    )
    .init();

    log::info!("fir-util: device {}", cli.device_num);

    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1800").unwrap(), 0x1800);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "fir-util",
            "-c",
            "1",
            "--csr-base",
            "0x100",
            "configuration",
            "-d",
            "4",
            "-o",
            "32",
            "-O",
        ])
        .unwrap();
        assert_eq!(cli.device_num, 1);
        assert_eq!(cli.csr_base, Some(0x100));
        match cli.command {
            FirCommand::Configuration {
                decimation,
                operations,
                odd_operations,
            } => {
                assert_eq!(decimation, 4);
                assert_eq!(operations, 32);
                assert!(odd_operations);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["fir-util", "coefficients"]).is_err());
        assert!(Cli::try_parse_from(["fir-util", "configuration", "-d", "4"]).is_err());
    }

    #[test]
    fn test_verbose_raises_log_level() {
        let cli = Cli::try_parse_from(["fir-util", "-v", "--dry-run", "coefficients", "taps.bin"])
            .unwrap();
        assert_eq!(default_log_level(cli.verbose), "info");
        let cli =
            Cli::try_parse_from(["fir-util", "--dry-run", "coefficients", "taps.bin"]).unwrap();
        assert_eq!(default_log_level(cli.verbose), "warn");
    }

    #[test]
    fn test_register_map_required_outside_dry_run() {
        let cli = Cli::try_parse_from(["fir-util", "coefficients", "taps.bin"]).unwrap();
        assert!(register_map(&cli).is_err());
        let cli =
            Cli::try_parse_from(["fir-util", "--dry-run", "coefficients", "taps.bin"]).unwrap();
        assert_eq!(register_map(&cli).unwrap(), FirRegisterMap::from_base(0));
    }

    #[test]
    fn test_execute_configuration() {
        let map = FirRegisterMap::from_base(0x100);
        let mut regs = RecordingRegisters::default();
        let cmd = FirCommand::Configuration {
            decimation: 2,
            operations: 8,
            odd_operations: false,
        };
        execute(&mut regs, &map, &cmd, None).unwrap();
        assert_eq!(
            regs.writes,
            vec![(map.decimation, 2), (map.operations_minus_one, 7), (map.cfg, 0)]
        );
    }

    #[test]
    fn test_malformed_file_rejected_before_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taps.bin");
        std::fs::write(&path, [0u8; 15]).unwrap();
        let cli = Cli::try_parse_from([
            "fir-util",
            "--csr-base",
            "0",
            "-c",
            "99",
            "coefficients",
            path.to_str().unwrap(),
        ])
        .unwrap();
        match run(&cli) {
            Err(SdrError::MalformedConfigFile { .. }) => {}
            other => panic!("expected malformed file error, got {:?}", other.err()),
        }
    }
}
