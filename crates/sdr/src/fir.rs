// Copyright 2025-2026 CEMAXECUTER LLC

//! FIR decimator coefficient upload and stage configuration.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, NativeEndian};

use crate::regs::{FirRegisterMap, RegisterIo};
use crate::{SdrError, SdrResult};

/// Coefficients are stored as raw 32-bit words
pub const COEFF_WORD_SIZE: usize = 4;

/// Widths of the decimation and operations CSRs in the default gateware (7 bits)
pub const MAX_DECIMATION: u32 = (1 << 7) - 1;
pub const MAX_OPERATIONS: u32 = 1 << 7;

/// Decode a coefficient file image. Rejects anything that is not a whole
/// number of words.
pub fn parse_coefficients(path: &Path, bytes: &[u8]) -> SdrResult<Vec<u32>> {
    if bytes.len() % COEFF_WORD_SIZE != 0 {
        return Err(SdrError::MalformedConfigFile {
            path: path.to_path_buf(),
            reason: format!(
                "length {} is not a multiple of {} bytes",
                bytes.len(),
                COEFF_WORD_SIZE
            ),
        });
    }
    let mut words = vec![0u32; bytes.len() / COEFF_WORD_SIZE];
    NativeEndian::read_u32_into(bytes, &mut words);
    Ok(words)
}

/// Read and validate a coefficient file. No register is touched here, so a
/// malformed file never results in a partial upload.
pub fn load_coefficients(path: &Path) -> SdrResult<Vec<u32>> {
    let bytes = fs::read(path).map_err(|e| SdrError::MalformedConfigFile {
        path: path.to_path_buf(),
        reason: format!("read failed: {}", e),
    })?;
    parse_coefficients(path, &bytes)
}

/// Write coefficients one per iteration: the word index to the address CSR,
/// then the word to the data CSR. Returns the number of coefficients written.
pub fn upload_coefficients<R: RegisterIo + ?Sized>(
    regs: &mut R,
    map: &FirRegisterMap,
    coeffs: &[u32],
) -> SdrResult<usize> {
    for (index, &word) in coeffs.iter().enumerate() {
        regs.write32(map.coeff_waddr, index as u32)?;
        regs.write32(map.coeff_wdata, word)?;
    }
    log::info!("uploaded {} FIR coefficients", coeffs.len());
    Ok(coeffs.len())
}

/// FIR stage configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirConfig {
    pub decimation: u32,
    pub operations: u32,
    pub odd_operations: bool,
}

impl FirConfig {
    pub fn validate(&self) -> SdrResult<()> {
        if self.decimation == 0 || self.decimation > MAX_DECIMATION {
            return Err(SdrError::InvalidConfig(format!(
                "decimation must be 1..={} (got {})",
                MAX_DECIMATION, self.decimation
            )));
        }
        if self.operations == 0 || self.operations > MAX_OPERATIONS {
            return Err(SdrError::InvalidConfig(format!(
                "operations must be 1..={} (got {})",
                MAX_OPERATIONS, self.operations
            )));
        }
        Ok(())
    }
}

/// Program decimation, operation count and parity.
pub fn apply_configuration<R: RegisterIo + ?Sized>(
    regs: &mut R,
    map: &FirRegisterMap,
    config: &FirConfig,
) -> SdrResult<()> {
    config.validate()?;
    regs.write32(map.decimation, config.decimation)?;
    regs.write32(map.operations_minus_one, config.operations - 1)?;
    regs.write32(map.cfg, config.odd_operations as u32)?;
    log::info!(
        "FIR configured: decimation={} operations={} odd={}",
        config.decimation,
        config.operations,
        config.odd_operations
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::RecordingRegisters;
    use std::io::Write;

    fn map() -> FirRegisterMap {
        FirRegisterMap::from_base(0x100)
    }

    #[test]
    fn test_sixteen_byte_file_uploads_four_pairs() {
        let words = [0x11u32, 0x2222, 0x333333, 0x44444444];
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for w in words {
            f.write_all(&w.to_ne_bytes()).unwrap();
        }
        f.flush().unwrap();

        let coeffs = load_coefficients(f.path()).unwrap();
        let mut regs = RecordingRegisters::default();
        let n = upload_coefficients(&mut regs, &map(), &coeffs).unwrap();

        assert_eq!(n, 4);
        let m = map();
        let expected: Vec<(u32, u32)> = words
            .iter()
            .enumerate()
            .flat_map(|(i, &w)| [(m.coeff_waddr, i as u32), (m.coeff_wdata, w)])
            .collect();
        assert_eq!(regs.writes, expected);
    }

    #[test]
    fn test_fifteen_byte_file_rejected_before_write() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0u8; 15]).unwrap();
        f.flush().unwrap();

        let regs = RecordingRegisters::default();
        match load_coefficients(f.path()) {
            Err(SdrError::MalformedConfigFile { reason, .. }) => {
                assert!(reason.contains("15"), "{}", reason)
            }
            other => panic!("expected MalformedConfigFile, got {:?}", other.map(|v| v.len())),
        }
        assert!(regs.writes.is_empty());
    }

    #[test]
    fn test_missing_file_is_malformed() {
        let err = load_coefficients(Path::new("/nonexistent/taps.bin")).unwrap_err();
        assert!(matches!(err, SdrError::MalformedConfigFile { .. }));
    }

    #[test]
    fn test_apply_configuration() {
        let mut regs = RecordingRegisters::default();
        let cfg = FirConfig {
            decimation: 4,
            operations: 16,
            odd_operations: true,
        };
        apply_configuration(&mut regs, &map(), &cfg).unwrap();
        let m = map();
        assert_eq!(
            regs.writes,
            vec![(m.decimation, 4), (m.operations_minus_one, 15), (m.cfg, 1)]
        );
    }

    #[test]
    fn test_configuration_rejects_zero_operations() {
        let mut regs = RecordingRegisters::default();
        let cfg = FirConfig {
            decimation: 2,
            operations: 0,
            odd_operations: false,
        };
        assert!(apply_configuration(&mut regs, &map(), &cfg).is_err());
        assert!(regs.writes.is_empty());
    }
}
