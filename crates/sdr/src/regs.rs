//! CSR register access and the FIR register map

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{SdrError, SdrResult};

/// LiteX CSR registers are 32-bit aligned
pub const CSR_STRIDE: u32 = 4;

/// Synchronous 32-bit register access on one device.
pub trait RegisterIo {
    fn write32(&mut self, address: u32, value: u32) -> SdrResult<()>;
    fn read32(&mut self, address: u32) -> SdrResult<u32>;
}

/// Addresses of the FIR decimator CSRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirRegisterMap {
    pub cfg: u32,
    pub decimation: u32,
    pub coeff_waddr: u32,
    pub coeff_wdata: u32,
    pub operations_minus_one: u32,
}

const FIR_CSR_NAMES: [&str; 5] = [
    "fir_cfg",
    "fir_decimation",
    "fir_coeff_waddr",
    "fir_coeff_wdata",
    "fir_operations_minus_one",
];

impl FirRegisterMap {
    /// Registers laid out consecutively from `base` in gateware declaration order.
    pub fn from_base(base: u32) -> Self {
        Self {
            cfg: base,
            decimation: base + CSR_STRIDE,
            coeff_waddr: base + 2 * CSR_STRIDE,
            coeff_wdata: base + 3 * CSR_STRIDE,
            operations_minus_one: base + 4 * CSR_STRIDE,
        }
    }

    /// Load addresses from a LiteX `csr.json`.
    pub fn from_csr_json(path: &Path) -> SdrResult<Self> {
        let text = fs::read_to_string(path)?;
        let root: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            SdrError::MalformedConfigFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Self::from_csr_value(&root).map_err(|reason| SdrError::MalformedConfigFile {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_csr_value(root: &serde_json::Value) -> Result<Self, String> {
        let regs = root
            .get("csr_registers")
            .and_then(|r| r.as_object())
            .ok_or_else(|| "missing csr_registers".to_string())?;

        let mut addrs = [0u32; 5];
        for (slot, suffix) in addrs.iter_mut().zip(FIR_CSR_NAMES) {
            let (_, entry) = regs
                .iter()
                .find(|(name, _)| name.ends_with(suffix))
                .ok_or_else(|| format!("no register ending in {}", suffix))?;
            let addr = entry
                .get("addr")
                .and_then(|a| a.as_u64())
                .ok_or_else(|| format!("register {} has no addr", suffix))?;
            *slot = u32::try_from(addr).map_err(|_| format!("{} address out of range", suffix))?;
        }

        Ok(Self {
            cfg: addrs[0],
            decimation: addrs[1],
            coeff_waddr: addrs[2],
            coeff_wdata: addrs[3],
            operations_minus_one: addrs[4],
        })
    }
}

/// Register sink that records writes instead of touching hardware.
///
/// Reads return the last value written to the address, or zero.
#[derive(Debug, Default)]
pub struct RecordingRegisters {
    pub writes: Vec<(u32, u32)>,
}

impl RegisterIo for RecordingRegisters {
    fn write32(&mut self, address: u32, value: u32) -> SdrResult<()> {
        self.writes.push((address, value));
        Ok(())
    }

    fn read32(&mut self, address: u32) -> SdrResult<u32> {
        Ok(self
            .writes
            .iter()
            .rev()
            .find(|(a, _)| *a == address)
            .map(|&(_, v)| v)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_base() {
        let map = FirRegisterMap::from_base(0x1000);
        assert_eq!(map.cfg, 0x1000);
        assert_eq!(map.coeff_waddr, 0x1008);
        assert_eq!(map.operations_minus_one, 0x1010);
    }

    #[test]
    fn test_from_csr_value() {
        let root = json!({
            "csr_bases": {},
            "csr_registers": {
                "sdr_processing_fir_cfg": {"addr": 0x3000, "size": 1, "type": "rw"},
                "sdr_processing_fir_decimation": {"addr": 0x3004, "size": 1, "type": "rw"},
                "sdr_processing_fir_coeff_waddr": {"addr": 0x3008, "size": 1, "type": "rw"},
                "sdr_processing_fir_coeff_wdata": {"addr": 0x300c, "size": 1, "type": "rw"},
                "sdr_processing_fir_operations_minus_one": {"addr": 0x3010, "size": 1, "type": "rw"},
                "sdr_processing_fir_status": {"addr": 0x3014, "size": 1, "type": "ro"}
            }
        });
        let map = FirRegisterMap::from_csr_value(&root).unwrap();
        assert_eq!(map, FirRegisterMap::from_base(0x3000));
    }

    #[test]
    fn test_from_csr_value_missing_register() {
        let root = json!({"csr_registers": {"sdr_processing_fir_cfg": {"addr": 0}}});
        let err = FirRegisterMap::from_csr_value(&root).unwrap_err();
        assert!(err.contains("fir_decimation"), "{}", err);
    }

    #[test]
    fn test_recording_read_back() {
        let mut regs = RecordingRegisters::default();
        regs.write32(4, 1).unwrap();
        regs.write32(4, 7).unwrap();
        assert_eq!(regs.read32(4).unwrap(), 7);
        assert_eq!(regs.read32(8).unwrap(), 0);
    }
}
