// Copyright 2025-2026 CEMAXECUTER LLC

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::raw::{c_int, c_void};
use std::os::unix::io::AsRawFd;
use std::slice;

use crate::regs::RegisterIo;
use crate::{DmaTransport, SdrError, SdrResult};

mod ffi {
    use std::os::raw::{c_char, c_int, c_void};

    extern "C" {
        pub fn iqscope_dma_open(device: *const c_char, zero_copy: u8) -> *mut c_void;
        pub fn iqscope_dma_set_writer(dma: *mut c_void, enable: c_int);
        pub fn iqscope_dma_process(dma: *mut c_void);
        pub fn iqscope_dma_next_read_buffer(dma: *mut c_void) -> *mut c_char;
        pub fn iqscope_dma_buffer_size() -> u32;
        pub fn iqscope_dma_close(dma: *mut c_void);

        pub fn litepcie_writel(fd: c_int, addr: u32, val: u32);
        pub fn litepcie_readl(fd: c_int, addr: u32) -> u32;
    }
}

/// LitePCIe DMA writer (device -> host) session.
pub struct LitePcieTransport {
    device: String,
    dma: *mut c_void,
    words: usize,
    armed: bool,
}

// The DMA control block is only touched by the owning worker thread
unsafe impl Send for LitePcieTransport {}

impl LitePcieTransport {
    /// Open the device and map its DMA buffers. May block briefly in the kernel.
    pub fn open(device: &str, zero_copy: bool) -> SdrResult<Self> {
        let cs = CString::new(device)
            .map_err(|e| SdrError::unavailable(device, format!("CString error: {}", e)))?;

        let dma = unsafe { ffi::iqscope_dma_open(cs.as_ptr(), zero_copy as u8) };
        if dma.is_null() {
            return Err(SdrError::unavailable(device, "litepcie_dma_init failed"));
        }

        let words = unsafe { ffi::iqscope_dma_buffer_size() } as usize / 2;
        log::info!("LitePCIe DMA opened: {} (zero_copy={})", device, zero_copy);

        Ok(Self {
            device: device.to_string(),
            dma,
            words,
            armed: false,
        })
    }
}

impl DmaTransport for LitePcieTransport {
    fn start(&mut self) -> SdrResult<()> {
        unsafe {
            ffi::iqscope_dma_set_writer(self.dma, 1);
            ffi::iqscope_dma_process(self.dma);
        }
        self.armed = true;
        Ok(())
    }

    fn poll_next_buffer(&mut self) -> Option<&[i16]> {
        if !self.armed {
            return None;
        }
        unsafe {
            let mut buf = ffi::iqscope_dma_next_read_buffer(self.dma);
            if buf.is_null() {
                // Update DMA status, then retry once
                ffi::iqscope_dma_process(self.dma);
                buf = ffi::iqscope_dma_next_read_buffer(self.dma);
            }
            if buf.is_null() {
                None
            } else {
                // DMA buffers are page aligned
                Some(slice::from_raw_parts(buf as *const i16, self.words))
            }
        }
    }

    fn stop(&mut self) {
        if self.armed {
            unsafe {
                ffi::iqscope_dma_set_writer(self.dma, 0);
                ffi::iqscope_dma_process(self.dma);
            }
            self.armed = false;
        }
    }

    fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for LitePcieTransport {
    fn drop(&mut self) {
        self.stop();
        unsafe { ffi::iqscope_dma_close(self.dma) };
        log::info!("LitePCIe DMA closed: {}", self.device);
    }
}

/// CSR access through the LitePCIe character device.
pub struct LitePcieRegisters {
    file: File,
}

impl LitePcieRegisters {
    pub fn open(device: &str) -> SdrResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| SdrError::unavailable(device, format!("could not init driver: {}", e)))?;
        Ok(Self { file })
    }

    fn fd(&self) -> c_int {
        self.file.as_raw_fd()
    }
}

impl RegisterIo for LitePcieRegisters {
    fn write32(&mut self, address: u32, value: u32) -> SdrResult<()> {
        unsafe { ffi::litepcie_writel(self.fd(), address, value) };
        Ok(())
    }

    fn read32(&mut self, address: u32) -> SdrResult<u32> {
        Ok(unsafe { ffi::litepcie_readl(self.fd(), address) })
    }
}
