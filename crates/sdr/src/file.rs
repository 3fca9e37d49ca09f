// Copyright 2025-2026 CEMAXECUTER LLC

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::pacer::Pacer;
use crate::{DmaTransport, SdrError, SdrResult, DMA_BUFFER_WORDS};

/// IQ sample format for file input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Complex int8 (CS8): pairs of i8
    Ci8,
    /// Raw little-endian int16 words exactly as the DMA delivered them
    /// (the stream stride applies).
    #[default]
    Ci16,
    /// Complex float32 (CF32): pairs of f32, little-endian
    Cf32,
}

impl SampleFormat {
    fn bytes_per_word(self) -> usize {
        match self {
            SampleFormat::Ci8 => 1,
            SampleFormat::Ci16 => 2,
            SampleFormat::Cf32 => 4,
        }
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ci8" => Ok(SampleFormat::Ci8),
            "ci16" => Ok(SampleFormat::Ci16),
            "cf32" => Ok(SampleFormat::Cf32),
            other => Err(format!(
                "unknown sample format: {} (use ci8, ci16, or cf32)",
                other
            )),
        }
    }
}

/// Replays a recorded IQ capture as DMA-sized buffers of int16 words,
/// paced at the capture's sample rate.
pub struct FileTransport {
    path: PathBuf,
    device: String,
    format: SampleFormat,
    reader: BufReader<File>,
    looped: bool,
    armed: bool,
    exhausted: bool,
    pacer: Pacer,
    raw: Vec<u8>,
    words: Vec<i16>,
}

impl FileTransport {
    pub fn open(
        path: impl AsRef<Path>,
        format: SampleFormat,
        sample_rate: u32,
        looped: bool,
    ) -> SdrResult<Self> {
        let path = path.as_ref().to_path_buf();
        let device = path.display().to_string();
        let file = File::open(&path)
            .map_err(|e| SdrError::unavailable(&device, format!("failed to open: {}", e)))?;

        // complex samples per buffer, assuming I/Q pairs
        let samples_per_buffer = DMA_BUFFER_WORDS / 2;

        Ok(Self {
            path,
            device,
            format,
            reader: BufReader::with_capacity(1024 * 1024, file),
            looped,
            armed: false,
            exhausted: false,
            pacer: Pacer::new(samples_per_buffer, sample_rate as f64),
            raw: vec![0u8; DMA_BUFFER_WORDS * format.bytes_per_word()],
            words: Vec::with_capacity(DMA_BUFFER_WORDS),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `self.raw` as far as the file allows. Returns bytes read.
    fn read_raw(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.raw.len() {
            match self.reader.read(&mut self.raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Convert `n` raw bytes into int16 words.
    fn decode(&mut self, n: usize) {
        let word_bytes = self.format.bytes_per_word();
        let count = n / word_bytes;
        self.words.clear();
        self.words.resize(count, 0);
        match self.format {
            SampleFormat::Ci8 => {
                // Scale i8 [-128, 127] to i16 range by shifting left 8
                for (dst, &b) in self.words.iter_mut().zip(&self.raw[..count]) {
                    *dst = (b as i8 as i16) << 8;
                }
            }
            SampleFormat::Ci16 => {
                LittleEndian::read_i16_into(&self.raw[..count * 2], &mut self.words);
            }
            SampleFormat::Cf32 => {
                let mut floats = vec![0f32; count];
                LittleEndian::read_f32_into(&self.raw[..count * 4], &mut floats);
                // Convert float [-1, 1] to int16
                for (dst, f) in self.words.iter_mut().zip(floats) {
                    *dst = (f * 32767.0).clamp(-32768.0, 32767.0) as i16;
                }
            }
        }
    }

    fn next_block(&mut self) -> io::Result<bool> {
        let mut n = self.read_raw()?;
        if n == 0 && self.looped {
            self.reader.seek(SeekFrom::Start(0))?;
            n = self.read_raw()?;
        }
        if n < self.format.bytes_per_word() {
            return Ok(false);
        }
        self.decode(n);
        Ok(true)
    }
}

impl DmaTransport for FileTransport {
    fn start(&mut self) -> SdrResult<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.exhausted = false;
        self.armed = true;
        self.pacer.reset();
        log::info!("replaying IQ from {} ({:?})", self.device, self.format);
        Ok(())
    }

    fn poll_next_buffer(&mut self) -> Option<&[i16]> {
        if !self.armed || self.exhausted || !self.pacer.try_release() {
            return None;
        }
        match self.next_block() {
            Ok(true) => Some(&self.words),
            Ok(false) => {
                log::info!("end of file: {}", self.device);
                self.exhausted = true;
                None
            }
            Err(e) => {
                log::error!("read error on {}: {}", self.device, e);
                self.exhausted = true;
                None
            }
        }
    }

    fn stop(&mut self) {
        self.armed = false;
    }

    fn device(&self) -> &str {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn capture(words: &[i16]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for w in words {
            f.write_all(&w.to_le_bytes()).unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_open_missing_file() {
        match FileTransport::open("/nonexistent/capture.bin", SampleFormat::Ci16, 0, false) {
            Err(SdrError::DeviceUnavailable { device, .. }) => {
                assert_eq!(device, "/nonexistent/capture.bin")
            }
            _ => panic!("expected DeviceUnavailable"),
        }
    }

    #[test]
    fn test_replay_ci16_words() {
        let words: Vec<i16> = (0..64).map(|v| v * 10 - 320).collect();
        let f = capture(&words);
        let mut t = FileTransport::open(f.path(), SampleFormat::Ci16, 0, false).unwrap();

        // nothing before start
        assert!(t.poll_next_buffer().is_none());

        t.start().unwrap();
        let buf = t.poll_next_buffer().expect("one buffer").to_vec();
        assert_eq!(buf, words);
        // short file, not looped: exhausted
        assert!(t.poll_next_buffer().is_none());
    }

    #[test]
    fn test_replay_looped() {
        let words = [1i16, 2, 3, 4];
        let f = capture(&words);
        let mut t = FileTransport::open(f.path(), SampleFormat::Ci16, 0, true).unwrap();
        t.start().unwrap();
        for _ in 0..3 {
            assert_eq!(t.poll_next_buffer().unwrap(), &words);
        }
    }

    #[test]
    fn test_ci8_scaling() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[1u8, 0xff, 0x7f, 0x80]).unwrap();
        f.flush().unwrap();
        let mut t = FileTransport::open(f.path(), SampleFormat::Ci8, 0, false).unwrap();
        t.start().unwrap();
        assert_eq!(t.poll_next_buffer().unwrap(), &[256, -256, 32512, -32768]);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("cf32".parse::<SampleFormat>().unwrap(), SampleFormat::Cf32);
        assert!("u8".parse::<SampleFormat>().is_err());
    }
}
