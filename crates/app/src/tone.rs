// Copyright 2025-2026 CEMAXECUTER LLC

use std::process::{Child, Command, Stdio};

/// Arguments for the external tone generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSettings {
    pub program: String,
    pub device: Option<u32>,
    pub frequency: i64,
    pub sample_rate: i64,
    pub amplitude: f64,
    pub zero_copy: bool,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            program: "m2sdr_tone".to_string(),
            device: None,
            frequency: 1000,
            sample_rate: 30_720_000,
            amplitude: 1.0,
            zero_copy: false,
        }
    }
}

impl ToneSettings {
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dev) = self.device {
            args.push("-c".to_string());
            args.push(dev.to_string());
        }
        args.push("-f".to_string());
        args.push(self.frequency.to_string());
        args.push("-s".to_string());
        args.push(self.sample_rate.to_string());
        args.push("-a".to_string());
        args.push(format!("{:.6}", self.amplitude.clamp(0.0, 1.0)));
        if self.zero_copy {
            args.push("-z".to_string());
        }
        args
    }
}

/// A running tone generator. Killed on `stop` or drop.
pub struct ToneProcess {
    child: Option<Child>,
    program: String,
}

impl ToneProcess {
    pub fn start(settings: &ToneSettings) -> Result<Self, String> {
        let args = settings.args();
        let child = Command::new(&settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to start {}: {}", settings.program, e))?;
        log::info!("tone: started {} {} (pid {})", settings.program, args.join(" "), child.id());
        Ok(Self {
            child: Some(child),
            program: settings.program.clone(),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    /// True while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill and reap the child. A no-op once stopped.
    pub fn stop(&mut self) -> Result<(), String> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(None) = child.try_wait() {
            child
                .kill()
                .map_err(|e| format!("failed to kill {}: {}", self.program, e))?;
        }
        let status = child
            .wait()
            .map_err(|e| format!("failed to reap {}: {}", self.program, e))?;
        log::info!("tone: {} exited ({})", self.program, status);
        Ok(())
    }
}

impl Drop for ToneProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("tone: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let settings = ToneSettings::default();
        assert_eq!(
            settings.args(),
            vec!["-f", "1000", "-s", "30720000", "-a", "1.000000"]
        );

        let settings = ToneSettings {
            device: Some(1),
            amplitude: 3.0,
            zero_copy: true,
            ..ToneSettings::default()
        };
        assert_eq!(
            settings.args(),
            vec!["-c", "1", "-f", "1000", "-s", "30720000", "-a", "1.000000", "-z"]
        );

        let settings = ToneSettings {
            amplitude: -0.5,
            ..ToneSettings::default()
        };
        assert!(settings.args().contains(&"0.000000".to_string()));
    }

    #[test]
    fn test_missing_program() {
        let settings = ToneSettings {
            program: "/nonexistent/m2sdr_tone".to_string(),
            ..ToneSettings::default()
        };
        assert!(ToneProcess::start(&settings).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_start_and_stop() {
        // `true` ignores its arguments and exits at once
        let settings = ToneSettings {
            program: "true".to_string(),
            ..ToneSettings::default()
        };
        let mut proc = ToneProcess::start(&settings).unwrap();
        assert!(proc.id().is_some());
        proc.stop().unwrap();
        assert!(!proc.is_running());
        assert!(proc.id().is_none());
        proc.stop().unwrap();
    }
}
