//! On/off output pins.

use super::ActuatorError;
use log::info;
use std::path::{Path, PathBuf};

/// A single on/off output such as a buzzer or vibration motor.
pub trait OutputPin: Send + Sync {
    fn set(&self, on: bool) -> Result<(), ActuatorError>;
}

/// Logs transitions instead of driving hardware.
#[derive(Debug, Clone)]
pub struct LogPin {
    name: &'static str,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl OutputPin for LogPin {
    fn set(&self, on: bool) -> Result<(), ActuatorError> {
        info!(
            "event=output_set module=actuator pin={} value={}",
            self.name,
            u8::from(on)
        );
        Ok(())
    }
}

/// Writes `1`/`0` to a file, e.g. a sysfs GPIO `value` file.
#[derive(Debug, Clone)]
pub struct FilePin {
    path: PathBuf,
}

impl FilePin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputPin for FilePin {
    fn set(&self, on: bool) -> Result<(), ActuatorError> {
        std::fs::write(&self.path, if on { "1" } else { "0" }).map_err(|source| {
            ActuatorError::Output {
                path: self.path.clone(),
                source,
            }
        })
    }
}
