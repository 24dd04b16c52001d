//! Process configuration loaded from a TOML file.
//!
//! # Invariants
//! - Every field has a default, so an empty file is a valid config.
//! - Relative paths are resolved against the config file's directory.
//! - A config that passed [`AppConfig::validate`] never yields a token
//!   shorter than 32 characters or a zero poll period.

use crate::actuator::DutyCycle;
use crate::alarm::LoopTiming;
use crate::unlock::token::{MAX_TOKEN_LEN, MIN_TOKEN_LEN};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Where alarm clips are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioBackend {
    /// The host sound device; falls back to `Log` when it cannot be opened.
    #[default]
    Device,
    /// Playback is only logged.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Directory holding `alarm.txt` and `unlock.txt`.
    pub unlock_dir: PathBuf,
    /// Root with one sub-directory of clips per urgency tier.
    pub sounds_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub idle_poll_secs: u64,
    pub alarm_poll_secs: u64,
    pub token_len: usize,
    pub pulse_on_ms: u64,
    pub pulse_off_ms: u64,
    /// Assumed clip length when a file has no readable WAV header.
    pub default_clip_secs: u64,
    pub audio_backend: AudioBackend,
    /// Output device name; the host default when unset.
    pub audio_device: Option<String>,
    pub tone_pin: Option<PathBuf>,
    pub vibration_pin: Option<PathBuf>,
    pub unlock_base_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/pichime.db"),
            unlock_dir: PathBuf::from("data"),
            sounds_dir: PathBuf::from("sounds"),
            log_dir: PathBuf::from("logs"),
            log_level: crate::logging::default_log_level().to_string(),
            idle_poll_secs: 60,
            alarm_poll_secs: 30,
            token_len: MIN_TOKEN_LEN,
            pulse_on_ms: 1000,
            pulse_off_ms: 1500,
            default_clip_secs: 5,
            audio_backend: AudioBackend::Device,
            audio_device: None,
            tone_pin: None,
            vibration_pin: None,
            unlock_base_url: None,
        }
    }
}

impl AppConfig {
    /// Loads, resolves and validates a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(current_dir);
        let config = config.resolved(&absolutize(&base));
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise defaults resolved against the
    /// working directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default().resolved(&current_dir());
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Rewrites relative paths as children of `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.database_path);
        resolve(&mut self.unlock_dir);
        resolve(&mut self.sounds_dir);
        resolve(&mut self.log_dir);
        if let Some(pin) = self.tone_pin.as_mut() {
            resolve(pin);
        }
        if let Some(pin) = self.vibration_pin.as_mut() {
            resolve(pin);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&self.token_len) {
            return Err(ConfigError::Invalid(format!(
                "token_len must be between {MIN_TOKEN_LEN} and {MAX_TOKEN_LEN}, got {}",
                self.token_len
            )));
        }
        if self.idle_poll_secs == 0 || self.alarm_poll_secs == 0 {
            return Err(ConfigError::Invalid(
                "idle_poll_secs and alarm_poll_secs must be positive".to_string(),
            ));
        }
        if self.pulse_on_ms == 0 {
            return Err(ConfigError::Invalid("pulse_on_ms must be positive".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path cannot be empty".to_string()));
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            idle_poll: Duration::from_secs(self.idle_poll_secs),
            alarm_poll: Duration::from_secs(self.alarm_poll_secs),
        }
    }

    pub fn duty_cycle(&self) -> DutyCycle {
        DutyCycle {
            on: Duration::from_millis(self.pulse_on_ms),
            off: Duration::from_millis(self.pulse_off_ms),
        }
    }

    pub fn default_clip_len(&self) -> Duration {
        Duration::from_secs(self.default_clip_secs)
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir().join(path)
    }
}
