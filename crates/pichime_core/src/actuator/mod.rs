//! Output actuators driven by the alarm control loop.
//!
//! # Responsibility
//! - Run one background drive loop per active output.
//! - Make `start`/`stop` idempotent and mutually exclusive per actuator.
//!
//! # Invariants
//! - At most one worker thread exists per actuator.
//! - `stop()` returns only after the worker has been joined and the output
//!   driven low.
//! - Workers re-check their liveness flag every `LIVENESS_SLICE`.

pub mod audio;
#[cfg(feature = "device-audio")]
pub mod device;
pub mod output;
pub mod pulse;

pub use audio::{decode_wav, AudioActuator, AudioSink, DecodedClip, LogAudioSink, SoundLibrary};
#[cfg(feature = "device-audio")]
pub use device::CpalAudioSink;
pub use output::{FilePin, LogPin, OutputPin};
pub use pulse::{DutyCycle, PulseActuator};

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub(crate) const LIVENESS_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum ActuatorError {
    /// Writing an output pin failed.
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Starting or stopping playback failed.
    Audio(String),
    /// The worker thread could not be spawned.
    Spawn {
        actuator: &'static str,
        source: std::io::Error,
    },
    /// The worker thread panicked before it was joined.
    WorkerPanicked(&'static str),
}

impl Display for ActuatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output { path, source } => {
                write!(f, "output `{}` write failed: {source}", path.display())
            }
            Self::Audio(message) => write!(f, "audio error: {message}"),
            Self::Spawn { actuator, source } => {
                write!(f, "failed to spawn {actuator} worker: {source}")
            }
            Self::WorkerPanicked(actuator) => write!(f, "{actuator} worker panicked"),
        }
    }
}

impl Error for ActuatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Output { source, .. } | Self::Spawn { source, .. } => Some(source),
            Self::Audio(_) | Self::WorkerPanicked(_) => None,
        }
    }
}

/// Common surface used when the control loop stops every output at once.
pub trait Actuator {
    fn name(&self) -> &'static str;
    fn is_running(&self) -> bool;
    fn stop(&self) -> Result<(), ActuatorError>;
}

/// One running drive loop and the flag that keeps it alive.
pub(crate) struct Worker {
    actuator: &'static str,
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn(
        actuator: &'static str,
        body: impl FnOnce(&AtomicBool) + Send + 'static,
    ) -> Result<Self, ActuatorError> {
        let alive = Arc::new(AtomicBool::new(true));
        let worker_alive = Arc::clone(&alive);
        let handle = std::thread::Builder::new()
            .name(format!("pichime-{actuator}"))
            .spawn(move || body(&worker_alive))
            .map_err(|source| ActuatorError::Spawn { actuator, source })?;
        Ok(Self {
            actuator,
            alive,
            handle,
        })
    }

    /// Clears the liveness flag and joins the thread.
    pub(crate) fn shutdown(self) -> Result<(), ActuatorError> {
        self.alive.store(false, Ordering::SeqCst);
        self.handle
            .join()
            .map_err(|_| ActuatorError::WorkerPanicked(self.actuator))
    }
}

/// Sleeps up to `duration` in `LIVENESS_SLICE` steps.
///
/// Returns `false` as soon as `alive` is cleared.
pub(crate) fn sleep_while_alive(alive: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !alive.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(LIVENESS_SLICE.min(deadline - now));
    }
}

/// Locks actuator state; a poisoned lock still guards a valid `Option`.
pub(crate) fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{sleep_while_alive, Worker};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn sleep_while_alive_returns_early_when_cleared() {
        let alive = AtomicBool::new(false);
        let started = Instant::now();
        assert!(!sleep_while_alive(&alive, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn worker_shutdown_joins_the_thread() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let worker_ticks = Arc::clone(&ticks);
        let worker = Worker::spawn("test", move |alive| {
            while sleep_while_alive(alive, Duration::from_millis(10)) {
                worker_ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        worker.shutdown().unwrap();

        let after_join = ticks.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), after_join);
    }
}
