//! Duty-cycle actuator used for tone and vibration.

use super::{lock_state, sleep_while_alive, Actuator, ActuatorError, OutputPin, Worker};
use log::{info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub on: Duration,
    pub off: Duration,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            on: Duration::from_millis(1000),
            off: Duration::from_millis(1500),
        }
    }
}

/// Toggles one [`OutputPin`] on a fixed duty cycle while running.
pub struct PulseActuator {
    name: &'static str,
    pin: Arc<dyn OutputPin>,
    cycle: DutyCycle,
    worker: Mutex<Option<Worker>>,
}

impl PulseActuator {
    pub fn new(name: &'static str, pin: Arc<dyn OutputPin>, cycle: DutyCycle) -> Self {
        Self {
            name,
            pin,
            cycle,
            worker: Mutex::new(None),
        }
    }

    /// Spawns the drive loop unless one is already running.
    pub fn start(&self) -> Result<(), ActuatorError> {
        let mut worker = lock_state(&self.worker);
        if worker.is_some() {
            return Ok(());
        }
        let name = self.name;
        let pin = Arc::clone(&self.pin);
        let cycle = self.cycle;
        *worker = Some(Worker::spawn(name, move |alive| {
            drive(name, pin.as_ref(), cycle, alive)
        })?);
        info!("event=actuator_start module=actuator actuator={name} status=ok");
        Ok(())
    }
}

impl Actuator for PulseActuator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_running(&self) -> bool {
        lock_state(&self.worker).is_some()
    }

    fn stop(&self) -> Result<(), ActuatorError> {
        let mut worker = lock_state(&self.worker);
        let Some(running) = worker.take() else {
            return Ok(());
        };
        let joined = running.shutdown();
        let lowered = self.pin.set(false);
        info!(
            "event=actuator_stop module=actuator actuator={} status={}",
            self.name,
            if joined.is_ok() && lowered.is_ok() { "ok" } else { "error" }
        );
        joined.and(lowered)
    }
}

fn drive(name: &'static str, pin: &dyn OutputPin, cycle: DutyCycle, alive: &AtomicBool) {
    let set = |on: bool| {
        if let Err(err) = pin.set(on) {
            warn!("event=output_set module=actuator actuator={name} status=error error={err}");
        }
    };
    loop {
        set(true);
        if !sleep_while_alive(alive, cycle.on) {
            break;
        }
        set(false);
        if !sleep_while_alive(alive, cycle.off) {
            break;
        }
    }
}
