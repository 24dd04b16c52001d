//! Idle/alarming state machine that ties storage, outputs and the unlock
//! channel together.
//!
//! # Invariants
//! - Within one tick: dismissal check, then fetch, then aggregation, then
//!   actuator reconciliation, then token rotation.
//! - Demands only accumulate during an episode; they are cleared solely on
//!   the `Alarming -> Idle` transition.
//! - On that transition every actuator is stopped before events are
//!   announced.
//! - An episode that requested remote unlock ends only when the most
//!   recently issued token has been consumed. Any other episode ends when
//!   the snooze clears the alarm gate.

use super::announce::{Announcer, TokenDisplay};
use super::clock::{Clock, SystemClock};
use crate::actuator::{Actuator, AudioActuator, PulseActuator};
use crate::repo::reminder_store::ReminderStore;
use crate::schedule::aggregate::{aggregate, AlarmState};
use crate::schedule::due::fetch_due;
use crate::unlock::{UnlockSignal, UnlockToken};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RUN_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Alarming,
}

impl LoopState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Alarming => "alarming",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub idle_poll: Duration,
    pub alarm_poll: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(60),
            alarm_poll: Duration::from_secs(30),
        }
    }
}

/// Edge-triggered local cancel input.
#[derive(Debug, Clone, Default)]
pub struct SnoozeHandle(Arc<AtomicBool>);

impl SnoozeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_pressed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consumes a pending press.
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Everything the loop drives or informs.
pub struct Outputs {
    pub tone: PulseActuator,
    pub vibration: PulseActuator,
    pub audio: AudioActuator,
    pub announcer: Box<dyn Announcer>,
    pub display: Box<dyn TokenDisplay>,
}

pub struct ControlLoop<S, U> {
    store: S,
    unlock: U,
    outputs: Outputs,
    timing: LoopTiming,
    clock: Box<dyn Clock>,
    snooze: SnoozeHandle,
    state: LoopState,
    alarm: AlarmState,
    alarm_trigger: bool,
    issued_token: Option<UnlockToken>,
}

impl<S: ReminderStore, U: UnlockSignal> ControlLoop<S, U> {
    pub fn new(store: S, unlock: U, outputs: Outputs, timing: LoopTiming) -> Self {
        Self {
            store,
            unlock,
            outputs,
            timing,
            clock: Box::new(SystemClock),
            snooze: SnoozeHandle::new(),
            state: LoopState::Idle,
            alarm: AlarmState::new(),
            alarm_trigger: false,
            issued_token: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn snooze_handle(&self) -> SnoozeHandle {
        self.snooze.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn alarm_state(&self) -> &AlarmState {
        &self.alarm
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Logs a one-time summary of stored reminders and the unlock channel.
    pub fn log_startup_diagnostics(&self) {
        match self.store.list_reminders() {
            Ok(scan) => {
                let pending = scan.reminders.iter().filter(|r| !r.consumed).count();
                info!(
                    "event=startup_diagnostics module=alarm status=ok reminders={} pending={} consumed={} malformed={}",
                    scan.reminders.len(),
                    pending,
                    scan.reminders.len() - pending,
                    scan.malformed.len()
                );
                for malformed in &scan.malformed {
                    warn!(
                        "event=startup_diagnostics module=alarm status=malformed reminder_id={} error={}",
                        malformed.reminder_id, malformed.reason
                    );
                }
            }
            Err(err) => error!(
                "event=startup_diagnostics module=alarm status=error error_code=storage_unavailable error={err}"
            ),
        }
        match self.unlock.read_active() {
            Ok(active) => info!("event=startup_diagnostics module=alarm unlock_active={active}"),
            Err(err) => warn!("event=startup_diagnostics module=alarm status=error error={err}"),
        }
    }

    /// Runs exactly one tick and returns the delay before the next one.
    pub fn step(&mut self) -> Duration {
        match self.state {
            LoopState::Idle => self.idle_tick(),
            LoopState::Alarming => self.alarm_tick(),
        }
    }

    /// Repeats [`Self::step`] until `shutdown` is raised, then stops every
    /// output. The unlock channel is left as is so a restart can resume.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("event=control_loop module=alarm status=start");
        while !shutdown.load(Ordering::SeqCst) {
            let delay = self.step();
            self.wait(delay, shutdown);
        }
        self.stop_outputs();
        self.outputs.display.clear();
        info!("event=control_loop module=alarm status=stopped");
    }

    fn wait(&self, delay: Duration, shutdown: &AtomicBool) {
        let deadline = Instant::now() + delay;
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            if self.snooze_can_dismiss() && self.snooze.is_pressed() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(RUN_SLICE.min(deadline - now));
        }
    }

    /// Whether a snooze press may cut the current wait short. In a
    /// remote-unlock episode it never does, so each displayed token stays
    /// valid for a full alarm period.
    fn snooze_can_dismiss(&self) -> bool {
        self.state == LoopState::Alarming && !self.alarm.remote_unlock_requested
    }

    fn idle_tick(&mut self) -> Duration {
        if self.snooze.take() {
            debug!("event=snooze module=alarm status=ignored state=idle");
        }

        self.poll();

        if !self.alarm.remote_unlock_requested {
            match self.unlock.read_active() {
                Ok(true) => {
                    info!("event=unlock_resume module=alarm status=ok");
                    self.alarm.remote_unlock_requested = true;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!("event=unlock_read module=alarm status=error state=idle error={err}")
                }
            }
        }

        if !(self.alarm_trigger || self.alarm.is_alarming()) {
            return self.timing.idle_poll;
        }

        self.transition(LoopState::Alarming);
        self.service_outputs();
        self.timing.alarm_poll
    }

    fn alarm_tick(&mut self) -> Duration {
        if self.should_dismiss() {
            self.dismiss();
            return self.timing.idle_poll;
        }
        self.poll();
        self.service_outputs();
        self.timing.alarm_poll
    }

    fn poll(&mut self) {
        let now = self.clock.now();
        let due = match fetch_due(&self.store, now) {
            Ok(due) => due,
            // Already logged as a storage failure; the next tick retries.
            Err(_) => return,
        };
        if due.reminders.is_empty() {
            return;
        }
        let aggregation = aggregate(&self.store, &due.reminders, now);
        self.alarm.merge(aggregation.state);
        self.alarm_trigger = true;
    }

    fn should_dismiss(&mut self) -> bool {
        if self.snooze.take() {
            info!("event=snooze module=alarm status=ok state=alarming");
            self.alarm_trigger = false;
        }

        if !self.alarm.remote_unlock_requested {
            return !self.alarm_trigger;
        }
        if self.issued_token.is_none() {
            return false;
        }
        match self.unlock.read_active() {
            Ok(active) => !active,
            Err(err) => {
                warn!(
                    "event=unlock_read module=alarm status=error state=alarming assumed=active error={err}"
                );
                false
            }
        }
    }

    fn service_outputs(&mut self) {
        reconcile_pulse(&self.outputs.tone, self.alarm.tone);
        reconcile_pulse(&self.outputs.vibration, self.alarm.vibration);
        self.reconcile_audio();
        if self.alarm.remote_unlock_requested {
            self.rotate_token();
        }
    }

    fn reconcile_audio(&self) {
        let audio = &self.outputs.audio;
        let result = match (self.alarm.max_urgency(), audio.current_urgency()) {
            (Some(target), current) if current != Some(target) => audio.start(target),
            (None, Some(_)) => audio.stop(),
            _ => Ok(()),
        };
        if let Err(err) = result {
            error!("event=actuator_reconcile module=alarm actuator=audio status=error error={err}");
        }
    }

    fn rotate_token(&mut self) {
        match self.unlock.activate() {
            Ok(token) => {
                self.outputs.display.show(&token);
                self.issued_token = Some(token);
            }
            Err(err) => {
                // No token is known to be live until the next successful write.
                self.issued_token = None;
                error!("event=unlock_activate module=alarm status=error error={err}");
            }
        }
    }

    fn dismiss(&mut self) {
        self.transition(LoopState::Idle);
        self.stop_outputs();
        self.outputs.announcer.announce(&self.alarm.affected_events());

        self.alarm.reset();
        self.alarm_trigger = false;
        self.issued_token = None;
        if let Err(err) = self.unlock.deactivate() {
            warn!("event=unlock_deactivate module=alarm status=error error={err}");
        }
        self.outputs.display.clear();
    }

    fn stop_outputs(&self) {
        let actuators: [&dyn Actuator; 3] = [
            &self.outputs.tone,
            &self.outputs.vibration,
            &self.outputs.audio,
        ];
        for actuator in actuators {
            if let Err(err) = actuator.stop() {
                error!(
                    "event=actuator_stop module=alarm actuator={} status=error error={err}",
                    actuator.name()
                );
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        info!(
            "event=state_change module=alarm from={} to={} events={}",
            self.state.as_str(),
            next.as_str(),
            self.alarm.affected_events.len()
        );
        self.state = next;
    }
}

fn reconcile_pulse(actuator: &PulseActuator, wanted: bool) {
    let result = match (wanted, actuator.is_running()) {
        (true, false) => actuator.start(),
        (false, true) => actuator.stop(),
        _ => Ok(()),
    };
    if let Err(err) = result {
        error!(
            "event=actuator_reconcile module=alarm actuator={} status=error error={err}",
            actuator.name()
        );
    }
}
