use pichime_core::{
    Actuator, ActuatorError, AudioActuator, AudioSink, DutyCycle, OutputPin, PulseActuator,
    SoundLibrary, Urgency,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingPin {
    writes: Mutex<Vec<bool>>,
}

impl RecordingPin {
    fn writes(&self) -> Vec<bool> {
        self.writes.lock().unwrap().clone()
    }

    fn on_count(&self) -> usize {
        self.writes().iter().filter(|on| **on).count()
    }
}

impl OutputPin for RecordingPin {
    fn set(&self, on: bool) -> Result<(), ActuatorError> {
        self.writes.lock().unwrap().push(on);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkCall {
    Play(PathBuf),
    Halt,
}

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, clip: &Path) -> Result<Duration, ActuatorError> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Play(clip.to_path_buf()));
        Ok(Duration::from_millis(200))
    }

    fn halt(&self) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(SinkCall::Halt);
        Ok(())
    }
}

fn slow_cycle() -> DutyCycle {
    DutyCycle {
        on: Duration::from_millis(400),
        off: Duration::from_millis(400),
    }
}

fn pulse(pin: &Arc<RecordingPin>, cycle: DutyCycle) -> PulseActuator {
    let pin: Arc<dyn OutputPin> = pin.clone();
    PulseActuator::new("tone", pin, cycle)
}

fn library_with(tiers: &[(&str, &str)]) -> (tempfile::TempDir, SoundLibrary) {
    let dir = tempfile::tempdir().unwrap();
    for (tier, file) in tiers {
        let tier_dir = dir.path().join(tier);
        std::fs::create_dir_all(&tier_dir).unwrap();
        std::fs::write(tier_dir.join(file), b"clip").unwrap();
    }
    let library = SoundLibrary::new(dir.path());
    (dir, library)
}

#[test]
fn starting_twice_leaves_exactly_one_worker() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = pulse(&pin, slow_cycle());

    actuator.start().unwrap();
    actuator.start().unwrap();
    std::thread::sleep(Duration::from_millis(150));

    assert!(actuator.is_running());
    assert_eq!(pin.on_count(), 1);
    actuator.stop().unwrap();
}

#[test]
fn concurrent_starts_spawn_one_worker() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = Arc::new(pulse(&pin, slow_cycle()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let actuator = Arc::clone(&actuator);
            std::thread::spawn(move || actuator.start().unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    std::thread::sleep(Duration::from_millis(150));

    assert_eq!(pin.on_count(), 1);
    actuator.stop().unwrap();
}

#[test]
fn stop_while_idle_is_an_immediate_no_op() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = pulse(&pin, slow_cycle());

    let started = Instant::now();
    actuator.stop().unwrap();
    actuator.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert!(pin.writes().is_empty());
    assert!(!actuator.is_running());
}

#[test]
fn no_output_after_stop_returns() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = pulse(
        &pin,
        DutyCycle {
            on: Duration::from_millis(30),
            off: Duration::from_millis(30),
        },
    );

    actuator.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    actuator.stop().unwrap();

    let at_stop = pin.writes();
    assert_eq!(at_stop.last(), Some(&false));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(pin.writes(), at_stop);
}

#[test]
fn stop_interrupts_a_long_on_phase_promptly() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = pulse(
        &pin,
        DutyCycle {
            on: Duration::from_secs(30),
            off: Duration::from_secs(30),
        },
    );

    actuator.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    actuator.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(pin.writes(), vec![true, false]);
}

#[test]
fn pulse_can_restart_after_stop() {
    let pin = Arc::new(RecordingPin::default());
    let actuator = pulse(&pin, slow_cycle());

    actuator.start().unwrap();
    actuator.stop().unwrap();
    actuator.start().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(actuator.is_running());
    actuator.stop().unwrap();
    assert_eq!(pin.on_count(), 2);
}

#[test]
fn audio_plays_a_clip_from_the_requested_tier() {
    let (dir, library) = library_with(&[("urgent", "siren.wav"), ("very", "horn.wav")]);
    let sink = Arc::new(RecordingSink::default());
    let audio = AudioActuator::new(sink.clone(), library);

    audio.start(Urgency::Urgent).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(audio.current_urgency(), Some(Urgency::Urgent));
    assert_eq!(
        sink.calls().first(),
        Some(&SinkCall::Play(dir.path().join("urgent").join("siren.wav")))
    );

    audio.stop().unwrap();
    assert_eq!(sink.calls().last(), Some(&SinkCall::Halt));
    assert_eq!(audio.current_urgency(), None);
}

#[test]
fn audio_restarts_only_when_urgency_changes() {
    let (dir, library) = library_with(&[("urgent", "siren.wav"), ("very", "horn.wav")]);
    let sink = Arc::new(RecordingSink::default());
    let audio = AudioActuator::new(sink.clone(), library);

    audio.start(Urgency::Urgent).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    audio.start(Urgency::Urgent).unwrap();
    assert!(!sink.calls().contains(&SinkCall::Halt));

    audio.start(Urgency::Very).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let calls = sink.calls();
    let halt_at = calls.iter().position(|c| *c == SinkCall::Halt).unwrap();
    assert!(calls[..halt_at]
        .iter()
        .all(|c| *c == SinkCall::Play(dir.path().join("urgent").join("siren.wav"))));
    assert_eq!(
        calls[halt_at + 1],
        SinkCall::Play(dir.path().join("very").join("horn.wav"))
    );
    assert_eq!(audio.current_urgency(), Some(Urgency::Very));
    audio.stop().unwrap();
}

#[test]
fn audio_loops_the_clip_until_stopped() {
    let (_dir, library) = library_with(&[("somewhat", "bell.wav")]);
    let sink = Arc::new(RecordingSink::default());
    let audio = AudioActuator::new(sink.clone(), library);

    audio.start(Urgency::Somewhat).unwrap();
    std::thread::sleep(Duration::from_millis(500));
    audio.stop().unwrap();

    let plays = sink
        .calls()
        .iter()
        .filter(|c| matches!(c, SinkCall::Play(_)))
        .count();
    assert!(plays >= 2, "expected the clip to loop, saw {plays} plays");
    let at_stop = sink.calls();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(sink.calls(), at_stop);
}

#[test]
fn missing_tier_is_silent_and_never_fails() {
    let (_dir, library) = library_with(&[("urgent", "siren.wav")]);
    let sink = Arc::new(RecordingSink::default());
    let audio = AudioActuator::new(sink.clone(), library);

    audio.start(Urgency::Extremely).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(audio.current_urgency(), Some(Urgency::Extremely));
    assert!(sink.calls().is_empty());

    audio.stop().unwrap();
    assert_eq!(sink.calls(), vec![SinkCall::Halt]);
}
