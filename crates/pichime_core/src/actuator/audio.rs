//! Looped audio playback selected by urgency tier.
//!
//! # Invariants
//! - The running worker always plays the urgency recorded next to it.
//! - Changing urgency stops the old worker before the new one starts.
//! - A tier with no clips plays nothing and never fails the caller.

use super::{lock_state, sleep_while_alive, Actuator, ActuatorError, Worker};
use crate::model::reminder::Urgency;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shortest wait between two plays of the same clip.
const MIN_CLIP_LEN: Duration = Duration::from_millis(100);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Plays one clip at a time.
pub trait AudioSink: Send + Sync {
    /// Starts `clip` and returns its playback length.
    fn play(&self, clip: &Path) -> Result<Duration, ActuatorError>;
    fn halt(&self) -> Result<(), ActuatorError>;
}

/// Logs playback instead of driving a sound device.
#[derive(Debug, Clone)]
pub struct LogAudioSink {
    default_clip_len: Duration,
}

impl LogAudioSink {
    pub fn new(default_clip_len: Duration) -> Self {
        Self { default_clip_len }
    }
}

impl AudioSink for LogAudioSink {
    fn play(&self, clip: &Path) -> Result<Duration, ActuatorError> {
        let length = wav_length(clip).unwrap_or(self.default_clip_len);
        info!(
            "event=audio_play module=actuator clip={} length_ms={}",
            clip.display(),
            length.as_millis()
        );
        Ok(length)
    }

    fn halt(&self) -> Result<(), ActuatorError> {
        info!("event=audio_halt module=actuator status=ok");
        Ok(())
    }
}

/// Reads a clip's length from its WAV header.
pub fn wav_length(path: &Path) -> Option<Duration> {
    let reader = hound::WavReader::open(path).ok()?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(sample_rate),
    ))
}

/// A WAV clip decoded to interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedClip {
    pub fn length(&self) -> Duration {
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }
}

/// Reads every sample of a WAV clip.
pub fn decode_wav(path: &Path) -> Result<DecodedClip, ActuatorError> {
    let decode_error = |err: hound::Error| {
        ActuatorError::Audio(format!("cannot decode `{}`: {err}", path.display()))
    };
    let mut reader = hound::WavReader::open(path).map_err(decode_error)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_error)?
        }
    };
    Ok(DecodedClip {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Sound files grouped in one directory per urgency tier.
#[derive(Debug, Clone)]
pub struct SoundLibrary {
    root: PathBuf,
}

impl SoundLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tier_dir(&self, urgency: Urgency) -> PathBuf {
        self.root.join(urgency.as_str())
    }

    /// Lists the regular files of a tier in name order; a missing tier
    /// directory is empty.
    pub fn clips(&self, urgency: Urgency) -> std::io::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(self.tier_dir(urgency)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut clips = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                clips.push(path);
            }
        }
        clips.sort();
        Ok(clips)
    }

    /// Picks one clip of the tier uniformly at random.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        urgency: Urgency,
        rng: &mut R,
    ) -> std::io::Result<Option<PathBuf>> {
        Ok(self.clips(urgency)?.choose(rng).cloned())
    }
}

/// Loops a randomly chosen clip of the current urgency tier.
pub struct AudioActuator {
    sink: Arc<dyn AudioSink>,
    library: Arc<SoundLibrary>,
    worker: Mutex<Option<(Urgency, Worker)>>,
}

impl AudioActuator {
    pub fn new(sink: Arc<dyn AudioSink>, library: SoundLibrary) -> Self {
        Self {
            sink,
            library: Arc::new(library),
            worker: Mutex::new(None),
        }
    }

    pub fn current_urgency(&self) -> Option<Urgency> {
        lock_state(&self.worker).as_ref().map(|(urgency, _)| *urgency)
    }

    /// Plays `urgency`; a no-op when already playing it, otherwise any
    /// running playback is stopped first.
    pub fn start(&self, urgency: Urgency) -> Result<(), ActuatorError> {
        let mut worker = lock_state(&self.worker);
        if let Some((current, _)) = worker.as_ref() {
            if *current == urgency {
                return Ok(());
            }
        }
        if let Some((previous, running)) = worker.take() {
            self.shutdown(running)?;
            info!(
                "event=audio_restart module=actuator from={previous} to={urgency} status=ok"
            );
        }

        let sink = Arc::clone(&self.sink);
        let library = Arc::clone(&self.library);
        let running = Worker::spawn("audio", move |alive| {
            play_loop(sink.as_ref(), &library, urgency, alive)
        })?;
        *worker = Some((urgency, running));
        info!("event=actuator_start module=actuator actuator=audio urgency={urgency} status=ok");
        Ok(())
    }

    fn shutdown(&self, running: Worker) -> Result<(), ActuatorError> {
        let joined = running.shutdown();
        let halted = self.sink.halt();
        joined.and(halted)
    }
}

impl Actuator for AudioActuator {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn is_running(&self) -> bool {
        lock_state(&self.worker).is_some()
    }

    fn stop(&self) -> Result<(), ActuatorError> {
        let mut worker = lock_state(&self.worker);
        let Some((_, running)) = worker.take() else {
            return Ok(());
        };
        let result = self.shutdown(running);
        info!(
            "event=actuator_stop module=actuator actuator=audio status={}",
            if result.is_ok() { "ok" } else { "error" }
        );
        result
    }
}

fn play_loop(sink: &dyn AudioSink, library: &SoundLibrary, urgency: Urgency, alive: &AtomicBool) {
    let clip = match library.pick(urgency, &mut rand::thread_rng()) {
        Ok(Some(clip)) => clip,
        Ok(None) => {
            warn!(
                "event=audio_select module=actuator status=missing urgency={urgency} dir={} playback=silent",
                library.tier_dir(urgency).display()
            );
            return;
        }
        Err(err) => {
            warn!(
                "event=audio_select module=actuator status=error urgency={urgency} playback=silent error={err}"
            );
            return;
        }
    };

    loop {
        let wait = match sink.play(&clip) {
            Ok(length) => length.max(MIN_CLIP_LEN),
            Err(err) => {
                warn!(
                    "event=audio_play module=actuator status=error clip={} error={err}",
                    clip.display()
                );
                RETRY_DELAY
            }
        };
        if !sleep_while_alive(alive, wait) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_wav, wav_length, SoundLibrary};
    use crate::actuator::ActuatorError;
    use crate::model::reminder::Urgency;
    use std::time::Duration;

    #[test]
    fn wav_length_reads_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beep.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert_eq!(wav_length(&path), Some(Duration::from_millis(500)));
    }

    #[test]
    fn non_wav_files_have_no_header_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.mp3");
        std::fs::write(&path, b"not a wav").unwrap();
        assert_eq!(wav_length(&path), None);
    }

    #[test]
    fn decode_wav_normalizes_integer_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 4000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..1000 {
            writer.write_sample(i16::MIN).unwrap();
            writer.write_sample(16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.sample_rate, 4000);
        assert_eq!(clip.samples.len(), 2000);
        assert_eq!(clip.samples[0], -1.0);
        assert_eq!(clip.samples[1], 0.5);
        assert_eq!(clip.length(), Duration::from_millis(250));
    }

    #[test]
    fn decode_wav_rejects_non_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.mp3");
        std::fs::write(&path, b"not a wav").unwrap();
        assert!(matches!(
            decode_wav(&path),
            Err(ActuatorError::Audio(ref message)) if message.contains("chime.mp3")
        ));
    }

    #[test]
    fn library_lists_tier_files_and_tolerates_missing_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let tier = dir.path().join("urgent");
        std::fs::create_dir_all(tier.join("nested")).unwrap();
        std::fs::write(tier.join("b.wav"), b"").unwrap();
        std::fs::write(tier.join("a.wav"), b"").unwrap();

        let library = SoundLibrary::new(dir.path());
        let clips = library.clips(Urgency::Urgent).unwrap();
        assert_eq!(clips, vec![tier.join("a.wav"), tier.join("b.wav")]);
        assert!(library.clips(Urgency::Extremely).unwrap().is_empty());

        let picked = library
            .pick(Urgency::Urgent, &mut rand::thread_rng())
            .unwrap()
            .unwrap();
        assert!(clips.contains(&picked));
    }
}
