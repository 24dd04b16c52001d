//! Clip playback on a real sound device through cpal.
//!
//! # Invariants
//! - One dedicated thread owns the device and its output stream.
//! - Starting a clip drops the previous stream first, so two clips never
//!   overlap.
//! - Dropping the sink ends the playback thread.

use super::audio::{decode_wav, AudioSink, DecodedClip};
use super::{lock_state, ActuatorError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum DeviceCommand {
    Play {
        clip: PathBuf,
        reply: Sender<Result<Duration, ActuatorError>>,
    },
    Halt {
        reply: Sender<Result<(), ActuatorError>>,
    },
}

/// Plays WAV clips through the default or a named output device.
pub struct CpalAudioSink {
    commands: Mutex<Sender<DeviceCommand>>,
}

impl CpalAudioSink {
    /// Opens `device_name`, or the host's default output device when
    /// `None`, and starts the playback thread.
    pub fn open(device_name: Option<&str>) -> Result<Self, ActuatorError> {
        let (commands, inbox) = mpsc::channel();
        let (opened_tx, opened_rx) = mpsc::channel();
        let wanted = device_name.map(str::to_string);
        std::thread::Builder::new()
            .name("pichime-sound-device".to_string())
            .spawn(move || {
                let device = match open_device(wanted.as_deref()) {
                    Ok(device) => {
                        let _ = opened_tx.send(Ok(()));
                        device
                    }
                    Err(err) => {
                        let _ = opened_tx.send(Err(err));
                        return;
                    }
                };
                serve(&device, &inbox);
            })
            .map_err(|source| ActuatorError::Spawn {
                actuator: "sound-device",
                source,
            })?;

        opened_rx
            .recv()
            .map_err(|_| ActuatorError::WorkerPanicked("sound-device"))??;
        Ok(Self {
            commands: Mutex::new(commands),
        })
    }

    fn send(&self, command: DeviceCommand) -> Result<(), ActuatorError> {
        lock_state(&self.commands)
            .send(command)
            .map_err(|_| ActuatorError::Audio("sound device thread has exited".to_string()))
    }
}

impl AudioSink for CpalAudioSink {
    fn play(&self, clip: &Path) -> Result<Duration, ActuatorError> {
        let (reply, answer) = mpsc::channel();
        self.send(DeviceCommand::Play {
            clip: clip.to_path_buf(),
            reply,
        })?;
        answer
            .recv()
            .map_err(|_| ActuatorError::WorkerPanicked("sound-device"))?
    }

    fn halt(&self) -> Result<(), ActuatorError> {
        let (reply, answer) = mpsc::channel();
        self.send(DeviceCommand::Halt { reply })?;
        answer
            .recv()
            .map_err(|_| ActuatorError::WorkerPanicked("sound-device"))?
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device, ActuatorError> {
    let host = cpal::default_host();
    let device = match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| ActuatorError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|device| {
                device
                    .description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| ActuatorError::Audio(format!("output device `{name}` not found")))?,
        None => host
            .default_output_device()
            .ok_or_else(|| ActuatorError::Audio("no default output device".to_string()))?,
    };
    let device_name = device
        .description()
        .map(|desc| desc.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("event=audio_device module=actuator status=ok device={device_name}");
    Ok(device)
}

fn serve(device: &cpal::Device, inbox: &Receiver<DeviceCommand>) {
    let mut current: Option<cpal::Stream> = None;
    while let Ok(command) = inbox.recv() {
        match command {
            DeviceCommand::Play { clip, reply } => {
                current = None;
                let result = decode_wav(&clip).and_then(|decoded| {
                    let length = decoded.length();
                    current = Some(start_stream(device, decoded)?);
                    Ok(length)
                });
                if let Err(err) = &result {
                    warn!(
                        "event=audio_play module=actuator status=error clip={} error={err}",
                        clip.display()
                    );
                }
                let _ = reply.send(result);
            }
            DeviceCommand::Halt { reply } => {
                current = None;
                let _ = reply.send(Ok(()));
            }
        }
    }
    drop(current);
    info!("event=audio_device module=actuator status=closed");
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
}

fn start_stream(device: &cpal::Device, clip: DecodedClip) -> Result<cpal::Stream, ActuatorError> {
    let config = cpal::StreamConfig {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: clip.samples,
        position: 0,
    }));
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = lock_state(&buffer);
                for sample in data.iter_mut() {
                    *sample = buf.samples.get(buf.position).copied().unwrap_or(0.0);
                    buf.position = buf.position.saturating_add(1);
                }
            },
            move |err| {
                error!("event=audio_stream module=actuator status=error error={err}");
            },
            None,
        )
        .map_err(|e| ActuatorError::Audio(format!("failed to build output stream: {e}")))?;
    stream
        .play()
        .map_err(|e| ActuatorError::Audio(format!("failed to start output stream: {e}")))?;
    Ok(stream)
}
