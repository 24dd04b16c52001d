//! `pichime` command-line entry point.
//!
//! # Responsibility
//! - Run the alarm daemon.
//! - Give a web front end and the operator shell access to unlock, add,
//!   list and withdraw.
//!
//! # Invariants
//! - Only startup failures exit non-zero; the daemon loop itself never
//!   exits on a tick error.

use chrono::{Local, NaiveDateTime, Timelike};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use pichime_core::model::reminder::parse_timestamp;
use pichime_core::{
    AppConfig, AudioActuator, AudioBackend, AudioSink, ControlLoop, EventId, EventOverview,
    EventService, FilePin, FileUnlockChannel, ListOrder, LogAnnouncer, LogAudioSink, LogPin,
    LogTokenDisplay, OutputPin, Outputs, PulseActuator, Reminder, ReminderDraft, RepeatKind,
    SoundLibrary, SqliteEventRepository, SubmitEventRequest, UnlockOutcome, UnlockSignal, Urgency,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "pichime", version, about = "Household reminder alarm")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the alarm control loop.
    Run {
        /// Mirror logs to stderr and stop when stdin closes.
        #[arg(long)]
        foreground: bool,
    },
    /// Present an unlock token; exits 0 on unlock, 1 on rejection.
    Unlock { token: String },
    /// Add an event with one reminder.
    Add(AddArgs),
    /// List visible events.
    List {
        /// Earliest reminder first.
        #[arg(long)]
        asc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Withdraw an event and consume its reminders.
    Withdraw { event_id: EventId },
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Local time, `YYYY-MM-DD HH:MM`.
    #[arg(long, value_parser = parse_at)]
    at: NaiveDateTime,
    #[arg(long)]
    tone: bool,
    #[arg(long)]
    vibration: bool,
    #[arg(long)]
    remote_unlock: bool,
    /// Requests audio from this tier.
    #[arg(long)]
    urgency: Option<Urgency>,
    #[arg(long, default_value = "never")]
    repeat: RepeatKind,
}

fn parse_at(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value).map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("pichime: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<ExitCode, String> {
    let config = AppConfig::load(cli.config.as_deref()).map_err(|err| err.to_string())?;
    match cli.command {
        Command::Run { foreground } => run_daemon(&config, foreground).map(|()| ExitCode::SUCCESS),
        Command::Unlock { token } => unlock(&config, &token),
        Command::Add(args) => add(&config, args).map(|()| ExitCode::SUCCESS),
        Command::List { asc, json } => list(&config, asc, json).map(|()| ExitCode::SUCCESS),
        Command::Withdraw { event_id } => withdraw(&config, event_id).map(|()| ExitCode::SUCCESS),
    }
}

fn run_daemon(config: &AppConfig, foreground: bool) -> Result<(), String> {
    pichime_core::init_logging(&config.log_level, &config.log_dir, foreground)?;
    let conn = pichime_core::open_db(&config.database_path).map_err(|err| err.to_string())?;
    let store = SqliteEventRepository::new(&conn);
    let unlock = FileUnlockChannel::new(&config.unlock_dir, config.token_len);

    let outputs = Outputs {
        tone: PulseActuator::new(
            "tone",
            output_pin("tone", config.tone_pin.as_deref()),
            config.duty_cycle(),
        ),
        vibration: PulseActuator::new(
            "vibration",
            output_pin("vibration", config.vibration_pin.as_deref()),
            config.duty_cycle(),
        ),
        audio: AudioActuator::new(audio_sink(config), SoundLibrary::new(&config.sounds_dir)),
        announcer: Box::new(LogAnnouncer),
        display: Box::new(LogTokenDisplay::new(config.unlock_base_url.clone())),
    };

    let mut control = ControlLoop::new(store, unlock, outputs, config.loop_timing());
    control.log_startup_diagnostics();

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_stdin_snooze(control.snooze_handle(), foreground.then(|| Arc::clone(&shutdown)))?;

    control.run(&shutdown);
    Ok(())
}

fn audio_sink(config: &AppConfig) -> Arc<dyn AudioSink> {
    let fallback = || -> Arc<dyn AudioSink> {
        Arc::new(LogAudioSink::new(config.default_clip_len()))
    };
    match config.audio_backend {
        AudioBackend::Log => fallback(),
        AudioBackend::Device => match open_device_sink(config.audio_device.as_deref()) {
            Ok(sink) => sink,
            Err(reason) => {
                warn!("event=audio_backend module=cli status=fallback backend=log reason={reason}");
                fallback()
            }
        },
    }
}

#[cfg(feature = "device-audio")]
fn open_device_sink(device: Option<&str>) -> Result<Arc<dyn AudioSink>, String> {
    pichime_core::CpalAudioSink::open(device)
        .map(|sink| Arc::new(sink) as Arc<dyn AudioSink>)
        .map_err(|err| err.to_string())
}

#[cfg(not(feature = "device-audio"))]
fn open_device_sink(_device: Option<&str>) -> Result<Arc<dyn AudioSink>, String> {
    Err("built without the device-audio feature".to_string())
}

fn output_pin(name: &'static str, path: Option<&Path>) -> Arc<dyn OutputPin> {
    match path {
        Some(path) => Arc::new(FilePin::new(path)),
        None => Arc::new(LogPin::new(name)),
    }
}

/// Each stdin line is one snooze press; end of input raises `shutdown`
/// when given.
fn spawn_stdin_snooze(
    snooze: pichime_core::SnoozeHandle,
    shutdown: Option<Arc<AtomicBool>>,
) -> Result<(), String> {
    std::thread::Builder::new()
        .name("pichime-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(_) => {
                        info!("event=snooze_input module=cli status=pressed");
                        snooze.press();
                    }
                    Err(err) => {
                        warn!("event=snooze_input module=cli status=error error={err}");
                        break;
                    }
                }
            }
            if let Some(shutdown) = shutdown {
                info!("event=snooze_input module=cli status=closed");
                shutdown.store(true, Ordering::SeqCst);
            }
        })
        .map(|_| ())
        .map_err(|err| format!("failed to spawn stdin reader: {err}"))
}

fn unlock(config: &AppConfig, token: &str) -> Result<ExitCode, String> {
    let channel = FileUnlockChannel::new(&config.unlock_dir, config.token_len);
    match channel.attempt_unlock(token).map_err(|err| err.to_string())? {
        UnlockOutcome::Unlocked => {
            println!("unlocked");
            Ok(ExitCode::SUCCESS)
        }
        UnlockOutcome::Rejected => {
            println!("rejected");
            Ok(ExitCode::from(1))
        }
    }
}

fn add(config: &AppConfig, args: AddArgs) -> Result<(), String> {
    let conn = pichime_core::open_db(&config.database_path).map_err(|err| err.to_string())?;
    let service = EventService::new(SqliteEventRepository::new(&conn));
    let request = SubmitEventRequest {
        title: args.title,
        description: args.description,
        reminders: vec![ReminderDraft {
            fire_at: args.at,
            tone: args.tone,
            vibration: args.vibration,
            remote_unlock: args.remote_unlock,
            urgency: args.urgency,
            repeat: args.repeat,
        }],
    };
    let id = service
        .submit(request, local_now())
        .map_err(|err| err.to_string())?;
    println!("{id}");
    Ok(())
}

fn list(config: &AppConfig, asc: bool, json: bool) -> Result<(), String> {
    let conn = pichime_core::open_db(&config.database_path).map_err(|err| err.to_string())?;
    let service = EventService::new(SqliteEventRepository::new(&conn));
    let order = if asc { ListOrder::Asc } else { ListOrder::Desc };
    let overviews = service.list(order).map_err(|err| err.to_string())?;

    if json {
        let rendered = serde_json::to_string_pretty(&overviews).map_err(|err| err.to_string())?;
        println!("{rendered}");
        return Ok(());
    }
    for overview in &overviews {
        print_overview(overview);
    }
    Ok(())
}

fn print_overview(overview: &EventOverview) {
    let status = if overview.all_consumed { "done" } else { "pending" };
    println!("{}  {}  [{status}]", overview.event.uuid, overview.event.title);
    if !overview.event.description.is_empty() {
        println!("    {}", overview.event.description);
    }
    for reminder in &overview.reminders {
        println!(
            "    - {} repeat={} outputs={}{}",
            reminder.fire_at.format("%Y-%m-%d %H:%M"),
            reminder.repeat,
            describe_outputs(reminder),
            if reminder.consumed { " consumed" } else { "" }
        );
    }
    for malformed in &overview.malformed {
        println!(
            "    ! unreadable reminder {}: {}",
            malformed.reminder_id, malformed.reason
        );
    }
}

fn describe_outputs(reminder: &Reminder) -> String {
    if !reminder.requests_output() {
        return "none".to_string();
    }
    let mut outputs = Vec::new();
    if reminder.tone {
        outputs.push("tone".to_string());
    }
    if reminder.vibration {
        outputs.push("vibration".to_string());
    }
    if reminder.remote_unlock {
        outputs.push("remote-unlock".to_string());
    }
    if let Some(urgency) = reminder.urgency {
        outputs.push(format!("audio:{urgency}"));
    }
    outputs.join(",")
}

fn withdraw(config: &AppConfig, event_id: EventId) -> Result<(), String> {
    let conn = pichime_core::open_db(&config.database_path).map_err(|err| err.to_string())?;
    let service = EventService::new(SqliteEventRepository::new(&conn));
    service.withdraw(event_id).map_err(|err| err.to_string())?;
    println!("withdrawn {event_id}");
    Ok(())
}

fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
