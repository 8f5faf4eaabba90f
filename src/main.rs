//! Immersive Headtrack - Main Entry Point
//!
//! Runs the head-tracked camera loop headless. Tracking arrives over OSC;
//! operator commands are read from stdin, one per line:
//!
//! ```text
//! up | down | left | right      nudge the head one step
//! pos <x> <y> <z>              place the head (room units)
//! preset <a|b> <n>             load a viewpoint preset on one display
//! reset                        return both cameras to their baseline
//! quit                         exit
//! ```
//!
//! Usage: `immersive-headtrack [settings.xml]`

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use immersive_headtrack::settings::HeadTrackSettings;
use immersive_headtrack::telemetry::{init_logging, LogConfig};
use immersive_headtrack::{App, ManualCommand, TraceRenderer};

/// How often the loop logs eye positions and receiver counters
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Lines read from the operator console
enum ConsoleInput {
    Command(ManualCommand),
    Quit,
}

/// Read stdin on a background thread so the frame loop never blocks
fn spawn_console() -> Receiver<ConsoleInput> {
    let (sender, receiver) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("headtrack-console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let input = if trimmed.eq_ignore_ascii_case("quit") {
                    ConsoleInput::Quit
                } else if let Some(command) = ManualCommand::parse(trimmed) {
                    ConsoleInput::Command(command)
                } else {
                    tracing::warn!("Unknown command: '{}'", trimmed);
                    continue;
                };
                if sender.send(input).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("Console input unavailable: {}", e);
    }
    receiver
}

fn load_settings() -> Result<HeadTrackSettings, String> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            tracing::info!("Loading settings from {}", path.display());
            HeadTrackSettings::load_from_file(&path)
                .map_err(|e| format!("Failed to load {}: {}", path.display(), e))
        }
        None => Ok(HeadTrackSettings::load_or_default()),
    }
}

fn main() -> ExitCode {
    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&LogConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Immersive Headtrack v{}", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Target FPS: {}", settings.target_fps);

    let mut app = match App::new(settings) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match app.start_tracking() {
        Ok(Some(addr)) => tracing::info!("Waiting for head positions on {}", addr),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to start tracking: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let console = spawn_console();
    let mut console_open = true;
    let mut renderer = TraceRenderer::new();
    let frame_interval = app.frame_interval();
    let mut last_status = Instant::now();

    loop {
        let frame_start = Instant::now();

        while console_open {
            match console.try_recv() {
                Ok(ConsoleInput::Command(command)) => app.queue_command(command),
                Ok(ConsoleInput::Quit) => {
                    tracing::info!("Shutting down after {} frames", app.frame_count());
                    return ExitCode::SUCCESS;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // stdin closed; keep running on tracking alone
                    console_open = false;
                }
            }
        }

        let report = app.frame(&mut renderer);

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            match app.receiver_stats() {
                Some(stats) => tracing::info!(
                    packets = stats.packets,
                    accepted = stats.accepted,
                    dropped = stats.dropped,
                    "Frame {}: {}",
                    report.frame,
                    app.status_line()
                ),
                None => tracing::info!("Frame {}: {}", report.frame, app.status_line()),
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_interval {
            std::thread::sleep(frame_interval - elapsed);
        }
    }
}
