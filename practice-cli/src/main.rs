//! # Practice CLI
//!
//! Terminal frontend around one `PracticeSession`. It loads an
//! expected-event timeline from a JSON file, acquires the default
//! microphone, drives the tick loop against a wall-clock transport, and
//! prints live status plus the end-of-session summary.
//!
//! ## Architecture
//! - **Capture**: CPAL stream owned by the session, frames over a
//!   crossbeam channel
//! - **Tick loop**: fixed 50 ms period on the main thread; no work
//!   survives the loop ending
//! - **Transport**: wall-clock stand-in for the external playback engine

mod transport;

use std::fs::File;
use std::io::BufReader;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use practice_core::{
    feedback, ExpectedEvent, Mode, PracticeSession, SessionConfig, SkillLevel,
};
use transport::WallClockTransport;

/// Tick period for the processing loop. Capture frames arrive at ~46 ms
/// (2048 samples at 44.1 kHz), so 50 ms keeps at most one frame pending.
const TICK_PERIOD: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(about = "Practice a score against live microphone input")]
struct Args {
    /// Path to a timeline JSON file (array of expected events).
    timeline: String,

    /// Pause playback until each note is held correctly.
    #[arg(long)]
    wait: bool,

    /// Skill level.
    #[arg(long, value_enum, default_value = "beginner")]
    skill: SkillArg,

    /// Playback tempo as a percentage of the score tempo.
    #[arg(long, default_value_t = 100.0)]
    tempo: f32,
}

/// CLI-side mirror of [`SkillLevel`]; implementing clap's `ValueEnum` on
/// the core's enum from here would fall foul of the orphan rule, and the
/// headless core does not take a clap dependency.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SkillArg {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<SkillArg> for SkillLevel {
    fn from(arg: SkillArg) -> Self {
        match arg {
            SkillArg::Beginner => SkillLevel::Beginner,
            SkillArg::Intermediate => SkillLevel::Intermediate,
            SkillArg::Advanced => SkillLevel::Advanced,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let skill_level = SkillLevel::from(args.skill);
    let mode = if args.wait { Mode::Wait } else { Mode::Flow };

    let events = load_timeline(&args.timeline)?;
    let end = events.last().map(|e| e.end_time).unwrap_or(0.0);

    let config = SessionConfig {
        skill_level,
        mode,
        tempo_scale: args.tempo,
        ..SessionConfig::default()
    };
    let mut session = PracticeSession::new(events, config, WallClockTransport::new(end))
        .context("building practice session")?;
    session
        .acquire_capture()
        .context("starting audio capture")?;

    info!("practicing {} at {:?} level, {:?} mode", args.timeline, skill_level, mode);
    run_session(&mut session);

    let stats = session.stats();
    println!();
    println!("{}", feedback::session_summary(&stats, skill_level));
    println!("Next step: {}", feedback::next_step(&stats, skill_level));
    Ok(())
}

/// The cooperative tick loop: one session owns capture and transport for
/// its whole lifetime, and nothing runs after the loop returns.
fn run_session(session: &mut PracticeSession<WallClockTransport>) {
    let mut last_line = String::new();
    loop {
        let update = session.tick(Instant::now());

        for result in &update.finalized {
            println!("  event {:>3}: {}", result.event_index, feedback::remark(result));
        }

        let line = status_line(&update);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        if update.finished {
            break;
        }
        thread::sleep(TICK_PERIOD);
    }
}

fn status_line(update: &practice_core::TickUpdate) -> String {
    let position = match update.event_index {
        Some(index) => format!("event {index}"),
        None => "--".to_string(),
    };
    let heard = match update.observation.frequency_hz {
        Some(freq) => format!("{freq:.1} Hz"),
        None => "silence".to_string(),
    };
    let state = if update.transport_running {
        "playing"
    } else {
        "waiting"
    };
    format!(
        "[{state}] {position}, hearing {heard}, score {}",
        update.stats.overall_score
    )
}

fn load_timeline(path: &str) -> Result<Vec<ExpectedEvent>> {
    let file = File::open(path).with_context(|| format!("opening timeline {path}"))?;
    let events: Vec<ExpectedEvent> =
        serde_json::from_reader(BufReader::new(file)).context("parsing timeline JSON")?;
    Ok(events)
}
