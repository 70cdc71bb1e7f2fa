//! # Practice Session
//!
//! The owning object for one practice run: it constructs and holds the
//! pitch detector, synchronizer, controller and stats aggregator, talks to
//! the injected transport, and optionally owns the microphone capture for
//! its lifetime. Construction validates the timeline; teardown (drop or
//! [`PracticeSession::finish`]) releases the capture stream. There is no
//! multi-session concurrency: a new session must fully replace the old one.

use std::time::Instant;

use log::info;
use thiserror::Error;

use crate::audio::{AudioCapture, AudioFrame};
use crate::controller::{Mode, PracticeModeController, TransportCommand};
use crate::pitch::{DetectorConfig, PitchDetector};
use crate::stats::{SessionStats, SessionStatsAggregator};
use crate::sync::PlaybackSynchronizer;
use crate::timeline::{ExpectedEvent, Timeline, TimelineError};
use crate::tolerance::{self, SkillLevel};
use crate::validator::{self, ValidationResult};
use crate::{PitchObservation, TickUpdate};

/// Reasons a session cannot start.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The supplied expected-event timeline failed validation.
    #[error("invalid timeline: {0}")]
    Timeline(#[from] TimelineError),

    /// The audio capture resource could not be acquired (e.g. no
    /// microphone permission). The session never proceeds without input.
    #[error("audio capture unavailable: {0}")]
    Capture(#[source] anyhow::Error),
}

/// Per-session configuration supplied by the UI layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub skill_level: SkillLevel,
    pub mode: Mode,
    pub detector: DetectorConfig,
    /// Playback tempo as a percentage of the score tempo (100 = as written).
    pub tempo_scale: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            skill_level: SkillLevel::default(),
            mode: Mode::default(),
            detector: DetectorConfig::default(),
            tempo_scale: 100.0,
        }
    }
}

/// External playback engine interface. The core only issues commands and
/// reads the position; out-of-range seeks are the transport's job to clamp.
pub trait Transport {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, time: f64);
    fn set_tempo_scale(&mut self, percent: f32);
    /// Current playback position in seconds.
    fn position(&self) -> f64;
}

/// One live practice session.
pub struct PracticeSession<T: Transport> {
    skill_level: SkillLevel,
    detector: PitchDetector,
    synchronizer: PlaybackSynchronizer,
    controller: PracticeModeController,
    stats: SessionStatsAggregator,
    transport: T,
    capture: Option<AudioCapture>,
    last_observation: PitchObservation,
}

impl<T: Transport> PracticeSession<T> {
    /// Validates the timeline and assembles a session around it.
    pub fn new(
        events: Vec<ExpectedEvent>,
        config: SessionConfig,
        mut transport: T,
    ) -> Result<Self, SessionError> {
        let timeline = Timeline::new(events)?;
        transport.set_tempo_scale(config.tempo_scale);
        info!(
            "session: {} events ({} notes), {:?} mode",
            timeline.len(),
            timeline.note_count(),
            config.mode
        );

        let stats = SessionStatsAggregator::new(timeline.len());
        let mut controller = PracticeModeController::new(timeline.clone(), config.mode);
        controller.set_tempo_scale(config.tempo_scale);
        Ok(Self {
            skill_level: config.skill_level,
            detector: PitchDetector::new(config.detector),
            synchronizer: PlaybackSynchronizer::new(timeline),
            controller,
            stats,
            transport,
            capture: None,
            last_observation: PitchObservation::silent(),
        })
    }

    /// Acquires the default microphone for this session's lifetime.
    pub fn acquire_capture(&mut self) -> Result<(), SessionError> {
        self.capture = Some(AudioCapture::start().map_err(SessionError::Capture)?);
        Ok(())
    }

    /// Adopts an already-started capture handle (e.g. one the caller opened
    /// to report device errors before building the session).
    pub fn attach_capture(&mut self, capture: AudioCapture) {
        self.capture = Some(capture);
    }

    pub fn skill_level(&self) -> SkillLevel {
        self.skill_level
    }

    pub fn set_skill_level(&mut self, skill: SkillLevel) {
        self.skill_level = skill;
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.controller.set_mode(mode);
    }

    pub fn is_finished(&self) -> bool {
        self.controller.is_finished()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.stats()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport for callers that drive its clock
    /// themselves (scripted transports in tests, the CLI's wall-clock one).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Runs one timer tick: consumes the freshest captured frame if one is
    /// pending, otherwise carries the previous observation forward (capture
    /// frames and ticks arrive at nearly the same rate, so at most one
    /// frame of staleness is possible).
    pub fn tick(&mut self, now: Instant) -> TickUpdate {
        match self.capture.as_ref().and_then(AudioCapture::latest_frame) {
            Some(frame) => self.process_frame(&frame, now),
            None => {
                let observation = self.last_observation.clone();
                self.advance(observation, now)
            }
        }
    }

    /// Runs one tick against an explicit audio frame. This is the full
    /// detection-to-validation path; `tick` is a thin wrapper over it.
    pub fn process_frame(&mut self, frame: &AudioFrame, now: Instant) -> TickUpdate {
        let observation = self.detector.observe(frame);
        self.advance(observation, now)
    }

    fn advance(&mut self, observation: PitchObservation, now: Instant) -> TickUpdate {
        self.last_observation = observation.clone();

        let time = self.transport.position();
        let located = self.synchronizer.locate(time);
        let event_index = located.event_index;
        let transitioned = located.transitioned;

        // Live validation of the current event against this observation.
        let live = located.event.map(|event| {
            let tolerance_anchor = observation
                .frequency_hz
                .or_else(|| {
                    event
                        .pitch
                        .as_deref()
                        .and_then(crate::note::frequency_of_name)
                })
                .unwrap_or(crate::note::A4_FREQUENCY);
            let tol = tolerance::tolerance(self.skill_level, tolerance_anchor);
            let progress = match self.controller.mode() {
                Mode::Flow => ((time - event.start_time) / event.duration()) as f32,
                Mode::Wait => {
                    let target = self.controller.hold_target(event.duration());
                    (self.controller.hold_seconds(event.index) / target) as f32
                }
            };
            validator::validate(event, &observation, tol, progress)
        });

        let output = self.controller.tick(event_index, live.as_ref(), time, now);

        for command in &output.commands {
            match *command {
                TransportCommand::Play => self.transport.play(),
                TransportCommand::Pause => self.transport.pause(),
                TransportCommand::Seek(target) => self.transport.seek(target),
            }
        }

        let finalized: Vec<ValidationResult> = output.finalized;
        for result in &finalized {
            self.stats.record(result.clone());
        }

        TickUpdate {
            event_index,
            transitioned,
            observation,
            live_validation: live,
            finalized,
            stats: self.stats.stats(),
            transport_running: self.controller.transport_running(),
            finished: output.finished,
        }
    }

    /// Tears the session down, releasing the capture stream, and returns
    /// the final stats.
    pub fn finish(mut self) -> SessionStats {
        self.capture = None; // released here; Drop covers early exits
        info!("session finished: {:?}", self.stats.stats());
        self.stats.stats()
    }
}
