// practice-core/src/lib.rs

//! The core logic for real-time practice evaluation: detect the pitch a
//! musician is playing, compare it against the note or rest the score
//! expects at that instant, classify the attempt, and drive a play/pause
//! transport so that "wait for the correct note" practice is possible.
//! This crate is completely headless and contains no UI code; accounts,
//! catalogs, storage and HTTP all live elsewhere.

pub mod audio;
pub mod controller;
pub mod feedback;
pub mod fft;
pub mod note;
pub mod pitch;
pub mod session;
pub mod stats;
pub mod sync;
pub mod timeline;
pub mod tolerance;
pub mod validator;

use serde::Serialize;

pub use controller::Mode;
pub use session::{PracticeSession, SessionConfig, SessionError, Transport};
pub use stats::SessionStats;
pub use timeline::{ExpectedEvent, Timeline};
pub use tolerance::SkillLevel;
pub use validator::{Classification, ValidationResult};

/// Result of analyzing one audio frame: the detector's frequency estimate
/// plus the gating signals around it. Derived fresh each tick; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PitchObservation {
    /// Smoothed frequency estimate in Hz, present only while detecting.
    pub frequency_hz: Option<f32>,
    /// Accumulated detection confidence, 0.0 to 1.0.
    pub confidence: f32,
    /// Input level, 0.0 to 1.0.
    pub audio_level: f32,
    /// True once confidence has accumulated past the detection threshold.
    pub is_detecting: bool,
}

impl PitchObservation {
    /// The observation silence produces: nothing detected, zero level.
    pub fn silent() -> Self {
        Self {
            frequency_hz: None,
            confidence: 0.0,
            audio_level: 0.0,
            is_detecting: false,
        }
    }
}

/// Everything one processing tick emits for the UI layer.
#[derive(Debug, Clone)]
pub struct TickUpdate {
    /// Index of the expected event under the playhead, if any.
    pub event_index: Option<usize>,
    /// True on the first tick inside a newly entered event.
    pub transitioned: bool,
    /// The latest pitch observation.
    pub observation: PitchObservation,
    /// Live (not yet finalized) validation of the current event.
    pub live_validation: Option<ValidationResult>,
    /// Results finalized this tick.
    pub finalized: Vec<ValidationResult>,
    /// Running session statistics.
    pub stats: SessionStats,
    pub transport_running: bool,
    /// True on the tick that ends the session.
    pub finished: bool,
}
