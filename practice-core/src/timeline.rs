//! # Expected-Event Timeline
//!
//! The ordered, gapless sequence of notes and rests a session is practiced
//! against. The timeline is built once by an external score parser (rests
//! synthesized to fill every gap) and is immutable for the session's
//! lifetime; this module only validates and serves it.
//!
//! An invalid timeline is rejected up front with a descriptive error; the
//! core never attempts best-effort repair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::note;

/// Validation failures for a candidate timeline.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The timeline contained no events at all.
    #[error("timeline has no events")]
    Empty,

    /// An event's interval was empty or negative.
    #[error("event {index} has non-positive duration ({start_time}..{end_time})")]
    NonPositiveDuration {
        index: usize,
        start_time: f64,
        end_time: f64,
    },

    /// Consecutive events did not tile the timeline exactly.
    #[error("event {index} starts at {got} but the previous event ends at {expected}")]
    NotGapless {
        index: usize,
        expected: f64,
        got: f64,
    },

    /// A note event carried a pitch name the core cannot interpret.
    #[error("event {index} has unparseable pitch {name:?}")]
    BadPitch { index: usize, name: String },
}

/// A scheduled note or rest with a fixed interval on the score timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedEvent {
    /// Position in the timeline; assigned during validation.
    #[serde(default)]
    pub index: usize,
    /// Scientific pitch name, or `None` for a rest.
    pub pitch: Option<String>,
    /// Interval start on the playback clock, seconds.
    pub start_time: f64,
    /// Interval end (exclusive), seconds.
    pub end_time: f64,
}

impl ExpectedEvent {
    /// Convenience constructor for a note event.
    pub fn note(pitch: &str, start_time: f64, end_time: f64) -> Self {
        Self {
            index: 0,
            pitch: Some(pitch.to_string()),
            start_time,
            end_time,
        }
    }

    /// Convenience constructor for a rest event.
    pub fn rest(start_time: f64, end_time: f64) -> Self {
        Self {
            index: 0,
            pitch: None,
            start_time,
            end_time,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `time` falls inside this event's half-open interval.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

/// A validated, immutable expected-event timeline.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Vec<ExpectedEvent>,
}

// Alignment slack between consecutive events. Timeline builders compute
// start/end from summed note durations, so exact equality is too strict.
const GAP_EPSILON: f64 = 1e-6;

impl Timeline {
    /// Validates and adopts a sequence of events.
    ///
    /// Checks, in order: non-empty, strictly positive durations, exact
    /// tiling (each event starts where the previous one ends), and
    /// parseable pitch names on every note event. Indices are assigned
    /// from position.
    pub fn new(mut events: Vec<ExpectedEvent>) -> Result<Self, TimelineError> {
        if events.is_empty() {
            return Err(TimelineError::Empty);
        }

        for (i, event) in events.iter_mut().enumerate() {
            event.index = i;
        }

        for event in &events {
            if event.end_time - event.start_time <= 0.0 {
                return Err(TimelineError::NonPositiveDuration {
                    index: event.index,
                    start_time: event.start_time,
                    end_time: event.end_time,
                });
            }
            if let Some(name) = &event.pitch {
                if note::midi_of_name(name).is_none() {
                    return Err(TimelineError::BadPitch {
                        index: event.index,
                        name: name.clone(),
                    });
                }
            }
        }

        for pair in events.windows(2) {
            if (pair[1].start_time - pair[0].end_time).abs() > GAP_EPSILON {
                return Err(TimelineError::NotGapless {
                    index: pair[1].index,
                    expected: pair[0].end_time,
                    got: pair[1].start_time,
                });
            }
        }

        Ok(Self { events })
    }

    pub fn events(&self) -> &[ExpectedEvent] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&ExpectedEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of note (non-rest) events.
    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_rest()).count()
    }

    /// Start of the first event, seconds.
    pub fn start_time(&self) -> f64 {
        self.events[0].start_time
    }

    /// End of the last event, seconds.
    pub fn end_time(&self) -> f64 {
        self.events[self.events.len() - 1].end_time
    }
}
