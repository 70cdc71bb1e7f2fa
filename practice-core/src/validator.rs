//! # Note Validator
//!
//! Scores one pitch observation against one expected event. `validate` is a
//! pure function of its inputs plus the A4 = 440 Hz reference, so every
//! classification is reproducible from literal fixtures.

use serde::{Deserialize, Serialize};

use crate::note;
use crate::timeline::ExpectedEvent;
use crate::tolerance::Tolerance;
use crate::PitchObservation;

/// Outcome category for one attempt at an expected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Within the accept tolerance.
    Correct,
    /// Outside accept but within the close tolerance.
    Close,
    /// Outside both tolerances.
    Wrong,
    /// Nothing was detected while a note was expected.
    Silent,
    /// The expected event is a rest; silence is the correct action and is
    /// not separately scored.
    Rest,
}

/// Fixed accuracy for a `Wrong` classification. "Right note family, bad
/// pitch" versus "completely different note" only differs in feedback text,
/// not in score.
const WRONG_ACCURACY: u8 = 20;

/// One scored attempt. At most one finalized result exists per non-rest
/// event per session; a later result for the same index replaces the
/// earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub event_index: usize,
    pub classification: Classification,
    /// 0-100.
    pub accuracy: u8,
    /// Signed deviation in cents (positive = sharp). Zero when silent or
    /// resting.
    pub cents_deviation: f32,
    /// Frequency that produced this classification, when one was heard.
    /// Kept so feedback can name the note actually played even if the
    /// observation has changed by the time the result is finalized.
    pub detected_hz: Option<f32>,
    /// Fraction of the event satisfied: playback ratio in flow mode, hold
    /// ratio in wait mode. Clamped to [0, 1].
    pub progress: f32,
}

impl ValidationResult {
    /// The result recorded for a note event that never produced a detection.
    pub fn silent(event_index: usize, progress: f32) -> Self {
        Self {
            event_index,
            classification: Classification::Silent,
            accuracy: 0,
            cents_deviation: 0.0,
            detected_hz: None,
            progress: progress.clamp(0.0, 1.0),
        }
    }

    /// The result recorded for a completed rest.
    pub fn rest(event_index: usize, progress: f32) -> Self {
        Self {
            event_index,
            classification: Classification::Rest,
            accuracy: 100,
            cents_deviation: 0.0,
            detected_hz: None,
            progress: progress.clamp(0.0, 1.0),
        }
    }
}

/// Scores `observed` against `expected` under the given tolerance.
///
/// Rules, in order: rests are never pitch-judged; no detection is `Silent`;
/// otherwise the absolute cent deviation against the equal-temperament
/// reference picks `Correct` (accuracy 100 down to 80 at the boundary),
/// `Close` (70 down to 50) or `Wrong` (fixed low).
pub fn validate(
    expected: &ExpectedEvent,
    observed: &PitchObservation,
    tolerance: Tolerance,
    progress: f32,
) -> ValidationResult {
    if expected.is_rest() {
        return ValidationResult::rest(expected.index, progress);
    }

    let Some(frequency) = observed.frequency_hz.filter(|_| observed.is_detecting) else {
        return ValidationResult::silent(expected.index, progress);
    };

    // Timeline validation guarantees the pitch parses; an event that slips
    // through anyway scores as silent rather than panicking mid-tick.
    let Some(target) = expected.pitch.as_deref().and_then(note::frequency_of_name) else {
        debug_assert!(false, "unparseable pitch survived timeline validation");
        return ValidationResult::silent(expected.index, progress);
    };

    let cents = note::cents_deviation(frequency, target);
    let deviation = cents.abs();

    let (classification, accuracy) = if deviation <= tolerance.accept_cents {
        // 100 at zero deviation, 80 at the accept boundary.
        let span = tolerance.accept_cents.max(f32::EPSILON);
        let accuracy = 100.0 - 20.0 * (deviation / span);
        (Classification::Correct, accuracy)
    } else if deviation <= tolerance.close_cents {
        // 70 just past accept, 50 at the close boundary.
        let span = (tolerance.close_cents - tolerance.accept_cents).max(f32::EPSILON);
        let accuracy = 70.0 - 20.0 * ((deviation - tolerance.accept_cents) / span);
        (Classification::Close, accuracy)
    } else {
        (Classification::Wrong, WRONG_ACCURACY as f32)
    };

    ValidationResult {
        event_index: expected.index,
        classification,
        accuracy: accuracy.round().clamp(0.0, 100.0) as u8,
        cents_deviation: cents,
        detected_hz: Some(frequency),
        progress: progress.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ExpectedEvent;

    const TOLERANCE: Tolerance = Tolerance {
        accept_cents: 30.0,
        close_cents: 60.0,
    };

    fn a4_event() -> ExpectedEvent {
        ExpectedEvent::note("A4", 0.0, 1.0)
    }

    fn detecting(frequency: f32) -> PitchObservation {
        PitchObservation {
            frequency_hz: Some(frequency),
            confidence: 0.9,
            audio_level: 0.5,
            is_detecting: true,
        }
    }

    fn silent_observation() -> PitchObservation {
        PitchObservation {
            frequency_hz: None,
            confidence: 0.0,
            audio_level: 0.0,
            is_detecting: false,
        }
    }

    /// Frequency that is exactly `cents` away from 440 Hz.
    fn a4_offset_by(cents: f32) -> f32 {
        440.0 * 2.0_f32.powf(cents / 1200.0)
    }

    #[test]
    fn exact_pitch_is_perfect() {
        let result = validate(&a4_event(), &detecting(440.0), TOLERANCE, 0.5);
        assert_eq!(result.classification, Classification::Correct);
        assert_eq!(result.accuracy, 100);
        assert!(result.cents_deviation.abs() < 0.01);
    }

    #[test]
    fn boundary_cents_walk_through_the_classes() {
        // Just inside the accept boundary: still Correct, accuracy 80.
        let at_accept = validate(&a4_event(), &detecting(a4_offset_by(29.99)), TOLERANCE, 0.5);
        assert_eq!(at_accept.classification, Classification::Correct);
        assert_eq!(at_accept.accuracy, 80);

        // One cent beyond accept: Close.
        let past_accept = validate(&a4_event(), &detecting(a4_offset_by(31.0)), TOLERANCE, 0.5);
        assert_eq!(past_accept.classification, Classification::Close);

        // One cent beyond close: Wrong.
        let past_close = validate(&a4_event(), &detecting(a4_offset_by(61.0)), TOLERANCE, 0.5);
        assert_eq!(past_close.classification, Classification::Wrong);
        assert_eq!(past_close.accuracy, 20);
    }

    #[test]
    fn flat_deviations_keep_their_sign() {
        let result = validate(&a4_event(), &detecting(a4_offset_by(-20.0)), TOLERANCE, 0.5);
        assert_eq!(result.classification, Classification::Correct);
        assert!(result.cents_deviation < 0.0);
    }

    #[test]
    fn wrong_results_carry_the_heard_frequency() {
        let heard = 523.25;
        let result = validate(&a4_event(), &detecting(heard), TOLERANCE, 0.5);
        assert_eq!(result.classification, Classification::Wrong);
        assert_eq!(result.detected_hz, Some(heard));
    }

    #[test]
    fn no_detection_is_silent() {
        let result = validate(&a4_event(), &silent_observation(), TOLERANCE, 0.3);
        assert_eq!(result.classification, Classification::Silent);
        assert_eq!(result.accuracy, 0);
    }

    #[test]
    fn rests_are_not_pitch_judged() {
        let rest = ExpectedEvent::rest(0.0, 1.0);
        // Even while the player makes sound, a rest stays a rest.
        let result = validate(&rest, &detecting(440.0), TOLERANCE, 1.0);
        assert_eq!(result.classification, Classification::Rest);
        assert_eq!(result.accuracy, 100);
    }

    #[test]
    fn validate_is_deterministic() {
        let a = validate(&a4_event(), &detecting(452.0), TOLERANCE, 0.25);
        let b = validate(&a4_event(), &detecting(452.0), TOLERANCE, 0.25);
        assert_eq!(a.classification, b.classification);
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.cents_deviation, b.cents_deviation);
        assert_eq!(a.progress, b.progress);
    }

    #[test]
    fn progress_is_clamped() {
        let result = validate(&a4_event(), &detecting(440.0), TOLERANCE, 1.7);
        assert_eq!(result.progress, 1.0);
    }
}
