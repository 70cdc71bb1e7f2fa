//! # Feedback Module
//!
//! Deterministic, skill-level-aware feedback strings derived from
//! validation results and session stats. Classification and scoring happen
//! elsewhere; this module only names what happened in plain language for
//! the UI layer, e.g. whether a close attempt was sharp or flat, or what
//! note the player actually hit on a wrong attempt.

use crate::note;
use crate::stats::SessionStats;
use crate::tolerance::SkillLevel;
use crate::validator::{Classification, ValidationResult};

/// Short remark for one finalized result. The wrong-note naming uses the
/// frequency carried on the result itself, the one that earned the
/// classification, not whatever the detector hears now.
pub fn remark(result: &ValidationResult) -> String {
    match result.classification {
        Classification::Correct => "Correct".to_string(),
        Classification::Close => {
            if result.cents_deviation > 0.0 {
                format!("Close, {:.0} cents sharp", result.cents_deviation)
            } else {
                format!("Close, {:.0} cents flat", -result.cents_deviation)
            }
        }
        Classification::Wrong => match result.detected_hz {
            // "Right note family, bad pitch" vs "completely different note"
            // only differs here, never in the score.
            Some(freq) => {
                let (name, _) = note::find_nearest_note(freq);
                format!("Wrong note, sounded like {name}")
            }
            None => "Wrong note".to_string(),
        },
        Classification::Silent => "No note detected".to_string(),
        Classification::Rest => "Rest".to_string(),
    }
}

/// Session-level status line keyed on the overall score, with thresholds
/// shifted by skill level: lenient for beginners, strict for advanced
/// players.
pub fn session_summary(stats: &SessionStats, skill: SkillLevel) -> String {
    let adjustment: i32 = match skill {
        SkillLevel::Beginner => 10,
        SkillLevel::Intermediate => 0,
        SkillLevel::Advanced => -10,
    };
    let adjusted = (stats.overall_score as i32 + adjustment).clamp(0, 110);

    let status = if adjusted >= 90 {
        "Excellent!"
    } else if adjusted >= 75 {
        "Great work!"
    } else if adjusted >= 60 {
        "Good progress!"
    } else if adjusted >= 40 {
        "Keep practicing!"
    } else {
        "Let's work on the basics"
    };

    format!(
        "{status} {}/{} events, pitch {}%, duration {}%",
        stats.events_completed, stats.total_events, stats.pitch_accuracy, stats.duration_accuracy
    )
}

/// Single actionable next step for the session.
pub fn next_step(stats: &SessionStats, skill: SkillLevel) -> &'static str {
    if stats.overall_score >= 85 {
        match skill {
            SkillLevel::Beginner => "Try an intermediate-level exercise",
            _ => "You're ready for more challenging material",
        }
    } else if stats.overall_score >= 70 {
        "Keep practicing at this level"
    } else if stats.silent > stats.correct {
        "Make sure each note speaks clearly before moving on"
    } else {
        "Slow down and focus on accuracy first"
    }
}
