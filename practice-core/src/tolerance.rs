//! # Tolerance Model
//!
//! Pure mapping from a player's skill level and a detected frequency to the
//! cent thresholds the validator accepts. Base tolerances widen for lower
//! skill levels; a register-dependent multiplier widens them further for
//! high pitches, where holding a fixed-cents error is genuinely harder,
//! and tightens slightly below A4.

use serde::{Deserialize, Serialize};

/// Player skill level, set by the UI layer per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// Base (accept, close) tolerances in cents at A4.
    fn base_cents(self) -> (f32, f32) {
        match self {
            SkillLevel::Beginner => (50.0, 100.0),
            SkillLevel::Intermediate => (35.0, 70.0),
            SkillLevel::Advanced => (20.0, 45.0),
        }
    }
}

/// Acceptance thresholds in cents for one validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Deviations up to here classify as `Correct`.
    pub accept_cents: f32,
    /// Deviations up to here (beyond `accept_cents`) classify as `Close`.
    pub close_cents: f32,
}

/// Computes the tolerance for a skill level at a given register.
///
/// Multiplier: `1 + log2(f/440) · 0.3` above 440 Hz, a gentler linear
/// tightening below, clamped to [0.5, 3.0].
pub fn tolerance(skill: SkillLevel, frequency_hz: f32) -> Tolerance {
    let (accept, close) = skill.base_cents();
    let multiplier = register_multiplier(frequency_hz);
    Tolerance {
        accept_cents: accept * multiplier,
        close_cents: close * multiplier,
    }
}

fn register_multiplier(frequency_hz: f32) -> f32 {
    let m = if frequency_hz > 440.0 {
        1.0 + (frequency_hz / 440.0).log2() * 0.3
    } else if frequency_hz > 0.0 {
        1.0 - (440.0 - frequency_hz) / 440.0 * 0.1
    } else {
        1.0
    };
    m.clamp(0.5, 3.0)
}
