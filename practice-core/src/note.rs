//! # Musical Note Module
//!
//! Note-name parsing and equal-temperament frequency calculations for the
//! practice core. Expected pitches arrive from the timeline builder as
//! scientific pitch names ("C4", "F#5", "Bb3"); this module converts them
//! to MIDI numbers and reference frequencies (A4 = 440 Hz) and computes the
//! cent deviations the validator scores against.

use once_cell::sync::Lazy;

/// Reference frequency for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI number of A4.
pub const A4_MIDI: i32 = 69;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// MIDI note number
    pub midi: i32,
    /// Equal-temperament frequency in Hz
    pub frequency: f32,
}

/// Statically computed notes covering the full MIDI range used by
/// monophonic instruments (C0 = MIDI 12 up to C8 = MIDI 108).
///
/// Computed once at startup; used for nearest-note naming in feedback.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (12..=108)
        .map(|midi| {
            let name = format!("{}{}", NOTE_NAMES[(midi % 12) as usize], midi / 12 - 1);
            Note {
                name,
                midi,
                frequency: frequency_of_midi(midi),
            }
        })
        .collect()
});

/// Converts a MIDI note number to its equal-temperament frequency.
///
/// `f = 440 · 2^((midi - 69) / 12)`
pub fn frequency_of_midi(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Parses a scientific pitch name into a MIDI note number.
///
/// Accepts a note letter (A-G, case-insensitive), an optional `#` or `b`
/// accidental, and an octave number (C4 = MIDI 60). Returns `None` for
/// anything else; the timeline validator treats that as a malformed event.
pub fn midi_of_name(name: &str) -> Option<i32> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    let semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest: String = chars.collect();
    let (accidental, octave_str) = match rest.chars().next()? {
        '#' => (1, &rest[1..]),
        'b' => (-1, &rest[1..]),
        _ => (0, rest.as_str()),
    };

    let octave: i32 = octave_str.parse().ok()?;
    let midi = (octave + 1) * 12 + semitone + accidental;
    (0..=127).contains(&midi).then_some(midi)
}

/// Parses a pitch name straight to its reference frequency.
pub fn frequency_of_name(name: &str) -> Option<f32> {
    midi_of_name(name).map(frequency_of_midi)
}

/// Finds the closest note in the table to a given frequency.
///
/// Used to name what the player actually produced when generating
/// feedback for a wrong note.
///
/// # Arguments
/// * `freq` - Input frequency in Hz
///
/// # Returns
/// * `(note_name, target_frequency)` - Closest note name and its frequency
pub fn find_nearest_note(freq: f32) -> (&'static str, f32) {
    let closest = NOTES
        .iter()
        .min_by(|a, b| {
            let diff_a = (a.frequency - freq).abs();
            let diff_b = (b.frequency - freq).abs();
            diff_a.partial_cmp(&diff_b).unwrap()
        })
        .unwrap(); // Safe: NOTES is never empty.

    (closest.name.as_str(), closest.frequency)
}

/// Calculates the deviation of a measured frequency from a target, in cents.
///
/// 100 cents = 1 semitone; positive = sharp, negative = flat.
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
