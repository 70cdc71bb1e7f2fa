//! Wall-clock playback transport.
//!
//! Stands in for the external playback engine: position advances with real
//! time while playing, scaled by the tempo percentage, and freezes while
//! paused. Out-of-range seeks clamp instead of erroring; a seek past the
//! end is a normal, recoverable UI condition.

use std::time::Instant;

use practice_core::Transport;

pub struct WallClockTransport {
    /// Position at the last play/pause/seek edge, seconds.
    base: f64,
    /// Wall-clock time of that edge, while playing.
    resumed_at: Option<Instant>,
    tempo_scale: f32,
    end: f64,
}

impl WallClockTransport {
    pub fn new(end: f64) -> Self {
        Self {
            base: 0.0,
            resumed_at: None,
            tempo_scale: 100.0,
            end,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.resumed_at.is_some()
    }

    fn freeze(&mut self) {
        self.base = self.position();
        self.resumed_at = None;
    }
}

impl Transport for WallClockTransport {
    fn play(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.freeze();
    }

    fn seek(&mut self, time: f64) {
        let was_playing = self.is_playing();
        self.base = time.clamp(0.0, self.end);
        self.resumed_at = was_playing.then(Instant::now);
    }

    fn set_tempo_scale(&mut self, percent: f32) {
        // Re-anchor so already-elapsed time keeps its old scale.
        let was_playing = self.is_playing();
        self.freeze();
        self.tempo_scale = percent.clamp(25.0, 200.0);
        if was_playing {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        let elapsed = self
            .resumed_at
            .map(|t| t.elapsed().as_secs_f64() * self.tempo_scale as f64 / 100.0)
            .unwrap_or(0.0);
        (self.base + elapsed).min(self.end)
    }
}
