//! # Practice Mode Controller
//!
//! The state machine that turns per-tick validation into transport commands
//! and finalized results. One controller serves both practice modes,
//! parameterized by [`Mode`]:
//!
//! - **Flow**: the transport always runs; each event is finalized when the
//!   playhead passes its end, using the best validation observed during the
//!   event (or `Silent` if nothing was ever detected).
//! - **Wait**: the transport is paused unless the player currently holds the
//!   correct pitch; hold time accrues on the wall clock (the paused playback
//!   clock does not advance) and the event completes once the accumulator
//!   reaches 80% of the event's duration. Dropouts pause accrual without
//!   resetting it. Rests advance on playback time alone.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;
use crate::validator::{Classification, ValidationResult};

/// Fraction of an event's duration that must be held in wait mode.
pub const HOLD_FRACTION: f64 = 0.8;

/// Practice mode selected by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Playback runs continuously regardless of accuracy.
    #[default]
    Flow,
    /// Playback pauses until the correct pitch is sustained.
    Wait,
}

/// Command for the external playback transport. Only this controller (via
/// the owning session) issues them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    /// Absolute position in seconds; the transport clamps out-of-range
    /// targets rather than erroring.
    Seek(f64),
}

/// Everything one controller tick produced.
#[derive(Debug, Default)]
pub struct ControllerOutput {
    pub commands: Vec<TransportCommand>,
    /// Results finalized this tick, ready for the stats aggregator.
    pub finalized: Vec<ValidationResult>,
    /// True on the tick that ends the session.
    pub finished: bool,
}

/// Per-session practice state machine. Reset by constructing a new one;
/// nothing here is persisted.
#[derive(Debug)]
pub struct PracticeModeController {
    mode: Mode,
    timeline: Timeline,
    /// Wall-clock hold time accrued per event index (wait mode).
    hold_seconds: BTreeMap<usize, f64>,
    /// Event the controller is currently tracking, with the best validation
    /// seen inside it.
    pending_index: Option<usize>,
    best_live: Option<ValidationResult>,
    /// Indices already finalized; guards against double finalization around
    /// seeks.
    done: BTreeSet<usize>,
    last_wall_clock: Option<Instant>,
    transport_running: bool,
    finished: bool,
    /// Playback tempo as a percentage of the score tempo; scales the
    /// wall-clock hold target in wait mode.
    tempo_scale: f32,
}

impl PracticeModeController {
    pub fn new(timeline: Timeline, mode: Mode) -> Self {
        Self {
            mode,
            timeline,
            hold_seconds: BTreeMap::new(),
            pending_index: None,
            best_live: None,
            done: BTreeSet::new(),
            last_wall_clock: None,
            transport_running: false,
            finished: false,
            tempo_scale: 100.0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switches practice mode mid-session. Hold accumulators survive the
    /// switch; they are only reset at session start.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn transport_running(&self) -> bool {
        self.transport_running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Accrued hold time for an event, seconds (wait mode).
    pub fn hold_seconds(&self, event_index: usize) -> f64 {
        self.hold_seconds.get(&event_index).copied().unwrap_or(0.0)
    }

    pub fn set_tempo_scale(&mut self, percent: f32) {
        self.tempo_scale = percent.max(1.0);
    }

    /// Wall-clock seconds of hold that complete an event of `duration`
    /// score seconds. Hold accrues on the wall clock but the playhead moves
    /// at the tempo scale, so the target shrinks at fast tempi; at any
    /// tempo the hold completes 80% of the way through the note.
    pub fn hold_target(&self, duration: f64) -> f64 {
        HOLD_FRACTION * duration * 100.0 / self.tempo_scale as f64
    }

    /// Advances the state machine by one tick.
    ///
    /// `event_index` is the synchronizer's current location, `validation`
    /// the live (not yet finalized) validation for that event, and
    /// `playback_time` the transport clock. `now` must be the wall clock:
    /// wait-mode hold accrual cannot use the playback clock, which stands
    /// still while paused.
    pub fn tick(
        &mut self,
        event_index: Option<usize>,
        validation: Option<&ValidationResult>,
        playback_time: f64,
        now: Instant,
    ) -> ControllerOutput {
        let mut out = ControllerOutput::default();
        if self.finished {
            return out;
        }

        let delta = self
            .last_wall_clock
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_wall_clock = Some(now);

        // Leaving an event finalizes it exactly once.
        if event_index != self.pending_index {
            if let Some(previous) = self.pending_index.take() {
                let basis = self.best_live.take();
                self.finalize(previous, playback_time, basis, &mut out);
            }
            self.pending_index = event_index;
            self.best_live = None;
        }

        if let (Some(index), Some(live)) = (event_index, validation) {
            if live.event_index == index {
                self.consider_live(live);
            }
        }

        // A slow tick or a forward seek can jump the playhead over whole
        // events; every passed event still gets a result.
        self.sweep_passed(playback_time, &mut out);

        match self.mode {
            Mode::Flow => self.ensure_playing(&mut out),
            Mode::Wait => self.tick_wait(event_index, validation, delta, &mut out),
        }

        // Past the final event the session is over; the sweep above has
        // already finalized everything up to the end.
        if playback_time >= self.timeline.end_time() {
            self.pending_index = None;
            self.ensure_paused(&mut out);
            self.finished = true;
            out.finished = true;
            debug!("session finished at t={playback_time:.2}");
        }

        out
    }

    /// Finalizes every not-yet-finalized event whose interval ended at or
    /// before `playback_time`. The pending event never qualifies (its end
    /// is still ahead of the playhead), so no live basis applies here:
    /// swept notes were never heard and score as silent.
    fn sweep_passed(&mut self, playback_time: f64, out: &mut ControllerOutput) {
        let passed: Vec<usize> = self
            .timeline
            .events()
            .iter()
            .filter(|e| e.end_time <= playback_time && !self.done.contains(&e.index))
            .map(|e| e.index)
            .collect();
        for index in passed {
            self.finalize(index, playback_time, None, out);
        }
    }

    fn tick_wait(
        &mut self,
        event_index: Option<usize>,
        validation: Option<&ValidationResult>,
        delta: f64,
        out: &mut ControllerOutput,
    ) {
        let Some(index) = event_index else {
            // Lead-in before the first event: let playback reach it.
            self.ensure_playing(out);
            return;
        };
        if self.done.contains(&index) {
            self.ensure_playing(out);
            return;
        }
        let Some(event) = self.timeline.get(index) else {
            self.ensure_playing(out);
            return;
        };

        if event.is_rest() {
            // Nothing to validate during silence.
            self.ensure_playing(out);
            return;
        }

        let (duration, end_time) = (event.duration(), event.end_time);
        let holding = matches!(
            validation.map(|v| v.classification),
            Some(Classification::Correct) | Some(Classification::Close)
        );

        if !holding {
            // No penalty, no reset: accrual just pauses until the correct
            // pitch comes back.
            self.ensure_paused(out);
            return;
        }

        let target = self.hold_target(duration);
        self.ensure_playing(out);
        let accrued = self.hold_seconds.entry(index).or_insert(0.0);
        *accrued += delta;

        if *accrued >= target {
            debug!("event {index} held for {accrued:.2}s, advancing");
            self.hold_seconds.remove(&index);

            // Basis is the best validation observed; a hold can only
            // complete after at least one Correct/Close tick.
            let mut result = match self.best_live.take() {
                Some(best) => best,
                None => ValidationResult::silent(index, 1.0),
            };
            result.progress = 1.0;
            out.finalized.push(result);

            self.done.insert(index);
            self.pending_index = None;
            out.commands.push(TransportCommand::Seek(end_time));
            self.ensure_playing(out);
        }
    }

    /// Finalizes an event the playhead has left. `basis` is the best live
    /// validation observed inside the event, if any.
    fn finalize(
        &mut self,
        index: usize,
        playback_time: f64,
        basis: Option<ValidationResult>,
        out: &mut ControllerOutput,
    ) {
        if self.done.contains(&index) {
            return;
        }
        let Some(event) = self.timeline.get(index) else {
            return;
        };

        let elapsed = (playback_time.min(event.end_time) - event.start_time) / event.duration();
        let progress = elapsed.clamp(0.0, 1.0) as f32;

        let result = if event.is_rest() {
            ValidationResult::rest(index, progress)
        } else {
            match basis {
                Some(mut best) => {
                    best.progress = progress;
                    best
                }
                None => ValidationResult::silent(index, progress),
            }
        };

        self.hold_seconds.remove(&index);
        self.done.insert(index);
        out.finalized.push(result);
    }

    /// Keeps the highest-ranked live validation for the current event.
    fn consider_live(&mut self, live: &ValidationResult) {
        let better = match &self.best_live {
            None => true,
            Some(best) => {
                let (new, old) = (rank(live.classification), rank(best.classification));
                new > old || (new == old && live.accuracy > best.accuracy)
            }
        };
        if better {
            self.best_live = Some(live.clone());
        }
    }

    fn ensure_playing(&mut self, out: &mut ControllerOutput) {
        if !self.transport_running {
            out.commands.push(TransportCommand::Play);
            self.transport_running = true;
        }
    }

    fn ensure_paused(&mut self, out: &mut ControllerOutput) {
        if self.transport_running {
            out.commands.push(TransportCommand::Pause);
            self.transport_running = false;
        }
    }
}

fn rank(classification: Classification) -> u8 {
    match classification {
        Classification::Correct => 3,
        Classification::Close => 2,
        Classification::Wrong => 1,
        Classification::Silent | Classification::Rest => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ExpectedEvent;
    use std::time::Duration;

    fn one_second_note() -> Timeline {
        Timeline::new(vec![
            ExpectedEvent::note("A4", 0.0, 1.0),
            ExpectedEvent::note("B4", 1.0, 2.0),
        ])
        .unwrap()
    }

    fn correct(index: usize) -> ValidationResult {
        ValidationResult {
            event_index: index,
            classification: Classification::Correct,
            accuracy: 95,
            cents_deviation: 2.0,
            detected_hz: Some(441.0),
            progress: 0.0,
        }
    }

    fn wrong(index: usize) -> ValidationResult {
        ValidationResult {
            event_index: index,
            classification: Classification::Wrong,
            accuracy: 20,
            cents_deviation: 150.0,
            detected_hz: Some(479.0),
            progress: 0.0,
        }
    }

    #[test]
    fn flow_mode_keeps_the_transport_running() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Flow);
        let t0 = Instant::now();
        let out = controller.tick(Some(0), Some(&correct(0)), 0.1, t0);
        assert_eq!(out.commands, vec![TransportCommand::Play]);
        // Subsequent ticks issue nothing new.
        let out = controller.tick(Some(0), Some(&correct(0)), 0.2, t0 + Duration::from_millis(100));
        assert!(out.commands.is_empty());
    }

    #[test]
    fn flow_mode_finalizes_on_event_exit() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), Some(&correct(0)), 0.5, t0);
        let out = controller.tick(Some(1), None, 1.0, t0 + Duration::from_millis(100));
        assert_eq!(out.finalized.len(), 1);
        assert_eq!(out.finalized[0].event_index, 0);
        assert_eq!(out.finalized[0].classification, Classification::Correct);
    }

    #[test]
    fn flow_mode_keeps_the_best_observation() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), Some(&wrong(0)), 0.2, t0);
        controller.tick(Some(0), Some(&correct(0)), 0.5, t0 + Duration::from_millis(100));
        // Note decays into silence before the event ends.
        controller.tick(Some(0), None, 0.9, t0 + Duration::from_millis(200));
        let out = controller.tick(Some(1), None, 1.0, t0 + Duration::from_millis(300));
        assert_eq!(out.finalized[0].classification, Classification::Correct);
    }

    #[test]
    fn flow_mode_never_detected_finalizes_silent() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), None, 0.5, t0);
        let out = controller.tick(Some(1), None, 1.0, t0 + Duration::from_millis(100));
        assert_eq!(out.finalized[0].classification, Classification::Silent);
        assert_eq!(out.finalized[0].accuracy, 0);
    }

    #[test]
    fn flow_mode_rests_finalize_as_rest() {
        let timeline = Timeline::new(vec![
            ExpectedEvent::rest(0.0, 0.5),
            ExpectedEvent::note("A4", 0.5, 1.0),
        ])
        .unwrap();
        let mut controller = PracticeModeController::new(timeline, Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), None, 0.25, t0);
        let out = controller.tick(Some(1), None, 0.5, t0 + Duration::from_millis(100));
        assert_eq!(out.finalized[0].classification, Classification::Rest);
        assert_eq!(out.finalized[0].accuracy, 100);
    }

    #[test]
    fn flow_mode_ends_after_the_last_event() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), Some(&correct(0)), 0.5, t0);
        controller.tick(Some(1), Some(&correct(1)), 1.5, t0 + Duration::from_millis(100));
        let out = controller.tick(None, None, 2.0, t0 + Duration::from_millis(200));
        assert!(out.finished);
        assert!(controller.is_finished());
        assert!(out.commands.contains(&TransportCommand::Pause));
        // Event 1 is finalized on the way out; event 0 already was.
        assert_eq!(out.finalized.len(), 1);
        assert_eq!(out.finalized[0].event_index, 1);
    }

    /// Three one-second notes with the clock jumping from mid-note 0
    /// straight past the end: every event still gets a result and the
    /// session finishes with none missing.
    #[test]
    fn events_jumped_in_one_tick_are_still_finalized() {
        let timeline = Timeline::new(vec![
            ExpectedEvent::note("A4", 0.0, 1.0),
            ExpectedEvent::note("B4", 1.0, 2.0),
            ExpectedEvent::note("C5", 2.0, 3.0),
        ])
        .unwrap();
        let mut controller = PracticeModeController::new(timeline, Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), Some(&correct(0)), 0.5, t0);
        let out = controller.tick(None, None, 3.0, t0 + Duration::from_millis(100));

        assert!(out.finished);
        let mut indices: Vec<usize> = out.finalized.iter().map(|r| r.event_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(out.finalized[0].classification, Classification::Correct);
        // The jumped-over notes were never heard.
        assert!(out
            .finalized
            .iter()
            .filter(|r| r.event_index > 0)
            .all(|r| r.classification == Classification::Silent));
    }

    #[test]
    fn a_seek_past_an_event_finalizes_it_as_silent() {
        let timeline = Timeline::new(vec![
            ExpectedEvent::note("A4", 0.0, 1.0),
            ExpectedEvent::note("B4", 1.0, 2.0),
            ExpectedEvent::note("C5", 2.0, 3.0),
        ])
        .unwrap();
        let mut controller = PracticeModeController::new(timeline, Mode::Flow);
        let t0 = Instant::now();
        controller.tick(Some(0), Some(&correct(0)), 0.5, t0);
        // Seek lands inside event 2; event 1 was skipped entirely.
        let out = controller.tick(Some(2), None, 2.5, t0 + Duration::from_millis(100));

        assert!(!out.finished);
        let indices: Vec<usize> = out.finalized.iter().map(|r| r.event_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(out.finalized[0].classification, Classification::Correct);
        assert_eq!(out.finalized[1].classification, Classification::Silent);
    }

    /// A 1.0 s note held correctly at 100 ms ticks completes once 0.8 s
    /// have accrued, advancing exactly once.
    #[test]
    fn wait_mode_hold_completes_and_advances_once() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Wait);
        let t0 = Instant::now();
        let mut advanced = 0;
        for i in 0..10 {
            let now = t0 + Duration::from_millis(100 * i);
            let out = controller.tick(Some(0), Some(&correct(0)), 0.0, now);
            advanced += out
                .finalized
                .iter()
                .filter(|r| r.event_index == 0)
                .count();
            if !out.finalized.is_empty() {
                assert!(out.commands.contains(&TransportCommand::Seek(1.0)));
                assert_eq!(out.finalized[0].progress, 1.0);
            }
        }
        assert_eq!(advanced, 1);
        // 9 ticks of 100 ms = 0.9 s accrued >= 0.8 s target.
        assert!(controller.hold_seconds(0) == 0.0);
    }

    #[test]
    fn wait_mode_dropout_pauses_but_does_not_reset() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Wait);
        let t0 = Instant::now();
        let mut now = t0;
        let step = Duration::from_millis(100);

        // 4 correct ticks: 0.3 s accrued (first tick has no delta).
        for _ in 0..4 {
            controller.tick(Some(0), Some(&correct(0)), 0.0, now);
            now += step;
        }
        let before = controller.hold_seconds(0);
        assert!((before - 0.3).abs() < 1e-6);

        // 3 ticks of dropout: accumulator untouched, transport paused.
        for _ in 0..3 {
            let out = controller.tick(Some(0), None, 0.3, now);
            assert!(!controller.transport_running() || out.commands.is_empty());
            now += step;
        }
        assert_eq!(controller.hold_seconds(0), before);

        // Resume: accrual continues from where it stopped.
        controller.tick(Some(0), Some(&correct(0)), 0.3, now);
        now += step;
        controller.tick(Some(0), Some(&correct(0)), 0.3, now);
        assert!(controller.hold_seconds(0) > before);
    }

    /// At double tempo the playhead crosses a 1.0 s note in 0.5 s of wall
    /// clock, so the hold target must shrink to 0.4 s or the note would
    /// slip past before the hold ever completes.
    #[test]
    fn wait_mode_hold_target_scales_with_tempo() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Wait);
        controller.set_tempo_scale(200.0);
        assert!((controller.hold_target(1.0) - 0.4).abs() < 1e-9);

        let t0 = Instant::now();
        let mut now = t0;
        let mut playback = 0.0;
        let mut held = false;
        for _ in 0..6 {
            let out = controller.tick(Some(0), Some(&correct(0)), playback, now);
            if out.commands.contains(&TransportCommand::Seek(1.0)) {
                held = true;
                assert_eq!(out.finalized[0].progress, 1.0);
                break;
            }
            // Playback runs at twice the wall clock while playing.
            if controller.transport_running() {
                playback += 0.2;
            }
            now += Duration::from_millis(100);
        }

        assert!(held);
        // The hold completed before the playhead left the note.
        assert!(playback < 1.0);
    }

    #[test]
    fn wait_mode_pauses_on_wrong_pitch() {
        let mut controller = PracticeModeController::new(one_second_note(), Mode::Wait);
        let t0 = Instant::now();
        // First tick with a wrong note: transport stays paused (no Play ever
        // issued, so no Pause needed either).
        let out = controller.tick(Some(0), Some(&wrong(0)), 0.0, t0);
        assert!(!controller.transport_running());
        assert!(out.commands.is_empty());
        assert_eq!(controller.hold_seconds(0), 0.0);
    }

    #[test]
    fn wait_mode_rests_advance_on_playback_time() {
        let timeline = Timeline::new(vec![
            ExpectedEvent::rest(0.0, 0.5),
            ExpectedEvent::note("A4", 0.5, 1.0),
        ])
        .unwrap();
        let mut controller = PracticeModeController::new(timeline, Mode::Wait);
        let t0 = Instant::now();
        let out = controller.tick(Some(0), None, 0.1, t0);
        // No pitch gating during the rest: transport plays.
        assert_eq!(out.commands, vec![TransportCommand::Play]);
        let out = controller.tick(Some(1), None, 0.5, t0 + Duration::from_millis(400));
        assert_eq!(out.finalized[0].classification, Classification::Rest);
    }

    #[test]
    fn wait_mode_finishing_the_last_event_ends_the_session() {
        let timeline = Timeline::new(vec![ExpectedEvent::note("A4", 0.0, 1.0)]).unwrap();
        let mut controller = PracticeModeController::new(timeline, Mode::Wait);
        let t0 = Instant::now();
        let mut now = t0;
        let mut finished = false;
        for _ in 0..12 {
            // Playback sits at 0.99 until the completion seek lands it at 1.0.
            let time = if controller.transport_running() { 0.99 } else { 0.0 };
            let out = controller.tick(Some(0), Some(&correct(0)), time, now);
            now += Duration::from_millis(100);
            if out.finished {
                finished = true;
                break;
            }
            if out.commands.contains(&TransportCommand::Seek(1.0)) {
                // Seek applied: next tick reports the end position.
                let out = controller.tick(None, None, 1.0, now);
                finished = out.finished;
                break;
            }
        }
        assert!(finished);
        assert!(controller.is_finished());
    }
}
