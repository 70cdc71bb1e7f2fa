//! # Playback Synchronizer
//!
//! Maps a playback-clock position onto the expected-event timeline. The
//! timeline is sorted and gapless, so lookup is a binary search; the
//! synchronizer additionally remembers the last reported index so callers
//! can react to entry into a new event exactly once instead of every tick.

use crate::timeline::{ExpectedEvent, Timeline};

/// Result of one [`PlaybackSynchronizer::locate`] call.
#[derive(Debug)]
pub struct Locate<'a> {
    /// Index of the event containing the queried time, or `None` before the
    /// first event / at or after the end of the last one.
    pub event_index: Option<usize>,
    /// The located event, when inside the timeline span.
    pub event: Option<&'a ExpectedEvent>,
    /// True exactly once per entered event index.
    pub transitioned: bool,
}

/// Stateful locator over one session's timeline.
#[derive(Debug, Clone)]
pub struct PlaybackSynchronizer {
    timeline: Timeline,
    last_index: Option<usize>,
}

impl PlaybackSynchronizer {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            last_index: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Forgets the last reported index, e.g. after a seek.
    pub fn reset(&mut self) {
        self.last_index = None;
    }

    /// Locates the event whose `[start_time, end_time)` interval contains
    /// `time` and reports whether this is the first tick inside it.
    pub fn locate(&mut self, time: f64) -> Locate<'_> {
        let event_index = self.index_at(time);
        let transitioned = event_index.is_some() && event_index != self.last_index;
        if event_index.is_some() {
            self.last_index = event_index;
        }
        Locate {
            event_index,
            event: event_index.and_then(|i| self.timeline.get(i)),
            transitioned,
        }
    }

    /// Side-effect-free query slightly ahead of the playhead, for UI
    /// pre-staging of the upcoming event. Does not touch the authoritative
    /// current index.
    pub fn lookahead(&self, time: f64, epsilon: f64) -> Option<&ExpectedEvent> {
        self.index_at(time + epsilon)
            .and_then(|i| self.timeline.get(i))
    }

    fn index_at(&self, time: f64) -> Option<usize> {
        let events = self.timeline.events();
        // First event starting after `time`; the candidate is its predecessor.
        let upper = events.partition_point(|e| e.start_time <= time);
        if upper == 0 {
            return None;
        }
        let candidate = &events[upper - 1];
        candidate.contains(time).then_some(upper - 1)
    }
}
