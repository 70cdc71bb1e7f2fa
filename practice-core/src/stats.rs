//! # Session Statistics
//!
//! Folds finalized validation results into running accuracy metrics. The
//! aggregator stores at most one result per event index (upsert, not
//! append) and recomputes [`SessionStats`] on demand; the stats have no
//! lifecycle of their own.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::validator::{Classification, ValidationResult};

/// Running accuracy metrics for one practice session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub correct: usize,
    pub close: usize,
    pub wrong: usize,
    pub silent: usize,
    pub rests: usize,
    /// Events with a finalized result so far.
    pub events_completed: usize,
    /// Total events in the session's timeline.
    pub total_events: usize,
    /// `round((correct + 0.5·close) / scored · 100)` over non-rest results.
    pub pitch_accuracy: u8,
    /// Mean per-result progress over non-rest results, as a percentage.
    pub duration_accuracy: u8,
    /// Weighted blend of pitch and duration accuracy.
    pub overall_score: u8,
}

/// Accumulates finalized results keyed by event index.
#[derive(Debug, Clone, Default)]
pub struct SessionStatsAggregator {
    results: BTreeMap<usize, ValidationResult>,
    total_events: usize,
}

impl SessionStatsAggregator {
    pub fn new(total_events: usize) -> Self {
        Self {
            results: BTreeMap::new(),
            total_events,
        }
    }

    /// Records a finalized result. A later result for the same index
    /// replaces the earlier one, so re-finalizing an event is idempotent.
    pub fn record(&mut self, result: ValidationResult) {
        self.results.insert(result.event_index, result);
    }

    pub fn result_for(&self, event_index: usize) -> Option<&ValidationResult> {
        self.results.get(&event_index)
    }

    pub fn results(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.values()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Recomputes the aggregate over everything recorded so far.
    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total_events: self.total_events,
            events_completed: self.results.len(),
            ..SessionStats::default()
        };

        let mut scored = 0usize;
        let mut weighted_hits = 0.0f64;
        let mut progress_sum = 0.0f64;

        for result in self.results.values() {
            match result.classification {
                Classification::Correct => stats.correct += 1,
                Classification::Close => stats.close += 1,
                Classification::Wrong => stats.wrong += 1,
                Classification::Silent => stats.silent += 1,
                Classification::Rest => stats.rests += 1,
            }
            if result.classification != Classification::Rest {
                scored += 1;
                progress_sum += result.progress as f64;
                weighted_hits += match result.classification {
                    Classification::Correct => 1.0,
                    Classification::Close => 0.5,
                    _ => 0.0,
                };
            }
        }

        if scored > 0 {
            stats.pitch_accuracy = (weighted_hits / scored as f64 * 100.0).round() as u8;
            stats.duration_accuracy = (progress_sum / scored as f64 * 100.0).round() as u8;
            stats.overall_score = (0.7 * stats.pitch_accuracy as f64
                + 0.3 * stats.duration_accuracy as f64)
                .round() as u8;
        }

        stats
    }
}
