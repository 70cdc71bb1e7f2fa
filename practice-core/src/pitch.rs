//! # Pitch Detection Module
//!
//! Stateful monophonic pitch detection built on the YIN algorithm.
//!
//! ## Features
//! - YIN difference function with cumulative mean normalization
//! - First-dip threshold search with octave-error avoidance
//! - Parabolic interpolation for sub-sample accuracy
//! - RMS gating, instrument-range rejection, and spectral plausibility checks
//! - A confidence accumulator so single-frame noise spikes never register
//!   as notes, with confidence-weighted exponential smoothing
//!
//! Detection gaps are the normal steady state here: silence, breath noise
//! and dropouts all come back as `is_detecting = false`, never as errors.

use crate::audio::AudioFrame;
use crate::fft;
use crate::PitchObservation;

/// Tuning knobs for [`PitchDetector`].
///
/// Defaults cover a generic monophonic instrument; use a preset (or adjust
/// the ranges) when the instrument is known.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Lowest frequency the detector will report, in Hz.
    pub min_frequency: f32,
    /// Highest frequency the detector will report, in Hz.
    pub max_frequency: f32,
    /// RMS level below which a frame is treated as silence.
    pub rms_floor: f32,
    /// CMNDF dip threshold for the primary YIN search.
    pub yin_threshold: f32,
    /// Looser bound applied to the global CMNDF minimum when no dip
    /// crosses `yin_threshold`.
    pub yin_fallback_threshold: f32,
    /// Spectral-centroid band (Hz) a frame must fall inside to count as a
    /// pitched sound.
    pub centroid_min: f32,
    pub centroid_max: f32,
    /// Maximum zero-crossing rate (crossings per sample) for a pitched sound.
    pub max_zero_crossing_rate: f32,
    /// Confidence added per corroborated frame.
    pub confidence_gain: f32,
    /// Multiplier applied to confidence on every non-corroborated frame.
    pub confidence_decay: f32,
    /// Accumulated confidence required before `is_detecting` turns on.
    pub detection_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 30.0,
            max_frequency: 4200.0,
            rms_floor: 0.01,
            yin_threshold: 0.2,
            yin_fallback_threshold: 0.5,
            centroid_min: 100.0,
            centroid_max: 4000.0,
            max_zero_crossing_rate: 0.35,
            confidence_gain: 0.25,
            confidence_decay: 0.5,
            detection_threshold: 0.5,
        }
    }
}

impl DetectorConfig {
    /// Preset for trumpet practice: fundamentals E3-C6, the brass spectral
    /// centroid band, and the low zero-crossing rate brass tones exhibit.
    pub fn trumpet() -> Self {
        Self {
            min_frequency: 165.0,
            max_frequency: 1046.0,
            centroid_min: 800.0,
            centroid_max: 3000.0,
            max_zero_crossing_rate: 0.15,
            ..Self::default()
        }
    }
}

/// Stateful pitch detector: call [`observe`](PitchDetector::observe) once per
/// audio frame and read the resulting [`PitchObservation`].
///
/// The carried state is small: the smoothed frequency estimate and the
/// rolling confidence accumulator. [`reset`](PitchDetector::reset) clears
/// both, e.g. when a new practice session starts on the same detector.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    config: DetectorConfig,
    confidence: f32,
    smoothed_frequency: Option<f32>,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            confidence: 0.0,
            smoothed_frequency: None,
        }
    }

    /// Clears all smoothing and confidence state.
    pub fn reset(&mut self) {
        self.confidence = 0.0;
        self.smoothed_frequency = None;
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyzes one audio frame and updates the detector state.
    ///
    /// Cheap rejections run first (RMS gate), then the YIN search, then the
    /// spectral plausibility checks that gate the confidence accumulator.
    pub fn observe(&mut self, frame: &AudioFrame) -> PitchObservation {
        let samples = &frame.samples;
        let frame_len = samples.len();
        if frame_len < 4 {
            return self.miss(0.0);
        }

        let rms = (samples.iter().map(|&s| s * s).sum::<f32>() / frame_len as f32).sqrt();
        let audio_level = (rms / 0.25).clamp(0.0, 1.0);
        if rms < self.config.rms_floor {
            return self.miss(audio_level);
        }

        let candidate = yin(samples, frame.sample_rate, &self.config);
        let Some((frequency, clarity)) = candidate else {
            return self.miss(audio_level);
        };

        if !self.looks_pitched(samples, frame.sample_rate) {
            return self.miss(audio_level);
        }

        // Corroborated frame: raise confidence, weighted by YIN clarity.
        self.confidence = (self.confidence + self.config.confidence_gain * clarity).min(1.0);

        // More confidence converges faster; shaky confidence smooths harder.
        let alpha = 0.2 + 0.6 * self.confidence;
        let smoothed = match self.smoothed_frequency {
            Some(previous) => alpha * frequency + (1.0 - alpha) * previous,
            None => frequency,
        };
        self.smoothed_frequency = Some(smoothed);

        let is_detecting = self.confidence >= self.config.detection_threshold;
        PitchObservation {
            frequency_hz: is_detecting.then_some(smoothed),
            confidence: self.confidence,
            audio_level,
            is_detecting,
        }
    }

    /// Records a non-corroborated frame: confidence decays, and once it has
    /// collapsed the stale frequency anchor is dropped so the next note
    /// starts fresh instead of being dragged toward the old one.
    fn miss(&mut self, audio_level: f32) -> PitchObservation {
        self.confidence *= self.config.confidence_decay;
        if self.confidence < 0.1 {
            self.smoothed_frequency = None;
        }
        PitchObservation {
            frequency_hz: None,
            confidence: self.confidence,
            audio_level,
            is_detecting: false,
        }
    }

    /// Auxiliary spectral checks: a pitched sound keeps its energy centroid
    /// inside the configured band and crosses zero at a tonal rate.
    fn looks_pitched(&self, samples: &[f32], sample_rate: u32) -> bool {
        if fft::zero_crossing_rate(samples) > self.config.max_zero_crossing_rate {
            return false;
        }
        let magnitudes = fft::magnitude_spectrum(samples);
        match fft::spectral_centroid(&magnitudes, sample_rate) {
            Some(centroid) => {
                centroid >= self.config.centroid_min && centroid <= self.config.centroid_max
            }
            None => false,
        }
    }
}

/// Runs the YIN search on one frame.
///
/// Returns the detected frequency and a clarity value in [0, 1] (one minus
/// the CMNDF value at the chosen lag; deep dips mean clear periodicity).
fn yin(signal: &[f32], sample_rate: u32, config: &DetectorConfig) -> Option<(f32, f32)> {
    let frame_size = signal.len();
    let half = frame_size / 2;
    if half < 2 {
        return None;
    }

    // --- Step 1: squared-difference function over candidate lags ---
    let mut buffer = vec![0.0f32; half];
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        buffer[tau] = diff;
    }

    // --- Step 2: cumulative mean normalized difference, d'(0) = 1 ---
    let mut running_sum = 0.0;
    buffer[0] = 1.0;
    for tau in 1..half {
        running_sum += buffer[tau];
        if running_sum != 0.0 {
            buffer[tau] *= tau as f32 / running_sum;
        } else {
            buffer[tau] = 1.0;
        }
    }

    // Restrict the search to lags inside the instrument range.
    let tau_min = ((sample_rate as f32 / config.max_frequency) as usize).max(2);
    let tau_max = ((sample_rate as f32 / config.min_frequency) as usize).min(half - 1);
    if tau_min >= tau_max {
        return None;
    }

    // --- Step 3: first dip under the threshold, refined by walking forward
    // while the function keeps decreasing (avoids octave-low false dips) ---
    let mut period = 0;
    for tau in tau_min..=tau_max {
        if buffer[tau] < config.yin_threshold {
            let mut best = tau;
            while best + 1 <= tau_max && buffer[best + 1] < buffer[best] {
                best += 1;
            }
            period = best;
            break;
        }
    }

    // Fallback: the global minimum, if it is at least plausibly periodic.
    if period == 0 {
        let (min_tau, min_val) = (tau_min..=tau_max)
            .map(|tau| (tau, buffer[tau]))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        if min_val >= config.yin_fallback_threshold {
            return None;
        }
        period = min_tau;
    }

    // --- Step 4: parabolic interpolation around the chosen lag ---
    if period == 0 || period + 1 >= half {
        return None;
    }
    let y1 = buffer[period - 1];
    let y2 = buffer[period];
    let y3 = buffer[period + 1];

    let period_float = if (y1 - 2.0 * y2 + y3) != 0.0 {
        let peak_shift = (y1 - y3) / (2.0 * (y1 - 2.0 * y2 + y3));
        period as f32 + peak_shift
    } else {
        period as f32
    };
    if period_float <= 0.0 {
        return None;
    }

    let frequency = sample_rate as f32 / period_float;
    if !frequency.is_finite()
        || frequency < config.min_frequency
        || frequency > config.max_frequency
    {
        return None;
    }

    let clarity = (1.0 - y2).clamp(0.0, 1.0);
    Some((frequency, clarity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BUFFER_SIZE;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine_frame(freq: f32, amplitude: f32) -> AudioFrame {
        let samples = (0..BUFFER_SIZE)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect();
        AudioFrame::new(samples, SAMPLE_RATE)
    }

    /// Feed enough identical frames for confidence to accumulate, return the
    /// last observation.
    fn observe_until_stable(detector: &mut PitchDetector, frame: &AudioFrame) -> PitchObservation {
        let mut last = detector.observe(frame);
        for _ in 0..9 {
            last = detector.observe(frame);
        }
        last
    }

    #[test]
    fn detects_pure_sines_within_one_percent() {
        for freq in [110.0, 440.0, 880.0] {
            let mut detector = PitchDetector::new(DetectorConfig::default());
            let frame = sine_frame(freq, 0.5);
            let obs = observe_until_stable(&mut detector, &frame);
            assert!(obs.is_detecting, "no detection at {freq} Hz");
            let detected = obs.frequency_hz.unwrap();
            let relative_error = (detected - freq).abs() / freq;
            assert!(
                relative_error < 0.01,
                "{freq} Hz detected as {detected} Hz"
            );
        }
    }

    #[test]
    fn silence_never_detects() {
        let mut detector = PitchDetector::new(DetectorConfig::default());
        let frame = AudioFrame::new(vec![0.0; BUFFER_SIZE], SAMPLE_RATE);
        for _ in 0..20 {
            let obs = detector.observe(&frame);
            assert!(!obs.is_detecting);
            assert_eq!(obs.frequency_hz, None);
        }
    }

    #[test]
    fn sub_floor_input_is_treated_as_silence() {
        let mut detector = PitchDetector::new(DetectorConfig::default());
        let frame = sine_frame(440.0, 0.001);
        let obs = observe_until_stable(&mut detector, &frame);
        assert!(!obs.is_detecting);
    }

    #[test]
    fn single_pitched_frame_is_not_enough() {
        let mut detector = PitchDetector::new(DetectorConfig::default());
        let obs = detector.observe(&sine_frame(440.0, 0.5));
        // One frame of signal must not flip detection on.
        assert!(!obs.is_detecting);
    }

    #[test]
    fn broadband_noise_is_rejected() {
        let mut detector = PitchDetector::new(DetectorConfig::default());
        // Deterministic pseudo-noise, loud enough to pass the RMS gate.
        let mut state: u32 = 0x2545_F491;
        let samples: Vec<f32> = (0..BUFFER_SIZE)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state as f32 / u32::MAX as f32) - 0.5
            })
            .collect();
        let frame = AudioFrame::new(samples, SAMPLE_RATE);
        let obs = observe_until_stable(&mut detector, &frame);
        assert!(!obs.is_detecting);
    }

    #[test]
    fn out_of_range_frequency_is_rejected() {
        let mut detector = PitchDetector::new(DetectorConfig::trumpet());
        // 110 Hz (A2) sits below the trumpet fundamental range.
        let obs = observe_until_stable(&mut detector, &sine_frame(110.0, 0.5));
        assert!(!obs.is_detecting);
    }

    #[test]
    fn confidence_decays_after_signal_stops() {
        let mut detector = PitchDetector::new(DetectorConfig::default());
        let tone = sine_frame(440.0, 0.5);
        let silence = AudioFrame::new(vec![0.0; BUFFER_SIZE], SAMPLE_RATE);
        let obs = observe_until_stable(&mut detector, &tone);
        assert!(obs.is_detecting);
        let mut after = detector.observe(&silence);
        for _ in 0..5 {
            after = detector.observe(&silence);
        }
        assert!(!after.is_detecting);
        assert!(after.confidence < obs.confidence);
    }
}
