//! # Spectral Analysis Module
//!
//! FFT-based helpers for the pitch detector's confidence gating. The YIN
//! search itself runs in the time domain; the spectrum is only consulted to
//! corroborate that a candidate frame actually contains a pitched sound
//! (energy centroid inside a plausible band) before it is allowed to raise
//! detection confidence.

use rustfft::{num_complex::Complex, FftPlanner};

/// Removes the DC offset from a signal by making its average value zero.
///
/// A DC component inflates the 0 Hz bin and drags the spectral centroid
/// low, so the signal is centered before windowing.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Computes the magnitude spectrum of a signal.
///
/// Pipeline: DC offset removal, Hann window, forward FFT, then the
/// magnitudes of the first half of the bins (up to Nyquist).
///
/// # Arguments
/// * `signal` - Input audio samples (any non-zero length)
///
/// # Returns
/// * `Vec<f32>` - Magnitude per bin, `signal.len() / 2` entries
pub fn magnitude_spectrum(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut processed = signal.to_vec();
    remove_dc_offset(&mut processed);
    apply_hann_window(&mut processed);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);

    let mut buffer: Vec<Complex<f32>> = processed
        .into_iter()
        .map(|sample| Complex { re: sample, im: 0.0 })
        .collect();

    fft.process(&mut buffer);

    buffer.iter().take(n / 2).map(|c| c.norm()).collect()
}

/// Computes the spectral centroid of a magnitude spectrum, in Hz.
///
/// The centroid is the magnitude-weighted mean bin frequency. Pitched
/// monophonic material concentrates energy around the fundamental and its
/// first harmonics; broadband noise pushes the centroid far higher.
///
/// Returns `None` when the spectrum carries no energy.
pub fn spectral_centroid(magnitudes: &[f32], sample_rate: u32) -> Option<f32> {
    if magnitudes.is_empty() {
        return None;
    }
    let total: f32 = magnitudes.iter().sum();
    if total <= f32::EPSILON {
        return None;
    }

    // Bin width for an N-point FFT whose first N/2 magnitudes we keep.
    let bin_width = sample_rate as f32 / (magnitudes.len() * 2) as f32;
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * bin_width * m)
        .sum();

    Some(weighted / total)
}

/// Computes the zero-crossing rate of a signal (crossings per sample).
///
/// Tonal sounds cross zero roughly twice per fundamental period; hiss and
/// transients cross far more often. Used alongside the centroid to gate
/// detection confidence.
pub fn zero_crossing_rate(signal: &[f32]) -> f32 {
    if signal.len() < 2 {
        return 0.0;
    }
    let crossings = signal
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (signal.len() - 1) as f32
}
