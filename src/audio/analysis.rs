//! Shared analysis tap between playback and the visualizer.
//!
//! The playback thread pushes every sample it plays into a rolling
//! 256-sample window; readers get 128 byte-scaled frequency bins computed
//! over that window (Hann window, magnitude in dB mapped to 0..255 with
//! 0.5 smoothing). Only the playback side writes; the visualizer only
//! reads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

const FFT_SIZE: usize = 256;
pub const FREQUENCY_BINS: usize = FFT_SIZE / 2;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING: f32 = 0.5;

pub struct AnalysisTap {
    inner: Arc<Mutex<TapInner>>,
}

struct TapInner {
    window: VecDeque<f32>,
    smoothed: [f32; FREQUENCY_BINS],
    fft: Arc<dyn Fft<f32>>,
}

impl Clone for AnalysisTap {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AnalysisTap {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        Self {
            inner: Arc::new(Mutex::new(TapInner {
                window: VecDeque::with_capacity(FFT_SIZE),
                smoothed: [0.0; FREQUENCY_BINS],
                fft,
            })),
        }
    }

    /// Called by the playback thread for every sample it writes out.
    pub fn push_samples(&self, samples: &[f32]) {
        let mut inner = self.inner.lock().unwrap();
        for &s in samples {
            if inner.window.len() == FFT_SIZE {
                inner.window.pop_front();
            }
            inner.window.push_back(s);
        }
    }

    /// Current frequency-domain energy as byte-scaled bins.
    pub fn byte_frequency_data(&self) -> [u8; FREQUENCY_BINS] {
        let mut inner = self.inner.lock().unwrap();

        let mut buf: Vec<Complex<f32>> = (0..FFT_SIZE)
            .map(|i| {
                let sample = inner.window.get(i).copied().unwrap_or(0.0);
                // Hann window
                let w = 0.5
                    * (1.0
                        - (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32).cos());
                Complex::new(sample * w, 0.0)
            })
            .collect();

        inner.fft.process(&mut buf);

        let mut out = [0u8; FREQUENCY_BINS];
        for (i, bin) in buf.iter().take(FREQUENCY_BINS).enumerate() {
            // Normalize: full-scale sine lands near 0 dB after correcting
            // for FFT length and Hann coherent gain.
            let magnitude = bin.norm() * 4.0 / FFT_SIZE as f32;
            let db = 20.0 * magnitude.max(1e-10).log10();
            let scaled = ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0);

            let smoothed = SMOOTHING * inner.smoothed[i] + (1.0 - SMOOTHING) * scaled;
            inner.smoothed[i] = smoothed;
            out[i] = (smoothed * 255.0) as u8;
        }
        out
    }

    /// Mean amplitude over all bins, 0..255. This is what drives the
    /// visualizer's speaking/idle selection.
    pub fn mean_amplitude(&self) -> f32 {
        let bins = self.byte_frequency_data();
        bins.iter().map(|&b| b as f32).sum::<f32>() / FREQUENCY_BINS as f32
    }
}

impl Default for AnalysisTap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_reads_zero() {
        let tap = AnalysisTap::new();
        tap.push_samples(&[0.0; 512]);
        assert_eq!(tap.mean_amplitude(), 0.0);
    }

    #[test]
    fn broadband_signal_reads_loud() {
        let tap = AnalysisTap::new();
        // Deterministic wideband signal: sum of several incommensurate tones.
        let samples: Vec<f32> = (0..512)
            .map(|i| {
                let t = i as f32;
                0.3 * (t * 0.21).sin() + 0.3 * (t * 0.73).sin() + 0.3 * (t * 1.37).sin()
            })
            .collect();
        tap.push_samples(&samples);
        // Prime the smoothing filter a few times.
        for _ in 0..4 {
            let _ = tap.byte_frequency_data();
        }
        assert!(tap.mean_amplitude() > 10.0);
    }

    #[test]
    fn window_keeps_only_latest_samples() {
        let tap = AnalysisTap::new();
        let loud: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.8).sin()).collect();
        tap.push_samples(&loud);
        // Flood the window with silence afterwards; the reading must decay.
        tap.push_samples(&[0.0; 512]);
        for _ in 0..16 {
            let _ = tap.byte_frequency_data();
        }
        assert!(tap.mean_amplitude() < 5.0);
    }
}
