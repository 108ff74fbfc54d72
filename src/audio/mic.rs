//! Microphone capture feeding fixed-size f32 blocks to the event loop.
//!
//! The device is opened when the session acquires its media (so permission
//! and device errors surface synchronously), but the capture thread only
//! starts once the connection is open. Blocks are 4096 samples at the
//! session input rate; if the hardware negotiated a different rate the
//! thread resamples linearly before blocking up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use alsa::pcm::PCM;
use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::alsa_device::{self, NegotiatedParams};
use crate::session::MediaEvent;

pub struct MicCapture {
    pcm: Option<(PCM, NegotiatedParams)>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    target_rate: u32,
    block_samples: usize,
}

impl MicCapture {
    /// Open the capture device without starting the thread.
    pub fn open(device: &str, target_rate: u32, block_samples: usize) -> Result<Self> {
        let (pcm, params) = alsa_device::open_capture(device, target_rate)
            .context("microphone unavailable")?;
        Ok(Self {
            pcm: Some((pcm, params)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            target_rate,
            block_samples,
        })
    }

    /// Start streaming audio blocks into the media event channel.
    pub fn start(&mut self, tx: mpsc::Sender<MediaEvent>) -> Result<()> {
        let Some((pcm, params)) = self.pcm.take() else {
            // Already started or released; nothing to do.
            return Ok(());
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let target_rate = self.target_rate;
        let block_samples = self.block_samples;

        self.handle = Some(
            thread::Builder::new()
                .name("mic-capture".into())
                .spawn(move || {
                    if let Err(e) =
                        record_thread(pcm, params, target_rate, block_samples, tx, &running)
                    {
                        log::error!("Recording thread error: {}", e);
                    }
                })?,
        );
        Ok(())
    }

    /// Stop capture and release the device. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        self.pcm.take();
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
impl MicCapture {
    /// Deviceless stand-in for tests that only care about ownership and
    /// lifecycle, never about actual audio.
    pub(crate) fn deviceless() -> Self {
        Self {
            pcm: None,
            running: Arc::new(AtomicBool::new(true)),
            handle: None,
            target_rate: 16000,
            block_samples: 4096,
        }
    }

    /// Stable identity of this capture's control flag, for asserting that
    /// an instance survived an operation untouched.
    pub(crate) fn stream_id(&self) -> usize {
        Arc::as_ptr(&self.running) as usize
    }

    pub(crate) fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn record_thread(
    pcm: PCM,
    params: NegotiatedParams,
    target_rate: u32,
    block_samples: usize,
    tx: mpsc::Sender<MediaEvent>,
    running: &AtomicBool,
) -> Result<()> {
    let channels = params.channels as usize;
    let period_size = params.period_size;
    let io = pcm.io_i16()?;

    let mut read_buf = vec![0i16; period_size * channels];
    let mut accum: Vec<f32> = Vec::with_capacity(block_samples * 2);

    log::info!(
        "Recording started: rate={}, channels={}, period={}, block={}",
        params.sample_rate,
        params.channels,
        period_size,
        block_samples,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                // Interleaved → mono f32 (average across channels).
                let mut mono = Vec::with_capacity(frames);
                for i in 0..frames {
                    let mut sum = 0i32;
                    for c in 0..channels {
                        sum += read_buf[i * channels + c] as i32;
                    }
                    mono.push((sum / channels as i32) as f32 / 32768.0);
                }

                if params.sample_rate != target_rate {
                    mono = resample_linear(&mono, params.sample_rate, target_rate);
                }

                accum.extend_from_slice(&mono);

                while accum.len() >= block_samples {
                    let block: Vec<f32> = accum.drain(..block_samples).collect();
                    if tx.blocking_send(MediaEvent::AudioBlock(block)).is_err() {
                        log::warn!("Audio block receiver dropped, stopping capture");
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("Recording stopped");
    Ok(())
}

/// Per-period linear resampling. Good enough for speech into a lossy
/// realtime channel; the edge discontinuity between periods is inaudible
/// at these block sizes.
fn resample_linear(input: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || input.is_empty() {
        return input.to_vec();
    }
    let out_len = (input.len() as u64 * to as u64 / from as u64) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * (input.len() - 1) as f64 / (out_len.max(2) - 1) as f64;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = input[idx];
        let b = input[(idx + 1).min(input.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::resample_linear;

    #[test]
    fn identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 16000, 16000), input);
    }

    #[test]
    fn downsampling_halves_length() {
        let input: Vec<f32> = (0..480).map(|i| i as f32 / 480.0).collect();
        let out = resample_linear(&input, 48000, 16000);
        assert_eq!(out.len(), 160);
        // A linear ramp survives linear resampling.
        assert!((out[0] - 0.0).abs() < 1e-3);
        assert!((out[159] - input[479]).abs() < 1e-3);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample_linear(&[], 48000, 16000).is_empty());
    }
}
