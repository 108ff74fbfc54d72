//! Gapless playback of decoded model audio.
//!
//! `PlaybackScheduler` is the pure scheduling rule: each buffer starts at
//! `max(now, next_start)` and pushes `next_start` forward by its duration,
//! so chunks play strictly in arrival order with no overlap. A dedicated
//! ALSA playback thread consumes buffers FIFO, converts f32 → i16,
//! recovers from XRUNs, and feeds every played sample into the shared
//! analysis tap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;

use super::alsa_device;
use super::analysis::AnalysisTap;

/// Pure gapless scheduling rule over a monotonic clock in seconds.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a buffer of `duration` seconds at time `now`; returns the
    /// start time. FIFO, no reordering, no overlap.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = now.max(self.next_start);
        self.next_start = start + duration;
        start
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

/// The output audio context: owns the playback thread and the queue
/// feeding it. Queue depth is deliberately unbounded; utterances are
/// short and arrival order is the playback order.
pub struct PlaybackEngine {
    tx: Option<mpsc::UnboundedSender<Vec<f32>>>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    scheduler: PlaybackScheduler,
    started: Instant,
    sample_rate: u32,
}

impl PlaybackEngine {
    /// Open the playback device and start the output thread.
    pub fn start(device: &str, sample_rate: u32, tap: AnalysisTap) -> Result<Self> {
        let (pcm, params) = alsa_device::open_playback(device, sample_rate)?;
        let (tx, rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("audio-play".into())
                .spawn(move || {
                    if let Err(e) = play_thread(pcm, params, rx, tap, &running) {
                        log::error!("Playback thread error: {}", e);
                    }
                })?
        };

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            running,
            scheduler: PlaybackScheduler::new(),
            started: Instant::now(),
            sample_rate,
        })
    }

    /// Enqueue a decoded buffer for gapless sequential playback; returns
    /// the scheduled start time in engine seconds.
    pub fn enqueue(&mut self, samples: Vec<f32>) -> f64 {
        let duration = samples.len() as f64 / self.sample_rate as f64;
        let now = self.started.elapsed().as_secs_f64();
        let start = self.scheduler.schedule(now, duration);

        if let Some(tx) = &self.tx
            && tx.send(samples).is_err()
        {
            log::warn!("Playback thread gone, dropping audio buffer");
        }
        start
    }

    /// Close the output context. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the sender unblocks the thread's recv.
        self.tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play_thread(
    pcm: alsa::pcm::PCM,
    params: alsa_device::NegotiatedParams,
    mut rx: mpsc::UnboundedReceiver<Vec<f32>>,
    tap: AnalysisTap,
    running: &AtomicBool,
) -> Result<()> {
    let channels = params.channels as usize;
    let io = pcm.io_i16()?;

    log::info!(
        "Playback started: rate={}, channels={}",
        params.sample_rate,
        params.channels
    );

    while running.load(Ordering::Relaxed) {
        let Some(samples) = rx.blocking_recv() else {
            log::info!("Playback channel closed");
            break;
        };
        if samples.is_empty() {
            continue;
        }

        // Feed the analysis tap with exactly what becomes audible.
        tap.push_samples(&samples);

        // f32 → i16, upmixing mono to however many channels the device
        // negotiated.
        let mut pcm_data: Vec<i16> = Vec::with_capacity(samples.len() * channels);
        for &s in &samples {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            for _ in 0..channels {
                pcm_data.push(v);
            }
        }

        // Write with retry to ride out short writes and XRUN recovery.
        let total_frames = pcm_data.len() / channels;
        let mut frames_written = 0;
        while frames_written < total_frames {
            let offset = frames_written * channels;
            match io.writei(&pcm_data[offset..]) {
                Ok(n) => frames_written += n,
                Err(e) => {
                    log::warn!("ALSA playback error: {}, recovering...", e);
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        break;
                    }
                }
            }
        }
    }

    log::info!("Playback stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_are_non_decreasing_and_gapless() {
        let mut sched = PlaybackScheduler::new();
        let durations = [0.25, 0.1, 0.5, 0.05, 0.3];
        let now = 1.0;

        let mut starts = Vec::new();
        for &d in &durations {
            starts.push((sched.schedule(now, d), d));
        }

        assert!(starts[0].0 >= now, "first start never precedes now");
        for pair in starts.windows(2) {
            let (prev_start, prev_dur) = pair[0];
            let (start, _) = pair[1];
            assert!(start >= prev_start, "starts must be non-decreasing");
            assert!(
                start >= prev_start + prev_dur - 1e-9,
                "chunks must not overlap"
            );
        }
    }

    #[test]
    fn back_to_back_chunks_are_contiguous() {
        let mut sched = PlaybackScheduler::new();
        let s1 = sched.schedule(0.0, 0.2);
        let s2 = sched.schedule(0.0, 0.2);
        assert_eq!(s1, 0.0);
        assert_eq!(s2, 0.2);
        assert_eq!(sched.next_start(), 0.4);
    }

    #[test]
    fn late_arrival_schedules_at_now() {
        let mut sched = PlaybackScheduler::new();
        sched.schedule(0.0, 0.1);
        // The queue drained long ago; a new chunk starts immediately.
        let start = sched.schedule(5.0, 0.1);
        assert_eq!(start, 5.0);
        assert_eq!(sched.next_start(), 5.1);
    }

    #[test]
    fn zero_duration_buffer_does_not_move_the_timeline_backwards() {
        let mut sched = PlaybackScheduler::new();
        let s1 = sched.schedule(1.0, 0.0);
        let s2 = sched.schedule(1.0, 0.5);
        assert_eq!(s1, 1.0);
        assert_eq!(s2, 1.0);
    }
}
