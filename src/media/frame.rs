//! Periodic JPEG snapshots of the active video source.
//!
//! The sampler thread wakes on a fixed cadence (default 2 fps), grabs
//! the latest frame from the router, JPEG-encodes it and hands the
//! base64 payload to the event loop. Ticks are best-effort: when an
//! encode overruns the interval the missed ticks are simply skipped.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::mpsc;

use super::manager::VideoRouter;
use super::video::RawFrame;
use crate::session::MediaEvent;

/// Encode a raw RGB frame as base64 JPEG. Returns `None` for degenerate
/// frames (zero width or height), which the sampler silently skips.
pub fn encode_jpeg_frame(frame: &RawFrame, quality: u8) -> Result<Option<String>> {
    if frame.width == 0 || frame.height == 0 {
        return Ok(None);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), quality)
        .encode(
            &frame.rgb,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .context("JPEG encode failed")?;

    Ok(Some(STANDARD.encode(&jpeg)))
}

/// Samples the active video source at a fixed frame rate while the
/// session is open.
pub struct FrameSampler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSampler {
    pub fn start(
        router: Arc<Mutex<VideoRouter>>,
        frame_rate: u32,
        quality: u8,
        tx: mpsc::Sender<MediaEvent>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_millis(1000 / frame_rate.max(1) as u64);

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("frame-sampler".into())
                .spawn(move || {
                    sampler_thread(router, interval, quality, tx, &running);
                })?
        };

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop sampling. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sampler_thread(
    router: Arc<Mutex<VideoRouter>>,
    interval: Duration,
    quality: u8,
    tx: mpsc::Sender<MediaEvent>,
    running: &AtomicBool,
) {
    log::info!("Frame sampling started at {:?} intervals", interval);
    let mut deadline = Instant::now();

    while running.load(Ordering::Relaxed) {
        deadline += interval;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            // Encoding overran; drop the missed ticks rather than burst.
            deadline = now;
        }
        if !running.load(Ordering::Relaxed) {
            break;
        }

        let frame = match router.lock().unwrap().grab_active() {
            Ok(Some(f)) => f,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("Frame grab failed: {:#}", e);
                continue;
            }
        };

        match encode_jpeg_frame(&frame, quality) {
            Ok(Some(payload)) => {
                if tx.blocking_send(MediaEvent::Frame(payload)).is_err() {
                    log::warn!("Frame receiver dropped, stopping sampler");
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Frame encode failed: {:#}", e),
        }
    }

    log::info!("Frame sampling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_frame_is_skipped() {
        let frame = RawFrame {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        assert!(encode_jpeg_frame(&frame, 50).unwrap().is_none());
    }

    #[test]
    fn small_frame_encodes_to_base64_jpeg() {
        let frame = RawFrame {
            width: 2,
            height: 2,
            rgb: vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 128, 128, 128],
        };
        let payload = encode_jpeg_frame(&frame, 50).unwrap().unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        // JPEG SOI marker.
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}
