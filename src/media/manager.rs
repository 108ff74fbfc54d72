//! Device stream ownership and video-source switching.
//!
//! One persistent microphone+camera acquisition per session; an optional
//! screen-share source that may come and go any number of times without
//! touching the audio stream. Audio ALWAYS originates from the
//! microphone regardless of the active video source.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::video::{CameraSource, RawFrame, ScreenSource, VideoKind, VideoSource};
use crate::audio::MicCapture;
use crate::config::Config;
use crate::error::SessionError;
use crate::session::MediaEvent;

/// Routes frame grabs to whichever video source is active. Shared with
/// the frame sampler thread behind a mutex.
pub struct VideoRouter {
    camera: Option<Box<dyn VideoSource>>,
    screen: Option<Box<dyn VideoSource>>,
}

impl VideoRouter {
    pub fn new(camera: Box<dyn VideoSource>) -> Self {
        Self {
            camera: Some(camera),
            screen: None,
        }
    }

    pub fn active_kind(&self) -> VideoKind {
        if self.screen.is_some() {
            VideoKind::Screen
        } else {
            VideoKind::Camera
        }
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    pub fn set_screen(&mut self, screen: Option<Box<dyn VideoSource>>) {
        self.screen = screen;
    }

    /// Grab a frame from the active source. A failing screen source is
    /// treated as the share having been ended outside the app: drop it
    /// and fall back to the camera, exactly like an explicit toggle-off.
    pub fn grab_active(&mut self) -> Result<Option<RawFrame>> {
        if let Some(screen) = self.screen.as_mut() {
            match screen.grab() {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    log::warn!("Screen share ended: {:#}", e);
                    self.screen = None;
                }
            }
        }
        match self.camera.as_mut() {
            Some(camera) => camera.grab(),
            None => Ok(None),
        }
    }

    fn clear(&mut self) {
        self.screen = None;
        self.camera = None;
    }
}

/// Owns the session's device streams: the persistent microphone+camera
/// pair and the optional screen share.
pub struct CaptureManager {
    mic: Option<MicCapture>,
    router: Arc<Mutex<VideoRouter>>,
}

impl CaptureManager {
    /// Request combined microphone+camera access. Either device failing
    /// surfaces as a `DeviceAccess` error and acquires nothing.
    pub fn acquire_primary(config: &Config) -> Result<Self> {
        let mic = MicCapture::open(
            config.capture_device,
            config.input_sample_rate,
            config.block_samples,
        )
        .map_err(|e| SessionError::DeviceAccess(format!("{:#}", e)))?;

        let camera = CameraSource::open(config.camera_device)
            .map_err(|e| SessionError::DeviceAccess(format!("{:#}", e)))?;

        Ok(Self {
            mic: Some(mic),
            router: Arc::new(Mutex::new(VideoRouter::new(Box::new(camera)))),
        })
    }

    /// Start streaming microphone blocks once the connection is open.
    pub fn start_audio(&mut self, tx: mpsc::Sender<MediaEvent>) -> Result<()> {
        self.mic
            .as_mut()
            .context("microphone not acquired")?
            .start(tx)
    }

    /// Toggle the screen share on or off; returns the new sharing state.
    /// Never touches the microphone stream.
    pub fn toggle_screen_share(&mut self) -> Result<bool> {
        self.toggle_screen_with(|| Ok(Box::new(ScreenSource::open()?)))
    }

    fn toggle_screen_with(
        &mut self,
        open: impl FnOnce() -> Result<Box<dyn VideoSource>>,
    ) -> Result<bool> {
        let mut router = self.router.lock().unwrap();
        if router.is_screen_sharing() {
            router.set_screen(None);
            log::info!("Screen share stopped, reverting to camera");
            Ok(false)
        } else {
            router.set_screen(Some(open()?));
            Ok(true)
        }
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.router.lock().unwrap().is_screen_sharing()
    }

    /// Shared router handle for the frame sampler.
    pub fn router(&self) -> Arc<Mutex<VideoRouter>> {
        Arc::clone(&self.router)
    }

    /// Stop all tracks of every acquired stream. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut mic) = self.mic.take() {
            mic.stop();
        }
        self.router.lock().unwrap().clear();
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.release();
    }
}
