//! Video sources for the live session.
//!
//! Both the camera and the screen share implement `VideoSource`; the
//! frame sampler only ever sees the trait. The camera runs its own
//! capture thread (V4L2 streaming I/O blocks at the device frame rate)
//! and keeps a latest-frame mailbox; the screen is grabbed on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    Camera,
    Screen,
}

/// One decoded video frame, tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// A source of video frames. `grab` returns `None` until the source has
/// produced its first frame (e.g. right after a switch, before the device
/// delivers anything) and `Err` when the source has died — the router
/// treats a dead screen source as the native "stop sharing" signal.
pub trait VideoSource: Send {
    fn grab(&mut self) -> Result<Option<RawFrame>>;
    fn kind(&self) -> VideoKind;
}

// ======================== Camera (V4L2) ========================

pub struct CameraSource {
    latest: Arc<Mutex<Option<RawFrame>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Open the camera and start its capture thread. Fails synchronously
    /// if the device is missing or refuses a supported pixel format.
    pub fn open(device_path: &str) -> Result<Self> {
        let mut dev = v4l::Device::with_path(device_path)
            .with_context(|| format!("failed to open camera '{}'", device_path))?;

        let mut fmt = dev.format().context("failed to query camera format")?;
        fmt.fourcc = FourCC::new(b"YUYV");
        let fmt = dev
            .set_format(&fmt)
            .context("failed to configure camera format")?;

        let fourcc = fmt.fourcc;
        if fourcc != FourCC::new(b"YUYV") && fourcc != FourCC::new(b"MJPG") {
            bail!("camera pixel format {} not supported", fourcc);
        }

        let latest: Arc<Mutex<Option<RawFrame>>> = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let latest = latest.clone();
            let running = running.clone();
            let width = fmt.width;
            let height = fmt.height;
            thread::Builder::new()
                .name("camera-capture".into())
                .spawn(move || {
                    if let Err(e) =
                        camera_thread(dev, fourcc, width, height, latest, &running)
                    {
                        log::error!("Camera thread error: {}", e);
                    }
                })?
        };

        Ok(Self {
            latest,
            running,
            handle: Some(handle),
        })
    }
}

impl VideoSource for CameraSource {
    fn grab(&mut self) -> Result<Option<RawFrame>> {
        Ok(self.latest.lock().unwrap().clone())
    }

    fn kind(&self) -> VideoKind {
        VideoKind::Camera
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn camera_thread(
    mut dev: v4l::Device,
    fourcc: FourCC,
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<RawFrame>>>,
    running: &AtomicBool,
) -> Result<()> {
    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4)
        .context("failed to start camera stream")?;

    log::info!("Camera started: {}x{} {}", width, height, fourcc);

    while running.load(Ordering::Relaxed) {
        let (buf, _meta) = match stream.next() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Camera read error: {}", e);
                continue;
            }
        };

        let frame = if fourcc == FourCC::new(b"MJPG") {
            match decode_mjpg(buf, width, height) {
                Ok(f) => f,
                Err(e) => {
                    log::warn!("Dropping bad camera frame: {}", e);
                    continue;
                }
            }
        } else {
            yuyv_to_rgb(buf, width, height)
        };

        *latest.lock().unwrap() = Some(frame);
    }

    log::info!("Camera stopped");
    Ok(())
}

fn decode_mjpg(buf: &[u8], width: u32, height: u32) -> Result<RawFrame> {
    let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
        .context("MJPG frame decode failed")?;
    let rgb = img.to_rgb8();
    let _ = (width, height); // trust the decoded dimensions over the format
    Ok(RawFrame {
        width: rgb.width(),
        height: rgb.height(),
        rgb: rgb.into_raw(),
    })
}

/// YUYV 4:2:2 → packed RGB8, BT.601 full range.
fn yuyv_to_rgb(buf: &[u8], width: u32, height: u32) -> RawFrame {
    let pixels = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);

    for quad in buf.chunks_exact(4).take(pixels / 2) {
        let y0 = quad[0] as f32;
        let u = quad[1] as f32 - 128.0;
        let y1 = quad[2] as f32;
        let v = quad[3] as f32 - 128.0;

        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgb.push(r);
            rgb.push(g);
            rgb.push(b);
        }
    }

    RawFrame { width, height, rgb }
}

// ======================== Screen share ========================

pub struct ScreenSource {
    monitor: xcap::Monitor,
}

impl ScreenSource {
    /// Capture the primary monitor (first monitor when none is marked
    /// primary).
    pub fn open() -> Result<Self> {
        let mut monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;
        if monitors.is_empty() {
            bail!("no monitor available for screen capture");
        }
        let idx = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let monitor = monitors.swap_remove(idx);
        log::info!(
            "Screen share started: {} ({}x{})",
            monitor.name().unwrap_or_default(),
            monitor.width().unwrap_or(0),
            monitor.height().unwrap_or(0)
        );
        Ok(Self { monitor })
    }
}

impl VideoSource for ScreenSource {
    fn grab(&mut self) -> Result<Option<RawFrame>> {
        // A capture failure here is the desktop analogue of the screen
        // track ending (monitor unplugged, compositor revoked access);
        // the router reverts to the camera on Err.
        let image = self
            .monitor
            .capture_image()
            .context("screen capture failed")?;
        let width = image.width();
        let height = image.height();
        let rgb = image::DynamicImage::ImageRgba8(image).to_rgb8().into_raw();
        Ok(Some(RawFrame { width, height, rgb }))
    }

    fn kind(&self) -> VideoKind {
        VideoKind::Screen
    }
}
