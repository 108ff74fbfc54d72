//! audio - capture, playback, codec, and analysis for the live session
//!
//! Real-time ALSA I/O runs on dedicated OS threads (NOT tokio tasks) to
//! avoid contention with async network tasks; everything crosses back to
//! the event loop over mpsc channels.

mod alsa_device;
pub mod analysis;
mod mic;
pub mod pcm_codec;
mod playback;

pub use analysis::AnalysisTap;
pub use mic::MicCapture;
pub use playback::{PlaybackEngine, PlaybackScheduler};
