//! media - camera/screen video sources, the capture manager, and the
//! frame sampler that turns the active source into periodic snapshots.

mod frame;
mod manager;
mod video;

pub use frame::{FrameSampler, encode_jpeg_frame};
pub use manager::{CaptureManager, VideoRouter};
pub use video::{CameraSource, RawFrame, ScreenSource, VideoKind, VideoSource};
