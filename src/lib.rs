pub mod audio;
pub mod config;
pub mod content;
pub mod error;
pub mod media;
pub mod net_link;
pub mod notes;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transcript;
pub mod visualizer;

pub use config::Config;
pub use session::{LiveSession, MediaEvent};
pub use state::SessionState;
