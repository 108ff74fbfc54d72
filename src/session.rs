//! Live session controller.
//!
//! Owns every per-session resource exclusively: the network link, the
//! capture manager, the playback engine and the frame sampler. The main
//! event loop forwards `NetEvent`s and `MediaEvent`s here; the controller
//! mutates state and drives the devices. Exactly one session exists at a
//! time and a stopped session is never restarted — the caller builds a
//! fresh one.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::{AnalysisTap, PlaybackEngine};
use crate::audio::pcm_codec;
use crate::config::Config;
use crate::media::{CaptureManager, FrameSampler};
use crate::net_link::{NetCommand, NetEvent, NetLink};
use crate::protocol::ServerContent;
use crate::state::SessionState;
use crate::transcript::Transcript;

/// Capture-side events produced on dedicated device threads.
#[derive(Debug)]
pub enum MediaEvent {
    /// One fixed-size block of mono f32 microphone samples.
    AudioBlock(Vec<f32>),
    /// One base64 JPEG snapshot of the active video source.
    Frame(String),
}

// 命令通道容量；媒体发送是尽力而为，队列满则丢弃
const NET_CMD_CAPACITY: usize = 64;

// 拆除时给网络任务发送关闭帧的宽限期
const LINK_CLOSE_GRACE: std::time::Duration = std::time::Duration::from_millis(250);

pub struct LiveSession {
    config: Config,
    state: SessionState,
    error: Option<String>,
    transcript: Transcript,
    tap: AnalysisTap,
    net_tx: Option<mpsc::Sender<NetCommand>>,
    net_task: Option<JoinHandle<()>>,
    capture: Option<CaptureManager>,
    playback: Option<PlaybackEngine>,
    sampler: Option<FrameSampler>,
    media_tx: mpsc::Sender<MediaEvent>,
}

impl LiveSession {
    pub fn new(config: Config, media_tx: mpsc::Sender<MediaEvent>) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            error: None,
            transcript: Transcript::new(),
            tap: AnalysisTap::new(),
            net_tx: None,
            net_task: None,
            capture: None,
            playback: None,
            sampler: None,
            media_tx,
        }
    }

    /// Acquire devices and open the network link. On any failure the
    /// partially acquired resources are torn down and the session lands
    /// in `Closed` with an error message.
    pub fn start(&mut self, net_event_tx: mpsc::Sender<NetEvent>) {
        if self.state != SessionState::Idle {
            return;
        }
        self.state = SessionState::Connecting;
        self.error = None;

        let playback = match PlaybackEngine::start(
            self.config.playback_device,
            self.config.output_sample_rate,
            self.tap.clone(),
        ) {
            Ok(p) => p,
            Err(e) => {
                self.fail(format!("Audio output unavailable: {:#}", e));
                return;
            }
        };
        self.playback = Some(playback);

        let capture = match CaptureManager::acquire_primary(&self.config) {
            Ok(c) => c,
            Err(e) => {
                self.fail(format!("{:#}", e));
                return;
            }
        };
        self.capture = Some(capture);

        let (cmd_tx, cmd_rx) = mpsc::channel::<NetCommand>(NET_CMD_CAPACITY);
        self.net_tx = Some(cmd_tx);
        let link = NetLink::new(self.config.clone(), net_event_tx, cmd_rx);
        self.net_task = Some(tokio::spawn(link.run()));
    }

    pub fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Opened => {
                if self.state != SessionState::Connecting {
                    return;
                }
                log::info!("Session open");
                self.state = SessionState::Open;
                if let Some(capture) = self.capture.as_mut() {
                    if let Err(e) = capture.start_audio(self.media_tx.clone()) {
                        self.fail(format!("Failed to start microphone: {:#}", e));
                        return;
                    }
                    match FrameSampler::start(
                        capture.router(),
                        self.config.frame_rate,
                        self.config.jpeg_quality,
                        self.media_tx.clone(),
                    ) {
                        Ok(s) => self.sampler = Some(s),
                        Err(e) => log::warn!("Frame sampler failed to start: {:#}", e),
                    }
                }
            }
            NetEvent::Message(content) => self.handle_server_content(content),
            NetEvent::Closed => {
                log::info!("Session closed by remote");
                self.teardown();
                self.state = SessionState::Closed;
            }
            NetEvent::Error(msg) => {
                log::error!("Session error: {}", msg);
                self.error = Some(msg);
                self.state = SessionState::Errored;
                self.teardown();
                self.state = SessionState::Closed;
            }
        }
    }

    fn handle_server_content(&mut self, content: ServerContent) {
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                let Some(inline) = part.inline_data else {
                    continue;
                };
                if !inline.mime_type.starts_with("audio/pcm") {
                    continue;
                }
                match pcm_codec::decode_chunk(&inline.data) {
                    Ok(samples) => {
                        if let Some(playback) = self.playback.as_mut() {
                            playback.enqueue(samples);
                        }
                    }
                    Err(e) => log::warn!("Dropping undecodable audio chunk: {}", e),
                }
            }
        }

        if let Some(t) = content.output_transcription {
            self.transcript.apply_delta(&t.text);
        }
        if content.interrupted {
            self.transcript.interrupt();
        }
        if content.turn_complete {
            self.transcript.complete_turn();
        }
    }

    /// Forward captured media to the network link. Only meaningful while
    /// open; a full command queue drops the chunk rather than blocking
    /// the event loop.
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.state != SessionState::Open {
            return;
        }
        let Some(tx) = &self.net_tx else { return };

        let cmd = match event {
            MediaEvent::AudioBlock(samples) => {
                NetCommand::SendAudio(pcm_codec::encode_block(&samples))
            }
            MediaEvent::Frame(payload) => NetCommand::SendFrame(payload),
        };
        if let Err(e) = tx.try_send(cmd) {
            log::warn!("Network command queue full, dropping chunk: {}", e);
        }
    }

    /// User-initiated stop. Idempotent.
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(tx) = &self.net_tx {
            let _ = tx.try_send(NetCommand::Close);
        }
        self.teardown();
        self.state = SessionState::Closed;
    }

    /// Release every per-session resource. Safe to call repeatedly.
    fn teardown(&mut self) {
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
        }
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
        // Dropping the command sender ends the link task's loop; it sends
        // the WebSocket close frame on that path, so give it a grace
        // period to exit on its own before aborting a hung task.
        self.net_tx.take();
        if let Some(mut task) = self.net_task.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if tokio::time::timeout(LINK_CLOSE_GRACE, &mut task)
                            .await
                            .is_err()
                        {
                            task.abort();
                        }
                    });
                }
                // No runtime (e.g. dropped after shutdown): abort is all
                // that is left to do.
                Err(_) => task.abort(),
            }
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        self.transcript.clear();
    }

    fn fail(&mut self, msg: String) {
        log::error!("{}", msg);
        self.error = Some(msg);
        self.teardown();
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn caption(&self) -> &str {
        self.transcript.caption()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn tap(&self) -> AnalysisTap {
        self.tap.clone()
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.is_screen_sharing())
    }

    /// Toggle screen sharing; a no-op unless the session is open.
    pub fn toggle_screen_share(&mut self) -> Result<bool> {
        if self.state != SessionState::Open {
            return Ok(false);
        }
        match self.capture.as_mut() {
            Some(capture) => capture.toggle_screen_share(),
            None => Ok(false),
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ModelTurn, Transcription};

    fn session() -> LiveSession {
        let (media_tx, _media_rx) = mpsc::channel(8);
        LiveSession::new(Config::default(), media_tx)
    }

    #[test]
    fn new_session_is_idle() {
        let s = session();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.caption().is_empty());
        assert!(s.error_message().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut s = session();
        s.stop();
        assert_eq!(s.state(), SessionState::Closed);
        s.stop();
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn remote_error_surfaces_message_and_closes() {
        let mut s = session();
        s.state = SessionState::Connecting;
        s.handle_net_event(NetEvent::Error("boom".into()));
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.error_message(), Some("boom"));
    }

    #[test]
    fn transcription_flows_into_caption() {
        let mut s = session();
        s.state = SessionState::Open;
        s.handle_net_event(NetEvent::Message(ServerContent {
            output_transcription: Some(Transcription { text: "Hi".into() }),
            ..Default::default()
        }));
        s.handle_net_event(NetEvent::Message(ServerContent {
            output_transcription: Some(Transcription {
                text: " there".into(),
            }),
            ..Default::default()
        }));
        assert_eq!(s.caption(), "Hi there");

        s.handle_net_event(NetEvent::Message(ServerContent {
            turn_complete: true,
            ..Default::default()
        }));
        s.handle_net_event(NetEvent::Message(ServerContent {
            output_transcription: Some(Transcription { text: "Next".into() }),
            ..Default::default()
        }));
        assert_eq!(s.caption(), "Next");
    }

    #[tokio::test]
    async fn stop_lets_the_link_task_exit_on_its_own() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let mut s = session();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<NetCommand>(NET_CMD_CAPACITY);
        let finished = Arc::new(AtomicBool::new(false));
        let finished_in_task = finished.clone();

        // Stand-in for the link loop: drains commands until the sender is
        // dropped, then records its orderly exit.
        s.net_tx = Some(cmd_tx);
        s.net_task = Some(tokio::spawn(async move {
            while cmd_rx.recv().await.is_some() {}
            finished_in_task.store(true, Ordering::SeqCst);
        }));
        s.state = SessionState::Open;

        s.stop();
        assert_eq!(s.state(), SessionState::Closed);

        // The task must reach its natural end, not get aborted mid-close.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn media_events_ignored_unless_open() {
        let mut s = session();
        // Neither idle nor closed sessions forward media.
        s.handle_media_event(MediaEvent::AudioBlock(vec![0.0; 16]));
        s.stop();
        s.handle_media_event(MediaEvent::Frame("AAAA".into()));
    }

    #[test]
    fn non_audio_parts_are_skipped() {
        let mut s = session();
        s.state = SessionState::Open;
        s.handle_net_event(NetEvent::Message(ServerContent {
            model_turn: Some(ModelTurn {
                parts: vec![crate::protocol::Part {
                    inline_data: None,
                    text: Some("not audio".into()),
                }],
            }),
            ..Default::default()
        }));
        assert_eq!(s.state(), SessionState::Open);
    }
}
