use crate::audio::pcm_codec;
use crate::config::Config;
use crate::error::SessionError;
use crate::protocol::{ServerContent, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

// 实时链路的导师人设，随 setup 一并下发
const TUTOR_INSTRUCTION: &str = "You are a patient, encouraging AI tutor named \"Sphere\". \
You are watching a student solve problems via their camera. \
Guide them step-by-step. Do not give the answer immediately. \
Point out mistakes gently. Be concise because this is a real-time conversation.";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub enum NetEvent {
    /// Setup acknowledged by the server; the session is live.
    Opened,
    /// One parsed server turn payload.
    Message(ServerContent),
    /// Remote or local orderly close.
    Closed,
    Error(String),
}

#[derive(Debug)]
pub enum NetCommand {
    /// Base64 PCM block, 16 kHz mono.
    SendAudio(String),
    /// Base64 JPEG snapshot.
    SendFrame(String),
    Close,
}

// Setup 消息结构体，用于初始化连接
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupMessage<'a> {
    setup: SetupBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupBody<'a> {
    model: &'a str,
    generation_config: GenerationConfig<'a>,
    output_audio_transcription: EmptyObject,
    system_instruction: SystemInstruction<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'a str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Serialize)]
struct EmptyObject {}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputMessage<'a> {
    realtime_input: RealtimeInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput<'a> {
    media_chunks: [MediaChunk<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaChunk<'a> {
    mime_type: &'a str,
    data: &'a str,
}

pub struct NetLink {
    config: Config,
    tx: mpsc::Sender<NetEvent>,
    rx_cmd: mpsc::Receiver<NetCommand>,
}

impl NetLink {
    pub fn new(
        config: Config,
        tx: mpsc::Sender<NetEvent>,
        rx_cmd: mpsc::Receiver<NetCommand>,
    ) -> Self {
        Self { config, tx, rx_cmd }
    }

    // 单次连接，不自动重连；断开后由用户重新发起会话
    pub async fn run(mut self) {
        match self.connect_and_loop().await {
            Ok(()) => {
                let _ = self.tx.send(NetEvent::Closed).await;
            }
            Err(e) => {
                log::error!("Connection error: {:#}", e);
                let _ = self.tx.send(NetEvent::Error(format!("{:#}", e))).await;
            }
        }
    }

    // 进入连接和主循环，处理WebSocket消息和发送命令
    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        let ws_url = format!("{}?key={}", self.config.live_url, self.config.api_key);
        let url = Url::parse(&ws_url)?;
        let host = url.host_str().unwrap_or("generativelanguage.googleapis.com");

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&ws_url)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .body(())?;

        log::info!("Connecting to {}...", self.config.live_url);
        let (ws_stream, _) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| {
                SessionError::Connection(format!(
                    "no response within {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;
        log::info!("Connected, sending setup");

        let (mut write, mut read) = ws_stream.split();

        let setup = SetupMessage {
            setup: SetupBody {
                model: self.config.live_model,
                generation_config: GenerationConfig {
                    response_modalities: ["AUDIO"],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: self.config.voice_name,
                            },
                        },
                    },
                },
                output_audio_transcription: EmptyObject {},
                system_instruction: SystemInstruction {
                    parts: [TextPart {
                        text: TUTOR_INSTRUCTION,
                    }],
                },
            },
        };
        let setup_json = serde_json::to_string(&setup)?;
        write.send(Message::Text(setup_json.into())).await?;

        // 主循环，处理读取和写入
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            let text = match msg {
                                Message::Text(text) => text.to_string(),
                                // 服务端把 JSON 帧以二进制下发也要能处理
                                Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                                Message::Close(frame) => {
                                    log::info!("Server closed connection: {:?}", frame);
                                    return Ok(());
                                }
                                _ => continue,
                            };
                            self.dispatch(&text).await?;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(NetCommand::SendAudio(data)) => {
                            let msg = realtime_input_json(&pcm_codec::input_mime_type(), &data)?;
                            write.send(Message::Text(msg.into())).await?;
                        }
                        Some(NetCommand::SendFrame(data)) => {
                            let msg = realtime_input_json("image/jpeg", &data)?;
                            write.send(Message::Text(msg.into())).await?;
                        }
                        Some(NetCommand::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, text: &str) -> anyhow::Result<()> {
        let parsed: ServerMessage = match serde_json::from_str(text) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Unparseable server message: {} ({})", text, e);
                return Ok(());
            }
        };

        if parsed.setup_complete.is_some() {
            self.tx.send(NetEvent::Opened).await?;
        }
        if let Some(content) = parsed.server_content {
            self.tx.send(NetEvent::Message(content)).await?;
        }
        Ok(())
    }
}

fn realtime_input_json(mime_type: &str, data: &str) -> anyhow::Result<String> {
    let msg = RealtimeInputMessage {
        realtime_input: RealtimeInput {
            media_chunks: [MediaChunk { mime_type, data }],
        },
    };
    Ok(serde_json::to_string(&msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn audio_chunks_carry_the_codec_mime_type() {
        // The send path tags chunks with the codec's own descriptor, so the
        // advertised rate can never drift from what the encoder produces.
        let json = realtime_input_json(&pcm_codec::input_mime_type(), "AAAA").unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        let chunk = &v["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(chunk["data"], "AAAA");
    }

    #[test]
    fn frame_chunks_carry_jpeg_mime_type() {
        let json = realtime_input_json("image/jpeg", "/9j/").unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["realtimeInput"]["mediaChunks"][0]["mimeType"], "image/jpeg");
    }

    #[test]
    fn setup_message_shape() {
        let setup = SetupMessage {
            setup: SetupBody {
                model: "models/test",
                generation_config: GenerationConfig {
                    response_modalities: ["AUDIO"],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: "Kore" },
                        },
                    },
                },
                output_audio_transcription: EmptyObject {},
                system_instruction: SystemInstruction {
                    parts: [TextPart { text: "hi" }],
                },
            },
        };
        let v: Value = serde_json::to_value(&setup).unwrap();
        assert_eq!(v["setup"]["model"], "models/test");
        assert_eq!(v["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            v["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        assert!(v["setup"]["outputAudioTranscription"].is_object());
        assert_eq!(v["setup"]["systemInstruction"]["parts"][0]["text"], "hi");
    }
}
