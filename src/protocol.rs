//! Serde types for the bidirectional live-session wire protocol.
//!
//! The remote endpoint speaks JSON over WebSocket: one `setup` message from
//! the client, then `realtimeInput` media chunks upstream and
//! `serverContent` events downstream.

use serde::Deserialize;

/// 服务器下发的顶层消息
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<ServerContent>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetupComplete {}

/// One model event: audio parts, a transcription delta, and/or the
/// interruption and turn-boundary flags.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Transcription {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_chunk_message() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}}
                    ]
                }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts.len(), 1);
        let inline = parts[0].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "audio/pcm;rate=24000");
        assert_eq!(inline.data, "AAAA");
        assert!(!content.turn_complete);
        assert!(!content.interrupted);
    }

    #[test]
    fn parses_transcription_and_flags() {
        let raw = r#"{
            "serverContent": {
                "outputTranscription": {"text": "Hello"},
                "turnComplete": true
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert_eq!(content.output_transcription.unwrap().text, "Hello");
        assert!(content.turn_complete);
    }

    #[test]
    fn parses_interrupted_and_setup_complete() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert!(msg.server_content.unwrap().interrupted);

        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.setup_complete.is_some());
    }

    #[test]
    fn unknown_message_types_are_tolerated() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"usageMetadata": {"totalTokenCount": 42}}"#).unwrap();
        assert!(msg.setup_complete.is_none());
        assert!(msg.server_content.is_none());
    }
}
