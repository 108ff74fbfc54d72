//! REST client for one-shot content generation.
//!
//! Everything here is plain request/response: build a `generateContent`
//! body (with a response schema when the caller wants typed JSON), POST
//! it, pull the text or inline audio out of the first candidate. The
//! live tutoring link lives in `net_link`; this module never streams.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;

// 内容生成的响应类型

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize, Debug)]
struct ResponseInlineData {
    data: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Base64 payload of the first inline-data part, if any.
    fn inline_data(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref().map(|d| d.data.as_str()))
    }
}

// 领域类型（结构化输出按 responseSchema 解析）

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CoursePlan {
    pub title: String,
    pub description: String,
    pub modules: Vec<CourseModule>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CourseModule {
    pub title: String,
    pub topics: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    Book,
    Video,
    Article,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LibraryResource {
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub category: String,
    pub description: String,
    pub link: String,
}

/// Course preferences extracted from a spoken request.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CourseRequest {
    pub topic: String,
    pub level: String,
    pub style: String,
}

pub struct ContentClient {
    http: reqwest::Client,
    rest_url: String,
    api_key: String,
    flash_model: String,
    pro_model: String,
    tts_model: String,
    voice_name: String,
}

impl ContentClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_url: config.rest_url.to_string(),
            api_key: config.api_key.to_string(),
            flash_model: config.flash_model.to_string(),
            pro_model: config.pro_model.to_string(),
            tts_model: config.tts_model.to_string(),
            voice_name: config.voice_name.to_string(),
        }
    }

    // 发送 generateContent 请求并解析响应
    async fn generate(&self, model: &str, body: Value) -> Result<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.rest_url, model, self.api_key
        );
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("content request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("content request returned {}: {}", status, detail));
        }
        Ok(response.json().await.context("malformed content response")?)
    }

    async fn generate_text(&self, model: &str, body: Value) -> Result<String> {
        let response = self.generate(model, body).await?;
        response.text().context("no content generated")
    }

    async fn generate_json<T: serde::de::DeserializeOwned>(
        &self,
        model: &str,
        body: Value,
    ) -> Result<T> {
        let text = self.generate_text(model, body).await?;
        serde_json::from_str(&text).context("structured response did not match schema")
    }

    /// Build a structured learning path for a topic, level and style.
    pub async fn generate_course_plan(
        &self,
        topic: &str,
        level: &str,
        style: &str,
    ) -> Result<CoursePlan> {
        let prompt = format!(
            "Create a learning path for \"{topic}\" at a \"{level}\" level. \
             The learning style is \"{style}\". \
             Break it down into 4-6 distinct modules. \
             Each module should have a title and a list of sub-topics. \
             Provide a short description for the course."
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "title": {"type": "STRING"},
                "description": {"type": "STRING"},
                "modules": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": {"type": "STRING"},
                            "topics": {"type": "ARRAY", "items": {"type": "STRING"}}
                        },
                        "required": ["title", "topics"]
                    }
                }
            },
            "required": ["title", "description", "modules"]
        });
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            },
            "systemInstruction": {
                "parts": [{"text": "You are an expert curriculum designer. Output strict JSON."}]
            }
        });
        self.generate_json(&self.flash_model, body).await
    }

    /// Write a Markdown lesson for one module.
    pub async fn generate_lesson_content(
        &self,
        module_title: &str,
        topics: &[String],
    ) -> Result<String> {
        let prompt = format!(
            "Write a comprehensive lesson for the module \"{module_title}\". \
             Cover the following topics: {}. \
             Use Markdown formatting. Include headers, bullet points, and a practical example. \
             Keep the tone encouraging.",
            topics.join(", ")
        );
        let body = json!({"contents": [{"parts": [{"text": prompt}]}]});
        self.generate_text(&self.pro_model, body).await
    }

    /// Answer a question about a passage of lesson text.
    pub async fn ask_about_context(&self, context: &str, question: &str) -> Result<String> {
        let prompt = format!(
            "Context: \"{context}\"\n\nQuestion: {question}\n\nAnswer concisely and helpfully."
        );
        let body = json!({"contents": [{"parts": [{"text": prompt}]}]});
        self.generate_text(&self.flash_model, body).await
    }

    /// Three multiple-choice questions over the given text.
    pub async fn generate_quiz(&self, context: &str) -> Result<Vec<QuizQuestion>> {
        // 截断超长上下文
        let truncated: String = context.chars().take(3000).collect();
        let prompt = format!(
            "Create a quiz with 3 multiple choice questions based on the following text:\n\"{truncated}...\""
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "question": {"type": "STRING"},
                    "options": {"type": "ARRAY", "items": {"type": "STRING"}},
                    "correctIndex": {"type": "INTEGER"},
                    "explanation": {"type": "STRING"}
                },
                "required": ["question", "options", "correctIndex", "explanation"]
            }
        });
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        self.generate_json(&self.flash_model, body).await
    }

    /// Essential subjects for the student's level and focus.
    pub async fn get_curriculum_recommendations(
        &self,
        level: &str,
        grade: &str,
        focus: &str,
    ) -> Result<Vec<Recommendation>> {
        let prompt = format!(
            "The student is currently in \"{level}\" at grade \"{grade}\" and their field of \
             study/interest is \"{focus}\".\n\n\
             Based on standard educational requirements and this student's focus, recommend 4 \
             essential subjects or course titles they should master. \
             For each subject, provide a brief 1-sentence description of why it is important \
             for their level.\n\n\
             Output as a JSON array of objects with 'title' and 'description' keys."
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "description": {"type": "STRING"}
                },
                "required": ["title", "description"]
            }
        });
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        self.generate_json(&self.flash_model, body).await
    }

    /// Personalized reading/watching list for a grade and stream.
    pub async fn generate_library_resources(
        &self,
        grade: &str,
        stream: &str,
    ) -> Result<Vec<LibraryResource>> {
        let prompt = format!(
            "Recommend 8 educational resources for a student in \"{grade}\" focusing on \
             \"{stream}\". \
             If the grade is \"10th Grade\" or similar school grades, focus on standard subjects \
             (Math, Science, Social Studies). \
             If the grade is \"Undergraduate\" or higher, focus on the specific stream \
             \"{stream}\" (e.g., Engineering, Commerce, Political Science, Medical, Arts).\n\n\
             For each resource, provide:\n\
             - title\n\
             - author (or channel name)\n\
             - type (exactly one of: \"Book\", \"Video\", \"Article\")\n\
             - category (e.g., \"Physics\", \"Macroeconomics\")\n\
             - description (brief 1 sentence)\n\
             - link (For videos, provide a YouTube search URL like \
             \"https://www.youtube.com/results?search_query=...\". For others, use \"#\")\n\n\
             Output a JSON array."
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "author": {"type": "STRING"},
                    "type": {"type": "STRING", "enum": ["Book", "Video", "Article"]},
                    "category": {"type": "STRING"},
                    "description": {"type": "STRING"},
                    "link": {"type": "STRING"}
                },
                "required": ["title", "author", "type", "category", "description", "link"]
            }
        });
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        self.generate_json(&self.flash_model, body).await
    }

    /// Describe or answer questions about a recorded video clip.
    pub async fn analyze_video(
        &self,
        video_base64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<String> {
        let body = json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": mime_type, "data": video_base64}},
                {"text": prompt}
            ]}]
        });
        self.generate_text(&self.pro_model, body).await
    }

    /// Deep-reasoning query with an extended thinking budget.
    pub async fn ask_complex_query(&self, query: &str) -> Result<String> {
        let body = json!({
            "contents": [{"parts": [{"text": query}]}],
            "generationConfig": {
                "thinkingConfig": {"thinkingBudget": 32768}
            }
        });
        self.generate_text(&self.pro_model, body).await
    }

    /// Text-to-speech; returns the base64 audio payload when the model
    /// produced one.
    pub async fn generate_speech(&self, text: &str) -> Result<Option<String>> {
        let body = json!({
            "contents": [{"parts": [{"text": text}]}],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": {"voiceName": self.voice_name}
                    }
                }
            }
        });
        let response = self.generate(&self.tts_model, body).await?;
        Ok(response.inline_data().map(str::to_owned))
    }

    /// Verbatim transcription of a recorded audio clip.
    pub async fn transcribe_audio(&self, audio_base64: &str, mime_type: &str) -> Result<String> {
        let body = json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": mime_type, "data": audio_base64}},
                {"text": "Transcribe this audio exactly as it is spoken."}
            ]}]
        });
        self.generate_text(&self.flash_model, body).await
    }

    /// Extract course preferences from a spoken request.
    pub async fn process_voice_command(&self, audio_base64: &str) -> Result<CourseRequest> {
        let prompt = "Listen to the user's request for a course. \
             Extract the following fields:\n\
             1. topic (string)\n\
             2. level (one of: \"Beginner\", \"Intermediate\", \"Advanced\")\n\
             3. style (one of: \"Visual\", \"Theoretical\", \"Practical\")\n\n\
             If a field is not mentioned, infer it from context or default to \"Beginner\" \
             and \"Visual\". \
             Example: \"I want to learn calculus with pictures\" -> \
             { topic: \"Calculus\", level: \"Beginner\", style: \"Visual\" }";
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "topic": {"type": "STRING"},
                "level": {"type": "STRING", "enum": ["Beginner", "Intermediate", "Advanced"]},
                "style": {"type": "STRING", "enum": ["Visual", "Theoretical", "Practical"]}
            },
            "required": ["topic", "level", "style"]
        });
        let body = json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": "audio/wav", "data": audio_base64}},
                {"text": prompt}
            ]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        self.generate_json(&self.flash_model, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_plan_parses_from_schema_json() {
        let raw = r#"{
            "title": "Calculus Basics",
            "description": "A gentle start.",
            "modules": [
                {"title": "Limits", "topics": ["Definition", "One-sided limits"]},
                {"title": "Derivatives", "topics": ["Power rule"]}
            ]
        }"#;
        let plan: CoursePlan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.modules.len(), 2);
        assert_eq!(plan.modules[0].topics[1], "One-sided limits");
    }

    #[test]
    fn quiz_question_maps_camel_case_index() {
        let raw = r#"[{
            "question": "2+2?",
            "options": ["3", "4", "5"],
            "correctIndex": 1,
            "explanation": "Basic arithmetic."
        }]"#;
        let quiz: Vec<QuizQuestion> = serde_json::from_str(raw).unwrap();
        assert_eq!(quiz[0].correct_index, 1);
        assert_eq!(quiz[0].options.len(), 3);
    }

    #[test]
    fn library_resource_maps_type_field() {
        let raw = r##"{
            "title": "Feynman Lectures",
            "author": "Richard Feynman",
            "type": "Book",
            "category": "Physics",
            "description": "Classic undergraduate physics.",
            "link": "#"
        }"##;
        let res: LibraryResource = serde_json::from_str(raw).unwrap();
        assert_eq!(res.resource_type, ResourceType::Book);
    }

    #[test]
    fn response_text_concatenates_first_candidate_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}]}
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().unwrap(), "Hello world");
    }

    #[test]
    fn response_inline_data_extracts_audio_payload() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "QUJD"}}]}
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.inline_data().unwrap(), "QUJD");
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
        assert!(response.inline_data().is_none());
    }
}
