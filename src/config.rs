use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // 音频配置
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub block_samples: usize,

    // 视频配置
    pub camera_device: &'static str,
    pub frame_rate: u32,
    pub jpeg_quality: u8,

    // 网络配置（静态部分）
    pub live_url: &'static str,
    pub rest_url: &'static str,
    pub api_key: &'static str,
    pub live_model: &'static str,
    pub flash_model: &'static str,
    pub pro_model: &'static str,
    pub tts_model: &'static str,
    pub voice_name: &'static str,

    // 本地存储
    pub notes_path: &'static str,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            // 音频配置
            capture_device: env!("AUDIO_CAPTURE_DEVICE"),
            playback_device: env!("AUDIO_PLAYBACK_DEVICE"),
            input_sample_rate: env!("AUDIO_INPUT_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse AUDIO_INPUT_SAMPLE_RATE")?,
            output_sample_rate: env!("AUDIO_OUTPUT_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse AUDIO_OUTPUT_SAMPLE_RATE")?,
            block_samples: env!("AUDIO_BLOCK_SAMPLES")
                .parse()
                .map_err(|_| "Failed to parse AUDIO_BLOCK_SAMPLES")?,

            // 视频配置
            camera_device: env!("VIDEO_CAMERA_DEVICE"),
            frame_rate: env!("VIDEO_FRAME_RATE")
                .parse()
                .map_err(|_| "Failed to parse VIDEO_FRAME_RATE")?,
            jpeg_quality: env!("VIDEO_JPEG_QUALITY")
                .parse()
                .map_err(|_| "Failed to parse VIDEO_JPEG_QUALITY")?,

            // 网络配置
            live_url: env!("LIVE_URL"),
            rest_url: env!("REST_URL"),
            api_key: env!("API_KEY"),
            live_model: env!("LIVE_MODEL"),
            flash_model: env!("FLASH_MODEL"),
            pro_model: env!("PRO_MODEL"),
            tts_model: env!("TTS_MODEL"),
            voice_name: env!("VOICE_NAME"),

            // 本地存储
            notes_path: env!("NOTES_PATH"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
