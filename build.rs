use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    video: Video,
    network: Network,
    storage: Storage,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    input_sample_rate: u32,
    output_sample_rate: u32,
    block_samples: usize,
}

#[derive(Deserialize)]
struct Video {
    camera_device: String,
    frame_rate: u32,
    jpeg_quality: u8,
}

#[derive(Deserialize)]
struct Network {
    live_url: String,
    rest_url: String,
    api_key: String,
    live_model: String,
    flash_model: String,
    pro_model: String,
    tts_model: String,
    voice_name: String,
}

#[derive(Deserialize)]
struct Storage {
    notes_path: String,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 应用信息
    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_INPUT_SAMPLE_RATE={}", config.audio.input_sample_rate);
    println!("cargo:rustc-env=AUDIO_OUTPUT_SAMPLE_RATE={}", config.audio.output_sample_rate);
    println!("cargo:rustc-env=AUDIO_BLOCK_SAMPLES={}", config.audio.block_samples);

    // 视频配置
    println!("cargo:rustc-env=VIDEO_CAMERA_DEVICE={}", config.video.camera_device);
    println!("cargo:rustc-env=VIDEO_FRAME_RATE={}", config.video.frame_rate);
    println!("cargo:rustc-env=VIDEO_JPEG_QUALITY={}", config.video.jpeg_quality);

    // 网络配置
    println!("cargo:rustc-env=LIVE_URL={}", config.network.live_url);
    println!("cargo:rustc-env=REST_URL={}", config.network.rest_url);
    println!("cargo:rustc-env=API_KEY={}", config.network.api_key);
    println!("cargo:rustc-env=LIVE_MODEL={}", config.network.live_model);
    println!("cargo:rustc-env=FLASH_MODEL={}", config.network.flash_model);
    println!("cargo:rustc-env=PRO_MODEL={}", config.network.pro_model);
    println!("cargo:rustc-env=TTS_MODEL={}", config.network.tts_model);
    println!("cargo:rustc-env=VOICE_NAME={}", config.network.voice_name);

    // 存储配置
    println!("cargo:rustc-env=NOTES_PATH={}", config.storage.notes_path);
}
