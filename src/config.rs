use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub capture: Capture,
    #[serde(default)]
    pub inference: Inference,
    #[serde(default)]
    pub notify: Notify,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: Default::default(),
            camera: Default::default(),
            capture: Default::default(),
            inference: Default::default(),
            notify: Default::default(),
            output: Default::default(),
            logging: Default::default(),
            targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub job_name: String,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            job_name: "coop".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub host: String,
    pub onvif_port: u16,
    /// Single endpoint path; the cameras we target serve every ONVIF service
    /// from it.
    pub service_path: String,
    pub username: String,
    pub password_env: String,
    /// Media profile token. Discovered via GetProfiles when empty.
    pub profile_token: String,
    pub rtsp_port: u16,
    pub rtsp_path: String,
    pub settle_seconds: u64,
    pub request_timeout_seconds: u64,
}
impl Default for Camera {
    fn default() -> Self {
        Self {
            host: "192.168.1.64".into(),
            onvif_port: 8000,
            service_path: "/onvif/device_service".into(),
            username: "admin".into(),
            password_env: "CAM_PASS".into(),
            profile_token: "".into(),
            rtsp_port: 554,
            rtsp_path: "Preview_01_main".into(),
            settle_seconds: 3,
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub ffmpeg_exe: String,
    pub max_attempts: u32,
    pub retry_backoff_seconds: u64,
    pub attempt_timeout_seconds: u64,
}
impl Default for Capture {
    fn default() -> Self {
        Self {
            ffmpeg_exe: "ffmpeg".into(),
            max_attempts: 3,
            retry_backoff_seconds: 1,
            attempt_timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inference {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}
impl Default for Inference {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: 300,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notify {
    pub backend: String,
    #[serde(default)]
    pub textbelt: Textbelt,
}
impl Default for Notify {
    fn default() -> Self {
        Self {
            backend: "stdout".into(),
            textbelt: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Textbelt {
    pub url: String,
    pub phone_env: String,
    pub key_env: String,
}
impl Default for Textbelt {
    fn default() -> Self {
        Self {
            url: "https://textbelt.com/text".into(),
            phone_env: "PHONE_NUMBER".into(),
            key_env: "TEXTBELT_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub save_frames: bool,
    pub write_report_json: bool,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            save_frames: true,
            write_report_json: true,
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

/// One named viewpoint to inspect: where to aim the camera, what to ask the
/// model, and how to read the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub preset_token: String,
    pub question: String,
    pub ok_marker: String,
    pub problem_marker: String,
}
