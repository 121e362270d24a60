//! Engine configuration (§6 "Environment / configuration inputs"), loaded
//! entirely from the environment with typed defaults, `.env`-file aware.

use crate::types::{Position, SubtitleSettings, SubtitleStyle};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workers: usize,
    pub queue_capacity: usize,

    pub probe_timeout: Duration,
    pub transcribe_timeout: Duration,
    pub transcode_timeout: Duration,

    pub daemon_startup_timeout: Duration,
    pub daemon_idle_timeout: Duration,
    pub daemon_restart_max_attempts: u32,
    pub daemon_restart_window: Duration,

    pub ai_runtime_path: String,
    pub ai_script_path: PathBuf,
    pub model_name: String,
    pub log_level: String,

    pub ffmpeg_path: String,
    pub ffprobe_path: String,

    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,

    pub domain_allowlist: Vec<String>,

    pub default_subtitle_settings: SubtitleSettings,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let domain_allowlist = env::var("VIDEOCRAFT_DOMAIN_ALLOWLIST")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            workers: env_parse("VIDEOCRAFT_WORKERS", 4),
            queue_capacity: env_parse("VIDEOCRAFT_QUEUE_CAPACITY", 100),

            probe_timeout: Duration::from_secs(env_parse("VIDEOCRAFT_PROBE_TIMEOUT_SECS", 30)),
            transcribe_timeout: Duration::from_secs(env_parse(
                "VIDEOCRAFT_TRANSCRIBE_TIMEOUT_SECS",
                120,
            )),
            transcode_timeout: Duration::from_secs(env_parse(
                "VIDEOCRAFT_TRANSCODE_TIMEOUT_SECS",
                3600,
            )),

            daemon_startup_timeout: Duration::from_secs(env_parse(
                "VIDEOCRAFT_DAEMON_STARTUP_TIMEOUT_SECS",
                60,
            )),
            daemon_idle_timeout: Duration::from_secs(env_parse(
                "VIDEOCRAFT_DAEMON_IDLE_TIMEOUT_SECS",
                600,
            )),
            daemon_restart_max_attempts: env_parse("VIDEOCRAFT_DAEMON_RESTART_MAX_ATTEMPTS", 5),
            daemon_restart_window: Duration::from_secs(env_parse(
                "VIDEOCRAFT_DAEMON_RESTART_WINDOW_SECS",
                300,
            )),

            ai_runtime_path: env::var("VIDEOCRAFT_AI_RUNTIME_PATH")
                .unwrap_or_else(|_| "python3".to_string()),
            ai_script_path: env::var("VIDEOCRAFT_AI_SCRIPT_PATH")
                .unwrap_or_else(|_| "./transcribe_daemon.py".to_string())
                .into(),
            model_name: env::var("VIDEOCRAFT_MODEL_NAME").unwrap_or_else(|_| "base".to_string()),
            log_level: env::var("VIDEOCRAFT_DAEMON_LOG_LEVEL")
                .unwrap_or_else(|_| "warning".to_string()),

            ffmpeg_path: env::var("VIDEOCRAFT_FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("VIDEOCRAFT_FFPROBE_PATH")
                .unwrap_or_else(|_| "ffprobe".to_string()),

            output_dir: env::var("VIDEOCRAFT_OUTPUT_DIR")
                .unwrap_or_else(|_| "./output".to_string())
                .into(),
            temp_dir: env::var("VIDEOCRAFT_TEMP_DIR")
                .unwrap_or_else(|_| "./tmp".to_string())
                .into(),

            domain_allowlist,

            default_subtitle_settings: default_subtitle_settings_from_env(),
        })
    }

    /// Create the output and temp directories if they don't exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_subtitle_settings_from_env() -> SubtitleSettings {
    SubtitleSettings {
        style: if env::var("VIDEOCRAFT_SUBTITLE_STYLE").as_deref() == Ok("classic") {
            SubtitleStyle::Classic
        } else {
            SubtitleStyle::Progressive
        },
        font_family: env::var("VIDEOCRAFT_SUBTITLE_FONT_FAMILY")
            .unwrap_or_else(|_| "Arial".to_string()),
        font_size: env_parse("VIDEOCRAFT_SUBTITLE_FONT_SIZE", 24),
        word_color: env::var("VIDEOCRAFT_SUBTITLE_WORD_COLOR")
            .unwrap_or_else(|_| "#FFD700".to_string()),
        line_color: env::var("VIDEOCRAFT_SUBTITLE_LINE_COLOR")
            .unwrap_or_else(|_| "#FFFFFF".to_string()),
        outline_color: env::var("VIDEOCRAFT_SUBTITLE_OUTLINE_COLOR")
            .unwrap_or_else(|_| "#000000".to_string()),
        outline_width: env_parse("VIDEOCRAFT_SUBTITLE_OUTLINE_WIDTH", 1),
        shadow_color: env::var("VIDEOCRAFT_SUBTITLE_SHADOW_COLOR")
            .unwrap_or_else(|_| "#808080".to_string()),
        shadow_offset: env_parse("VIDEOCRAFT_SUBTITLE_SHADOW_OFFSET", 2),
        box_color: env::var("VIDEOCRAFT_SUBTITLE_BOX_COLOR")
            .unwrap_or_else(|_| "#000000".to_string()),
        position: Position::CenterBottom,
    }
}
