use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_ANALYSIS_URL: &str =
    "https://1aw4hjm1bc.execute-api.ca-central-1.amazonaws.com/dev/Image-Recognization";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub endpoint: String,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    pub attach_session_token: bool,
    /// Show an unparseable `content` string as text instead of failing.
    pub render_fallback_text: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub library_dir: PathBuf,
    pub capture_allowed: bool,
    pub library_allowed: bool,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Screens untouched for this long are dropped, media included.
    pub idle_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub analysis: AnalysisConfig,
    pub media: MediaConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "foodlens".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "foodlens-users".into()),
        };
        let analysis = AnalysisConfig {
            endpoint: std::env::var("ANALYSIS_URL").unwrap_or_else(|_| DEFAULT_ANALYSIS_URL.into()),
            jpeg_quality: std::env::var("ANALYSIS_JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse::<u8>().ok())
                .map(|q| q.clamp(1, 100))
                .unwrap_or(50),
            attach_session_token: env_flag("ANALYSIS_ATTACH_SESSION_TOKEN", true),
            render_fallback_text: env_flag("ANALYSIS_RENDER_FALLBACK_TEXT", false),
        };
        let media = MediaConfig {
            library_dir: std::env::var("MEDIA_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./media")),
            capture_allowed: env_flag("MEDIA_CAPTURE_ALLOWED", true),
            library_allowed: env_flag("MEDIA_LIBRARY_ALLOWED", true),
            max_upload_bytes: upload_limit(std::env::var("MEDIA_MAX_UPLOAD_MB").ok().as_deref()),
        };
        let session = SessionConfig {
            idle_ttl: Duration::from_secs(
                std::env::var("SCREEN_IDLE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_SCREEN_IDLE_TTL_SECS),
            ),
        };
        Ok(Self {
            jwt,
            analysis,
            media,
            session,
        })
    }
}

const DEFAULT_UPLOAD_MB: usize = 20;
const DEFAULT_SCREEN_IDLE_TTL_SECS: u64 = 30 * 60;

/// Megabytes to bytes. Unparseable or overflowing values fall back to 20 MB.
fn upload_limit(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .and_then(|mb| mb.checked_mul(1024 * 1024))
        .unwrap_or(DEFAULT_UPLOAD_MB * 1024 * 1024)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
