use presenter_core::{control::DeliveryPolicy, instructions::NavigationPolicy};
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub public_url: String,
    pub room_api_key: String,
    pub room_api_secret: String,
    pub anam_api_key: String,
    pub anam_avatar_id: String,
    pub anam_api_url: String,
    pub avatar_name: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_voice: String,
    pub deck_path: PathBuf,
    pub slides_dir: PathBuf,
    pub debounce_interval: Duration,
    pub delivery: DeliveryPolicy,
    pub peer_ready_timeout: Duration,
    pub speaking_fps: f64,
    pub silent_fps: f64,
    pub navigation_policy: NavigationPolicy,
    pub log_level: Level,
}

const MAX_REDUNDANT_SENDS: u32 = 5;

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Credentials are checked first so a missing secret is reported before
    /// anything else is parsed or opened.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let anam_api_key = required(&["ANAM_API_KEY"])?;
        let anam_avatar_id = required(&["ANAM_AVATAR_ID", "ANAM_PERSONA_ID"])?;
        let gemini_api_key = required(&["GEMINI_API_KEY", "GOOGLE_API_KEY"])?;
        let room_api_secret = required(&["ROOM_API_SECRET"])?;

        let bind_address: SocketAddr = parsed("BIND_ADDRESS", "0.0.0.0:8000")?;

        let debounce_ms: u64 = parsed("DEBOUNCE_INTERVAL_MS", "2000")?;
        if debounce_ms == 0 {
            return Err(invalid("DEBOUNCE_INTERVAL_MS", "must be greater than zero"));
        }

        let redundant_send_count: u32 = parsed("REDUNDANT_SEND_COUNT", "1")?;
        if !(1..=MAX_REDUNDANT_SENDS).contains(&redundant_send_count) {
            return Err(invalid(
                "REDUNDANT_SEND_COUNT",
                format!("must be between 1 and {MAX_REDUNDANT_SENDS}"),
            ));
        }
        let redundant_send_delay_ms: u64 = parsed("REDUNDANT_SEND_DELAY_MS", "50")?;
        let publish_timeout_ms: u64 = parsed("PUBLISH_TIMEOUT_MS", "5000")?;
        let peer_ready_timeout_ms: u64 = parsed("PEER_READY_TIMEOUT_MS", "10000")?;

        let speaking_fps = frame_rate("SPEAKING_FPS", "0.2")?;
        let silent_fps = frame_rate("SILENT_FPS", "0.1")?;

        let navigation_policy: NavigationPolicy = parsed("NAVIGATION_POLICY", "confirm")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            public_url: optional("PUBLIC_URL", "ws://localhost:8000"),
            room_api_key: optional("ROOM_API_KEY", "presenter"),
            room_api_secret,
            anam_api_key,
            anam_avatar_id,
            anam_api_url: optional("ANAM_API_URL", "https://api.anam.ai"),
            avatar_name: optional("AVATAR_NAME", "Maya"),
            gemini_api_key,
            gemini_model: optional("GEMINI_MODEL", "models/gemini-2.0-flash-exp"),
            gemini_voice: optional("GEMINI_VOICE", "Aoede"),
            deck_path: PathBuf::from(optional("DECK_PATH", "presentation.json")),
            slides_dir: PathBuf::from(optional("SLIDES_DIR", "slides")),
            debounce_interval: Duration::from_millis(debounce_ms),
            delivery: DeliveryPolicy {
                redundant_send_count,
                redundant_send_delay: Duration::from_millis(redundant_send_delay_ms),
                // Zero disables the bound.
                publish_timeout: (publish_timeout_ms > 0)
                    .then(|| Duration::from_millis(publish_timeout_ms)),
            },
            peer_ready_timeout: Duration::from_millis(peer_ready_timeout_ms),
            speaking_fps,
            silent_fps,
            navigation_policy,
            log_level,
        })
    }
}

/// First non-blank value among `names`; the error names the primary key.
fn required(names: &[&str]) -> Result<String, ConfigError> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingVar(names.join(" or ")))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    optional(name, default)
        .trim()
        .parse::<T>()
        .map_err(|e| invalid(name, e))
}

fn frame_rate(name: &str, default: &str) -> Result<f64, ConfigError> {
    let fps: f64 = parsed(name, default)?;
    if !fps.is_finite() || fps < 0.0 {
        return Err(invalid(name, format!("'{fps}' is not a valid frame rate")));
    }
    Ok(fps)
}

fn invalid(name: &str, reason: impl Display) -> ConfigError {
    ConfigError::InvalidValue(name.to_string(), reason.to_string())
}
