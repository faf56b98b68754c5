//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/cyberguard.sqlite"
//! busy_timeout_ms = 5000
//!
//! [oracle]
//! provider = "gemini"          # or "disabled"
//! model = "gemini-1.5-flash"
//!
//! [speech]
//! recognizer = "google"        # or "disabled"
//! synthesizer = "espeak"       # or "disabled"
//! pitch = 1.0
//! rate = 1.0
//!
//! [smtp]                       # optional; absent = no confirmation e-mails
//! host = "smtp.gmail.com"
//! port = 587
//! from = "CyberGuard AI <portal@example.in>"
//! username = "portal@example.in"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! max_body_mb = 25
//! session_idle_minutes = 30
//!
//! [intake]
//! default_language = "English"
//! ```
//!
//! API keys and passwords are never read from the file; they come from
//! `GEMINI_API_KEY`, `GOOGLE_SPEECH_API_KEY` and `SMTP_PASSWORD`.

use anyhow::{bail, Context, Result};
use cyberguard_core::catalog::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            endpoint: default_oracle_endpoint(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_disabled")]
    pub recognizer: String,
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,
    /// Clips at or below this loudness are treated as silence.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold_dbfs: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_disabled")]
    pub synthesizer: String,
    #[serde(default = "default_voice_factor")]
    pub pitch: f32,
    #[serde(default = "default_voice_factor")]
    pub rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            recognizer: default_disabled(),
            endpoint: default_speech_endpoint(),
            silence_threshold_dbfs: default_silence_threshold(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            synthesizer: default_disabled(),
            pitch: default_voice_factor(),
            rate: default_voice_factor(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from: String,
    pub username: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Request body cap for routes that carry base64 audio or evidence.
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
    /// Sessions untouched for this long are discarded.
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_mb: default_max_body_mb(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

impl ServerConfig {
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntakeConfig {
    #[serde(default = "default_language")]
    pub default_language: Language,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}
fn default_max_connections() -> u32 {
    5
}
fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_oracle_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_speech_endpoint() -> String {
    "https://speech.googleapis.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_silence_threshold() -> f64 {
    -60.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_voice_factor() -> f32 {
    1.0
}
fn default_smtp_port() -> u16 {
    587
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_body_mb() -> usize {
    25
}
fn default_session_idle_minutes() -> u64 {
    30
}
fn default_language() -> Language {
    Language::English
}

impl Config {
    /// Everything disabled, database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/cyberguard.sqlite"),
                busy_timeout_ms: default_busy_timeout_ms(),
                max_connections: default_max_connections(),
            },
            oracle: OracleConfig::default(),
            speech: SpeechConfig::default(),
            smtp: None,
            server: ServerConfig::default(),
            intake: IntakeConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections < 1 {
        bail!("db.max_connections must be >= 1");
    }

    // Oracle
    match config.oracle.provider.as_str() {
        "disabled" | "gemini" => {}
        other => bail!(
            "Unknown oracle provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.oracle.is_enabled() && config.oracle.model.as_deref().unwrap_or("").is_empty() {
        bail!(
            "oracle.model must be specified when provider is '{}'",
            config.oracle.provider
        );
    }

    // Speech
    match config.speech.recognizer.as_str() {
        "disabled" | "google" => {}
        other => bail!(
            "Unknown speech recognizer: '{}'. Must be disabled or google.",
            other
        ),
    }
    match config.speech.synthesizer.as_str() {
        "disabled" | "espeak" => {}
        other => bail!(
            "Unknown speech synthesizer: '{}'. Must be disabled or espeak.",
            other
        ),
    }
    if config.speech.max_attempts < 1 {
        bail!("speech.max_attempts must be >= 1");
    }
    if !(0.5..=2.0).contains(&config.speech.pitch) {
        bail!("speech.pitch must be in [0.5, 2.0]");
    }
    if !(0.5..=2.0).contains(&config.speech.rate) {
        bail!("speech.rate must be in [0.5, 2.0]");
    }

    // Server
    if config.server.max_body_mb < 1 {
        bail!("server.max_body_mb must be >= 1");
    }
    if config.server.session_idle_minutes < 1 {
        bail!("server.session_idle_minutes must be >= 1");
    }

    // SMTP
    if let Some(smtp) = &config.smtp {
        if smtp.host.trim().is_empty() || smtp.from.trim().is_empty() {
            bail!("smtp.host and smtp.from must not be empty");
        }
    }

    Ok(())
}
