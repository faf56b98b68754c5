//! Speech turn resolution and voice output.
//!
//! A spoken turn arrives as a WAV clip and leaves as text (or an explicit
//! non-fatal failure) before the flow controller ever sees it:
//!
//! ```text
//! clip ──▶ loudness ≤ threshold? ──yes──▶ NoSound
//!                 │ no
//!                 ▼
//!        primary recognizer (up to max_attempts)
//!                 │ all failed
//!                 ▼
//!        generative transcription ──fail──▶ NotRecognized
//! ```
//!
//! Voice output is fire-and-forget: a failed synthesis is logged, never
//! surfaced.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use cyberguard_core::catalog::Language;
use cyberguard_core::traits::{Blob, GenerativeModel, OracleError, TranscribeAudio};

use crate::config::SpeechConfig;

/// Prompt for generative transcription.
pub const TRANSCRIBE_PROMPT: &str = "Transcribe this audio:";

pub const NO_SOUND_MESSAGE: &str = "No sound detected in audio.";
pub const NOT_RECOGNIZED_MESSAGE: &str =
    "Failed to recognize speech after multiple attempts. Please try typing instead.";

// ============ Loudness ============

/// RMS loudness of a WAV clip in dBFS.
///
/// Returns `None` when the clip cannot be decoded or has no samples.
/// A clip of digital silence gives negative infinity.
pub fn audio_level_dbfs(wav: &[u8]) -> Option<f64> {
    let mut reader = hound::WavReader::new(Cursor::new(wav)).ok()?;
    let spec = reader.spec();

    let samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .ok()?
            .into_iter()
            .map(f64::from)
            .collect(),
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f64;
            reader
                .samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .ok()?
                .into_iter()
                .map(|s| s as f64 / full_scale)
                .collect()
        }
    };

    if samples.is_empty() {
        return None;
    }
    let mean_square = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
    Some(20.0 * mean_square.sqrt().log10())
}

/// Whether the clip is louder than `threshold_dbfs`. Undecodable clips are silent.
pub fn has_sound(wav: &[u8], threshold_dbfs: f64) -> bool {
    matches!(audio_level_dbfs(wav), Some(level) if level > threshold_dbfs)
}

// ============ Recognition ============

/// Failure of the primary speech recognizer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("speech recognition timed out")]
    Timeout,
    #[error("speech was unintelligible")]
    Unintelligible,
    #[error("speech recognition request failed: {0}")]
    Request(String),
}

/// Primary speech-to-text engine.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, wav: &[u8], locale: &str) -> Result<String, RecognitionError>;
}

/// Recognizer used when none is configured.
pub struct DisabledRecognizer;

#[async_trait]
impl SpeechRecognizer for DisabledRecognizer {
    async fn recognize(&self, _wav: &[u8], _locale: &str) -> Result<String, RecognitionError> {
        Err(RecognitionError::Request(
            "speech recognition is not configured".to_string(),
        ))
    }
}

/// Google Cloud Speech-to-Text `speech:recognize` client.
pub struct GoogleSpeechRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleSpeechRecognizer {
    /// Build from configuration, reading `GOOGLE_SPEECH_API_KEY` from the environment.
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_SPEECH_API_KEY")
            .context("GOOGLE_SPEECH_API_KEY environment variable not set")?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &SpeechConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeechRecognizer {
    async fn recognize(&self, wav: &[u8], locale: &str) -> Result<String, RecognitionError> {
        // LINEAR16 WAV: encoding and sample rate come from the header.
        let body = serde_json::json!({
            "config": { "languageCode": locale },
            "audio": { "content": base64::engine::general_purpose::STANDARD.encode(wav) },
        });

        let response = self
            .client
            .post(format!("{}/speech:recognize?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecognitionError::Timeout
                } else {
                    RecognitionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Request(format!("HTTP {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RecognitionError::Request(e.to_string()))?;

        json.pointer("/results/0/alternatives/0/transcript")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(RecognitionError::Unintelligible)
    }
}

/// [`TranscribeAudio`] backed by the generative model.
pub struct OracleTranscriber {
    model: Arc<dyn GenerativeModel>,
}

impl OracleTranscriber {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TranscribeAudio for OracleTranscriber {
    async fn transcribe(&self, audio: &[u8], media_type: &str) -> Result<String, OracleError> {
        let blob = Blob {
            media_type,
            data: audio,
        };
        let text = self.model.generate(TRANSCRIBE_PROMPT, Some(blob)).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

/// Outcome of resolving one spoken turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum SpeechResolution {
    Text(String),
    NoSound,
    NotRecognized,
}

impl SpeechResolution {
    /// Message for the user when no text came out.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            SpeechResolution::Text(_) => None,
            SpeechResolution::NoSound => Some(NO_SOUND_MESSAGE),
            SpeechResolution::NotRecognized => Some(NOT_RECOGNIZED_MESSAGE),
        }
    }
}

/// Turns a WAV clip into text for the flow controller.
pub struct SpeechTurnResolver {
    recognizer: Arc<dyn SpeechRecognizer>,
    fallback: Arc<dyn TranscribeAudio>,
    threshold_dbfs: f64,
    max_attempts: u32,
}

impl SpeechTurnResolver {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        fallback: Arc<dyn TranscribeAudio>,
        threshold_dbfs: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            recognizer,
            fallback,
            threshold_dbfs,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn resolve(&self, wav: &[u8], language: Language) -> SpeechResolution {
        if !has_sound(wav, self.threshold_dbfs) {
            warn!(bytes = wav.len(), "audio clip has no sound");
            return SpeechResolution::NoSound;
        }

        for attempt in 1..=self.max_attempts {
            match self.recognizer.recognize(wav, language.locale()).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(attempt, "speech recognized");
                    return SpeechResolution::Text(text.trim().to_string());
                }
                Ok(_) => warn!(attempt, max = self.max_attempts, "empty recognition result"),
                Err(e) => warn!(attempt, max = self.max_attempts, error = %e, "speech recognition failed"),
            }
        }

        info!("primary recognizer exhausted; trying generative transcription");
        match self.fallback.transcribe(wav, "audio/wav").await {
            Ok(text) => SpeechResolution::Text(text),
            Err(e) => {
                warn!(error = %e, "generative transcription failed");
                SpeechResolution::NotRecognized
            }
        }
    }
}

pub fn create_recognizer(config: &SpeechConfig) -> Result<Arc<dyn SpeechRecognizer>> {
    match config.recognizer.as_str() {
        "disabled" => Ok(Arc::new(DisabledRecognizer)),
        "google" => Ok(Arc::new(GoogleSpeechRecognizer::new(config)?)),
        other => bail!("Unknown speech recognizer: {}", other),
    }
}

// ============ Voice output ============

/// Pitch and rate multipliers, each in `[0.5, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub pitch: f32,
    pub rate: f32,
}

impl VoiceSettings {
    pub fn new(pitch: f32, rate: f32) -> Result<Self> {
        if !(0.5..=2.0).contains(&pitch) || !(0.5..=2.0).contains(&rate) {
            bail!("voice pitch and rate must be in [0.5, 2.0]");
        }
        Ok(Self { pitch, rate })
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

/// Text-to-speech output.
pub trait SpeechSynthesizer: Send + Sync {
    /// Start speaking `text`; returns without waiting for playback.
    fn speak(&self, text: &str, language: Language, voice: VoiceSettings);
}

pub struct DisabledSynthesizer;

impl SpeechSynthesizer for DisabledSynthesizer {
    fn speak(&self, _text: &str, _language: Language, _voice: VoiceSettings) {}
}

/// Speaks through the `espeak-ng` command-line synthesizer.
pub struct EspeakSynthesizer {
    program: String,
}

impl EspeakSynthesizer {
    pub fn new() -> Self {
        Self {
            program: "espeak-ng".to_string(),
        }
    }

    /// Command-line arguments for one utterance.
    pub fn args(text: &str, language: Language, voice: VoiceSettings) -> Vec<String> {
        let tts_locale = language.tts_locale();
        let voice_name = tts_locale.split('-').next().unwrap_or("en");
        // espeak pitch is 0-99 (50 neutral), speed in words per minute (175 neutral).
        let pitch = ((voice.pitch * 50.0).round() as i32).clamp(0, 99);
        let speed = (voice.rate * 175.0).round() as i32;
        vec![
            "-v".to_string(),
            voice_name.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-s".to_string(),
            speed.to_string(),
            text.to_string(),
        ]
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn speak(&self, text: &str, language: Language, voice: VoiceSettings) {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(Self::args(text, language, voice))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        match command.spawn() {
            Ok(mut child) => {
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            warn!(%status, "speech synthesis exited with an error")
                        }
                        Err(e) => warn!(error = %e, "speech synthesis failed"),
                        Ok(_) => {}
                    }
                });
            }
            Err(e) => warn!(error = %e, program = %self.program, "could not start speech synthesis"),
        }
    }
}

pub fn create_synthesizer(config: &SpeechConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    match config.synthesizer.as_str() {
        "disabled" => Ok(Arc::new(DisabledSynthesizer)),
        "espeak" => Ok(Arc::new(EspeakSynthesizer::new())),
        other => bail!("Unknown speech synthesizer: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn wav(samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn tone() -> Vec<u8> {
        let samples: Vec<i16> = (0..1600)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect();
        wav(&samples)
    }

    /// Recognizer that replays scripted results and counts calls.
    struct Scripted {
        results: Mutex<Vec<Result<String, RecognitionError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(mut results: Vec<Result<String, RecognitionError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(0),
            }
        }
        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SpeechRecognizer for Scripted {
        async fn recognize(&self, _: &[u8], locale: &str) -> Result<String, RecognitionError> {
            assert_eq!(locale, "hi-IN");
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(RecognitionError::Unintelligible))
        }
    }

    struct FixedTranscriber(Result<String, OracleError>);

    #[async_trait]
    impl TranscribeAudio for FixedTranscriber {
        async fn transcribe(&self, _: &[u8], media_type: &str) -> Result<String, OracleError> {
            assert_eq!(media_type, "audio/wav");
            self.0.clone()
        }
    }

    fn resolver(
        recognizer: Arc<Scripted>,
        fallback: Result<String, OracleError>,
    ) -> SpeechTurnResolver {
        SpeechTurnResolver::new(recognizer, Arc::new(FixedTranscriber(fallback)), -60.0, 3)
    }

    #[test]
    fn test_level_of_tone_and_silence() {
        let level = audio_level_dbfs(&tone()).unwrap();
        // 8000 / 32768 full scale ≈ -12.2 dBFS
        assert!((level + 12.25).abs() < 0.1, "level {}", level);
        assert!(has_sound(&tone(), -60.0));

        let silent = wav(&[0; 1600]);
        assert!(!has_sound(&silent, -60.0));
    }

    #[test]
    fn test_undecodable_or_empty_is_silent() {
        assert_eq!(audio_level_dbfs(b"not a wav"), None);
        assert!(!has_sound(b"not a wav", -60.0));
        assert_eq!(audio_level_dbfs(&wav(&[])), None);
    }

    #[tokio::test]
    async fn test_silence_skips_recognition() {
        let rec = Arc::new(Scripted::new(vec![Ok("hello".into())]));
        let out = resolver(rec.clone(), Ok("x".into()))
            .resolve(&wav(&[0; 800]), Language::Hindi)
            .await;
        assert_eq!(out, SpeechResolution::NoSound);
        assert_eq!(out.notice(), Some(NO_SOUND_MESSAGE));
        assert_eq!(rec.calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let rec = Arc::new(Scripted::new(vec![
            Err(RecognitionError::Timeout),
            Ok("  अगला ".into()),
        ]));
        let out = resolver(rec.clone(), Err(OracleError::Disabled))
            .resolve(&tone(), Language::Hindi)
            .await;
        assert_eq!(out, SpeechResolution::Text("अगला".into()));
        assert_eq!(rec.calls(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_after_three_failures() {
        let rec = Arc::new(Scripted::new(vec![]));
        let out = resolver(rec.clone(), Ok("मेरा नाम आशा है".into()))
            .resolve(&tone(), Language::Hindi)
            .await;
        assert_eq!(out, SpeechResolution::Text("मेरा नाम आशा है".into()));
        assert_eq!(rec.calls(), 3);
    }

    #[tokio::test]
    async fn test_not_recognized_when_everything_fails() {
        let rec = Arc::new(Scripted::new(vec![]));
        let out = resolver(rec, Err(OracleError::Timeout))
            .resolve(&tone(), Language::Hindi)
            .await;
        assert_eq!(out, SpeechResolution::NotRecognized);
        assert!(out.notice().is_some());
    }

    #[test]
    fn test_voice_settings_range() {
        assert!(VoiceSettings::new(0.5, 2.0).is_ok());
        assert!(VoiceSettings::new(0.4, 1.0).is_err());
        assert!(VoiceSettings::new(1.0, 2.1).is_err());
    }

    #[test]
    fn test_espeak_args() {
        let args = EspeakSynthesizer::args(
            "नमस्ते",
            Language::Hindi,
            VoiceSettings::new(2.0, 0.5).unwrap(),
        );
        assert_eq!(args, vec!["-v", "hi", "-p", "99", "-s", "88", "नमस्ते"]);
    }
}
