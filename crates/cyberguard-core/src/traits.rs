//! Adapter interfaces for every external collaborator the core calls.
//!
//! The flow controller and categorization engine only see these traits,
//! so they can run against deterministic fakes in tests and against the
//! real generative-language client, SMTP sender and database in the
//! application crate.
//!
//! ```text
//!                ┌──────────────────────┐
//!                │   GenerativeModel    │  text (+ one blob) → text
//!                └──────────┬───────────┘
//!        ┌──────────┬───────┴────┬──────────────┐
//!        ▼          ▼            ▼              ▼
//!   Translate    Extract     Categorize    DescribeImage
//! ```
//!
//! The generative model is fallible; the adapters built on it are not.
//! Each adapter degrades to a safe default when the model fails.

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::Language;
use crate::categorize::Categorization;
use crate::models::{AnswerRecord, ComplaintRecord};

/// Failure of a call to an external AI service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("generative oracle is disabled")]
    Disabled,
    #[error("oracle request timed out")]
    Timeout,
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle returned no usable text")]
    EmptyResponse,
}

/// A binary attachment sent alongside a prompt.
#[derive(Debug, Clone, Copy)]
pub struct Blob<'a> {
    pub media_type: &'a str,
    pub data: &'a [u8],
}

/// Stateless text-generation service.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Send `prompt` (and optionally one blob) and return the trimmed reply.
    async fn generate(&self, prompt: &str, attachment: Option<Blob<'_>>)
        -> Result<String, OracleError>;
}

/// Text translation between catalog languages. Never fails: on oracle
/// failure the input text comes back unchanged.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, source: Language, target: Language) -> String;
}

/// Pulls the value a question asks for out of a free-form response.
///
/// Returns `""` when nothing can be confidently extracted; callers treat
/// that as "no value", not as an error.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, question: &str, response: &str) -> String;
}

/// Assigns a category to a set of normalized answers.
#[async_trait]
pub trait Categorize: Send + Sync {
    async fn categorize(&self, answers: &AnswerRecord, evidence: &[String]) -> Categorization;
}

/// Describes an image for use as categorization evidence.
#[async_trait]
pub trait DescribeImage: Send + Sync {
    async fn describe_image(&self, bytes: &[u8], media_type: &str) -> String;
}

/// Turns an audio clip into text.
#[async_trait]
pub trait TranscribeAudio: Send + Sync {
    async fn transcribe(&self, audio: &[u8], media_type: &str) -> Result<String, OracleError>;
}

/// Delivery failure reported by a [`Notifier`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Sends the filing confirmation to the complainant.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(
        &self,
        to: &str,
        record: &ComplaintRecord,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no mail transport is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_confirmation(
        &self,
        _to: &str,
        _record: &ComplaintRecord,
    ) -> Result<(), NotifyError> {
        Err(NotifyError("e-mail delivery is not configured".to_string()))
    }
}

/// Model used when no generative provider is configured; every call fails
/// with [`OracleError::Disabled`], so all adapters take their fallback path.
pub struct DisabledModel;

#[async_trait]
impl GenerativeModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _attachment: Option<Blob<'_>>,
    ) -> Result<String, OracleError> {
        Err(OracleError::Disabled)
    }
}
