//! Categorization engine.
//!
//! Builds one prompt from the normalized answers and any image-evidence
//! descriptions, asks the oracle once, and parses the two-line reply:
//!
//! ```text
//! Category: Financial Fraud
//! Explanation: The complainant reports an unauthorized UPI debit ...
//! ```
//!
//! Categorization never fails. Any oracle error, malformed reply or
//! unknown category yields [`Category::Other`] with
//! [`FALLBACK_EXPLANATION`]; the cause is kept in
//! [`Categorization::failure`] for logs and notices.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{AnswerRecord, Category};
use crate::questions::fields;
use crate::traits::{Categorize, GenerativeModel};

/// Explanation returned whenever categorization falls back to `Other`.
pub const FALLBACK_EXPLANATION: &str = "Failed to categorize due to an error in processing the response. Please ensure all details are complete and retry.";

/// Marker used in the prompt when there is no image evidence.
pub const NO_IMAGES_MARKER: &str = "No images provided.";

/// Why categorization fell back.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum CategorizationFailure {
    #[error("categorization oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("malformed categorization response: {0}")]
    MalformedResponse(String),
    #[error("unknown category in response: '{0}'")]
    UnknownCategory(String),
}

/// Result of one categorization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CategorizationFailure>,
}

impl Categorization {
    pub fn fallback(failure: CategorizationFailure) -> Self {
        Self {
            category: Category::Other,
            explanation: FALLBACK_EXPLANATION.to_string(),
            failure: Some(failure),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

/// Assemble the categorization prompt.
///
/// Meta fields (`category`, `category_explanation`, `evidence_files`) are
/// left out; evidence descriptions are joined with `"; "`.
pub fn build_prompt(answers: &AnswerRecord, evidence: &[String]) -> String {
    let complaint_text = answers
        .iter()
        .filter(|(field, _)| !fields::META.contains(field))
        .map(|(field, value)| format!("{}: {}", field, value))
        .collect::<Vec<_>>()
        .join("\n");

    let image_block = if evidence.is_empty() {
        NO_IMAGES_MARKER.to_string()
    } else {
        evidence.join("; ")
    };

    let categories = Category::ALL
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert cybercrime analyst with advanced knowledge in digital forensics, behavioral analysis, and legal frameworks. Your task is to categorize the following complaint into one of these categories:
{categories}

Provide a precise and detailed explanation (6-10 sentences) justifying the chosen category, adhering to these steps:
1. Analyze each Yes/No response, assigning weighted relevance to potential categories based on severity and specificity.
2. Perform a semantic analysis of the incident description, identifying key phrases, intent, and contextual clues.
3. Integrate image analysis (if available) as corroborative evidence, assessing its relevance to the complaint narrative.
4. Cross-reference the combined data against known cybercrime patterns and typologies for consistency.
5. Resolve ambiguities by prioritizing the most specific and impactful evidence, avoiding generic assumptions.
6. Conclude with a clear, evidence-based rationale for the selected category, ensuring alignment with legal definitions.

Respond in this format:
Category: [category name]
Explanation: [detailed explanation]

Complaint details:
{complaint_text}

Image Analysis (if any):
{image_block}"
    )
}

/// Parse a `Category: ...` / `Explanation: ...` reply.
///
/// The reply is split at its first newline. Blank lines between the two
/// lines are tolerated; the explanation is everything after its prefix.
pub fn parse_response(reply: &str) -> Result<(Category, String), CategorizationFailure> {
    let (first, rest) = reply.trim().split_once('\n').ok_or_else(|| {
        CategorizationFailure::MalformedResponse("expected two lines".to_string())
    })?;

    let category_text = first.trim().strip_prefix("Category: ").ok_or_else(|| {
        CategorizationFailure::MalformedResponse("first line must start with 'Category: '".into())
    })?;

    let explanation = rest
        .trim_start()
        .strip_prefix("Explanation: ")
        .map(str::trim)
        .ok_or_else(|| {
            CategorizationFailure::MalformedResponse(
                "second line must start with 'Explanation: '".into(),
            )
        })?;

    if explanation.is_empty() {
        return Err(CategorizationFailure::MalformedResponse(
            "empty explanation".into(),
        ));
    }

    let category = category_text
        .parse::<Category>()
        .map_err(|_| CategorizationFailure::UnknownCategory(category_text.trim().to_string()))?;

    Ok((category, explanation.to_string()))
}

/// [`Categorize`] implementation backed by a [`GenerativeModel`].
pub struct Categorizer {
    model: Arc<dyn GenerativeModel>,
}

impl Categorizer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Categorize for Categorizer {
    async fn categorize(&self, answers: &AnswerRecord, evidence: &[String]) -> Categorization {
        let prompt = build_prompt(answers, evidence);
        debug!(fields = answers.len(), images = evidence.len(), "categorizing complaint");

        let outcome = match self.model.generate(&prompt, None).await {
            Ok(reply) => parse_response(&reply).map(|(category, explanation)| Categorization {
                category,
                explanation,
                failure: None,
            }),
            Err(e) => Err(CategorizationFailure::OracleUnavailable(e.to_string())),
        };

        outcome.unwrap_or_else(|failure| {
            warn!(%failure, "categorization fell back to Other");
            Categorization::fallback(failure)
        })
    }
}
