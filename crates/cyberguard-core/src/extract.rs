//! Answer extraction adapter.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::traits::{Extract, GenerativeModel};

/// [`Extract`] implementation backed by a [`GenerativeModel`].
pub struct OracleExtractor {
    model: Arc<dyn GenerativeModel>,
}

impl OracleExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

fn extraction_prompt(question: &str, response: &str) -> String {
    format!(
        r#"You are an advanced information extraction system. Given the following question and user response, extract ONLY the relevant information as a plain string. Do not use brackets, '[Not Provided]', or any extra text, just the extracted value. If the response is incomplete or unclear, return only what can be confidently extracted; otherwise, return an empty string ('').

Question: {question}
Response: {response}

Extract:
- For "What is your full name and contact phone number?": the full name and phone number as a single string (e.g., "pruthviraj 544434")
- For "What is your email address?": the email address (e.g., "aakash@gmail.com")
- For "When did the incident occur?": the date and time (e.g., "12-03-2025 14:30")
- For "Can you describe what happened in detail?": the full description as provided
- For "Do you have any evidence...?": the evidence description as provided
- For yes/no questions: "yes" or "no" (lowercase); if unclear, return an empty string ('')"#
    )
}

/// Strip the decoration models like to add around an extracted value.
///
/// A bare pair of quotes (`''` or `""`) is the model spelling out "empty".
pub fn normalize_extracted(raw: &str) -> String {
    let mut value = raw.trim();
    loop {
        let stripped = ['"', '\'', '`']
            .iter()
            .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
            .or_else(|| value.strip_prefix('[').and_then(|v| v.strip_suffix(']')));
        match stripped {
            Some(inner) => value = inner.trim(),
            None => break,
        }
    }
    if value.eq_ignore_ascii_case("not provided") {
        return String::new();
    }
    value.to_string()
}

#[async_trait]
impl Extract for OracleExtractor {
    async fn extract(&self, question: &str, response: &str) -> String {
        if response.trim().is_empty() {
            return String::new();
        }
        match self
            .model
            .generate(&extraction_prompt(question, response), None)
            .await
        {
            Ok(raw) => normalize_extracted(&raw),
            Err(e) => {
                warn!(error = %e, "extraction failed; treating answer as empty");
                String::new()
            }
        }
    }
}
