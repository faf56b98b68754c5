//! Deterministic fakes shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::catalog::Language;
use crate::categorize::Categorization;
use crate::models::{AnswerRecord, Category};
use crate::traits::{
    Blob, Categorize, DescribeImage, Extract, GenerativeModel, OracleError, Translate,
};

/// Generative model that replays canned replies and records every call.
pub struct ScriptedModel {
    replies: Mutex<Vec<Result<String, OracleError>>>,
    repeat_last: bool,
    prompts: Mutex<Vec<String>>,
    media_types: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn sequence(replies: Vec<Result<String, OracleError>>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            repeat_last: false,
            prompts: Mutex::new(Vec::new()),
            media_types: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            repeat_last: true,
            ..Self::sequence(vec![Ok(reply.to_string())])
        }
    }

    pub fn failing() -> Self {
        Self {
            repeat_last: true,
            ..Self::sequence(vec![Err(OracleError::Transport("connection refused".into()))])
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn media_types(&self) -> Vec<String> {
        self.media_types.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<Blob<'_>>,
    ) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(blob) = attachment {
            self.media_types
                .lock()
                .unwrap()
                .push(blob.media_type.to_string());
        }
        let mut replies = self.replies.lock().unwrap();
        if self.repeat_last && replies.len() == 1 {
            return replies[0].clone();
        }
        replies.pop().unwrap_or(Err(OracleError::EmptyResponse))
    }
}

/// Extractor that returns the trimmed response, with optional overrides.
#[derive(Default)]
pub struct EchoExtractor {
    overrides: HashMap<String, String>,
    calls: Mutex<usize>,
}

impl EchoExtractor {
    pub fn with(mut self, response: &str, extracted: &str) -> Self {
        self.overrides
            .insert(response.to_string(), extracted.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Extract for EchoExtractor {
    async fn extract(&self, _question: &str, response: &str) -> String {
        *self.calls.lock().unwrap() += 1;
        self.overrides
            .get(response)
            .cloned()
            .unwrap_or_else(|| response.trim().to_string())
    }
}

/// Translator that tags non-identity translations with the target language.
pub struct TagTranslator;

#[async_trait]
impl Translate for TagTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> String {
        if source == target || text.is_empty() {
            text.to_string()
        } else {
            format!("[{}] {}", target.locale(), text)
        }
    }
}

/// Categorizer that always answers with the same category and records the
/// answers it was given.
pub struct FixedCategorizer {
    pub category: Category,
    seen: Mutex<Vec<(AnswerRecord, Vec<String>)>>,
}

impl FixedCategorizer {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(AnswerRecord, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Categorize for FixedCategorizer {
    async fn categorize(&self, answers: &AnswerRecord, evidence: &[String]) -> Categorization {
        self.seen
            .lock()
            .unwrap()
            .push((answers.clone(), evidence.to_vec()));
        Categorization {
            category: self.category,
            explanation: format!("fixed: {}", self.category),
            failure: None,
        }
    }
}

/// Image describer that reports the byte length.
pub struct LengthDescriber;

#[async_trait]
impl DescribeImage for LengthDescriber {
    async fn describe_image(&self, bytes: &[u8], _media_type: &str) -> String {
        format!("{} bytes", bytes.len())
    }
}
