//! Shared fakes for the core integration tests.
//!
//! `PhraseModel` stands in for the generative service. It recognizes the
//! kind of request from the prompt and answers from small lookup tables,
//! so the real translation, extraction and categorization adapters run
//! unchanged on top of it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use cyberguard_core::models::ComplaintRecord;
use cyberguard_core::traits::{Blob, GenerativeModel, Notifier, NotifyError, OracleError};

pub struct PhraseModel {
    translations: HashMap<String, String>,
    extractions: HashMap<String, String>,
    category_reply: String,
    calls: Mutex<usize>,
}

impl PhraseModel {
    pub fn new(category_reply: &str) -> Self {
        Self {
            translations: HashMap::new(),
            extractions: HashMap::new(),
            category_reply: category_reply.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn translate(mut self, from: &str, to: &str) -> Self {
        self.translations.insert(from.to_string(), to.to_string());
        self
    }

    pub fn extract(mut self, response: &str, value: &str) -> Self {
        self.extractions
            .insert(response.to_string(), value.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn after<'a>(prompt: &'a str, marker: &str) -> &'a str {
    prompt
        .split_once(marker)
        .map(|(_, rest)| rest.lines().next().unwrap_or("").trim())
        .unwrap_or("")
}

#[async_trait]
impl GenerativeModel for PhraseModel {
    fn model_name(&self) -> &str {
        "phrase"
    }

    async fn generate(
        &self,
        prompt: &str,
        attachment: Option<Blob<'_>>,
    ) -> Result<String, OracleError> {
        *self.calls.lock().unwrap() += 1;

        if attachment.is_some() {
            return Ok("Screenshot of an SMS asking for a card PIN".to_string());
        }
        if prompt.contains("precise language translator") {
            let text = after(prompt, "Text to translate: ");
            return Ok(self
                .translations
                .get(text)
                .cloned()
                .unwrap_or_else(|| text.to_string()));
        }
        if prompt.contains("information extraction system") {
            let response = after(prompt, "Response: ");
            return Ok(self
                .extractions
                .get(response)
                .cloned()
                .unwrap_or_else(|| response.to_string()));
        }
        if prompt.contains("expert cybercrime analyst") {
            return Ok(self.category_reply.clone());
        }
        Err(OracleError::EmptyResponse)
    }
}

/// Notifier that remembers who it wrote to.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_confirmation(
        &self,
        to: &str,
        _record: &ComplaintRecord,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(to.to_string());
        Ok(())
    }
}
