//! Translation adapter with a process-lifetime memo table.
//!
//! Identity translations (same language, or empty text) never reach the
//! oracle. Successful translations are cached by `(text, source, target)`;
//! failures are not cached and degrade to the untranslated input.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::catalog::Language;
use crate::traits::{GenerativeModel, Translate};

type CacheKey = (String, Language, Language);

/// [`Translate`] implementation backed by a [`GenerativeModel`].
pub struct OracleTranslator {
    model: Arc<dyn GenerativeModel>,
    cache: Mutex<HashMap<CacheKey, String>>,
}

impl OracleTranslator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of memoized translations.
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lookup(&self, key: &CacheKey) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn remember(&self, key: CacheKey, value: String) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }
}

pub(crate) fn translation_prompt(text: &str, source: Language, target: Language) -> String {
    format!(
        "You are a precise language translator. Translate the following '{}' text into '{}' \
         and return ONLY the translated text, nothing else: no explanations, no breakdowns, \
         no notes. Use the appropriate script for the target language.\n\
         Text to translate: {}",
        source, target, text
    )
}

#[async_trait]
impl Translate for OracleTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> String {
        if source == target || text.is_empty() {
            return text.to_string();
        }

        let key = (text.to_string(), source, target);
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        let prompt = translation_prompt(text, source, target);
        match self.model.generate(&prompt, None).await {
            Ok(translated) => {
                self.remember(key, translated.clone());
                translated
            }
            Err(e) => {
                warn!(%source, %target, error = %e, "translation failed; keeping original text");
                text.to_string()
            }
        }
    }
}
