//! The fixed interview: an ordered sequence of [`Question`]s.
//!
//! Order is significant; it is the order the flow controller asks in and
//! the order answers appear in the categorization prompt.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::{Language, CANONICAL_LANGUAGE};

/// Field identifiers of the standard questionnaire, plus meta fields that
/// never come from a question.
pub mod fields {
    pub const NAME_PHONE: &str = "name_phone";
    pub const EMAIL: &str = "email";
    pub const INCIDENT_DATE: &str = "incident_date";
    pub const THREAT_HARASS_WOMEN_CHILDREN: &str = "threat_harass_women_children";
    pub const FINANCIAL_SCAM: &str = "financial_scam";
    pub const MALWARE_RANSOMWARE: &str = "malware_ransomware";
    pub const ILLEGAL_TRAFFICKING: &str = "illegal_trafficking";
    pub const INCIDENT_DESCRIPTION: &str = "incident_description";
    pub const EVIDENCE: &str = "evidence";

    pub const CATEGORY: &str = "category";
    pub const CATEGORY_EXPLANATION: &str = "category_explanation";
    pub const EVIDENCE_FILES: &str = "evidence_files";

    /// Keys excluded from the categorization prompt.
    pub const META: [&str; 3] = [CATEGORY, CATEGORY_EXPLANATION, EVIDENCE_FILES];
}

/// How an answer to a question is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    YesNo,
    TextWithAttachment,
}

/// One interview question with its per-language prompt texts.
///
/// Every question carries a canonical-language prompt; other languages are
/// optional and are otherwise produced by translation at runtime.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub field: String,
    pub required: bool,
    pub kind: QuestionKind,
    prompts: BTreeMap<Language, String>,
}

impl Question {
    pub fn new(field: &str, canonical_prompt: &str, kind: QuestionKind, required: bool) -> Self {
        let mut prompts = BTreeMap::new();
        prompts.insert(CANONICAL_LANGUAGE, canonical_prompt.to_string());
        Self {
            field: field.to_string(),
            required,
            kind,
            prompts,
        }
    }

    /// Attach a hand-written prompt for `language`.
    pub fn with_prompt(mut self, language: Language, prompt: &str) -> Self {
        self.prompts.insert(language, prompt.to_string());
        self
    }

    /// Prompt in the canonical language.
    pub fn canonical_prompt(&self) -> &str {
        self.prompts
            .get(&CANONICAL_LANGUAGE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Prompt in `language`, if one was provided up front.
    pub fn prompt(&self, language: Language) -> Option<&str> {
        self.prompts.get(&language).map(String::as_str)
    }
}

/// The nine-question complaint interview.
pub fn standard_questions() -> Vec<Question> {
    use fields::*;
    use QuestionKind::*;

    vec![
        Question::new(
            NAME_PHONE,
            "What is your full name and contact phone number?",
            FreeText,
            true,
        ),
        Question::new(EMAIL, "What is your email address?", FreeText, true),
        Question::new(
            INCIDENT_DATE,
            "When did the incident occur? (Please provide the date and approximate time.)",
            FreeText,
            true,
        ),
        Question::new(
            THREAT_HARASS_WOMEN_CHILDREN,
            "Have you or someone you know received threatening or harassing messages online specifically targeting women or children? Please answer with yes or no.",
            YesNo,
            false,
        ),
        Question::new(
            FINANCIAL_SCAM,
            "Have you experienced unauthorized financial transactions, phishing scams, or deceptive financial offers via online communications? Please answer with yes or no.",
            YesNo,
            false,
        ),
        Question::new(
            MALWARE_RANSOMWARE,
            "Has your computer system or network been compromised by malware, ransomware, or unauthorized access? Please answer with yes or no.",
            YesNo,
            false,
        ),
        Question::new(
            ILLEGAL_TRAFFICKING,
            "Have you encountered online platforms or content facilitating illegal trafficking or sale of goods/services? Please answer with yes or no.",
            YesNo,
            false,
        ),
        Question::new(
            INCIDENT_DESCRIPTION,
            "Can you describe what happened in detail?",
            FreeText,
            true,
        ),
        Question::new(
            EVIDENCE,
            "Do you have any evidence such as screenshots, emails, or messages that support your report? Please describe and upload if available.",
            TextWithAttachment,
            false,
        ),
    ]
}
