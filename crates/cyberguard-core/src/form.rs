//! Manual form submission: a complete complaint in one request.
//!
//! The form path skips the interview but ends in the same place: a
//! categorized [`ComplaintDraft`] with native and normalized answers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Language, CANONICAL_LANGUAGE};
use crate::evidence::EvidencePreprocessor;
use crate::flow::Adapters;
use crate::models::{AnswerRecord, Attachment, ComplaintDraft};
use crate::questions::{fields, Question, QuestionKind};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("required fields are missing: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("'{field}' must be yes or no, got '{value}'")]
    InvalidYesNo { field: String, value: String },
}

/// A complete complaint as submitted from a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplaintForm {
    /// Language the values are written in; the service default when absent.
    pub language: Option<Language>,
    pub name_phone: String,
    pub email: String,
    pub incident_date: String,
    pub threat_harass_women_children: String,
    pub financial_scam: String,
    pub malware_ransomware: String,
    pub illegal_trafficking: String,
    pub incident_description: String,
    pub evidence: String,
    pub attachments: Vec<Attachment>,
}

impl ComplaintForm {
    fn value(&self, field: &str) -> &str {
        match field {
            fields::NAME_PHONE => &self.name_phone,
            fields::EMAIL => &self.email,
            fields::INCIDENT_DATE => &self.incident_date,
            fields::THREAT_HARASS_WOMEN_CHILDREN => &self.threat_harass_women_children,
            fields::FINANCIAL_SCAM => &self.financial_scam,
            fields::MALWARE_RANSOMWARE => &self.malware_ransomware,
            fields::ILLEGAL_TRAFFICKING => &self.illegal_trafficking,
            fields::INCIDENT_DESCRIPTION => &self.incident_description,
            fields::EVIDENCE => &self.evidence,
            _ => "",
        }
    }
}

/// Validate, translate and categorize a form into a draft.
///
/// Yes/no values are lower-cased canonical tokens and are not translated;
/// an empty yes/no value means unanswered and is stored as `""`.
pub async fn prepare_form(
    form: ComplaintForm,
    questions: &[Question],
    default_language: Language,
    adapters: &Adapters,
) -> Result<ComplaintDraft, FormError> {
    let missing: Vec<String> = questions
        .iter()
        .filter(|q| q.required && form.value(&q.field).trim().is_empty())
        .map(|q| q.field.clone())
        .collect();
    if !missing.is_empty() {
        return Err(FormError::MissingFields(missing));
    }

    let language = form.language.unwrap_or(default_language);
    let mut answers_native = AnswerRecord::new();
    let mut answers = AnswerRecord::new();

    for question in questions {
        let raw = form.value(&question.field).trim();
        match question.kind {
            QuestionKind::YesNo => {
                let token = raw.to_lowercase();
                if !matches!(token.as_str(), "" | "yes" | "no") {
                    return Err(FormError::InvalidYesNo {
                        field: question.field.clone(),
                        value: raw.to_string(),
                    });
                }
                answers_native.set(&question.field, token.clone());
                answers.set(&question.field, token);
            }
            QuestionKind::FreeText | QuestionKind::TextWithAttachment => {
                let normalized = adapters
                    .translator
                    .translate(raw, language, CANONICAL_LANGUAGE)
                    .await;
                answers_native.set(&question.field, raw);
                answers.set(&question.field, normalized);
            }
        }
    }

    let evidence = EvidencePreprocessor::new(adapters.describer.clone())
        .describe(&form.attachments)
        .await;
    let categorization = adapters.categorizer.categorize(&answers, &evidence).await;
    debug!(category = %categorization.category, "form categorized");

    Ok(ComplaintDraft {
        language,
        answers_native,
        answers,
        attachments: form.attachments,
        category: categorization.category,
        explanation: categorization.explanation,
    })
}
