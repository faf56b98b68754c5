//! Core data models: answers, attachments, categories, and complaint records.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::catalog::Language;

/// Ordered field → value mapping.
///
/// Entries keep the order in which fields were first written, so a record
/// built by the interview lists answers in question order. Writing an
/// existing field replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerRecord {
    entries: Vec<(String, String)>,
}

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(f, _)| f.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = AnswerRecord::new();
        for (k, v) in iter {
            let k = k.into();
            record.set(&k, v);
        }
        record
    }
}

impl Serialize for AnswerRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AnswerRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = AnswerRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<AnswerRecord, A::Error> {
                let mut record = AnswerRecord::new();
                while let Some((field, value)) = access.next_entry::<String, String>()? {
                    record.set(&field, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// An evidence file in its transport encoding (standard base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

impl Attachment {
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.content.trim())
    }

    /// True for `.jpg`, `.jpeg` and `.png` names (case-insensitive).
    pub fn is_image(&self) -> bool {
        let lower = self.name.to_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }

    /// Media type declared to the vision oracle.
    pub fn image_media_type(&self) -> &'static str {
        if self.name.to_lowercase().ends_with(".png") {
            "image/png"
        } else {
            "image/jpeg"
        }
    }
}

/// The five complaint categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Cyber Harassment")]
    CyberHarassment,
    #[serde(rename = "Financial Fraud")]
    FinancialFraud,
    #[serde(rename = "System Security")]
    SystemSecurity,
    #[serde(rename = "Illegal Activities")]
    IllegalActivities,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::CyberHarassment,
        Category::FinancialFraud,
        Category::SystemSecurity,
        Category::IllegalActivities,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::CyberHarassment => "Cyber Harassment",
            Category::FinancialFraud => "Financial Fraud",
            Category::SystemSecurity => "System Security",
            Category::IllegalActivities => "Illegal Activities",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Exact match on the display name after trimming.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: '{}'", s))
    }
}

/// Case status. Transitions after filing are owned by case management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintStatus {
    #[serde(rename = "Under Investigation")]
    UnderInvestigation,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::UnderInvestigation => "Under Investigation",
            ComplaintStatus::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Under Investigation" => Ok(ComplaintStatus::UnderInvestigation),
            "Resolved" => Ok(ComplaintStatus::Resolved),
            other => Err(format!("unknown complaint status: '{}'", other)),
        }
    }
}

/// Prefix of every ticket identifier.
pub const TICKET_PREFIX: &str = "CYBER-";

/// Externally visible complaint identifier, `CYBER-` + 8 upper-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// A fresh identifier derived from a random UUID.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        TicketId(format!("{}{}", TICKET_PREFIX, hex[..8].to_uppercase()))
    }

    /// Normalize a ticket typed by a user (trimmed, upper-cased).
    pub fn from_user_input(input: &str) -> Self {
        TicketId(input.trim().to_uppercase())
    }

    /// Whether the identifier has the canonical shape.
    pub fn is_well_formed(&self) -> bool {
        self.0
            .strip_prefix(TICKET_PREFIX)
            .map(|rest| {
                rest.len() == 8
                    && rest
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
            })
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A categorized complaint ready to be filed, not yet persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintDraft {
    pub language: Language,
    pub answers_native: AnswerRecord,
    pub answers: AnswerRecord,
    pub attachments: Vec<Attachment>,
    pub category: Category,
    pub explanation: String,
}

/// A filed complaint as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub ticket_id: TicketId,
    pub language: Language,
    /// Answers as captured, in the complainant's language.
    pub answers_native: AnswerRecord,
    /// Answers normalized to the canonical language.
    pub answers: AnswerRecord,
    pub category: Category,
    pub explanation: String,
    pub attachments: Vec<Attachment>,
    pub status: ComplaintStatus,
    pub filed_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ComplaintRecord {
    /// Build the record for a draft filed at `now`.
    pub fn from_draft(ticket_id: TicketId, draft: ComplaintDraft, now: DateTime<Utc>) -> Self {
        Self {
            ticket_id,
            language: draft.language,
            answers_native: draft.answers_native,
            answers: draft.answers,
            category: draft.category,
            explanation: draft.explanation,
            attachments: draft.attachments,
            status: ComplaintStatus::UnderInvestigation,
            filed_at: now,
            last_updated: now,
        }
    }

    /// Normalized answer for `field`, or `""`.
    pub fn field(&self, field: &str) -> &str {
        self.answers.get(field).unwrap_or_default()
    }
}

/// Timestamp format used in reports, e-mails and listings.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
