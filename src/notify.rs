//! Confirmation e-mail with category-specific safety tips.
//!
//! The message body follows the portal's fixed template; the five safety
//! tips are generated by the oracle and replaced by a fixed list when the
//! oracle is unavailable or answers with fewer than five usable lines.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{info, warn};

use cyberguard_core::models::{format_timestamp, Category, ComplaintRecord};
use cyberguard_core::traits::{DisabledNotifier, GenerativeModel, Notifier, NotifyError};

use crate::config::SmtpConfig;

/// Tips used when the oracle cannot provide five of its own.
pub const FALLBACK_TIPS: [&str; 5] = [
    "Be cautious online.",
    "Use strong passwords.",
    "Avoid suspicious links.",
    "Keep software updated.",
    "Report suspicious activity.",
];

const TIP_COUNT: usize = 5;

fn tips_prompt(category: Category) -> String {
    format!(
        "You are a cybersecurity expert tasked with providing practical and meaningful advice. \
         Based on the cybercrime category '{category}', generate exactly 5 concise, actionable tips \
         to help individuals avoid falling victim to this type of crime. Ensure the tips are specific \
         to the category, easy to understand, and useful for the general public. Format the response \
         as a numbered list (1-5) with no additional explanations or introductions beyond the tips \
         themselves.\n\nCategory: {category}"
    )
}

/// Pull up to five tips out of a numbered or bulleted list.
pub fn parse_tips(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', '-', '*', '•'])
                .trim()
                .to_string()
        })
        .filter(|tip| !tip.is_empty())
        .take(TIP_COUNT)
        .collect()
}

/// Five safety tips for `category`.
pub async fn safety_tips(model: &dyn GenerativeModel, category: Category) -> Vec<String> {
    match model.generate(&tips_prompt(category), None).await {
        Ok(reply) => {
            let tips = parse_tips(&reply);
            if tips.len() == TIP_COUNT {
                return tips;
            }
            warn!(got = tips.len(), "oracle returned too few safety tips; using defaults");
        }
        Err(e) => warn!(error = %e, "safety tips unavailable; using defaults"),
    }
    FALLBACK_TIPS.iter().map(|t| t.to_string()).collect()
}

pub fn confirmation_subject(record: &ComplaintRecord) -> String {
    format!(
        "CyberGuard AI - Complaint Confirmation (Ticket ID: {})",
        record.ticket_id
    )
}

/// Plain-text confirmation body.
pub fn compose_confirmation(record: &ComplaintRecord, tips: &[String]) -> String {
    let numbered = tips
        .iter()
        .enumerate()
        .map(|(i, tip)| format!("{}. {}", i + 1, tip))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Dear User,

Thank you for submitting your complaint to CyberGuard AI - National Cyber Crime Reporting Portal.
Your complaint has been successfully registered with the following details:

Ticket ID: {ticket}
Date Filed: {filed}
Status: {status}
Category: {category}

You can track the status of your complaint using the Ticket ID on our portal under 'Track Complaint'.
For any further assistance, please contact us at cybercrime@nic.in or call 1930.

5 Tips to Avoid {category} Crimes:
{numbered}

Regards,
CyberGuard AI Team
National Cyber Crime Reporting Portal
",
        ticket = record.ticket_id,
        filed = format_timestamp(&record.filed_at),
        status = record.status,
        category = record.category,
    )
}

/// SMTP (STARTTLS) notifier.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    model: Arc<dyn GenerativeModel>,
}

impl SmtpNotifier {
    /// Build from configuration, reading `SMTP_PASSWORD` from the environment.
    pub fn new(config: &SmtpConfig, model: Arc<dyn GenerativeModel>) -> Result<Self> {
        let password =
            std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD environment variable not set")?;
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("Invalid smtp.from address: {}", config.from))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP host: {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), password))
            .build();

        Ok(Self {
            transport,
            from,
            model,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_confirmation(
        &self,
        to: &str,
        record: &ComplaintRecord,
    ) -> Result<(), NotifyError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| NotifyError(format!("invalid recipient '{}': {}", to, e)))?;

        let tips = safety_tips(self.model.as_ref(), record.category).await;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(confirmation_subject(record))
            .header(ContentType::TEXT_PLAIN)
            .body(compose_confirmation(record, &tips))
            .map_err(|e| NotifyError(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;
        info!(ticket = %record.ticket_id, "confirmation e-mail sent");
        Ok(())
    }
}

/// SMTP notifier when `[smtp]` is configured, otherwise a disabled one.
pub fn create_notifier(
    config: Option<&SmtpConfig>,
    model: Arc<dyn GenerativeModel>,
) -> Result<Arc<dyn Notifier>> {
    match config {
        Some(smtp) => Ok(Arc::new(SmtpNotifier::new(smtp, model)?)),
        None => Ok(Arc::new(DisabledNotifier)),
    }
}
