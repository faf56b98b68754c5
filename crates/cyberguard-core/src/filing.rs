//! Filing pipeline: persist a categorized draft, then notify.
//!
//! Persistence is the only step that can fail the filing. The
//! confirmation e-mail is best-effort; its outcome is reported on the
//! receipt as a warning.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ComplaintDraft, ComplaintRecord, TicketId};
use crate::questions::fields;
use crate::store::{ComplaintStore, StoreError};
use crate::traits::Notifier;

/// Fresh tickets tried before a ticket collision is reported.
const TICKET_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum FilingError {
    #[error("could not persist complaint")]
    Store(#[from] StoreError),
}

/// What happened to the confirmation e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent { to: String },
    /// No e-mail address was given.
    Skipped,
    Failed { to: String, reason: String },
}

/// Result of a successful filing.
#[derive(Debug, Clone, Serialize)]
pub struct FilingReceipt {
    pub ticket_id: TicketId,
    pub record: ComplaintRecord,
    pub notification: NotificationStatus,
}

impl FilingReceipt {
    /// User-facing warning when the confirmation could not be sent.
    pub fn warning(&self) -> Option<String> {
        match &self.notification {
            NotificationStatus::Failed { to, .. } => Some(format!(
                "Complaint filed, but the confirmation e-mail to {} could not be sent.",
                to
            )),
            _ => None,
        }
    }
}

/// Store + notifier pair used to file complaints.
#[derive(Clone)]
pub struct Filing {
    store: Arc<dyn ComplaintStore>,
    notifier: Arc<dyn Notifier>,
}

impl Filing {
    pub fn new(store: Arc<dyn ComplaintStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn ComplaintStore> {
        &self.store
    }

    /// Assign a ticket, persist, then send the confirmation.
    pub async fn file(&self, draft: ComplaintDraft) -> Result<FilingReceipt, FilingError> {
        let now = Utc::now();
        let mut record = ComplaintRecord::from_draft(TicketId::generate(), draft, now);

        let mut attempt = 1;
        let ticket_id = loop {
            match self.store.insert(&record).await {
                Ok(ticket) => break ticket,
                Err(StoreError::Duplicate(taken)) if attempt < TICKET_ATTEMPTS => {
                    warn!(ticket = %taken, attempt, "ticket collision; regenerating");
                    record.ticket_id = TicketId::generate();
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, "complaint persistence failed");
                    return Err(e.into());
                }
            }
        };
        info!(ticket = %ticket_id, category = %record.category, "complaint filed");

        let email = record.field(fields::EMAIL).trim().to_string();
        let notification = if email.is_empty() {
            NotificationStatus::Skipped
        } else {
            match self.notifier.send_confirmation(&email, &record).await {
                Ok(()) => NotificationStatus::Sent { to: email },
                Err(e) => {
                    warn!(ticket = %ticket_id, error = %e, "confirmation e-mail not sent");
                    NotificationStatus::Failed {
                        to: email,
                        reason: e.to_string(),
                    }
                }
            }
        };

        Ok(FilingReceipt {
            ticket_id,
            record,
            notification,
        })
    }
}
