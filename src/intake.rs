//! Interactive terminal chatbot (`cyberguard intake`).
//!
//! Each input line is one turn. Besides plain answers and the voice
//! commands (`next`, `back`, `repeat`, `submit` or their localized words),
//! three colon commands are understood:
//!
//! | Line | Effect |
//! |------|--------|
//! | `:audio <file.wav>` | Transcribe the clip and use it as the answer |
//! | `:attach <file>` | Add an evidence file (evidence question only) |
//! | `:quit` | Abandon the session; nothing is saved |
//!
//! When the interview completes, the complaint is filed and the ticket
//! printed (and optionally a PDF report written). If filing fails the
//! answers stay in memory and the user can retry with Enter or `:retry`.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

use cyberguard_core::catalog::Language;
use cyberguard_core::filing::FilingReceipt;
use cyberguard_core::flow::{SessionState, TurnInput, TurnOutcome};
use cyberguard_core::models::Attachment;
use cyberguard_core::questions::QuestionKind;

use crate::config::Config;
use crate::report::render_complaint_pdf;
use crate::services::Services;
use crate::speech::SpeechResolution;

/// Run `cyberguard intake` against stdin/stdout.
pub async fn run_intake(
    config: &Config,
    language: Option<String>,
    pdf: Option<PathBuf>,
) -> Result<()> {
    let services = Services::from_config(config).await?;
    let language = match language {
        Some(raw) => raw.parse::<Language>()?,
        None => services.default_language,
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = std::io::stdout();
    run_intake_with(&services, language, stdin, stdout, pdf.as_deref()).await?;
    Ok(())
}

/// Drive one interview over arbitrary line input and text output.
///
/// Returns the filing receipt, or `None` if the session was abandoned.
pub async fn run_intake_with<R, W>(
    services: &Services,
    language: Language,
    input: R,
    mut out: W,
    pdf: Option<&Path>,
) -> Result<Option<FilingReceipt>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let flow = &services.flow;
    let mut state = flow.start(language);
    let mut lines = input.lines();
    let mut pending: Vec<Attachment> = Vec::new();

    writeln!(
        out,
        "CyberGuard AI complaint intake ({}). Type 'next', 'back', 'repeat' or 'submit' at any time; ':quit' to leave.",
        language
    )?;
    if let Some(prompt) = flow.current_prompt(&state).await {
        bot_says(services, &mut state, &mut out, &prompt)?;
    }

    loop {
        let Some(line) = lines.next_line().await? else {
            writeln!(out, "Session abandoned; nothing was saved.")?;
            return Ok(None);
        };
        let line = line.trim();

        let text = if line == ":quit" {
            writeln!(out, "Session abandoned; nothing was saved.")?;
            return Ok(None);
        } else if let Some(path) = line.strip_prefix(":attach ") {
            let at_evidence = flow
                .questions()
                .get(state.current_index())
                .is_some_and(|q| q.kind == QuestionKind::TextWithAttachment);
            if !at_evidence {
                writeln!(
                    out,
                    "Evidence files can only be attached at the evidence question."
                )?;
                continue;
            }
            match read_attachment(Path::new(path.trim())) {
                Ok(attachment) => {
                    writeln!(
                        out,
                        "Attached {}. It will be sent with your next answer.",
                        attachment.name
                    )?;
                    pending.push(attachment);
                }
                Err(e) => writeln!(out, "Could not attach file: {:#}", e)?,
            }
            continue;
        } else if let Some(path) = line.strip_prefix(":audio ") {
            let wav = match std::fs::read(path.trim()) {
                Ok(wav) => wav,
                Err(e) => {
                    writeln!(out, "Could not read audio file: {}", e)?;
                    continue;
                }
            };
            match services.speech.resolve(&wav, language).await {
                SpeechResolution::Text(text) => {
                    writeln!(out, "You said: {}", text)?;
                    text
                }
                other => {
                    if let Some(notice) = other.notice() {
                        writeln!(out, "{}", notice)?;
                    }
                    continue;
                }
            }
        } else {
            line.to_string()
        };

        let turn = TurnInput::text(text).with_attachments(std::mem::take(&mut pending));
        match flow.handle_turn(&mut state, turn).await {
            TurnOutcome::Ignored => {}
            TurnOutcome::Moved { prompt, .. } | TurnOutcome::Repeated { prompt } => {
                bot_says(services, &mut state, &mut out, &prompt)?;
            }
            TurnOutcome::Reprompt { message } => writeln!(out, "Bot: {}", message)?,
            TurnOutcome::Completed(completion) => {
                writeln!(out, "Bot: {}", completion.message)?;
                if !completion.missing_required.is_empty() {
                    writeln!(
                        out,
                        "Note: required details were left blank: {}",
                        completion.missing_required.join(", ")
                    )?;
                }
                return file_with_retry(services, &state, &mut lines, &mut out, pdf).await;
            }
            TurnOutcome::Inactive => {
                warn!("turn received after completion");
                return Ok(None);
            }
        }
    }
}

fn bot_says<W: Write>(
    services: &Services,
    state: &mut SessionState,
    out: &mut W,
    prompt: &str,
) -> Result<()> {
    writeln!(out, "Bot: {}", prompt)?;
    writeln!(
        out,
        "[{:.0}% complete]",
        services.flow.progress(state) * 100.0
    )?;
    if services.flow.take_speech_cue(state) {
        services
            .voice
            .speak(prompt, state.language(), services.voice_settings);
    }
    Ok(())
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment::from_bytes(&name, &bytes))
}

/// File the completed session, offering a retry after every store failure
/// until it succeeds or the user leaves.
async fn file_with_retry<R, W>(
    services: &Services,
    state: &SessionState,
    lines: &mut Lines<R>,
    out: &mut W,
    pdf: Option<&Path>,
) -> Result<Option<FilingReceipt>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let draft = state
        .draft()
        .context("interview completed without a categorization")?;

    loop {
        match services.filing.file(draft.clone()).await {
            Ok(receipt) => {
                print_receipt(&receipt, out, pdf)?;
                return Ok(Some(receipt));
            }
            Err(e) => {
                let e = anyhow::Error::new(e);
                warn!("filing failed, session kept: {:#}", e);
                writeln!(out, "Could not file the complaint: {:#}", e)?;
                writeln!(
                    out,
                    "Your answers are kept. Press Enter or type ':retry' to try again, ':quit' to leave."
                )?;
            }
        }

        loop {
            let Some(line) = lines.next_line().await? else {
                writeln!(out, "Session abandoned; nothing was saved.")?;
                return Ok(None);
            };
            match line.trim() {
                "" | ":retry" => break,
                ":quit" => {
                    writeln!(out, "Session abandoned; nothing was saved.")?;
                    return Ok(None);
                }
                _ => writeln!(out, "Type ':retry' to file again or ':quit' to leave.")?,
            }
        }
    }
}

fn print_receipt<W: Write>(
    receipt: &FilingReceipt,
    out: &mut W,
    pdf: Option<&Path>,
) -> Result<()> {
    writeln!(out, "Complaint filed. Ticket ID: {}", receipt.ticket_id)?;
    writeln!(out, "Category: {}", receipt.record.category)?;
    if let Some(warning) = receipt.warning() {
        writeln!(out, "Warning: {}", warning)?;
    }
    if let Some(path) = pdf {
        // The complaint is already stored; `cyberguard track --pdf` can redo this.
        match write_report(receipt, path) {
            Ok(()) => writeln!(out, "Report written to {}", path.display())?,
            Err(e) => writeln!(out, "Could not write report: {:#}", e)?,
        }
    }
    Ok(())
}

pub(crate) fn write_report(receipt: &FilingReceipt, path: &Path) -> Result<()> {
    let bytes = render_complaint_pdf(&receipt.record)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use cyberguard_core::models::{Category, ComplaintRecord, ComplaintStatus, TicketId};
    use cyberguard_core::store::memory::InMemoryStore;
    use cyberguard_core::store::{ComplaintStats, ComplaintStore, StoreError};
    use cyberguard_core::traits::{Blob, DisabledNotifier, GenerativeModel, OracleError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::speech::{DisabledRecognizer, DisabledSynthesizer};

    /// Echoes translation/extraction input back and always categorizes as fraud.
    struct Oracle;

    #[async_trait]
    impl GenerativeModel for Oracle {
        fn model_name(&self) -> &str {
            "oracle"
        }
        async fn generate(&self, prompt: &str, _: Option<Blob<'_>>) -> Result<String, OracleError> {
            if prompt.contains("expert cybercrime analyst") {
                return Ok("Category: Financial Fraud\nExplanation: OTP scam".into());
            }
            if let Some((_, text)) = prompt.rsplit_once("Text to translate: ") {
                return Ok(text.to_string());
            }
            if let Some((_, rest)) = prompt.split_once("Response: ") {
                return Ok(rest.lines().next().unwrap_or_default().to_string());
            }
            Err(OracleError::Disabled)
        }
    }

    fn services() -> Services {
        Services::assemble(
            Arc::new(Oracle),
            Arc::new(InMemoryStore::new()),
            Arc::new(DisabledNotifier),
            Arc::new(DisabledRecognizer),
            Arc::new(DisabledSynthesizer),
        )
    }

    #[tokio::test]
    async fn test_terminal_interview_files_complaint() {
        let services = services();
        let script = "Asha 98765\n\nasha@example.in\nyesterday\nmaybe\nno\nyes\nno\nno\nOTP call\nsubmit\n";
        let mut out = Vec::new();

        let receipt = run_intake_with(
            &services,
            Language::English,
            script.as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap()
        .expect("complaint filed");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Please respond with 'yes' or 'no'."));
        assert!(text.contains(&format!("Ticket ID: {}", receipt.ticket_id)));
        assert_eq!(receipt.record.category, Category::FinancialFraud);
        assert_eq!(receipt.record.field("financial_scam"), "yes");
        assert!(services
            .store()
            .fetch(&receipt.ticket_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_eof_abandons_without_saving() {
        let services = services();
        let mut out = Vec::new();
        let result = run_intake_with(
            &services,
            Language::English,
            "Asha\n".as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap();
        assert!(result.is_none());
        assert_eq!(services.store().stats().await.unwrap().total, 0);
        assert!(String::from_utf8(out).unwrap().contains("nothing was saved"));
    }

    #[tokio::test]
    async fn test_attach_and_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("shot.png");
        std::fs::write(&shot, b"png").unwrap();
        let pdf = dir.path().join("report.pdf");

        let script = format!(
            "Asha\na@b.in\ntoday\nnext\nnext\nnext\nnext\nlost money\n:attach {}\n:attach {}\nsee screenshot\n",
            shot.display(),
            dir.path().join("missing.png").display()
        );
        let services = services();
        let mut out = Vec::new();
        let receipt = run_intake_with(
            &services,
            Language::English,
            script.as_bytes(),
            &mut out,
            Some(&pdf),
        )
        .await
        .unwrap()
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Attached shot.png"));
        assert!(text.contains("Could not attach file"));
        assert_eq!(receipt.record.attachments.len(), 1);
        assert!(std::fs::read(&pdf).unwrap().starts_with(b"%PDF"));
    }

    /// Fails the first `failures` inserts, then stores normally.
    struct FlakyStore {
        failures: AtomicUsize,
        inner: InMemoryStore,
    }

    impl FlakyStore {
        fn failing(times: usize) -> Self {
            Self {
                failures: AtomicUsize::new(times),
                inner: InMemoryStore::new(),
            }
        }
    }

    #[async_trait]
    impl ComplaintStore for FlakyStore {
        async fn insert(&self, record: &ComplaintRecord) -> Result<TicketId, StoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Backend("database is locked".into()));
            }
            self.inner.insert(record).await
        }
        async fn fetch(&self, ticket: &TicketId) -> Result<Option<ComplaintRecord>, StoreError> {
            self.inner.fetch(ticket).await
        }
        async fn update_status(
            &self,
            ticket: &TicketId,
            status: ComplaintStatus,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.update_status(ticket, status, at).await
        }
        async fn stats(&self) -> Result<ComplaintStats, StoreError> {
            self.inner.stats().await
        }
    }

    fn services_with_store(store: FlakyStore) -> Services {
        Services::assemble(
            Arc::new(Oracle),
            Arc::new(store),
            Arc::new(DisabledNotifier),
            Arc::new(DisabledRecognizer),
            Arc::new(DisabledSynthesizer),
        )
    }

    #[tokio::test]
    async fn test_store_failure_keeps_answers_for_retry() {
        let services = services_with_store(FlakyStore::failing(1));
        let script = "Asha 98765\nasha@example.in\nyesterday\nsubmit\nwhat now\n:retry\n";
        let mut out = Vec::new();

        let receipt = run_intake_with(
            &services,
            Language::English,
            script.as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap()
        .expect("filed on retry");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Could not file the complaint"));
        assert_eq!(text.matches("database is locked").count(), 1);
        assert!(text.contains("Your answers are kept."));
        assert!(text.contains("Type ':retry' to file again"));
        assert!(text.contains(&format!("Ticket ID: {}", receipt.ticket_id)));

        let stored = services
            .store()
            .fetch(&receipt.ticket_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.field("name_phone"), "Asha 98765");
        assert_eq!(stored.field("incident_date"), "yesterday");
    }

    #[tokio::test]
    async fn test_enter_retries_and_quit_leaves_after_store_failure() {
        let services = services_with_store(FlakyStore::failing(2));
        let mut out = Vec::new();
        let result = run_intake_with(
            &services,
            Language::English,
            "Asha\nsubmit\n\n:quit\n".as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap();

        assert!(result.is_none());
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Could not file the complaint").count(), 2);
        assert!(text.contains("nothing was saved"));
        assert_eq!(services.store().stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_attach_is_refused_before_the_evidence_question() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("chat.png");
        std::fs::write(&shot, b"png").unwrap();

        // Refused at question 1, accepted at the evidence question, then
        // kept when the user moves on with "next".
        let script = format!(
            ":attach {shot}\nAsha\na@b.in\ntoday\nnext\nnext\nnext\nnext\nlost money\n:attach {shot}\nnext\n",
            shot = shot.display()
        );
        let services = services();
        let mut out = Vec::new();
        let receipt = run_intake_with(
            &services,
            Language::English,
            script.as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap()
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Evidence files can only be attached at the evidence question."));
        assert_eq!(text.matches("Attached chat.png").count(), 1);
        assert_eq!(receipt.record.attachments.len(), 1);
        assert_eq!(receipt.record.attachments[0].name, "chat.png");
    }

    #[tokio::test]
    async fn test_unreadable_audio_is_reported() {
        let services = services();
        let mut out = Vec::new();
        run_intake_with(
            &services,
            Language::English,
            ":audio /nonexistent/clip.wav\n:quit\n".as_bytes(),
            &mut out,
            None,
        )
        .await
        .unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Could not read audio file"));
    }
}
