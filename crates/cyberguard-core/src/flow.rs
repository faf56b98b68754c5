//! Conversational intake flow controller.
//!
//! Drives the fixed question sequence one user turn at a time. Each turn is
//! either a navigation command or an answer attempt:
//!
//! ```text
//!  turn ──▶ command? ──next──▶ i+1 ─────────────┐
//!              │      ──back──▶ max(0, i-1)     │
//!              │      ──repeat─▶ re-emit prompt │
//!              │      ──submit─────────────┐    │
//!              ▼                           │    ▼
//!           extract ──▶ validate ──▶ store ──▶ i+1 ──▶ i == N? ──▶ categorize ──▶ COMPLETE
//!                          │                               ▲
//!                          └─ yes/no invalid: re-prompt    └──── submit
//! ```
//!
//! All mutable state lives in [`SessionState`], which the caller owns and
//! passes in by `&mut`. The controller itself is immutable and can serve
//! any number of sessions.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{match_command, Command, Language, CANONICAL_LANGUAGE};
use crate::categorize::{Categorization, Categorizer};
use crate::evidence::{EvidencePreprocessor, OracleImageDescriber};
use crate::extract::OracleExtractor;
use crate::models::{AnswerRecord, Attachment, ComplaintDraft};
use crate::questions::{Question, QuestionKind};
use crate::traits::{Categorize, DescribeImage, Extract, GenerativeModel, Translate};
use crate::translate::OracleTranslator;

/// Re-prompt for a yes/no question whose answer was not understood.
pub const YES_NO_REPROMPT: &str = "Please respond with 'yes' or 'no'.";

/// The adapters a flow controller calls out to.
#[derive(Clone)]
pub struct Adapters {
    pub translator: Arc<dyn Translate>,
    pub extractor: Arc<dyn Extract>,
    pub categorizer: Arc<dyn Categorize>,
    pub describer: Arc<dyn DescribeImage>,
}

impl Adapters {
    /// Every adapter backed by the same generative model.
    pub fn from_model(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            translator: Arc::new(OracleTranslator::new(model.clone())),
            extractor: Arc::new(OracleExtractor::new(model.clone())),
            categorizer: Arc::new(Categorizer::new(model.clone())),
            describer: Arc::new(OracleImageDescriber::new(model)),
        }
    }
}

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bot,
    User,
}

/// One line of the append-only chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub message: String,
}

/// Where a session is in the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum Phase {
    AwaitingInput(usize),
    Complete,
}

/// Per-session interview state, owned by exactly one session.
///
/// `answers_native` and `answers_normalized` always hold the same set of
/// fields: every write goes to both in the same turn.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    language: Language,
    current_index: usize,
    answers_native: AnswerRecord,
    answers_normalized: AnswerRecord,
    attachments: Vec<Attachment>,
    active: bool,
    transcript: Vec<TranscriptEntry>,
    categorization: Option<Categorization>,
    last_spoken_index: Option<usize>,
}

impl SessionState {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            current_index: 0,
            answers_native: AnswerRecord::new(),
            answers_normalized: AnswerRecord::new(),
            attachments: Vec::new(),
            active: true,
            transcript: Vec::new(),
            categorization: None,
            last_spoken_index: None,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> Phase {
        if self.active {
            Phase::AwaitingInput(self.current_index)
        } else {
            Phase::Complete
        }
    }

    pub fn answers_native(&self) -> &AnswerRecord {
        &self.answers_native
    }

    pub fn answers_normalized(&self) -> &AnswerRecord {
        &self.answers_normalized
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn categorization(&self) -> Option<&Categorization> {
        self.categorization.as_ref()
    }

    /// The filing draft, once categorization has run.
    pub fn draft(&self) -> Option<ComplaintDraft> {
        self.categorization.as_ref().map(|c| ComplaintDraft {
            language: self.language,
            answers_native: self.answers_native.clone(),
            answers: self.answers_normalized.clone(),
            attachments: self.attachments.clone(),
            category: c.category,
            explanation: c.explanation.clone(),
        })
    }

    fn record_answer(&mut self, field: &str, native: String, normalized: String) {
        self.answers_native.set(field, native);
        self.answers_normalized.set(field, normalized);
    }

    fn record_exchange(&mut self, prompt: &str, input: &str) {
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::Bot,
            message: prompt.to_string(),
        });
        self.transcript.push(TranscriptEntry {
            speaker: Speaker::User,
            message: input.to_string(),
        });
    }
}

/// One user turn, already resolved from typing or speech.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// What caused the interview to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// The user said "submit".
    Submitted,
    /// The last question was answered or skipped.
    Exhausted,
}

/// Result of a finished interview.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub trigger: CompletionTrigger,
    pub categorization: Categorization,
    pub message: String,
    /// Required questions left unanswered (or answered with nothing).
    pub missing_required: Vec<String>,
}

/// The controller's reply to one turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// The session moved to question `index`.
    Moved { index: usize, prompt: String },
    /// The current question, emitted again.
    Repeated { prompt: String },
    /// The answer was rejected; the index did not change.
    Reprompt { message: String },
    /// The interview finished and categorization ran.
    Completed(Completion),
    /// The session was already complete.
    Inactive,
}

/// The intake flow controller.
pub struct IntakeFlow {
    questions: Arc<[Question]>,
    adapters: Adapters,
    evidence: EvidencePreprocessor,
}

impl IntakeFlow {
    pub fn new(questions: Vec<Question>, adapters: Adapters) -> Self {
        let evidence = EvidencePreprocessor::new(adapters.describer.clone());
        Self {
            questions: questions.into(),
            adapters,
            evidence,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    /// Open a new session in `language`.
    pub fn start(&self, language: Language) -> SessionState {
        SessionState::new(language)
    }

    /// Fraction of the interview done, in `[0.0, 1.0]`.
    pub fn progress(&self, state: &SessionState) -> f32 {
        if self.questions.is_empty() {
            return 1.0;
        }
        state.current_index as f32 / self.questions.len() as f32
    }

    /// Prompt for question `index` in `language`, translating (and caching)
    /// on first use of a language.
    pub async fn prompt_for(&self, index: usize, language: Language) -> Option<String> {
        let question = self.questions.get(index)?;
        if let Some(prompt) = question.prompt(language) {
            return Some(prompt.to_string());
        }
        Some(
            self.adapters
                .translator
                .translate(question.canonical_prompt(), CANONICAL_LANGUAGE, language)
                .await,
        )
    }

    /// The prompt the session is waiting on, or `None` once complete.
    pub async fn current_prompt(&self, state: &SessionState) -> Option<String> {
        if !state.active {
            return None;
        }
        self.prompt_for(state.current_index, state.language).await
    }

    /// Whether the current question still needs to be spoken aloud.
    ///
    /// Marks it as spoken, so each question is voiced at most once per
    /// forward move.
    pub fn take_speech_cue(&self, state: &mut SessionState) -> bool {
        if !state.active {
            return false;
        }
        let due = state
            .last_spoken_index
            .map_or(true, |spoken| state.current_index > spoken);
        if due {
            state.last_spoken_index = Some(state.current_index);
        }
        due
    }

    /// Process one turn.
    pub async fn handle_turn(&self, state: &mut SessionState, input: TurnInput) -> TurnOutcome {
        if !state.active {
            return TurnOutcome::Inactive;
        }
        let index = state.current_index;
        let question = match self.questions.get(index) {
            Some(q) => q,
            None => {
                // Only reachable with an empty questionnaire.
                return TurnOutcome::Completed(
                    self.complete(state, CompletionTrigger::Exhausted).await,
                );
            }
        };

        let text = input.text.trim();
        let accepts_files = question.kind == QuestionKind::TextWithAttachment;
        if text.is_empty() && !(accepts_files && !input.attachments.is_empty()) {
            return TurnOutcome::Ignored;
        }

        let prompt = self
            .prompt_for(index, state.language)
            .await
            .unwrap_or_default();
        state.record_exchange(&prompt, text);

        if let Some(command) = match_command(state.language, text) {
            debug!(?command, index, "flow command");
            self.keep_attachments(state, question, input.attachments);
            return match command {
                Command::Next => {
                    state.current_index = index + 1;
                    self.after_move(state).await
                }
                Command::Back => {
                    state.current_index = index.saturating_sub(1);
                    self.after_move(state).await
                }
                Command::Submit => TurnOutcome::Completed(
                    self.complete(state, CompletionTrigger::Submitted).await,
                ),
                Command::Repeat => TurnOutcome::Repeated { prompt },
            };
        }

        let extracted = self
            .adapters
            .extractor
            .extract(question.canonical_prompt(), text)
            .await;

        match question.kind {
            QuestionKind::YesNo => {
                let token = extracted.trim().to_lowercase();
                if token != "yes" && token != "no" {
                    debug!(field = %question.field, extracted = %extracted, "yes/no answer rejected");
                    let message = self
                        .adapters
                        .translator
                        .translate(YES_NO_REPROMPT, CANONICAL_LANGUAGE, state.language)
                        .await;
                    return TurnOutcome::Reprompt { message };
                }
                state.record_answer(&question.field, token.clone(), token);
            }
            QuestionKind::TextWithAttachment | QuestionKind::FreeText => {
                let normalized = self
                    .adapters
                    .translator
                    .translate(&extracted, state.language, CANONICAL_LANGUAGE)
                    .await;
                state.record_answer(&question.field, extracted, normalized);
            }
        }

        self.keep_attachments(state, question, input.attachments);

        state.current_index = index + 1;
        self.after_move(state).await
    }

    /// Files sent with any turn at the evidence question are kept, commands
    /// included; elsewhere they are dropped.
    fn keep_attachments(
        &self,
        state: &mut SessionState,
        question: &Question,
        attachments: Vec<Attachment>,
    ) {
        if attachments.is_empty() {
            return;
        }
        if question.kind == QuestionKind::TextWithAttachment {
            state.attachments.extend(attachments);
        } else {
            warn!(
                field = %question.field,
                count = attachments.len(),
                "attachments sent to a question that does not take files; dropped"
            );
        }
    }

    /// Force completion: categorize whatever has been answered so far.
    pub async fn submit(&self, state: &mut SessionState) -> TurnOutcome {
        if !state.active {
            return TurnOutcome::Inactive;
        }
        TurnOutcome::Completed(self.complete(state, CompletionTrigger::Submitted).await)
    }

    async fn after_move(&self, state: &mut SessionState) -> TurnOutcome {
        if state.current_index >= self.questions.len() {
            state.current_index = self.questions.len();
            return TurnOutcome::Completed(
                self.complete(state, CompletionTrigger::Exhausted).await,
            );
        }
        let prompt = self
            .prompt_for(state.current_index, state.language)
            .await
            .unwrap_or_default();
        TurnOutcome::Moved {
            index: state.current_index,
            prompt,
        }
    }

    async fn complete(&self, state: &mut SessionState, trigger: CompletionTrigger) -> Completion {
        state.active = false;

        let evidence = self.evidence.describe(&state.attachments).await;
        let categorization = self
            .adapters
            .categorizer
            .categorize(&state.answers_normalized, &evidence)
            .await;

        let lead = match trigger {
            CompletionTrigger::Submitted => "All details collected.",
            CompletionTrigger::Exhausted => "Thank you for providing all the information.",
        };
        let message = format!(
            "{} Complaint categorized as: {}. Explanation: {}",
            lead, categorization.category, categorization.explanation
        );

        let missing_required = self
            .questions
            .iter()
            .filter(|q| q.required)
            .filter(|q| {
                state
                    .answers_normalized
                    .get(&q.field)
                    .map_or(true, |v| v.trim().is_empty())
            })
            .map(|q| q.field.clone())
            .collect();

        info!(
            ?trigger,
            category = %categorization.category,
            answered = state.answers_normalized.len(),
            "intake complete"
        );

        state.categorization = Some(categorization.clone());
        Completion {
            trigger,
            categorization,
            message,
            missing_required,
        }
    }
}
