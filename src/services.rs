//! Wiring: everything a surface (CLI or HTTP) needs to run intake and
//! filing, built once from [`Config`].

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use cyberguard_core::catalog::Language;
use cyberguard_core::filing::Filing;
use cyberguard_core::flow::{Adapters, IntakeFlow};
use cyberguard_core::questions::standard_questions;
use cyberguard_core::store::ComplaintStore;
use cyberguard_core::traits::{GenerativeModel, Notifier};

use crate::config::Config;
use crate::notify::create_notifier;
use crate::oracle::create_model;
use crate::speech::{
    create_recognizer, create_synthesizer, OracleTranscriber, SpeechRecognizer, SpeechSynthesizer,
    SpeechTurnResolver, VoiceSettings,
};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// Shared, immutable service graph.
pub struct Services {
    pub flow: IntakeFlow,
    pub filing: Filing,
    pub speech: SpeechTurnResolver,
    pub voice: Arc<dyn SpeechSynthesizer>,
    pub voice_settings: VoiceSettings,
    pub default_language: Language,
}

impl Services {
    /// Connect to the database (creating the schema if needed) and build
    /// the configured oracle, notifier and speech engines.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let model = create_model(&config.oracle)?;
        let store: Arc<dyn ComplaintStore> = Arc::new(SqliteStore::new(pool));
        let notifier = create_notifier(config.smtp.as_ref(), model.clone())?;
        let recognizer = create_recognizer(&config.speech)?;
        let voice = create_synthesizer(&config.speech)?;
        let voice_settings = VoiceSettings::new(config.speech.pitch, config.speech.rate)?;

        info!(
            oracle = %config.oracle.provider,
            recognizer = %config.speech.recognizer,
            synthesizer = %config.speech.synthesizer,
            smtp = config.smtp.is_some(),
            "services ready"
        );

        let speech = SpeechTurnResolver::new(
            recognizer,
            Arc::new(OracleTranscriber::new(model.clone())),
            config.speech.silence_threshold_dbfs,
            config.speech.max_attempts,
        );

        Ok(Self {
            flow: IntakeFlow::new(standard_questions(), Adapters::from_model(model)),
            filing: Filing::new(store, notifier),
            speech,
            voice,
            voice_settings,
            default_language: config.intake.default_language,
        })
    }

    /// Build from explicit parts with default speech settings.
    pub fn assemble(
        model: Arc<dyn GenerativeModel>,
        store: Arc<dyn ComplaintStore>,
        notifier: Arc<dyn Notifier>,
        recognizer: Arc<dyn SpeechRecognizer>,
        voice: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let speech = SpeechTurnResolver::new(
            recognizer,
            Arc::new(OracleTranscriber::new(model.clone())),
            -60.0,
            3,
        );
        Self {
            flow: IntakeFlow::new(standard_questions(), Adapters::from_model(model)),
            filing: Filing::new(store, notifier),
            speech,
            voice,
            voice_settings: VoiceSettings::default(),
            default_language: Language::English,
        }
    }

    pub fn store(&self) -> &Arc<dyn ComplaintStore> {
        self.filing.store()
    }
}
