//! # CyberGuard AI
//!
//! A multilingual cybercrime complaint intake portal. Complainants answer a
//! fixed interview by typing or speaking in one of 23 languages; answers are
//! normalized to English, categorized by a generative model, stored under a
//! ticket ID, confirmed by e-mail and exportable as a PDF report.
//!
//! The interview itself (question flow, voice commands, extraction,
//! categorization, filing) lives in the `cyberguard-core` crate. This crate
//! supplies the concrete backends and the two surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐       ┌─────────────────────┐
//! │   CLI    │  │   HTTP   │──────▶│ cyberguard-core     │
//! │ (intake) │  │  (axum)  │       │ IntakeFlow / Filing │
//! └────┬─────┘  └────┬─────┘       └──────────┬──────────┘
//!      └──────┬──────┘                        │ traits
//!             ▼                               ▼
//!       ┌──────────┐   ┌────────┐  ┌────────┐  ┌────────┐  ┌──────┐
//!       │ Services │──▶│ Gemini │  │ Speech │  │ SQLite │  │ SMTP │
//!       └──────────┘   └────────┘  └────────┘  └────────┘  └──────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite complaint store |
//! | [`oracle`] | Gemini generative-model client |
//! | [`speech`] | Silence check, speech recognition, voice output |
//! | [`notify`] | Confirmation e-mail with safety tips |
//! | [`report`] | PDF complaint report |
//! | [`services`] | Wiring from config to a ready service graph |
//! | [`intake`] | Terminal chatbot |
//! | [`submit`] | Manual form submission |
//! | [`track`] | Tracking and statistics commands |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod intake;
pub mod migrate;
pub mod notify;
pub mod oracle;
pub mod report;
pub mod server;
pub mod services;
pub mod speech;
pub mod sqlite_store;
pub mod submit;
pub mod track;
