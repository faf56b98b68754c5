//! # CyberGuard CLI (`cyberguard`)
//!
//! ## Usage
//!
//! ```bash
//! cyberguard --config ./config/cyberguard.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cyberguard init` | Create the SQLite database and complaint schema |
//! | `cyberguard languages` | List supported languages and locales |
//! | `cyberguard intake` | Interactive complaint chatbot in the terminal |
//! | `cyberguard file <form.toml>` | Submit a complete complaint form |
//! | `cyberguard track <ticket>` | Show a complaint's status |
//! | `cyberguard stats` | Total, resolved and active complaint counts |
//! | `cyberguard serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! cyberguard init
//! cyberguard intake --language Hindi --pdf complaint.pdf
//! cyberguard file ./complaint.toml
//! cyberguard track cyber-1a2b3c4d --pdf report.pdf
//! RUST_LOG=debug cyberguard serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cyberguard::{config, intake, migrate, server, submit, track};
use cyberguard_core::catalog::Language;

/// CyberGuard AI: multilingual cybercrime complaint intake.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cyberguard.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cyberguard",
    about = "CyberGuard AI - multilingual cybercrime complaint intake, categorization and tracking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cyberguard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// List supported languages with their speech locales.
    Languages,

    /// Run the complaint chatbot in the terminal.
    ///
    /// Type answers line by line. `:audio <file.wav>` answers by voice,
    /// `:attach <file>` adds evidence to the next answer, `:quit` abandons.
    Intake {
        /// Conversation language, by name or locale (e.g. `Hindi`, `ta-IN`).
        #[arg(long)]
        language: Option<String>,

        /// Write the PDF report here after filing.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Submit a complete complaint form from a TOML file.
    File {
        form: PathBuf,

        /// Write the PDF report here after filing.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Show the status of a complaint.
    Track {
        /// Ticket ID (case-insensitive).
        ticket: String,

        /// Regenerate the PDF report to this path.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Show complaint counts.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Languages = cli.command {
        for lang in Language::ALL {
            println!("{:<12} {}", lang.name(), lang.locale());
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Intake { language, pdf } => {
            intake::run_intake(&cfg, language, pdf).await?;
        }
        Commands::File { form, pdf } => {
            submit::run_file(&cfg, &form, pdf.as_deref()).await?;
        }
        Commands::Track { ticket, pdf } => {
            track::run_track(&cfg, &ticket, pdf.as_deref()).await?;
        }
        Commands::Stats => {
            track::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Languages => {}
    }

    Ok(())
}
