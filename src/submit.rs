//! Manual form submission (`cyberguard file <form.toml>`).
//!
//! ```toml
//! language = "Hindi"            # optional; defaults to intake.default_language
//! name_phone = "आशा, 9876543210"
//! email = "asha@example.in"
//! incident_date = "12-03-2025 14:30"
//! financial_scam = "yes"
//! incident_description = "..."
//! evidence = "Screenshot of the UPI request"
//! files = ["shots/upi.png"]     # relative to the form file
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use cyberguard_core::filing::FilingReceipt;
use cyberguard_core::form::{prepare_form, ComplaintForm};
use cyberguard_core::models::Attachment;

use crate::config::Config;
use crate::intake::write_report;
use crate::services::Services;

/// A [`ComplaintForm`] on disk, with evidence given as file paths.
#[derive(Debug, Deserialize)]
pub struct FormFile {
    #[serde(flatten)]
    pub form: ComplaintForm,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Parse a form file, reading its evidence files relative to it.
pub fn load_form(path: &Path) -> Result<ComplaintForm> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file: {}", path.display()))?;
    let file: FormFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse form file: {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut form = file.form;
    for rel in &file.files {
        let full = base.join(rel);
        let bytes = std::fs::read(&full)
            .with_context(|| format!("Failed to read evidence file: {}", full.display()))?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel.display().to_string());
        form.attachments.push(Attachment::from_bytes(&name, &bytes));
    }
    Ok(form)
}

/// Validate, categorize and file a form.
pub async fn submit_form(services: &Services, form: ComplaintForm) -> Result<FilingReceipt> {
    let draft = prepare_form(
        form,
        services.flow.questions(),
        services.default_language,
        services.flow.adapters(),
    )
    .await?;
    Ok(services.filing.file(draft).await?)
}

pub async fn run_file(config: &Config, path: &Path, pdf: Option<&Path>) -> Result<()> {
    let form = load_form(path)?;
    let services = Services::from_config(config).await?;
    let receipt = submit_form(&services, form).await?;

    println!("Complaint filed.");
    println!("  Ticket ID:   {}", receipt.ticket_id);
    println!("  Category:    {}", receipt.record.category);
    println!("  Explanation: {}", receipt.record.explanation);
    println!("  Status:      {}", receipt.record.status);
    if let Some(warning) = receipt.warning() {
        eprintln!("Warning: {}", warning);
    }
    if let Some(path) = pdf {
        write_report(&receipt, path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
