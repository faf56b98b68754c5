//! Complaint tracking and dashboard counts.

use anyhow::{bail, Result};
use std::path::Path;

use cyberguard_core::models::{format_timestamp, TicketId};

use crate::config::Config;
use crate::report::render_complaint_pdf;
use crate::services::Services;

/// Print the status of one complaint, optionally regenerating its report.
pub async fn run_track(config: &Config, ticket: &str, pdf: Option<&Path>) -> Result<()> {
    let services = Services::from_config(config).await?;
    let ticket = TicketId::from_user_input(ticket);

    let Some(record) = services.store().fetch(&ticket).await? else {
        bail!("No complaint found with ticket ID {}", ticket);
    };

    println!("Ticket ID:    {}", record.ticket_id);
    println!("Status:       {}", record.status);
    println!("Date Filed:   {}", format_timestamp(&record.filed_at));
    println!("Last Updated: {}", format_timestamp(&record.last_updated));
    println!("Category:     {}", record.category);
    println!("Explanation:  {}", record.explanation);

    if let Some(path) = pdf {
        std::fs::write(path, render_complaint_pdf(&record)?)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let stats = services.store().stats().await?;

    println!("CyberGuard AI Complaint Stats");
    println!("=============================");
    println!();
    println!("  Database:  {}", config.db.path.display());
    println!("  Total:     {}", stats.total);
    println!("  Resolved:  {}", stats.resolved);
    println!("  Active:    {}", stats.active);
    Ok(())
}
