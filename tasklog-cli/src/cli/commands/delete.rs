//! Delete command handler

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input};

use super::AppContext;
use crate::cli::DeleteArgs;
use crate::ingest::{RecordStore, delete_upload};

pub async fn handle_delete_command(ctx: &AppContext, args: DeleteArgs) -> Result<()> {
    let actor = ctx.actor().await?;

    let upload = ctx
        .store
        .fetch_upload(&args.upload_id)
        .await?
        .with_context(|| format!("Upload '{}' not found", args.upload_id))?;

    println!("Upload: {}", upload.id.dimmed());
    println!("  File:    {}", upload.file_name.cyan());
    println!("  User:    {}", upload.user_id);
    println!("  Date:    {}", upload.file_date.format("%d.%m.%Y"));
    println!("  Records: {}", upload.record_count);

    let reason = match args.reason {
        Some(reason) => reason,
        None => Input::<String>::new()
            .with_prompt("Reason for deletion")
            .interact_text()
            .context("Failed to read deletion reason")?,
    };

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Delete this upload?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("{}", "Cancelled".yellow());
            return Ok(());
        }
    }

    let deleted = delete_upload(&ctx.store, &actor, &upload.id, &reason).await?;
    println!(
        "{} Deleted {} ({} records)",
        "✓".bright_green().bold(),
        deleted.file_name.cyan(),
        deleted.record_count
    );
    Ok(())
}
