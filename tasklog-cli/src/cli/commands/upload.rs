//! Upload command handler

use anyhow::Result;
use colored::*;

use super::AppContext;
use crate::cli::UploadArgs;
use crate::config::repository::users;
use crate::ingest::report::export_errors_csv;
use crate::ingest::{
    DateParser, IngestError, SchemaProvider, UploadOrchestrator, UploadRequest,
};

pub async fn handle_upload_command(ctx: &AppContext, args: UploadArgs) -> Result<()> {
    let actor = ctx.actor().await?;

    let schema = ctx.store.load_schema().await?;
    if schema.upload_fields().next().is_none() {
        anyhow::bail!("No task fields configured. Use 'tasklog schema load <FILE>' first");
    }

    let mut request = UploadRequest::from_path(&args.file, args.date)?;
    if let Some(user) = &args.user {
        if users::get_user(ctx.store.pool(), user).await?.is_none() {
            anyhow::bail!("Unknown user '{}'", user);
        }
        request = request.for_user(user.clone());
    }

    let parser = DateParser::new(ctx.config.time_zone()?);
    let mut orchestrator = UploadOrchestrator::new(&ctx.store, &schema)
        .with_policy(ctx.config.policy())
        .with_date_parser(parser)
        .with_preferred_sheet(ctx.config.default_sheet.clone())
        .with_max_file_size(ctx.config.max_file_size);

    println!(
        "Uploading {} for {}...",
        args.file.display().to_string().cyan(),
        args.date.format("%d.%m.%Y").to_string().bold()
    );

    let result = orchestrator.upload(&actor, request).await;
    match result {
        Ok(outcome) => {
            println!(
                "{} Stored {} records for {} (upload {})",
                "✓".bright_green().bold(),
                outcome.record_count.to_string().bold(),
                outcome.target_user.bright_green(),
                outcome.upload_id.dimmed()
            );
            Ok(())
        }
        Err(IngestError::Validation(errors)) => {
            println!("{}", "Validation failed:".bright_red().bold());
            for error in &errors {
                println!("  {}", error.to_string().red());
            }
            if let Some(path) = &args.errors_out {
                export_errors_csv(&errors, path)?;
                println!("Errors written to: {}", path.display().to_string().bright_green());
            }
            anyhow::bail!("Upload rejected with {} error(s); nothing was stored", errors.len())
        }
        Err(IngestError::MissingColumns(titles)) => {
            println!("{}", "Required columns are missing from the header:".bright_red().bold());
            for title in &titles {
                println!("  {}", title.red());
            }
            anyhow::bail!("Upload rejected; nothing was stored")
        }
        Err(err) => {
            let stage = orchestrator.stage();
            let note = if err.is_pre_write() {
                "nothing was stored"
            } else {
                "the batch may or may not have been stored"
            };
            Err(anyhow::Error::new(err)
                .context(format!("Upload failed during {:?}; {}", stage, note)))
        }
    }
}
