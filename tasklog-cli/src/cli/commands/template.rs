//! Template command handler

use anyhow::Result;
use colored::*;

use super::AppContext;
use crate::cli::TemplateArgs;
use crate::ingest::SchemaProvider;
use crate::ingest::excel::write_template;

pub async fn handle_template_command(ctx: &AppContext, args: TemplateArgs) -> Result<()> {
    let schema = ctx.store.load_schema().await?;
    let sheet = args.sheet.as_deref().unwrap_or(&ctx.config.default_sheet);

    write_template(&schema, sheet, &args.output)?;
    println!(
        "{} Template with {} columns written to {}",
        "✓".bright_green().bold(),
        schema.upload_fields().count(),
        args.output.display().to_string().bright_green()
    );
    Ok(())
}
