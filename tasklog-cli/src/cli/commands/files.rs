//! Files command handler

use anyhow::Result;
use colored::*;

use super::AppContext;
use crate::cli::FilesArgs;
use crate::config::repository::uploads;

pub async fn handle_files_command(ctx: &AppContext, args: FilesArgs) -> Result<()> {
    let user = if args.all {
        None
    } else {
        match args.user {
            Some(user) => Some(user),
            None => Some(ctx.actor().await?.id),
        }
    };

    let files = uploads::list_uploads(ctx.store.pool(), user.as_deref(), args.date).await?;
    let day = args.date.format("%d.%m.%Y").to_string();

    if files.is_empty() {
        println!("No uploads on {}", day.bold());
        return Ok(());
    }

    println!("Uploads on {}:", day.bold());
    for file in &files {
        let on_behalf = match &file.uploaded_by {
            Some(by) if *by != file.user_id => format!(" (by {})", by).dimmed().to_string(),
            _ => String::new(),
        };
        println!(
            "  {}  {:<12} {:<30} {:>4} records{}",
            file.id.dimmed(),
            file.user_id.bright_green(),
            file.file_name.cyan(),
            file.record_count,
            on_behalf
        );

        if args.records {
            let records = uploads::get_upload_records(ctx.store.pool(), &file.id).await?;
            for (i, record) in records.iter().enumerate() {
                let cells: Vec<String> =
                    record.iter().map(|(key, value)| format!("{}={}", key, value)).collect();
                println!("      {:>3}. {}", i + 1, cells.join(", ").dimmed());
            }
        }
    }

    Ok(())
}
