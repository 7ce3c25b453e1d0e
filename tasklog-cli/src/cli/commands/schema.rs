//! Schema command handler
//!
//! `schema load` reads a TOML file of the form
//!
//! ```toml
//! [[fields]]
//! key = "task_number"
//! title = "№ Задачи"
//! type = "text"
//! required = true
//!
//! [[statuses]]
//! title = "Завершена"
//! slug = "completed"
//!
//! [[users]]
//! id = "alice"
//! name = "Alice"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;

use super::AppContext;
use crate::cli::SchemaCommands;
use crate::config::repository::{schema, users};
use crate::config::repository::users::User;
use crate::ingest::{FieldDefinition, SchemaProvider, SchemaSnapshot, StatusDefinition};

#[derive(Debug, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub statuses: Vec<StatusDefinition>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl SchemaFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse schema file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(content)?;
        // Rejects duplicate keys, titles and statuses before anything is written
        SchemaSnapshot::new(file.fields.clone(), file.statuses.clone())?;
        Ok(file)
    }
}

pub async fn handle_schema_command(ctx: &AppContext, command: SchemaCommands) -> Result<()> {
    match command {
        SchemaCommands::Show => show_schema(ctx).await,
        SchemaCommands::Load { file } => load_schema_file(ctx, &file).await,
    }
}

async fn show_schema(ctx: &AppContext) -> Result<()> {
    let snapshot = ctx.store.load_schema().await?;

    if snapshot.fields().is_empty() {
        println!("{}", "No task fields configured".yellow());
    } else {
        println!("{}", "Fields:".bold());
        for field in snapshot.fields() {
            let mut flags = Vec::new();
            if field.required {
                flags.push("required");
            }
            if field.filterable {
                flags.push("filterable");
            }
            if field.is_system() {
                flags.push("system");
            }
            println!(
                "  {:<24} {:<28} {:<8} {}",
                field.key.cyan(),
                field.title,
                field.field_type.to_string(),
                flags.join(", ").dimmed()
            );
        }
    }

    if !snapshot.statuses().is_empty() {
        println!("{}", "Statuses:".bold());
        for status in snapshot.statuses() {
            println!("  {:<24} {:<28} {}", status.slug.cyan(), status.title, status.color.dimmed());
        }
    }

    Ok(())
}

async fn load_schema_file(ctx: &AppContext, path: &Path) -> Result<()> {
    let file = SchemaFile::read(path)?;
    let pool = ctx.store.pool();

    // Anyone may seed an empty database; afterwards only superadmins
    if !users::list_users(pool).await?.is_empty() {
        let actor = ctx.actor().await?;
        if !actor.elevated {
            anyhow::bail!("Only superadmins may change the schema");
        }
    }

    schema::replace_schema(pool, &file.fields, &file.statuses).await?;
    if !file.users.is_empty() {
        users::upsert_users(pool, &file.users).await?;
    }

    println!(
        "{} Loaded {} fields, {} statuses and {} users from {}",
        "✓".bright_green().bold(),
        file.fields.len(),
        file.statuses.len(),
        file.users.len(),
        path.display().to_string().bright_green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FieldType;

    #[test]
    fn test_parse_schema_file() {
        let file = SchemaFile::parse(
            r#"
            [[fields]]
            key = "task_number"
            title = "№ Задачи"
            type = "text"
            required = true
            order = 1

            [[fields]]
            key = "billable"
            title = "Оплачиваемая"
            type = "bool"

            [[statuses]]
            title = "Завершена"
            slug = "completed"
            color = "green"

            [[users]]
            id = "root"
            name = "Admin"
            superadmin = true
            "#,
        )
        .unwrap();

        assert_eq!(file.fields.len(), 2);
        assert!(file.fields[0].required);
        assert_eq!(file.fields[1].field_type, FieldType::Boolean);
        assert_eq!(file.statuses[0].slug, "completed");
        assert!(file.users[0].superadmin);
    }

    #[test]
    fn test_duplicate_titles_are_rejected() {
        let err = SchemaFile::parse(
            r#"
            [[fields]]
            key = "a"
            title = "Task"
            type = "text"

            [[fields]]
            key = "b"
            title = " task "
            type = "text"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("duplicate"));
    }
}
