//! Command-line interface definitions

pub mod commands;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tasklog", version, about = "Ingest daily task report spreadsheets")]
pub struct Cli {
    /// Act as this user (defaults to `default_user` from the config file)
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub as_user: Option<String>,

    /// Database file, overriding the config file and $TASKLOG_DB
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a report workbook and store its rows
    Upload(UploadArgs),
    /// Delete an upload, keeping the original file in the deletion log
    Delete(DeleteArgs),
    /// List uploads for a day
    Files(FilesArgs),
    /// Show or replace the field schema and status vocabulary
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Write an empty report workbook with the configured headers
    Template(TemplateArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Report workbook (.xlsx or .xls)
    pub file: PathBuf,

    /// Day the report covers (YYYY-MM-DD or DD.MM.YYYY)
    #[arg(long, value_parser = parse_day)]
    pub date: NaiveDate,

    /// Upload on behalf of another user (superadmins only)
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<String>,

    /// Write row errors to this CSV file when validation fails
    #[arg(long, value_name = "CSV")]
    pub errors_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub upload_id: String,

    /// Why the upload is removed; prompted for when omitted
    #[arg(long)]
    pub reason: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct FilesArgs {
    #[arg(long, value_parser = parse_day)]
    pub date: NaiveDate,

    /// Only this user's uploads (defaults to the acting user)
    #[arg(long, value_name = "USER_ID", conflicts_with = "all")]
    pub user: Option<String>,

    /// Uploads of every user
    #[arg(long)]
    pub all: bool,

    /// Also print the stored rows of each upload
    #[arg(long)]
    pub records: bool,
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// Print fields and statuses
    Show,
    /// Replace fields and statuses (and upsert users) from a TOML file
    Load {
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Output workbook path
    pub output: PathBuf,

    /// Sheet name (defaults to `default_sheet` from the config file)
    #[arg(long)]
    pub sheet: Option<String>,
}

/// Parse a report day as `YYYY-MM-DD` or `DD.MM.YYYY`
pub fn parse_day(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD or DD.MM.YYYY", s))
}
