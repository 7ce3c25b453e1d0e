//! Command handlers and the state they share

pub mod delete;
pub mod files;
pub mod schema;
pub mod template;
pub mod upload;

use anyhow::{Context, Result};

use super::{Cli, Commands};
use crate::config::Config;
use crate::config::repository::{self, SqliteStore, users};
use crate::ingest::Actor;

/// Loaded configuration plus an open store
pub struct AppContext {
    pub config: Config,
    pub store: SqliteStore,
    as_user: Option<String>,
}

impl AppContext {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let config = Config::load()?;
        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => config.database_path()?,
        };
        let pool = repository::connect(&db_path).await?;

        Ok(AppContext {
            config,
            store: SqliteStore::new(pool),
            as_user: cli.as_user.clone(),
        })
    }

    /// The acting user, from `--as` or the configured default
    pub async fn actor(&self) -> Result<Actor> {
        let id = self
            .as_user
            .as_deref()
            .or(self.config.default_user.as_deref())
            .context("No user selected. Pass --as <USER_ID> or set default_user in the config file")?;

        let user = users::get_user(self.store.pool(), id)
            .await?
            .with_context(|| format!("Unknown user '{}'. Add it with 'tasklog schema load'", id))?;
        log::debug!("Acting as {} (superadmin: {})", user.id, user.superadmin);
        Ok(user.actor())
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = AppContext::open(&cli).await?;

    match cli.command {
        Commands::Upload(args) => upload::handle_upload_command(&ctx, args).await,
        Commands::Delete(args) => delete::handle_delete_command(&ctx, args).await,
        Commands::Files(args) => files::handle_files_command(&ctx, args).await,
        Commands::Schema { command } => schema::handle_schema_command(&ctx, command).await,
        Commands::Template(args) => template::handle_template_command(&ctx, args).await,
    }
}
