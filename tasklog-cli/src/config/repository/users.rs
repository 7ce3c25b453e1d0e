//! Users repository

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::ingest::Actor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub superadmin: bool,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.superadmin)
    }
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, name, superadmin FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    row.map(|row| {
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            superadmin: row.try_get("superadmin")?,
        })
    })
    .transpose()
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows: Vec<(String, String, bool)> =
        sqlx::query_as("SELECT id, name, superadmin FROM users ORDER BY id")
            .fetch_all(pool)
            .await
            .context("Failed to list users")?;

    Ok(rows
        .into_iter()
        .map(|(id, name, superadmin)| User { id, name, superadmin })
        .collect())
}

/// Insert users, updating name and role of existing ids
pub async fn upsert_users(pool: &SqlitePool, users: &[User]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    for user in users {
        sqlx::query(
            "INSERT INTO users (id, name, superadmin) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, superadmin = excluded.superadmin",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.superadmin)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to save user {}", user.id))?;
    }

    tx.commit().await.context("Failed to commit users")?;
    Ok(())
}
