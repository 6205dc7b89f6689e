//! Append-only sheet store for the flattened projection.
//!
//! Stands in for the shared spreadsheet the results are uploaded to: the
//! column set only grows, and every run appends its rows under a common
//! `scrape_datetime`.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::output::FlatTable;

const SHEET_TABLE: &str = "offer_sheet";
pub const TIMESTAMP_COLUMN: &str = "scrape_datetime";

pub struct SheetStore {
    pool: SqlitePool,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Target columns for an upload, and the column each incoming header fills.
///
/// SQLite compares column names ASCII case-insensitively, so headers that
/// differ only in case share one column, spelled as the sheet already has it
/// or else as first seen. The timestamp column always comes first and is not
/// filled from the table.
fn resolve_columns(existing: &[String], headers: &[String]) -> (Vec<String>, Vec<Option<usize>>) {
    let mut columns = vec![TIMESTAMP_COLUMN.to_string()];
    let slots = headers
        .iter()
        .map(|header| {
            if header.eq_ignore_ascii_case(TIMESTAMP_COLUMN) {
                return None;
            }
            if let Some(slot) = columns.iter().position(|c| c.eq_ignore_ascii_case(header)) {
                return Some(slot);
            }
            let name = existing
                .iter()
                .find(|e| e.eq_ignore_ascii_case(header))
                .unwrap_or(header);
            columns.push(name.clone());
            Some(columns.len() - 1)
        })
        .collect();
    (columns, slots)
}

impl SheetStore {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(parent) = db_url
            .strip_prefix("sqlite:")
            .map(|path| Path::new(path.trim_start_matches("//")))
            .and_then(Path::parent)
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating sheet database {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::with_pool(pool).await
    }

    /// Single-connection in-memory store
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        info!("Running sheet migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Existing sheet columns, in position order
    pub async fn columns(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(SHEET_TABLE)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect())
    }

    /// Add each of `columns` the sheet lacks
    async fn add_missing_columns(&self, existing: &[String], columns: &[String]) -> Result<()> {
        let missing: Vec<&String> = columns
            .iter()
            .filter(|c| !existing.iter().any(|e| e.eq_ignore_ascii_case(c)))
            .collect();

        if !missing.is_empty() {
            info!("Adding new columns: {:?}", missing);
        }
        for column in missing {
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
                quote_ident(SHEET_TABLE),
                quote_ident(column)
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Append `table` stamped with `scraped_at`, extending the column set first.
    ///
    /// Returns the number of rows appended.
    pub async fn append(&self, table: &FlatTable, scraped_at: DateTime<Local>) -> Result<usize> {
        if table.rows.is_empty() {
            info!("No rows to append");
            return Ok(0);
        }

        let existing = self.columns().await?;
        let (columns, slots) = resolve_columns(&existing, &table.headers);
        self.add_missing_columns(&existing, &columns).await?;

        let names = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders})",
            quote_ident(SHEET_TABLE)
        );
        let stamp = scraped_at.format("%Y-%m-%d %H:%M").to_string();

        let mut tx = self.pool.begin().await?;
        for row in &table.rows {
            let mut values = vec![String::new(); columns.len()];
            values[0].clone_from(&stamp);
            for (slot, cell) in slots.iter().zip(row) {
                if let Some(slot) = *slot
                    && values[slot].is_empty()
                {
                    values[slot].clone_from(cell);
                }
            }

            let mut query = sqlx::query(&insert);
            for value in values {
                query = query.bind(value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Appended {} rows to sheet", table.rows.len());
        Ok(table.rows.len())
    }

    pub async fn row_count(&self) -> Result<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", quote_ident(SHEET_TABLE)))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

impl Clone for SheetStore {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
