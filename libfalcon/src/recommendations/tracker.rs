//! Posted-tickers tracker backed by SQLite
//!
//! Remembers which tickers the feed has already announced so a ticker is
//! posted at most once until the history is cleared.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::info;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct PostedTicker {
    pub ticker: String,
    pub posted_at: DateTime<Utc>,
    pub rvol: Option<f64>,
    pub theme: Option<String>,
    pub sector: Option<String>,
}

#[derive(Clone)]
pub struct PostedTickers {
    pool: SqlitePool,
}

impl PostedTickers {
    /// Open (creating if needed) the tracker database at `db_path`
    ///
    /// `":memory:"` opens a private in-memory database.
    pub async fn open(db_path: &str) -> Result<Self> {
        let pool = if db_path == ":memory:" {
            // One connection, otherwise every pooled connection sees its own empty database
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(DbError::SqlxError)?
        } else {
            let expanded_path = shellexpand::tilde(db_path).to_string();
            if let Some(parent) = Path::new(&expanded_path).parent() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
            let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
            SqlitePool::connect(&db_url).await.map_err(DbError::SqlxError)?
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        let tracker = Self { pool };
        let count = tracker.count().await?;
        if count > 0 {
            info!("Loaded {} previously posted tickers", count);
        }
        Ok(tracker)
    }

    pub async fn is_posted(&self, ticker: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM posted_tickers WHERE ticker = ?")
            .bind(normalize(ticker))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.is_some())
    }

    /// Record `ticker` as posted now, replacing any earlier entry
    pub async fn mark_posted(
        &self,
        ticker: &str,
        rvol: Option<f64>,
        theme: Option<&str>,
        sector: Option<&str>,
    ) -> Result<()> {
        self.mark_posted_at(ticker, Utc::now(), rvol, theme, sector).await
    }

    pub async fn mark_posted_at(
        &self,
        ticker: &str,
        posted_at: DateTime<Utc>,
        rvol: Option<f64>,
        theme: Option<&str>,
        sector: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO posted_tickers (ticker, posted_at, rvol, theme, sector)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(normalize(ticker))
        .bind(posted_at.timestamp())
        .bind(rvol)
        .bind(theme)
        .bind(sector)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Every posted ticker, newest first
    pub async fn list(&self) -> Result<Vec<PostedTicker>> {
        let rows = sqlx::query(
            "SELECT ticker, posted_at, rvol, theme, sector FROM posted_tickers ORDER BY posted_at DESC, ticker ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| {
                let posted_at: i64 = r.get("posted_at");
                PostedTicker {
                    ticker: r.get("ticker"),
                    posted_at: Utc
                        .timestamp_opt(posted_at, 0)
                        .single()
                        .unwrap_or_default(),
                    rvol: r.get("rvol"),
                    theme: r.get("theme"),
                    sector: r.get("sector"),
                }
            })
            .collect())
    }

    /// Delete history, optionally only entries posted before `before`
    ///
    /// Returns the number of entries removed.
    pub async fn clear(&self, before: Option<DateTime<Utc>>) -> Result<u64> {
        let result = match before {
            Some(cutoff) => sqlx::query("DELETE FROM posted_tickers WHERE posted_at < ?")
                .bind(cutoff.timestamp())
                .execute(&self.pool)
                .await,
            None => sqlx::query("DELETE FROM posted_tickers")
                .execute(&self.pool)
                .await,
        }
        .map_err(DbError::SqlxError)?;

        let count = result.rows_affected();
        info!("Cleared {} posted tickers", count);
        Ok(count)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM posted_tickers")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.get("n"))
    }
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
