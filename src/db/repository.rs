use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, NewArticle};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, title, link, summary, insight_points, generated_image_path, \
                               posting_image_path, posting_video_path, ingested_at";

/// Single-table article store.
///
/// Every operation opens its own connection and drops it when done; nothing is held
/// between calls.
pub struct Repository {
    db_path: PathBuf,
}

impl Repository {
    /// Creates the schema if needed. Safe to call against an existing database.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let repository = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        repository.connect().await?;
        tracing::info!("Article store ready at {}", repository.db_path.display());
        Ok(repository)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).await?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(conn)
    }

    /// Inserts the article unless its link is already stored.
    /// Returns whether a new row was created.
    pub async fn insert_if_absent(&self, article: &NewArticle) -> Result<bool> {
        let points = encode_points(&article.insight_points)?;
        let article = article.clone();
        let conn = self.connect().await?;

        let inserted = conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO articles (title, link, summary, insight_points)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(link) DO NOTHING"#,
                    params![article.title, article.link, article.summary, points],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// Rows whose generated image is NULL or empty, newest first.
    pub async fn find_missing_generated_image(&self, limit: usize) -> Result<Vec<Article>> {
        let limit = sql_limit(limit);
        let conn = self.connect().await?;

        let articles = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE generated_image_path IS NULL OR generated_image_path = ''
                     ORDER BY ingested_at DESC, id DESC
                     LIMIT ?1"
                ))?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Records the generated image for an article that does not have one yet.
    /// Returns false when no such row exists.
    pub async fn set_generated_image(&self, id: i64, path: &str) -> Result<bool> {
        let path = path.to_string();
        let conn = self.connect().await?;

        let updated = conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET generated_image_path = ?1
                       WHERE id = ?2
                         AND (generated_image_path IS NULL OR generated_image_path = '')"#,
                    params![path, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    pub async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        let link = link.to_string();
        let conn = self.connect().await?;

        let article = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE link = ?1"
                ))?;
                let article = stmt
                    .query_row(params![link], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Article>> {
        let limit = sql_limit(limit);
        let conn = self.connect().await?;

        let articles = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     ORDER BY ingested_at DESC, id DESC
                     LIMIT ?1"
                ))?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.connect().await?;
        let count = conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn encode_points(points: &[String]) -> Result<Option<String>> {
    if points.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(points)?))
}

fn decode_points(id: i64, raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(points) => points,
        Err(e) => {
            tracing::warn!("Corrupt insight_points for article {}: {}", id, e);
            Vec::new()
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    let id: i64 = row.get(0)?;
    Ok(Article {
        id,
        title: row.get(1)?,
        link: row.get(2)?,
        summary: row.get(3)?,
        insight_points: decode_points(id, row.get(4)?),
        generated_image_path: row.get(5)?,
        posting_image_path: row.get(6)?,
        posting_video_path: row.get(7)?,
        ingested_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
