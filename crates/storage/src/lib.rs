use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{Comment, CommentId, News, NewsId, Note, NoteId, User, UserId},
    error::{DuplicateSlug, DuplicateUsername},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Column values for a note insert or update; the author is passed separately
/// because it is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFields {
    pub title: String,
    pub text: String,
    pub slug: String,
}

const COMMENT_COLUMNS: &str = "c.id, c.news_id, c.text, c.created, u.id, u.username
     FROM comments c
     INNER JOIN users u ON u.id = c.author_user_id";

const NOTE_COLUMNS: &str = "n.id, n.title, n.text, n.slug, u.id, u.username
     FROM notes n
     INNER JOIN users u ON u.id = n.author_user_id";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Fails with a [`DuplicateUsername`] in the error chain when the name is taken.
    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query("INSERT INTO users (username) VALUES (?) RETURNING id")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                unique_conflict(e, || DuplicateUsername {
                    username: username.to_string(),
                })
            })
            .with_context(|| format!("failed to create user '{username}'"))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| User {
            id: UserId(r.get::<i64, _>(0)),
            username: r.get::<String, _>(1),
        }))
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| User {
            id: UserId(r.get::<i64, _>(0)),
            username: r.get::<String, _>(1),
        }))
    }

    pub async fn create_news(&self, title: &str, text: &str, date: NaiveDate) -> Result<NewsId> {
        let rec = sqlx::query("INSERT INTO news (title, text, date) VALUES (?, ?, ?) RETURNING id")
            .bind(title)
            .bind(text)
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(NewsId(rec.get::<i64, _>(0)))
    }

    pub async fn news(&self, news_id: NewsId) -> Result<Option<News>> {
        let row = sqlx::query("SELECT id, title, text, date FROM news WHERE id = ?")
            .bind(news_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| news_from_row(&r)))
    }

    /// Newest first; ties on the same date fall back to insertion order.
    pub async fn list_latest_news(&self, limit: u32) -> Result<Vec<News>> {
        let rows = sqlx::query(
            "SELECT id, title, text, date
             FROM news
             ORDER BY date DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(news_from_row).collect())
    }

    pub async fn insert_comment(
        &self,
        news_id: NewsId,
        author_id: UserId,
        text: &str,
        created: DateTime<Utc>,
    ) -> Result<CommentId> {
        let rec = sqlx::query(
            "INSERT INTO comments (news_id, author_user_id, text, created) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(news_id.0)
        .bind(author_id.0)
        .bind(text)
        .bind(created)
        .fetch_one(&self.pool)
        .await?;
        Ok(CommentId(rec.get::<i64, _>(0)))
    }

    pub async fn comment(&self, comment_id: CommentId) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} WHERE c.id = ?"))
            .bind(comment_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| comment_from_row(&r)))
    }

    /// Oldest first.
    pub async fn list_comments_for_news(&self, news_id: NewsId) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} WHERE c.news_id = ? ORDER BY c.created ASC, c.id ASC"
        ))
        .bind(news_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn update_comment_text(&self, comment_id: CommentId, text: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(comment_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_comment(&self, comment_id: CommentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_comments(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Fails with a [`DuplicateSlug`] in the error chain when the slug is taken.
    pub async fn create_note(&self, author_id: UserId, fields: &NoteFields) -> Result<NoteId> {
        let rec = sqlx::query(
            "INSERT INTO notes (title, text, slug, author_user_id) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&fields.title)
        .bind(&fields.text)
        .bind(&fields.slug)
        .bind(author_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_conflict(e, || DuplicateSlug {
                slug: fields.slug.clone(),
            })
        })?;
        Ok(NoteId(rec.get::<i64, _>(0)))
    }

    pub async fn note_by_slug(&self, slug: &str) -> Result<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} WHERE n.slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| note_from_row(&r)))
    }

    pub async fn note(&self, note_id: NoteId) -> Result<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} WHERE n.id = ?"))
            .bind(note_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| note_from_row(&r)))
    }

    /// True when some note other than `exclude` already uses `slug`.
    pub async fn slug_taken(&self, slug: &str, exclude: Option<NoteId>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE slug = ? AND (? IS NULL OR id != ?))",
        )
        .bind(slug)
        .bind(exclude.map(|id| id.0))
        .bind(exclude.map(|id| id.0))
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn list_notes_for_author(&self, author_id: UserId) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} WHERE n.author_user_id = ? ORDER BY n.slug ASC"
        ))
        .bind(author_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(note_from_row).collect())
    }

    /// Rewrites title, text and slug. The author column is never touched.
    pub async fn update_note(&self, note_id: NoteId, fields: &NoteFields) -> Result<bool> {
        let result = sqlx::query("UPDATE notes SET title = ?, text = ?, slug = ? WHERE id = ?")
            .bind(&fields.title)
            .bind(&fields.text)
            .bind(&fields.slug)
            .bind(note_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                unique_conflict(e, || DuplicateSlug {
                    slug: fields.slug.clone(),
                })
            })?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_note(&self, note_id: NoteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(note_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_notes(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn news_from_row(r: &SqliteRow) -> News {
    News {
        id: NewsId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        text: r.get::<String, _>(2),
        date: r.get::<NaiveDate, _>(3),
    }
}

fn comment_from_row(r: &SqliteRow) -> Comment {
    Comment {
        id: CommentId(r.get::<i64, _>(0)),
        news_id: NewsId(r.get::<i64, _>(1)),
        text: r.get::<String, _>(2),
        created: r.get::<DateTime<Utc>, _>(3),
        author: User {
            id: UserId(r.get::<i64, _>(4)),
            username: r.get::<String, _>(5),
        },
    }
}

fn note_from_row(r: &SqliteRow) -> Note {
    Note {
        id: NoteId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        text: r.get::<String, _>(2),
        slug: r.get::<String, _>(3),
        author: User {
            id: UserId(r.get::<i64, _>(4)),
            username: r.get::<String, _>(5),
        },
    }
}

fn unique_conflict<E>(err: sqlx::Error, conflict: impl FnOnce() -> E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let is_unique_violation = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if is_unique_violation {
        anyhow::Error::new(conflict())
    } else {
        err.into()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
