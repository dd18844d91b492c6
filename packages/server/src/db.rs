use crate::models::{Comment, Feedback, NewComment, NewFeedback};
use crate::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::str::FromStr;
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

/// Opens the pool, creating the database file when it does not exist yet.
pub async fn init_pool(db_url: &str, max_connections: u32) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    info!(db_url, "database pool initialised");
    Ok(pool)
}

pub async fn init_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rating INTEGER NOT NULL,
            comment VARCHAR(500) NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            comment TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Feedback and comment storage over a single pool.
///
/// Records are write-once: there is no update or delete. Every insert is a
/// single autocommitted statement, so it is durable once the call returns.
#[derive(Clone, Debug)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens `db_url` and makes sure both tables exist.
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        let pool = init_pool(db_url, max_connections).await?;
        init_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn create_feedback(&self, feedback: NewFeedback) -> Result<Feedback> {
        let record = sqlx::query_as::<_, Feedback>(
            "INSERT INTO feedback (rating, comment) VALUES (?, ?) RETURNING id, rating, comment",
        )
        .bind(feedback.rating)
        .bind(feedback.comment)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = record.id, rating = record.rating, "feedback stored");
        Ok(record)
    }

    pub async fn list_feedback(&self) -> Result<Vec<Feedback>> {
        let records =
            sqlx::query_as::<_, Feedback>("SELECT id, rating, comment FROM feedback ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    pub async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let record = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (comment) VALUES (?) RETURNING id, comment AS text",
        )
        .bind(comment.text)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = record.id, "comment stored");
        Ok(record)
    }

    pub async fn list_comments(&self) -> Result<Vec<Comment>> {
        let records =
            sqlx::query_as::<_, Comment>("SELECT id, comment AS text FROM comments ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    /// Validates raw form input and stores it. Invalid input is dropped
    /// without error and yields `Ok(None)`.
    pub async fn submit_feedback(
        &self,
        rating: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Option<Feedback>> {
        match NewFeedback::from_form(rating, comment) {
            Some(feedback) => self.create_feedback(feedback).await.map(Some),
            None => {
                debug!(?rating, "dropping incomplete feedback submission");
                Ok(None)
            }
        }
    }

    pub async fn submit_comment(&self, text: Option<&str>) -> Result<Option<Comment>> {
        match NewComment::from_form(text) {
            Some(comment) => self.create_comment(comment).await.map(Some),
            None => {
                debug!("dropping empty comment submission");
                Ok(None)
            }
        }
    }
}
