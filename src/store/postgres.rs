use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DbConfig;
use crate::error::{AppError, AppResult};
use crate::model::{CanonicalKey, Message, NewMessage, NewThread, Thread, ThreadStatus};
use crate::store::ThreadStore;

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(database_url: &str, config: &DbConfig) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(database_url)
        .await?;
    Ok(pool)
}

const THREAD_COLUMNS: &str = "id, participant_lo, participant_hi, project_id, subject, status, \
     last_message_id, last_activity, created_at";

const MESSAGE_COLUMNS: &str = "id, thread_id, sender_id, recipient_id, content, attachments, \
     is_read, read_at, created_at, seq";

/// Postgres-backed store. Uniqueness of the canonical key is enforced by the
/// `threads_canonical_key` expression index; `COALESCE` maps the no-project
/// bucket to a sentinel so NULLs cannot slip past the constraint.
pub struct PgThreadStore {
    pool: DbPool,
}

impl PgThreadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ThreadStore for PgThreadStore {
    async fn insert_thread_if_absent(&self, new: NewThread) -> AppResult<Option<Thread>> {
        let thread = sqlx::query_as::<_, Thread>(&format!(
            r#"
            INSERT INTO threads
                (id, participant_lo, participant_hi, project_id, subject, status,
                 last_activity, created_at)
            VALUES ($1, $2, $3, $4, $5, 'open', $6, $6)
            ON CONFLICT (participant_lo, participant_hi,
                         COALESCE(project_id, '00000000-0000-0000-0000-000000000000'::uuid))
                DO NOTHING
            RETURNING {THREAD_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(new.key.lo)
        .bind(new.key.hi)
        .bind(new.key.project)
        .bind(&new.subject)
        .bind(new.now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn thread_by_id(&self, id: Uuid) -> AppResult<Option<Thread>> {
        let thread = sqlx::query_as::<_, Thread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn thread_by_key(&self, key: &CanonicalKey) -> AppResult<Option<Thread>> {
        let thread = sqlx::query_as::<_, Thread>(&format!(
            r#"
            SELECT {THREAD_COLUMNS} FROM threads
            WHERE participant_lo = $1
              AND participant_hi = $2
              AND project_id IS NOT DISTINCT FROM $3
            "#
        ))
        .bind(key.lo)
        .bind(key.hi)
        .bind(key.project)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn thread_for_project(&self, user: Uuid, project: Uuid) -> AppResult<Option<Thread>> {
        let thread = sqlx::query_as::<_, Thread>(&format!(
            r#"
            SELECT {THREAD_COLUMNS} FROM threads
            WHERE (participant_lo = $1 OR participant_hi = $1)
              AND project_id = $2
            "#
        ))
        .bind(user)
        .bind(project)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn threads_for_user(&self, user: Uuid) -> AppResult<Vec<Thread>> {
        let threads = sqlx::query_as::<_, Thread>(&format!(
            r#"
            SELECT {THREAD_COLUMNS} FROM threads
            WHERE participant_lo = $1 OR participant_hi = $1
            ORDER BY last_activity DESC
            "#
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(threads)
    }

    async fn append_message(&self, new: NewMessage) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages
                (id, thread_id, sender_id, recipient_id, content, attachments,
                 is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(new.thread_id)
        .bind(new.sender_id)
        .bind(new.recipient_id)
        .bind(&new.content)
        .bind(&new.attachments)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn messages_for_thread(&self, thread_id: Uuid) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE thread_id = $1
            ORDER BY created_at ASC, seq ASC
            "#
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn record_message_activity(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
        reopen_closed: bool,
    ) -> AppResult<ThreadStatus> {
        // Single-statement update; concurrent posts to the same thread apply
        // in the row-lock order without a read-modify-write window.
        let row = sqlx::query(
            r#"
            UPDATE threads
            SET last_message_id = $2,
                last_activity = GREATEST(last_activity, $3),
                status = CASE
                    WHEN status = 'closed' AND NOT $4 THEN status
                    ELSE 'replied'::thread_status
                END
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind(thread_id)
        .bind(message_id)
        .bind(at)
        .bind(reopen_closed)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| {
            AppError::internal(format!("thread {} vanished during metadata update", thread_id))
        })?;

        Ok(row.try_get::<ThreadStatus, _>("status")?)
    }

    async fn mark_read(
        &self,
        thread_id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE thread_id = $1 AND recipient_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(thread_id)
        .bind(reader)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn set_status(
        &self,
        thread_id: Uuid,
        status: ThreadStatus,
    ) -> AppResult<Option<Thread>> {
        let thread = sqlx::query_as::<_, Thread>(&format!(
            r#"
            UPDATE threads SET status = $2
            WHERE id = $1
            RETURNING {THREAD_COLUMNS}
            "#
        ))
        .bind(thread_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
