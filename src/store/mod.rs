pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::{CanonicalKey, Message, NewMessage, NewThread, Thread, ThreadStatus};

pub use memory::MemoryThreadStore;
pub use postgres::PgThreadStore;

/// Persistence seam for threads and messages. Pure data access; policy
/// (participant checks, validation, event fan-out) lives in the resolver and
/// dispatcher.
///
/// Mutations are atomic per call: `insert_thread_if_absent` is a single
/// insert-if-absent against the canonical key, and the thread-metadata and
/// read-state writes are single field-level updates. Implementations never
/// expose a load-then-save window.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Atomically create the thread for `new.key` unless one already exists.
    /// Returns the created thread, or `None` when another writer holds the
    /// key (the caller re-reads and adopts the winner).
    async fn insert_thread_if_absent(&self, new: NewThread) -> AppResult<Option<Thread>>;

    async fn thread_by_id(&self, id: Uuid) -> AppResult<Option<Thread>>;

    async fn thread_by_key(&self, key: &CanonicalKey) -> AppResult<Option<Thread>>;

    /// The caller's thread bound to `project`, if any. At most one exists by
    /// the canonical-key invariant.
    async fn thread_for_project(&self, user: Uuid, project: Uuid) -> AppResult<Option<Thread>>;

    /// All threads the user participates in, most recent activity first.
    async fn threads_for_user(&self, user: Uuid) -> AppResult<Vec<Thread>>;

    /// Persist a message; the store assigns the insertion sequence.
    async fn append_message(&self, new: NewMessage) -> AppResult<Message>;

    /// Messages of a thread in total order: `created_at` ascending, ties
    /// broken by insertion sequence.
    async fn messages_for_thread(&self, thread_id: Uuid) -> AppResult<Vec<Message>>;

    /// One atomic thread-metadata update after a message was appended: sets
    /// `last_message_id`, advances `last_activity` (never backwards) and
    /// moves the status to `replied` — unless the thread is closed and
    /// `reopen_closed` is false. Returns the resulting status.
    async fn record_message_activity(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
        reopen_closed: bool,
    ) -> AppResult<ThreadStatus>;

    /// Flip every unread message in the thread addressed to `reader` to
    /// read, stamping `read_at` exactly at the transition. Idempotent;
    /// returns the number of messages transitioned.
    async fn mark_read(&self, thread_id: Uuid, reader: Uuid, at: DateTime<Utc>)
        -> AppResult<u64>;

    /// Explicit status update (admin close/reopen). Returns the updated
    /// thread, or `None` when the id is unknown.
    async fn set_status(
        &self,
        thread_id: Uuid,
        status: ThreadStatus,
    ) -> AppResult<Option<Thread>>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> AppResult<()>;
}
