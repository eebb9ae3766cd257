use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a thread.
///
/// `open --message--> replied`; closure and reopen are explicit admin status
/// updates. Posting into a `closed` thread stores the message without
/// touching the status unless the reopen policy is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "thread_status", rename_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Replied,
    Closed,
}

/// Project reference passed in by callers when starting a project-scoped
/// conversation. The project record itself lives in the portal's CRUD side;
/// the messaging core only needs its id and a title for the subject line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub id: Uuid,
    pub title: String,
}

/// The canonical uniqueness key of a thread: the participant pair in sorted
/// order plus the optional project bucket. `project: None` is its own
/// bucket, distinct from every project id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub lo: Uuid,
    pub hi: Uuid,
    pub project: Option<Uuid>,
}

impl CanonicalKey {
    pub fn new(user_a: Uuid, user_b: Uuid, project: Option<Uuid>) -> Self {
        let (lo, hi) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        Self { lo, hi, project }
    }
}

/// A conversation between exactly two participants, optionally bound to one
/// project. Threads are never deleted; closure is a status change.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Uuid,
    pub participant_lo: Uuid,
    pub participant_hi: Uuid,
    pub project_id: Option<Uuid>,
    pub subject: String,
    pub status: ThreadStatus,
    pub last_message_id: Option<Uuid>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn key(&self) -> CanonicalKey {
        CanonicalKey {
            lo: self.participant_lo,
            hi: self.participant_hi,
            project: self.project_id,
        }
    }

    pub fn is_participant(&self, user: Uuid) -> bool {
        self.participant_lo == user || self.participant_hi == user
    }

    /// The participant on the other side of the conversation. Callers must
    /// have checked `is_participant` first.
    pub fn other_participant(&self, user: Uuid) -> Uuid {
        if self.participant_lo == user {
            self.participant_hi
        } else {
            self.participant_lo
        }
    }
}

/// A persisted message. Immutable after creation except for the one-way
/// read-state transition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    /// Ordered file-reference ids, owned by the file subsystem.
    pub attachments: Vec<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Insertion sequence; breaks `created_at` ties in the per-thread order.
    pub seq: i64,
}

/// Insert payload for a thread. The store assigns nothing: the resolver
/// fixes id, subject and timestamps before the atomic insert so a lost race
/// changes no observable state.
#[derive(Debug, Clone)]
pub struct NewThread {
    pub id: Uuid,
    pub key: CanonicalKey,
    pub subject: String,
    pub now: DateTime<Utc>,
}

/// Insert payload for a message. `seq` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}
