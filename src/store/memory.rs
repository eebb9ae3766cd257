use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{CanonicalKey, Message, NewMessage, NewThread, Thread, ThreadStatus};
use crate::store::ThreadStore;

#[derive(Default)]
struct MemoryState {
    threads: HashMap<Uuid, Thread>,
    key_index: HashMap<CanonicalKey, Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
    next_seq: i64,
}

/// In-process store with the same contract as the Postgres one. A single
/// mutex over the whole state makes every call atomic, which is the
/// serialization point the concurrency model requires. Backs the test
/// suite, where it keeps the whole stack hermetic.
#[derive(Default)]
pub struct MemoryThreadStore {
    inner: Mutex<MemoryState>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn insert_thread_if_absent(&self, new: NewThread) -> AppResult<Option<Thread>> {
        let mut state = self.inner.lock().await;

        if state.key_index.contains_key(&new.key) {
            return Ok(None);
        }

        let thread = Thread {
            id: new.id,
            participant_lo: new.key.lo,
            participant_hi: new.key.hi,
            project_id: new.key.project,
            subject: new.subject,
            status: ThreadStatus::Open,
            last_message_id: None,
            last_activity: new.now,
            created_at: new.now,
        };

        state.key_index.insert(new.key, thread.id);
        state.threads.insert(thread.id, thread.clone());

        Ok(Some(thread))
    }

    async fn thread_by_id(&self, id: Uuid) -> AppResult<Option<Thread>> {
        let state = self.inner.lock().await;
        Ok(state.threads.get(&id).cloned())
    }

    async fn thread_by_key(&self, key: &CanonicalKey) -> AppResult<Option<Thread>> {
        let state = self.inner.lock().await;
        Ok(state
            .key_index
            .get(key)
            .and_then(|id| state.threads.get(id))
            .cloned())
    }

    async fn thread_for_project(&self, user: Uuid, project: Uuid) -> AppResult<Option<Thread>> {
        let state = self.inner.lock().await;
        Ok(state
            .threads
            .values()
            .find(|t| t.project_id == Some(project) && t.is_participant(user))
            .cloned())
    }

    async fn threads_for_user(&self, user: Uuid) -> AppResult<Vec<Thread>> {
        let state = self.inner.lock().await;
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.is_participant(user))
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(threads)
    }

    async fn append_message(&self, new: NewMessage) -> AppResult<Message> {
        let mut state = self.inner.lock().await;

        state.next_seq += 1;
        let message = Message {
            id: new.id,
            thread_id: new.thread_id,
            sender_id: new.sender_id,
            recipient_id: new.recipient_id,
            content: new.content,
            attachments: new.attachments,
            is_read: false,
            read_at: None,
            created_at: new.created_at,
            seq: state.next_seq,
        };

        state
            .messages
            .entry(new.thread_id)
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn messages_for_thread(&self, thread_id: Uuid) -> AppResult<Vec<Message>> {
        let state = self.inner.lock().await;
        let mut messages = state.messages.get(&thread_id).cloned().unwrap_or_default();
        messages.sort_by(|a, b| (a.created_at, a.seq).cmp(&(b.created_at, b.seq)));
        Ok(messages)
    }

    async fn record_message_activity(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
        reopen_closed: bool,
    ) -> AppResult<ThreadStatus> {
        let mut state = self.inner.lock().await;

        let thread = state.threads.get_mut(&thread_id).ok_or_else(|| {
            AppError::internal(format!("thread {} vanished during metadata update", thread_id))
        })?;

        thread.last_message_id = Some(message_id);
        thread.last_activity = thread.last_activity.max(at);
        if thread.status != ThreadStatus::Closed || reopen_closed {
            thread.status = ThreadStatus::Replied;
        }

        Ok(thread.status)
    }

    async fn mark_read(
        &self,
        thread_id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.inner.lock().await;

        let mut transitioned = 0;
        if let Some(messages) = state.messages.get_mut(&thread_id) {
            for message in messages
                .iter_mut()
                .filter(|m| m.recipient_id == reader && !m.is_read)
            {
                message.is_read = true;
                message.read_at = Some(at);
                transitioned += 1;
            }
        }

        Ok(transitioned)
    }

    async fn set_status(
        &self,
        thread_id: Uuid,
        status: ThreadStatus,
    ) -> AppResult<Option<Thread>> {
        let mut state = self.inner.lock().await;

        Ok(state.threads.get_mut(&thread_id).map(|thread| {
            thread.status = status;
            thread.clone()
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
