use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::bus::RealtimeBus;
use crate::config::{MAX_MESSAGE_ATTACHMENTS, MAX_MESSAGE_CONTENT_CHARS, MessagingConfig};
use crate::error::{AppError, AppResult};
use crate::events::{RealtimeEvent, Room};
use crate::metrics;
use crate::model::{Message, NewMessage, ProjectRef, Thread, ThreadStatus};
use crate::resolver::ThreadResolver;
use crate::store::ThreadStore;

/// Validates and appends messages, maintains thread metadata and requests
/// realtime delivery.
///
/// Persistence always completes before any emit; a failed write
/// short-circuits and no event leaves the bus. Fan-out failures never
/// surface to the caller of the originating write.
pub struct MessageDispatcher {
    store: Arc<dyn ThreadStore>,
    bus: Arc<RealtimeBus>,
    resolver: ThreadResolver,
    reopen_closed_on_message: bool,
}

impl MessageDispatcher {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        bus: Arc<RealtimeBus>,
        messaging: &MessagingConfig,
    ) -> Self {
        Self {
            resolver: ThreadResolver::new(store.clone(), messaging),
            store,
            bus,
            reopen_closed_on_message: messaging.reopen_closed_on_message,
        }
    }

    pub fn resolver(&self) -> &ThreadResolver {
        &self.resolver
    }

    /// Load a thread on behalf of `caller`. A missing thread and a thread
    /// the caller does not participate in yield the identical error.
    pub async fn thread_for_participant(
        &self,
        thread_id: Uuid,
        caller: Uuid,
    ) -> AppResult<Thread> {
        match self.store.thread_by_id(thread_id).await? {
            Some(thread) if thread.is_participant(caller) => Ok(thread),
            _ => Err(AppError::thread_not_found()),
        }
    }

    /// Load the caller's thread for a project, same error policy as above.
    pub async fn thread_for_project(&self, project_id: Uuid, caller: Uuid) -> AppResult<Thread> {
        self.store
            .thread_for_project(caller, project_id)
            .await?
            .ok_or_else(AppError::thread_not_found)
    }

    pub async fn threads_for_user(&self, caller: Uuid) -> AppResult<Vec<Thread>> {
        self.store.threads_for_user(caller).await
    }

    pub async fn messages_for_thread(&self, thread: &Thread) -> AppResult<Vec<Message>> {
        self.store.messages_for_thread(thread.id).await
    }

    fn validate_content(content: &str, attachments: &[String]) -> AppResult<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("message content must not be empty"));
        }
        if trimmed.chars().count() > MAX_MESSAGE_CONTENT_CHARS {
            return Err(AppError::validation(format!(
                "message content exceeds {} characters",
                MAX_MESSAGE_CONTENT_CHARS
            )));
        }
        if attachments.len() > MAX_MESSAGE_ATTACHMENTS {
            return Err(AppError::validation(format!(
                "a message carries at most {} attachments",
                MAX_MESSAGE_ATTACHMENTS
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Append a message to an existing thread.
    ///
    /// The thread metadata update is a single atomic store operation, so
    /// concurrent posts against one thread serialize without lost updates.
    /// A message into a closed thread is stored but leaves the status
    /// untouched unless the reopen policy is on.
    pub async fn post_message(
        &self,
        thread_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachments: Vec<String>,
    ) -> AppResult<Message> {
        let content = Self::validate_content(content, &attachments)?;
        let thread = self.thread_for_participant(thread_id, sender_id).await?;
        let recipient_id = thread.other_participant(sender_id);

        let now = Utc::now();
        let message = self
            .store
            .append_message(NewMessage {
                id: Uuid::new_v4(),
                thread_id,
                sender_id,
                recipient_id,
                content,
                attachments,
                created_at: now,
            })
            .await?;

        let status = self
            .store
            .record_message_activity(thread_id, message.id, now, self.reopen_closed_on_message)
            .await?;

        metrics::MESSAGES_POSTED_TOTAL.inc();
        tracing::info!(
            thread_id = %thread_id,
            message_id = %message.id,
            status = ?status,
            "Message persisted"
        );

        self.fan_out_message(&thread, &message).await;

        Ok(message)
    }

    /// Delivery is a side effect of the completed write: best-effort,
    /// fire-and-forget, never reported back to the sender.
    async fn fan_out_message(&self, thread: &Thread, message: &Message) {
        self.bus
            .emit(
                Room::Thread(thread.id),
                RealtimeEvent::MessageReceived {
                    thread_id: thread.id,
                    message: message.clone(),
                },
            )
            .await;

        self.bus
            .emit(
                Room::User(message.recipient_id),
                RealtimeEvent::Notification {
                    thread_id: thread.id,
                    message_id: message.id,
                    sender_id: message.sender_id,
                    subject: thread.subject.clone(),
                },
            )
            .await;

        if let Some(project_id) = thread.project_id {
            self.bus
                .emit(
                    Room::Project(project_id),
                    RealtimeEvent::ProjectMessage {
                        project_id,
                        thread_id: thread.id,
                        message: message.clone(),
                    },
                )
                .await;
        }
    }

    /// Entry point for clients without a thread reference: resolve (or
    /// create) the canonical thread, then append. A pre-existing thread
    /// absorbs the message instead of producing a duplicate.
    pub async fn create_thread_and_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        project: Option<&ProjectRef>,
        content: &str,
        attachments: Vec<String>,
    ) -> AppResult<(Thread, Message)> {
        // Validate before touching the store so an empty message never
        // creates a thread as a side effect.
        Self::validate_content(content, &attachments)?;

        let thread = self
            .resolver
            .find_or_create(sender_id, recipient_id, project)
            .await?;
        let message = self
            .post_message(thread.id, sender_id, content, attachments)
            .await?;

        // Re-read so the caller sees the post-message metadata.
        let thread = self
            .store
            .thread_by_id(thread.id)
            .await?
            .unwrap_or(thread);

        Ok((thread, message))
    }

    /// Mark every unread message addressed to `reader` as read. Idempotent:
    /// a second call transitions nothing.
    pub async fn mark_thread_read(&self, thread_id: Uuid, reader_id: Uuid) -> AppResult<u64> {
        self.thread_for_participant(thread_id, reader_id).await?;

        let transitioned = self.store.mark_read(thread_id, reader_id, Utc::now()).await?;
        if transitioned > 0 {
            tracing::debug!(
                thread_id = %thread_id,
                transitioned = transitioned,
                "Messages marked read"
            );
        }

        Ok(transitioned)
    }

    /// Explicit status update. Closure and reopen are admin actions; the
    /// caller must also be a participant of the thread.
    pub async fn update_status(
        &self,
        thread_id: Uuid,
        caller: Principal,
        status: ThreadStatus,
    ) -> AppResult<Thread> {
        self.thread_for_participant(thread_id, caller.id).await?;

        if caller.role != Role::Admin {
            return Err(AppError::auth("thread status updates are an admin action"));
        }

        let thread = self
            .store
            .set_status(thread_id, status)
            .await?
            .ok_or_else(AppError::thread_not_found)?;

        tracing::info!(thread_id = %thread_id, status = ?status, "Thread status updated");
        Ok(thread)
    }
}
