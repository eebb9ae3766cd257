use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MessagingConfig;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::model::{CanonicalKey, NewThread, ProjectRef, Thread};
use crate::store::ThreadStore;

/// Finds or atomically creates the canonical thread for a participant pair
/// and optional project.
///
/// Creation goes through the store's insert-if-absent primitive, so two
/// racing callers can never mint duplicate threads; the loser of the race
/// re-reads the key once and adopts the winner's thread.
pub struct ThreadResolver {
    store: Arc<dyn ThreadStore>,
    default_subject: String,
}

impl ThreadResolver {
    pub fn new(store: Arc<dyn ThreadStore>, messaging: &MessagingConfig) -> Self {
        Self {
            store,
            default_subject: messaging.default_subject.clone(),
        }
    }

    fn subject_for(&self, project: Option<&ProjectRef>) -> String {
        match project {
            Some(p) => format!("Project: {}", p.title),
            None => self.default_subject.clone(),
        }
    }

    pub async fn find_or_create(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        project: Option<&ProjectRef>,
    ) -> AppResult<Thread> {
        if user_a == user_b {
            return Err(AppError::validation(
                "a thread needs two distinct participants",
            ));
        }

        let key = CanonicalKey::new(user_a, user_b, project.map(|p| p.id));

        if let Some(existing) = self.store.thread_by_key(&key).await? {
            return Ok(existing);
        }

        let new = NewThread {
            id: Uuid::new_v4(),
            key,
            subject: self.subject_for(project),
            now: Utc::now(),
        };

        if let Some(created) = self.store.insert_thread_if_absent(new).await? {
            metrics::THREADS_CREATED_TOTAL.inc();
            tracing::info!(
                thread_id = %created.id,
                project_id = ?created.project_id,
                "Thread created"
            );
            return Ok(created);
        }

        // Lost the creation race; the winner's row is visible now.
        tracing::debug!(
            participant_lo = %key.lo,
            participant_hi = %key.hi,
            "Concurrent thread creation collapsed to existing thread"
        );
        self.store.thread_by_key(&key).await?.ok_or_else(|| {
            AppError::internal("thread creation race could not be resolved")
        })
    }
}
