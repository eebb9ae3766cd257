// ============================================================================
// Thread Routes
// ============================================================================
//
// Endpoints:
// - GET   /api/threads                     - list the caller's threads
// - POST  /api/threads                     - create (or resolve) a thread with its first message
// - GET   /api/threads/:thread_id          - thread + ordered messages, marks them read
// - POST  /api/threads/:thread_id/messages - post a message
// - PATCH /api/threads/:thread_id/status   - admin status update (close/reopen)
// - GET   /api/projects/:project_id/thread - the caller's thread for a project
//
// Every endpoint enforces participant membership; non-participants and
// unknown ids receive the same 404.
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;
use crate::model::{Message, ProjectRef, Thread, ThreadStatus};
use crate::routes::extractors::AuthenticatedUser;
use crate::utils::log_safe_id;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub recipient_id: Uuid,
    pub project: Option<ProjectRef>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ThreadStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadWithMessage {
    pub thread: Thread,
    pub message: Message,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub thread: Thread,
    pub messages: Vec<Message>,
}

/// GET /api/threads
pub async fn list_threads(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Thread>>, AppError> {
    let threads = ctx.dispatcher.threads_for_user(user.0.id).await?;
    Ok(Json(threads))
}

/// POST /api/threads
///
/// The entry point for clients without a thread reference. Resolving an
/// existing thread is not an error: the message lands in it.
pub async fn create_thread(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = user.0.id;

    let (thread, message) = ctx
        .dispatcher
        .create_thread_and_message(
            caller,
            req.recipient_id,
            req.project.as_ref(),
            &req.content,
            req.attachments,
        )
        .await?;

    let salt = &ctx.config.logging.hash_salt;
    tracing::info!(
        thread_id = %thread.id,
        sender_hash = %log_safe_id(&caller.to_string(), salt),
        "Thread message accepted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ThreadWithMessage { thread, message }),
    ))
}

/// GET /api/threads/:thread_id
///
/// Fetching a thread is how a reader catches up after being offline, so it
/// also flips the reader's unread messages to read.
pub async fn get_thread(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<ThreadView>, AppError> {
    let caller = user.0.id;
    let thread = ctx.dispatcher.thread_for_participant(thread_id, caller).await?;

    ctx.dispatcher.mark_thread_read(thread_id, caller).await?;
    let messages = ctx.dispatcher.messages_for_thread(&thread).await?;

    Ok(Json(ThreadView { thread, messages }))
}

/// GET /api/projects/:project_id/thread
pub async fn get_project_thread(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ThreadView>, AppError> {
    let caller = user.0.id;
    let thread = ctx.dispatcher.thread_for_project(project_id, caller).await?;

    ctx.dispatcher.mark_thread_read(thread.id, caller).await?;
    let messages = ctx.dispatcher.messages_for_thread(&thread).await?;

    Ok(Json(ThreadView { thread, messages }))
}

/// POST /api/threads/:thread_id/messages
pub async fn post_message(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = ctx
        .dispatcher
        .post_message(thread_id, user.0.id, &req.content, req.attachments)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /api/threads/:thread_id/status
pub async fn update_status(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Thread>, AppError> {
    let thread = ctx
        .dispatcher
        .update_status(thread_id, user.0, req.status)
        .await?;

    Ok(Json(thread))
}
