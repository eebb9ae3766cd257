use uuid::Uuid;

use atrium_server::auth::{Principal, Role};
use atrium_server::config::MessagingConfig;
use atrium_server::model::{ProjectRef, ThreadStatus};
use atrium_server::store::ThreadStore as _;

use test_utils::{spawn_app, spawn_app_with};

fn admin(id: Uuid) -> Principal {
    Principal {
        id,
        role: Role::Admin,
    }
}

#[tokio::test]
async fn posting_computes_recipient_and_advances_status() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, message) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "Hello!", vec![])
        .await
        .unwrap();

    assert_eq!(message.sender_id, client);
    assert_eq!(message.recipient_id, staff);
    assert!(!message.is_read);
    assert_eq!(thread.status, ThreadStatus::Replied);
    assert_eq!(thread.last_message_id, Some(message.id));
}

#[tokio::test]
async fn message_order_is_non_decreasing() {
    let app = spawn_app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(a, b, None, "first", vec![])
        .await
        .unwrap();
    for i in 0..5 {
        let sender = if i % 2 == 0 { b } else { a };
        app.dispatcher
            .post_message(thread.id, sender, &format!("reply {}", i), vec![])
            .await
            .unwrap();
    }

    let messages = app.dispatcher.messages_for_thread(&thread).await.unwrap();
    assert_eq!(messages.len(), 6);
    for pair in messages.windows(2) {
        assert!(
            (pair[0].created_at, pair[0].seq) <= (pair[1].created_at, pair[1].seq),
            "messages must be ordered by creation time, ties by sequence"
        );
    }
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_persistence() {
    let app = spawn_app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let err = app
        .dispatcher
        .create_thread_and_message(a, b, None, "   \n ", vec![])
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    // The rejected message must not have created a thread as a side effect.
    assert!(app.store.threads_for_user(a).await.unwrap().is_empty());
}

#[tokio::test]
async fn content_is_trimmed_on_persist() {
    let app = spawn_app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let (_, message) = app
        .dispatcher
        .create_thread_and_message(a, b, None, "  hello  ", vec![])
        .await
        .unwrap();

    assert_eq!(message.content, "hello");
}

#[tokio::test]
async fn closed_thread_stores_messages_without_reopening() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "opening note", vec![])
        .await
        .unwrap();
    app.dispatcher
        .update_status(thread.id, admin(staff), ThreadStatus::Closed)
        .await
        .unwrap();

    let stored = app
        .dispatcher
        .post_message(thread.id, client, "are you still there?", vec![])
        .await
        .unwrap();

    let thread = app
        .dispatcher
        .thread_for_participant(thread.id, client)
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Closed);
    assert_eq!(thread.last_message_id, Some(stored.id));

    let messages = app.dispatcher.messages_for_thread(&thread).await.unwrap();
    assert!(messages.iter().any(|m| m.id == stored.id));
}

#[tokio::test]
async fn reopen_policy_moves_closed_threads_back_to_replied() {
    let app = spawn_app_with(MessagingConfig {
        reopen_closed_on_message: true,
        ..MessagingConfig::default()
    });
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "opening note", vec![])
        .await
        .unwrap();
    app.dispatcher
        .update_status(thread.id, admin(staff), ThreadStatus::Closed)
        .await
        .unwrap();

    app.dispatcher
        .post_message(thread.id, client, "knock knock", vec![])
        .await
        .unwrap();

    let thread = app
        .dispatcher
        .thread_for_participant(thread.id, client)
        .await
        .unwrap();
    assert_eq!(thread.status, ThreadStatus::Replied);
}

#[tokio::test]
async fn explicit_reopen_is_an_admin_action() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "hi", vec![])
        .await
        .unwrap();
    app.dispatcher
        .update_status(thread.id, admin(staff), ThreadStatus::Closed)
        .await
        .unwrap();

    let err = app
        .dispatcher
        .update_status(
            thread.id,
            Principal {
                id: client,
                role: Role::Client,
            },
            ThreadStatus::Open,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "AUTH_ERROR");

    let reopened = app
        .dispatcher
        .update_status(thread.id, admin(staff), ThreadStatus::Open)
        .await
        .unwrap();
    assert_eq!(reopened.status, ThreadStatus::Open);
}

#[tokio::test]
async fn mark_thread_read_is_idempotent() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "one", vec![])
        .await
        .unwrap();
    app.dispatcher
        .post_message(thread.id, client, "two", vec![])
        .await
        .unwrap();

    let first = app
        .dispatcher
        .mark_thread_read(thread.id, staff)
        .await
        .unwrap();
    assert_eq!(first, 2);

    let after_first: Vec<_> = app
        .dispatcher
        .messages_for_thread(&thread)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.recipient_id == staff)
        .collect();
    assert!(after_first.iter().all(|m| m.is_read && m.read_at.is_some()));

    let second = app
        .dispatcher
        .mark_thread_read(thread.id, staff)
        .await
        .unwrap();
    assert_eq!(second, 0, "a second pass must transition nothing");

    let after_second: Vec<_> = app
        .dispatcher
        .messages_for_thread(&thread)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.recipient_id == staff)
        .collect();
    // read_at was set exactly once, at the first transition.
    for (a, b) in after_first.iter().zip(after_second.iter()) {
        assert_eq!(a.read_at, b.read_at);
    }
}

#[tokio::test]
async fn non_participants_see_the_same_not_found_as_missing_threads() {
    let app = spawn_app();
    let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(a, b, None, "private", vec![])
        .await
        .unwrap();

    let as_outsider = app
        .dispatcher
        .thread_for_participant(thread.id, outsider)
        .await
        .unwrap_err();
    let missing = app
        .dispatcher
        .thread_for_participant(Uuid::new_v4(), a)
        .await
        .unwrap_err();

    assert_eq!(as_outsider.error_code(), "NOT_FOUND");
    assert_eq!(as_outsider.error_code(), missing.error_code());
    assert_eq!(as_outsider.user_message(), missing.user_message());
    assert_eq!(as_outsider.status_code(), missing.status_code());

    let post = app
        .dispatcher
        .post_message(thread.id, outsider, "let me in", vec![])
        .await
        .unwrap_err();
    assert_eq!(post.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn concurrent_first_contact_lands_both_messages_in_one_thread() {
    let app = spawn_app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let project = ProjectRef {
        id: Uuid::new_v4(),
        title: "Shared project".to_string(),
    };

    let d1 = app.dispatcher.clone();
    let d2 = app.dispatcher.clone();
    let (p1, p2) = (project.clone(), project.clone());

    let (r1, r2) = tokio::join!(
        tokio::spawn(async move {
            d1.create_thread_and_message(a, b, Some(&p1), "from a", vec![])
                .await
        }),
        tokio::spawn(async move {
            d2.create_thread_and_message(b, a, Some(&p2), "from b", vec![])
                .await
        }),
    );
    let (t1, m1) = r1.unwrap().unwrap();
    let (t2, m2) = r2.unwrap().unwrap();

    assert_eq!(t1.id, t2.id, "exactly one thread may be created");
    assert_ne!(m1.id, m2.id);

    let messages = app.dispatcher.messages_for_thread(&t1).await.unwrap();
    assert_eq!(messages.len(), 2);

    let threads = app.store.threads_for_user(a).await.unwrap();
    assert_eq!(threads.len(), 1);
}

#[tokio::test]
async fn last_activity_never_moves_backwards() {
    let app = spawn_app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(a, b, None, "start", vec![])
        .await
        .unwrap();
    let before = app
        .dispatcher
        .thread_for_participant(thread.id, a)
        .await
        .unwrap()
        .last_activity;

    app.dispatcher
        .post_message(thread.id, b, "later", vec![])
        .await
        .unwrap();
    let after = app
        .dispatcher
        .thread_for_participant(thread.id, a)
        .await
        .unwrap()
        .last_activity;

    assert!(after >= before);
}
