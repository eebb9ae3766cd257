use tokio::sync::mpsc;
use uuid::Uuid;

use atrium_server::events::{ProjectSummary, ProjectUpdate, RealtimeEvent, Room};
use atrium_server::model::ProjectRef;

use test_utils::spawn_app;

#[tokio::test]
async fn message_fan_out_hits_each_room_exactly_once() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "hello", vec![])
        .await
        .unwrap();

    // An observer watching the thread room and the recipient's own
    // connection.
    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    let observer_conn = Uuid::new_v4();
    app.bus
        .register(observer_conn, Uuid::new_v4(), observer_tx)
        .await;
    assert!(app.bus.join(observer_conn, Room::Thread(thread.id)).await);

    let (staff_tx, mut staff_rx) = mpsc::unbounded_channel();
    app.bus.register(Uuid::new_v4(), staff, staff_tx).await;

    let message = app
        .dispatcher
        .post_message(thread.id, client, "are you there?", vec![])
        .await
        .unwrap();

    // Exactly one message-received on the thread room...
    match observer_rx.try_recv().unwrap() {
        RealtimeEvent::MessageReceived {
            thread_id,
            message: delivered,
        } => {
            assert_eq!(thread_id, thread.id);
            assert_eq!(delivered.id, message.id);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(observer_rx.try_recv().is_err(), "no duplicate delivery");

    // ...and exactly one notification on the recipient's user room.
    match staff_rx.try_recv().unwrap() {
        RealtimeEvent::Notification {
            thread_id,
            message_id,
            sender_id,
            ..
        } => {
            assert_eq!(thread_id, thread.id);
            assert_eq!(message_id, message.id);
            assert_eq!(sender_id, client);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(staff_rx.try_recv().is_err(), "no duplicate delivery");
}

#[tokio::test]
async fn project_threads_also_reach_the_project_room() {
    let app = spawn_app();
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());
    let project = ProjectRef {
        id: Uuid::new_v4(),
        title: "Launch".to_string(),
    };

    let (thread, _) = app
        .dispatcher
        .create_thread_and_message(client, staff, Some(&project), "kickoff", vec![])
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Uuid::new_v4();
    app.bus.register(conn, Uuid::new_v4(), tx).await;
    app.bus.join(conn, Room::Project(project.id)).await;

    app.dispatcher
        .post_message(thread.id, staff, "update attached", vec!["file-1".into()])
        .await
        .unwrap();

    match rx.try_recv().unwrap() {
        RealtimeEvent::ProjectMessage {
            project_id,
            thread_id,
            message,
        } => {
            assert_eq!(project_id, project.id);
            assert_eq!(thread_id, thread.id);
            assert_eq!(message.attachments, vec!["file-1".to_string()]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn delivery_stops_after_leave_and_disconnect() {
    let app = spawn_app();
    let room = Room::Thread(Uuid::new_v4());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Uuid::new_v4();
    let user = Uuid::new_v4();
    app.bus.register(conn, user, tx).await;
    app.bus.join(conn, room).await;

    let event = RealtimeEvent::ProjectProgressUpdated {
        project_id: Uuid::new_v4(),
        progress: 10,
    };

    assert_eq!(app.bus.emit(room, event.clone()).await, 1);
    assert!(rx.try_recv().is_ok());

    app.bus.leave(conn, room).await;
    assert_eq!(app.bus.emit(room, event.clone()).await, 0);
    assert!(rx.try_recv().is_err());

    // Still in its own user room until the socket goes away.
    assert_eq!(app.bus.room_size(Room::User(user)).await, 1);
    app.bus.disconnect(conn).await;
    assert_eq!(app.bus.room_size(Room::User(user)).await, 0);
    assert_eq!(app.bus.emit(Room::User(user), event).await, 0);
}

#[tokio::test]
async fn emit_to_an_empty_room_delivers_nothing() {
    let app = spawn_app();
    let delivered = app
        .bus
        .emit(
            Room::Project(Uuid::new_v4()),
            RealtimeEvent::ProjectProgressUpdated {
                project_id: Uuid::new_v4(),
                progress: 0,
            },
        )
        .await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn join_requires_a_registered_connection() {
    let app = spawn_app();
    // A connection that never completed the handshake has no sender and
    // cannot claim rooms.
    assert!(!app.bus.join(Uuid::new_v4(), Room::AdminBroadcast).await);
}

#[tokio::test]
async fn project_lifecycle_events_reach_client_and_project_rooms() {
    let app = spawn_app();
    let client = Uuid::new_v4();
    let project_id = Uuid::new_v4();

    let (client_tx, mut client_rx) = mpsc::unbounded_channel();
    app.bus.register(Uuid::new_v4(), client, client_tx).await;

    let (watcher_tx, mut watcher_rx) = mpsc::unbounded_channel();
    let watcher_conn = Uuid::new_v4();
    app.bus
        .register(watcher_conn, Uuid::new_v4(), watcher_tx)
        .await;
    app.bus.join(watcher_conn, Room::Project(project_id)).await;

    app.project_events
        .project_created(ProjectSummary {
            id: project_id,
            client_id: client,
            title: "New build".to_string(),
            progress: 0,
        })
        .await;

    assert!(matches!(
        client_rx.try_recv().unwrap(),
        RealtimeEvent::ProjectCreated { .. }
    ));
    assert!(matches!(
        watcher_rx.try_recv().unwrap(),
        RealtimeEvent::ProjectCreated { .. }
    ));

    app.project_events
        .progress_updated(client, project_id, 55)
        .await;
    match watcher_rx.try_recv().unwrap() {
        RealtimeEvent::ProjectProgressUpdated {
            project_id: p,
            progress,
        } => {
            assert_eq!(p, project_id);
            assert_eq!(progress, 55);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn admin_authored_updates_reach_the_admin_broadcast_room() {
    let app = spawn_app();
    let client = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let project_id = Uuid::new_v4();

    let (admin_tx, mut admin_rx) = mpsc::unbounded_channel();
    let admin_conn = Uuid::new_v4();
    app.bus.register(admin_conn, admin, admin_tx).await;
    app.bus.join(admin_conn, Room::AdminBroadcast).await;

    let update = ProjectUpdate {
        id: Uuid::new_v4(),
        project_id,
        author_id: admin,
        body: "Milestone reached".to_string(),
    };
    app.project_events
        .update_added(client, update.clone(), true)
        .await;

    assert!(matches!(
        admin_rx.try_recv().unwrap(),
        RealtimeEvent::AdminProjectUpdate { .. }
    ));
    assert!(admin_rx.try_recv().is_err());

    // Client-authored updates stay off the admin broadcast room.
    let client_update = ProjectUpdate {
        id: Uuid::new_v4(),
        project_id,
        author_id: client,
        body: "Question about scope".to_string(),
    };
    app.project_events
        .update_added(client, client_update, false)
        .await;
    assert!(admin_rx.try_recv().is_err());
}
