use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

use atrium_server::auth::Role;
use atrium_server::context::AppContext;
use atrium_server::run_websocket_server;

use test_utils::{spawn_app, token_for};

type ClientSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_ws_server(ctx: AppContext) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_websocket_server(ctx, listener));
    format!("ws://{}", addr)
}

async fn next_json(socket: &mut ClientSocket) -> Value {
    loop {
        let msg = socket
            .next()
            .await
            .expect("connection closed unexpectedly")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).expect("server sent invalid JSON");
        }
    }
}

async fn send_json(socket: &mut ClientSocket, value: Value) {
    socket
        .send(WsMessage::Text(value.to_string()))
        .await
        .expect("failed to send frame");
}

#[tokio::test]
async fn handshake_is_required_before_any_room_join() {
    let app = spawn_app();
    let url = spawn_ws_server(app).await;

    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    send_json(
        &mut socket,
        json!({"type": "join-thread", "threadId": Uuid::new_v4()}),
    )
    .await;

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "HANDSHAKE_REQUIRED");

    // The server closes the connection; nothing else arrives.
    assert!(socket.next().await.map_or(true, |m| m
        .map(|m| matches!(m, WsMessage::Close(_)))
        .unwrap_or(true)));
}

#[tokio::test]
async fn invalid_tokens_are_rejected_at_handshake() {
    let app = spawn_app();
    let url = spawn_ws_server(app).await;

    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    send_json(
        &mut socket,
        json!({"type": "connect", "token": "not-a-real-token"}),
    )
    .await;

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "HANDSHAKE_REJECTED");
}

#[tokio::test]
async fn an_authenticated_connection_receives_its_events() {
    let app = spawn_app();
    let url = spawn_ws_server(app.clone()).await;
    let (client, staff) = (Uuid::new_v4(), Uuid::new_v4());

    // Staff connects; the user room join is automatic.
    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();
    let token = token_for(&app, &staff, Role::Admin);
    send_json(&mut socket, json!({"type": "connect", "token": token})).await;

    let connected = next_json(&mut socket).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["userId"], staff.to_string());

    // A message addressed to staff arrives as a notification.
    let (thread, first) = app
        .dispatcher
        .create_thread_and_message(client, staff, None, "anyone home?", vec![])
        .await
        .unwrap();

    let notification = next_json(&mut socket).await;
    assert_eq!(notification["event"], "notification");
    assert_eq!(notification["data"]["messageId"], first.id.to_string());
    assert_eq!(notification["data"]["senderId"], client.to_string());

    // After joining the thread room, the full message event arrives too.
    send_json(
        &mut socket,
        json!({"type": "join-thread", "threadId": thread.id}),
    )
    .await;
    let joined = next_json(&mut socket).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["room"], format!("thread:{}", thread.id));

    let second = app
        .dispatcher
        .post_message(thread.id, client, "hello again", vec![])
        .await
        .unwrap();

    let message_event = next_json(&mut socket).await;
    assert_eq!(message_event["event"], "message-received");
    assert_eq!(message_event["data"]["message"]["id"], second.id.to_string());

    let notification = next_json(&mut socket).await;
    assert_eq!(notification["event"], "notification");
    assert_eq!(notification["data"]["messageId"], second.id.to_string());
}
