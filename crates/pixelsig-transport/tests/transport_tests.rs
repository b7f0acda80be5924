//! Transport integration tests
//!
//! Real loopback sockets: upgrade dispatch, frame ordering, keepalive,
//! idle eviction, and the close handshake.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pixelsig_core::Role;
use pixelsig_transport::{ListenerConfig, PathMap, RoleDispatch, SocketEvent, WsListener};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

fn test_config(dispatch: RoleDispatch) -> ListenerConfig {
    ListenerConfig {
        dispatch,
        max_frame_size: 65536,
        ping_interval: Duration::from_secs(30),
        connection_timeout: Duration::from_secs(60),
    }
}

async fn bind_listener(config: ListenerConfig) -> (WsListener, u16) {
    let listener = WsListener::bind("127.0.0.1:0", config).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn path_dispatch_assigns_roles() {
    let config = test_config(RoleDispatch::ByPath(PathMap::default()));
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        let mut roles = Vec::new();
        for _ in 0..4 {
            let (_handle, _receiver, role, _addr) = listener.accept().await.unwrap();
            roles.push(role);
        }
        roles
    });

    let mut clients = Vec::new();
    for path in ["/streamer", "/player", "/sfu", "/unreal"] {
        let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}{path}"))
            .await
            .unwrap();
        clients.push(stream);
    }

    let roles = server.await.unwrap();
    assert_eq!(
        roles,
        vec![Role::Streamer, Role::Player, Role::Sfu, Role::Player]
    );
}

#[tokio::test]
async fn unknown_path_is_refused() {
    let config = test_config(RoleDispatch::ByPath(PathMap::default()));
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        // The refused upgrade surfaces as an accept error, and the listener
        // keeps going.
        let first = listener.accept().await;
        assert!(first.is_err());
        let (_handle, _receiver, role, _addr) = listener.accept().await.unwrap();
        role
    });

    let err = connect_async(format!("ws://127.0.0.1:{port}/nope"))
        .await
        .expect_err("upgrade should fail");
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 404)
        }
        other => panic!("expected HTTP 404, got {other:?}"),
    }

    let (_stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    assert_eq!(server.await.unwrap(), Role::Player);
}

#[tokio::test]
async fn fixed_dispatch_ignores_the_path() {
    let config = test_config(RoleDispatch::Fixed(Role::Sfu));
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        let (_handle, _receiver, role, _addr) = listener.accept().await.unwrap();
        role
    });

    let (_stream, _) = connect_async(format!("ws://127.0.0.1:{port}/whatever"))
        .await
        .unwrap();
    assert_eq!(server.await.unwrap(), Role::Sfu);
}

#[tokio::test]
async fn frames_keep_their_order() {
    let config = test_config(RoleDispatch::ByPath(PathMap::default()));
    let (listener, port) = bind_listener(config).await;

    // Echo server: every inbound frame goes straight back out.
    tokio::spawn(async move {
        let (handle, mut receiver, _role, _addr) = listener.accept().await.unwrap();
        while let Some(event) = receiver.recv().await {
            match event {
                SocketEvent::Frame(text) => {
                    handle.send(text, false);
                }
                SocketEvent::Closed { .. } => break,
            }
        }
    });

    let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    let (mut write, mut read) = stream.split();

    for i in 0..20 {
        write
            .send(WsMessage::Text(format!("frame-{i}")))
            .await
            .unwrap();
    }

    for i in 0..20 {
        let echoed = timeout(Duration::from_secs(2), async {
            loop {
                match read.next().await {
                    Some(Ok(WsMessage::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected {other:?}"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(echoed, format!("frame-{i}"));
    }
}

#[tokio::test]
async fn binary_frames_are_discarded() {
    let config = test_config(RoleDispatch::ByPath(PathMap::default()));
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        let (_handle, mut receiver, _role, _addr) = listener.accept().await.unwrap();
        match receiver.recv().await {
            Some(SocketEvent::Frame(text)) => text,
            other => panic!("expected text frame, got {other:?}"),
        }
    });

    let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    let (mut write, _read) = stream.split();
    write
        .send(WsMessage::Binary(vec![0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap();
    write
        .send(WsMessage::Text("after-binary".to_string()))
        .await
        .unwrap();

    // The binary frame never surfaces; the next text frame does.
    assert_eq!(server.await.unwrap(), "after-binary");
}

#[tokio::test]
async fn keepalive_ping_when_writer_is_idle() {
    let mut config = test_config(RoleDispatch::ByPath(PathMap::default()));
    config.ping_interval = Duration::from_secs(1);
    let (listener, port) = bind_listener(config).await;

    let _server = tokio::spawn(async move {
        let (handle, mut receiver, _role, _addr) = listener.accept().await.unwrap();
        while receiver.recv().await.is_some() {}
        drop(handle);
    });

    let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    let (_write, mut read) = stream.split();

    let got_ping = timeout(Duration::from_millis(1500), async {
        loop {
            match read.next().await {
                Some(Ok(WsMessage::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(got_ping, "expected a keepalive ping within 1.5s");
}

#[tokio::test]
async fn idle_reader_is_closed_with_a_reason() {
    let mut config = test_config(RoleDispatch::ByPath(PathMap::default()));
    config.connection_timeout = Duration::from_secs(1);
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        let (_handle, mut receiver, _role, _addr) = listener.accept().await.unwrap();
        timeout(Duration::from_secs(3), async {
            loop {
                match receiver.recv().await {
                    Some(SocketEvent::Closed { reason }) => return reason,
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .expect("closed event should arrive")
    });

    // Connect and go silent without polling, so nothing resets the deadline.
    let (_stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();

    let reason = server.await.unwrap();
    assert_eq!(reason.as_deref(), Some("idle timeout"));
}

#[tokio::test]
async fn close_drains_queued_frames_then_closes_cleanly() {
    let config = test_config(RoleDispatch::ByPath(PathMap::default()));
    let (listener, port) = bind_listener(config).await;

    tokio::spawn(async move {
        let (handle, _receiver, _role, _addr) = listener.accept().await.unwrap();
        handle.send("goodbye".to_string(), false);
        handle.close();
        handle.close(); // idempotent
    });

    let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    let (_write, mut read) = stream.split();

    let mut saw_goodbye = false;
    let closed = timeout(Duration::from_secs(2), async {
        loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    assert_eq!(text, "goodbye");
                    saw_goodbye = true;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    // Graceful close, code 1000.
                    return frame.map(|f| u16::from(f.code));
                }
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("close should arrive");

    assert!(saw_goodbye, "queued frame must drain before the close");
    assert_eq!(closed, Some(1000));
}

#[tokio::test]
async fn oversize_inbound_frame_closes_the_connection() {
    let mut config = test_config(RoleDispatch::ByPath(PathMap::default()));
    config.max_frame_size = 1024;
    let (listener, port) = bind_listener(config).await;

    let server = tokio::spawn(async move {
        let (_handle, mut receiver, _role, _addr) = listener.accept().await.unwrap();
        timeout(Duration::from_secs(2), async {
            loop {
                match receiver.recv().await {
                    Some(SocketEvent::Closed { .. }) | None => return true,
                    Some(SocketEvent::Frame(_)) => return false,
                }
            }
        })
        .await
        .unwrap_or(false)
    });

    let (stream, _) = connect_async(format!("ws://127.0.0.1:{port}/player"))
        .await
        .unwrap();
    let (mut write, _read) = stream.split();
    let _ = write.send(WsMessage::Text("x".repeat(4096))).await;

    assert!(server.await.unwrap(), "oversize frame should close, not deliver");
}
