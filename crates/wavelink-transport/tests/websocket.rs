//! Integration tests for the WebSocket client transport.
//!
//! These tests spin up a real in-process WebSocket server and verify that
//! frames actually flow over the network correctly: text and binary in
//! both directions, clean close detection, handshake headers, and the
//! connect timeout.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use wavelink_transport::{
        Connection, Frame, Transport, TransportError, WebSocketTransport,
    };

    /// Helper: binds a listener on an OS-assigned port and returns it
    /// with the `ws://` URL clients should connect to.
    async fn bind_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have local addr");
        (listener, format!("ws://{addr}"))
    }

    #[tokio::test]
    async fn test_connect_and_exchange_frames() {
        let (listener, url) = bind_server().await;

        // Server: accept one connection, read a text frame, answer with
        // a binary frame.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws accept");

            let msg = ws.next().await.expect("frame").expect("ok");
            assert_eq!(msg, Message::Text("hello server".into()));

            ws.send(Message::Binary(vec![1, 2, 3].into()))
                .await
                .expect("server send");
        });

        let conn = WebSocketTransport::new()
            .connect(&url)
            .await
            .expect("should connect");
        assert!(conn.id().into_inner() > 0);

        conn.send(Frame::Text("hello server".into()))
            .await
            .expect("client send");

        let frame = conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have a frame");
        assert_eq!(frame, Frame::Binary(vec![1, 2, 3]));

        server.await.expect("server task");
        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_server_close() {
        let (listener, url) = bind_server().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws accept");
            ws.send(Message::Close(None)).await.expect("server close");
        });

        let conn = WebSocketTransport::new()
            .connect(&url)
            .await
            .expect("should connect");

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_with_header_reaches_handshake_request() {
        let (listener, url) = bind_server().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let callback =
                |req: &tokio_tungstenite::tungstenite::handshake::server::Request,
                 resp: tokio_tungstenite::tungstenite::handshake::server::Response| {
                    assert_eq!(
                        req.headers()
                            .get("x-api-key")
                            .map(|v| v.to_str().unwrap()),
                        Some("secret"),
                    );
                    Ok(resp)
                };
            let _ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .expect("ws accept");
        });

        let _conn = WebSocketTransport::new()
            .with_header("x-api-key", "secret")
            .connect(&url)
            .await
            .expect("should connect");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_connect_timeout_when_handshake_stalls() {
        // A raw TCP listener that accepts but never speaks WebSocket —
        // the opening handshake stalls until the timeout fires.
        let (listener, url) = bind_server().await;
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let result = WebSocketTransport::new()
            .connect_timeout(Duration::from_millis(100))
            .connect(&url)
            .await;

        assert!(
            matches!(result, Err(TransportError::ConnectTimeout(_))),
            "stalled handshake should time out"
        );
    }

    #[tokio::test]
    async fn test_connect_refused_returns_connect_failed() {
        // Bind to learn a free port, then drop the listener so the
        // connection is refused.
        let (listener, url) = bind_server().await;
        drop(listener);

        let result = WebSocketTransport::new().connect(&url).await;
        assert!(
            matches!(result, Err(TransportError::ConnectFailed(_))),
            "connecting to a closed port should fail"
        );
    }
}
