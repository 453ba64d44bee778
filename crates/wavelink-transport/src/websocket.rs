//! WebSocket client transport implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default time allowed for the connection attempt, including the
/// WebSocket opening handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// A WebSocket-based [`Transport`] that opens client connections.
///
/// Configure the connect timeout and any extra handshake headers before
/// handing the transport to a session:
///
/// ```rust
/// use std::time::Duration;
/// use wavelink_transport::WebSocketTransport;
///
/// let transport = WebSocketTransport::new()
///     .connect_timeout(Duration::from_secs(10))
///     .with_header("x-api-key", "secret");
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
    headers: Vec<(String, String)>,
}

impl WebSocketTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            headers: Vec::new(),
        }
    }

    /// Sets the timeout for connection establishment.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Adds a header to the WebSocket opening handshake request.
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        url: &str,
    ) -> Result<Self::Connection, TransportError> {
        let mut request = url.into_client_request().map_err(|e| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                e,
            ))
        })?;

        for (name, value) in &self.headers {
            let name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    TransportError::ConnectFailed(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        e,
                    ))
                })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    e,
                ))
            })?;
            request.headers_mut().insert(name, value);
        }

        let connect = tokio_tungstenite::connect_async(request);
        let (ws, _response) =
            match tokio::time::timeout(self.connect_timeout, connect).await
            {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    return Err(TransportError::ConnectFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionRefused,
                            e,
                        ),
                    ));
                }
                Err(_) => {
                    return Err(TransportError::ConnectTimeout(
                        self.connect_timeout,
                    ));
                }
            };

        use futures_util::StreamExt;
        let (sink, stream) = ws.split();

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, url, "WebSocket connection established");

        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single client WebSocket connection.
///
/// The sink and stream halves are locked independently so a pending
/// `recv` never blocks a concurrent `send`.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<WsSink>,
    stream: Mutex<WsSource>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        use futures_util::SinkExt;
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data.into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        use futures_util::StreamExt;
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.into())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ws-level ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        use futures_util::SinkExt;
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
