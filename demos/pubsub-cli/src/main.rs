//! Minimal pub/sub chat client.
//!
//! Connects to a server, subscribes to one channel, prints everything
//! published there, and publishes each line typed on stdin.
//!
//! ```text
//! pubsub-cli [url] [channel]
//! RUST_LOG=wavelink=debug pubsub-cli ws://localhost:8000/socketcluster/ lobby
//! ```

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use wavelink::{
    ReconnectPolicy, Session, SessionListener, TransportError,
    WebSocketTransport,
};

// ---------------------------------------------------------------------------
// Lifecycle listener
// ---------------------------------------------------------------------------

struct ChatListener;

impl SessionListener for ChatListener {
    fn on_connected(&mut self) {
        println!("* connected");
    }

    fn on_disconnected(&mut self, cause: Option<&TransportError>) {
        match cause {
            Some(error) => println!("* disconnected: {error}"),
            None => println!("* disconnected"),
        }
    }

    fn on_connect_error(&mut self, error: &TransportError) {
        println!("* connect failed: {error}");
    }

    fn on_authenticated(&mut self, authenticated: bool) {
        println!("* authenticated: {authenticated}");
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), wavelink::ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "ws://127.0.0.1:8000/socketcluster/".to_owned());
    let channel_name = args.next().unwrap_or_else(|| "lobby".to_owned());

    let session = Session::builder(url.clone())
        .reconnect(ReconnectPolicy::default())
        .listener(ChatListener)
        .connect(
            WebSocketTransport::new()
                .connect_timeout(Duration::from_secs(5)),
        );

    let channel = session.channel(channel_name.clone())?;
    let label = channel_name.clone();
    channel.on_message(move |msg| println!("[{label}] {msg}"))?;
    channel.subscribe()?;

    println!("connected to {url}");
    println!("type a message and press enter to publish to '{channel_name}'");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        channel.publish(serde_json::json!(line))?;
    }

    session.disconnect()?;
    Ok(())
}
