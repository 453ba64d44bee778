//! Channel registry and the per-channel handle.
//!
//! Subscription state is client-local: the engine owns a
//! [`ChannelRegistry`] and replays every tracked channel's `#subscribe`
//! after each reconnection. The public [`Channel`] handle only sends
//! commands back to its owning session — it never mutates session state
//! directly.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::session::Command;
use crate::ClientError;

/// Counter for generating unique channel identities.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_channel_id() -> u64 {
    NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)
}

/// A per-channel message listener, invoked with each published payload.
pub type MessageListener = Box<dyn FnMut(Value) + Send>;

struct ChannelEntry {
    id: u64,
    name: String,
    listener: Option<MessageListener>,
}

/// Tracks channel subscriptions in insertion order.
///
/// Creating the same name twice is allowed and produces two entries
/// (and two subscriptions on the wire) — one channel instance per name
/// is the documented usage contract, not a structural constraint.
#[derive(Default)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a channel entry.
    pub fn insert(&mut self, id: u64, name: impl Into<String>) {
        self.entries.push(ChannelEntry {
            id,
            name: name.into(),
            listener: None,
        });
    }

    /// Removes a channel by identity. Returns whether it was present.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Attaches a message listener to the channel with the given
    /// identity. Returns `false` if the channel is gone.
    pub fn set_listener(
        &mut self,
        id: u64,
        listener: MessageListener,
    ) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.listener = Some(listener);
                true
            }
            None => false,
        }
    }

    /// Delivers a published payload to the first channel with the given
    /// name, if it has a listener. Returns whether a listener ran.
    pub fn dispatch(&mut self, name: &str, payload: Value) -> bool {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(ChannelEntry {
                listener: Some(listener),
                ..
            }) => {
                listener(payload);
                true
            }
            _ => false,
        }
    }

    /// First channel with the given name, as `(id, name)`.
    pub fn find(&self, name: &str) -> Option<(u64, String)> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.id, entry.name.clone()))
    }

    /// Snapshot of all channel names, in insertion order. Used for
    /// subscription replay — the snapshot keeps replay independent of
    /// registry mutation while sends are in flight.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Snapshot of all `(id, name)` pairs, in insertion order.
    pub fn entries(&self) -> Vec<(u64, String)> {
        self.entries
            .iter()
            .map(|entry| (entry.id, entry.name.clone()))
            .collect()
    }

    /// Number of tracked channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no channels are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Channel handle
// ---------------------------------------------------------------------------

/// A named pub/sub channel, created by
/// [`Session::channel`](crate::Session::channel).
///
/// All operations are fire-and-forget sends into the session's single
/// writer queue; supply an ack callback to learn the server's verdict.
pub struct Channel {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
}

impl Channel {
    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribes to this channel.
    pub fn subscribe(&self) -> Result<(), ClientError> {
        self.send(Command::Subscribe {
            channel: self.name.clone(),
            ack: None,
        })
    }

    /// Subscribes, invoking `ack` when the server responds.
    pub fn subscribe_with_ack(
        &self,
        ack: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::Subscribe {
            channel: self.name.clone(),
            ack: Some(Box::new(ack)),
        })
    }

    /// Unsubscribes from this channel.
    ///
    /// The local registry entry is removed whether or not the server
    /// acknowledges; the handle is spent afterwards.
    pub fn unsubscribe(&self) -> Result<(), ClientError> {
        self.send(Command::Unsubscribe {
            id: self.id,
            channel: self.name.clone(),
            ack: None,
        })
    }

    /// Unsubscribes, invoking `ack` when the server responds.
    pub fn unsubscribe_with_ack(
        &self,
        ack: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::Unsubscribe {
            id: self.id,
            channel: self.name.clone(),
            ack: Some(Box::new(ack)),
        })
    }

    /// Publishes a payload to this channel.
    pub fn publish(&self, data: Value) -> Result<(), ClientError> {
        self.send(Command::Publish {
            channel: self.name.clone(),
            data: Some(data),
            ack: None,
        })
    }

    /// Publishes, invoking `ack` when the server responds.
    pub fn publish_with_ack(
        &self,
        data: Value,
        ack: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::Publish {
            channel: self.name.clone(),
            data: Some(data),
            ack: Some(Box::new(ack)),
        })
    }

    /// Registers the listener invoked with each payload published to
    /// this channel.
    pub fn on_message(
        &self,
        listener: impl FnMut(Value) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::SetChannelListener {
            id: self.id,
            listener: Box::new(listener),
        })
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }
}

// =========================================================================
// Tests
// =========================================================================
