//! Correlation table: pending acknowledgment callbacks keyed by call id.
//!
//! Every outbound call that expects a response registers an entry here
//! under its `cid`. When the matching response (`rid`) arrives, the entry
//! is removed and its callback invoked — once, ever. Entries with no
//! response are never reclaimed; the protocol defines no per-call
//! timeout, so the leak is bounded by the life of the session.

use std::collections::HashMap;

use serde_json::Value;

/// An acknowledgment callback: `(label, error, data)`.
///
/// The label is whatever the call was registered under — the event name
/// for emits, the channel name for subscribe/unsubscribe/publish.
/// `FnOnce` makes at-most-once delivery structural.
pub type AckCallback =
    Box<dyn FnOnce(&str, Option<Value>, Option<Value>) + Send>;

struct AckEntry {
    label: String,
    callback: Option<AckCallback>,
}

/// Pending calls awaiting a response, keyed by call id.
#[derive(Default)]
pub struct AckTable {
    entries: HashMap<u64, AckEntry>,
}

impl AckTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending call.
    ///
    /// Overwrites silently if `id` is already present — the caller owns
    /// id uniqueness (the session's counter only repeats ids across
    /// connection epochs, where stale entries are already dead).
    pub fn register(
        &mut self,
        id: u64,
        label: impl Into<String>,
        callback: Option<AckCallback>,
    ) {
        self.entries.insert(
            id,
            AckEntry {
                label: label.into(),
                callback,
            },
        );
    }

    /// Resolves a response: removes the entry for `id` and invokes its
    /// callback with `(label, error, data)`.
    ///
    /// Returns whether an entry was found. A missing id is expected
    /// (responses to calls that registered no callback) and is a quiet
    /// no-op; an entry holding no callback is consumed without effect.
    pub fn resolve(
        &mut self,
        id: u64,
        error: Option<Value>,
        data: Option<Value>,
    ) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                match entry.callback {
                    Some(callback) => callback(&entry.label, error, data),
                    None => {
                        tracing::trace!(id, "resolved call had no callback")
                    }
                }
                true
            }
            None => {
                tracing::trace!(id, "no pending call for response id");
                false
            }
        }
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no calls are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
