//! Durable key-value storage abstraction.
//!
//! The [`KeyValueStore`] trait is the only persistence surface the triage
//! core needs: usage counters and the keyboard layout preference are each
//! stored as a single string value under a fixed key. Backends decide where
//! the bytes live (a JSON file for the CLI, memory for tests and embedding).
//!
//! Implementations must be `Send + Sync`; writes are simple overwrites and
//! the last writer wins.

pub mod memory;

use anyhow::Result;

/// Abstract string key-value store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](KeyValueStore::get) | Read the value for a key, if any |
/// | [`set`](KeyValueStore::set) | Overwrite the value for a key |
/// | [`remove`](KeyValueStore::remove) | Delete a key |
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
