//! Per-list usage counters.
//!
//! Every time a list is picked during triage its counter is bumped and its
//! last-used timestamp refreshed. The counters feed the key assignment
//! engine so frequently used lists get first pick of mnemonic keys.
//!
//! Counters live in a [`KeyValueStore`] under [`USAGE_STORAGE_KEY`] as a
//! JSON array of `{ "listId", "count", "lastUsed" }` records. Updates are
//! plain read-modify-write with no locking; concurrent writers race and the
//! last one wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;

/// Fixed storage key for the usage counters.
pub const USAGE_STORAGE_KEY: &str = "karakeep-list-usage";

/// Usage counter for one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsage {
    pub list_id: String,
    pub count: u64,
    pub last_used: DateTime<Utc>,
}

/// Look up how often a list has been used; unknown lists count as zero.
pub fn usage_count(list_id: &str, stats: &[ListUsage]) -> u64 {
    stats
        .iter()
        .find(|u| u.list_id == list_id)
        .map(|u| u.count)
        .unwrap_or(0)
}

/// Load the full counter set. A missing key yields an empty set.
pub fn load_list_usage(store: &dyn KeyValueStore) -> Result<Vec<ListUsage>> {
    match store.get(USAGE_STORAGE_KEY)? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse stored '{}'", USAGE_STORAGE_KEY)),
        _ => Ok(Vec::new()),
    }
}

/// Record one use of `list_id` at the current time.
pub fn save_list_usage(store: &dyn KeyValueStore, list_id: &str) -> Result<ListUsage> {
    save_list_usage_at(store, list_id, Utc::now())
}

/// Record one use of `list_id` at `now`.
///
/// Returns the updated counter.
pub fn save_list_usage_at(
    store: &dyn KeyValueStore,
    list_id: &str,
    now: DateTime<Utc>,
) -> Result<ListUsage> {
    let mut usage = load_list_usage(store)?;

    let updated = match usage.iter_mut().find(|u| u.list_id == list_id) {
        Some(entry) => {
            entry.count += 1;
            entry.last_used = now;
            entry.clone()
        }
        None => {
            let entry = ListUsage {
                list_id: list_id.to_string(),
                count: 1,
                last_used: now,
            };
            usage.push(entry.clone());
            entry
        }
    };

    let raw = serde_json::to_string(&usage)?;
    store.set(USAGE_STORAGE_KEY, &raw)?;
    Ok(updated)
}
