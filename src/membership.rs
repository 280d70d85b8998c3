//! Local index of bookmark → list membership.
//!
//! [`MembershipIndex`] answers "which lists contain bookmark X" in O(1)
//! without a round-trip, by crawling every list's bookmarks once at session
//! start and then applying each confirmed write incrementally.
//!
//! # Consistency
//!
//! The remote API is the source of truth. Writes call the API first and
//! touch the local map only after the call succeeds, so the index never
//! claims a membership the server has not confirmed. It is a snapshot as of
//! the last crawl plus the writes made through it; changes made elsewhere
//! are not picked up until [`reset`](MembershipIndex::reset) and a new
//! [`initialize`](MembershipIndex::initialize).
//!
//! # Initialization
//!
//! `initialize()` is single-flight: while a crawl is running, further calls
//! wait for it and receive its outcome instead of starting another. Per-list
//! fetches run concurrently, at most `concurrency` at a time; a list whose
//! fetch fails is logged and skipped. Only a failure to fetch the list of
//! lists fails the crawl.
//!
//! # Locking
//!
//! The map sits behind a `std::sync::RwLock` that is never held across an
//! `.await`. The crawl builds its result separately and installs it in one
//! step; a `reset()` that lands mid-crawl bumps a generation counter so the
//! stale result is dropped instead of installed. Writes confirmed while a
//! crawl is in flight are journaled and replayed onto the crawled result
//! before it is installed, so they survive even if the crawl read the
//! remote list before they landed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::ListsApi;
use crate::error::{ApiError, BatchAddError};
use crate::models::{Bookmark, ListKind};

type InitOutcome = Option<Result<(), ApiError>>;

#[derive(Debug, Default)]
struct Snapshot {
    memberships: HashMap<String, BTreeSet<String>>,
    smart_lists: HashSet<String>,
}

impl Snapshot {
    fn apply(&mut self, op: &MembershipOp) {
        match op {
            MembershipOp::Add {
                bookmark_id,
                list_id,
            } => {
                self.memberships
                    .entry(bookmark_id.clone())
                    .or_default()
                    .insert(list_id.clone());
            }
            MembershipOp::Remove {
                bookmark_id,
                list_id,
            } => {
                if let Some(lists) = self.memberships.get_mut(bookmark_id) {
                    lists.remove(list_id);
                    if lists.is_empty() {
                        self.memberships.remove(bookmark_id);
                    }
                }
            }
        }
    }
}

/// A write the API has confirmed.
#[derive(Debug, Clone)]
enum MembershipOp {
    Add { bookmark_id: String, list_id: String },
    Remove { bookmark_id: String, list_id: String },
}

enum InitPhase {
    Idle,
    InFlight {
        generation: u64,
        outcome: watch::Receiver<InitOutcome>,
        // Confirmed writes to replay onto the crawl result.
        journal: Vec<MembershipOp>,
    },
}

enum InitRole {
    Leader(watch::Sender<InitOutcome>, u64),
    Follower(watch::Receiver<InitOutcome>),
}

/// Introspection counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MembershipStats {
    /// Bookmarks with at least one membership.
    pub bookmark_count: usize,
    /// Sum of list memberships over all bookmarks.
    pub total_memberships: usize,
}

pub struct MembershipIndex {
    api: Arc<dyn ListsApi>,
    concurrency: usize,
    snapshot: RwLock<Snapshot>,
    ready: AtomicBool,
    phase: Mutex<InitPhase>,
    generation: AtomicU64,
}

/// Resets an abandoned crawl so the next caller can start over.
struct CrawlGuard<'a> {
    index: &'a MembershipIndex,
    generation: u64,
    finished: bool,
}

impl Drop for CrawlGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut phase = self.index.lock_phase();
        if matches!(&*phase, InitPhase::InFlight { generation, .. } if *generation == self.generation)
        {
            warn!("Membership crawl abandoned before completion");
            *phase = InitPhase::Idle;
        }
    }
}

impl MembershipIndex {
    /// Create an empty, not-yet-ready index. `concurrency` bounds the number
    /// of per-list fetches in flight during a crawl (minimum 1).
    pub fn new(api: Arc<dyn ListsApi>, concurrency: usize) -> Self {
        Self {
            api,
            concurrency: concurrency.max(1),
            snapshot: RwLock::new(Snapshot::default()),
            ready: AtomicBool::new(false),
            phase: Mutex::new(InitPhase::Idle),
            generation: AtomicU64::new(0),
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, InitPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Crawl the API and populate the index.
    ///
    /// No-op when already ready. Concurrent callers share one crawl and all
    /// observe its outcome. On failure the index stays not-ready and a later
    /// call starts a fresh crawl.
    pub async fn initialize(&self) -> Result<(), ApiError> {
        loop {
            let role = {
                let mut phase = self.lock_phase();
                if self.is_ready() {
                    return Ok(());
                }
                match &*phase {
                    InitPhase::InFlight { outcome, .. } => InitRole::Follower(outcome.clone()),
                    InitPhase::Idle => {
                        let (tx, rx) = watch::channel(None);
                        let generation = self.generation.load(Ordering::SeqCst);
                        *phase = InitPhase::InFlight {
                            generation,
                            outcome: rx,
                            journal: Vec::new(),
                        };
                        InitRole::Leader(tx, generation)
                    }
                }
            };

            match role {
                InitRole::Leader(tx, generation) => return self.lead_crawl(tx, generation).await,
                InitRole::Follower(mut rx) => {
                    let shared = rx.wait_for(Option::is_some).await.map(|o| (*o).clone());
                    match shared {
                        Ok(Some(outcome)) => return outcome,
                        // Leader was dropped mid-crawl; take over.
                        _ => continue,
                    }
                }
            }
        }
    }

    async fn lead_crawl(&self, tx: watch::Sender<InitOutcome>, generation: u64) -> Result<(), ApiError> {
        let mut guard = CrawlGuard {
            index: self,
            generation,
            finished: false,
        };

        let result = self.crawl().await;

        let outcome = {
            let mut phase = self.lock_phase();
            let current = self.generation.load(Ordering::SeqCst) == generation;
            let journal = if current {
                match std::mem::replace(&mut *phase, InitPhase::Idle) {
                    InitPhase::InFlight { journal, .. } => journal,
                    InitPhase::Idle => Vec::new(),
                }
            } else {
                Vec::new()
            };
            match result {
                Ok(mut snapshot) if current => {
                    for op in &journal {
                        snapshot.apply(op);
                    }
                    info!(
                        bookmarks = snapshot.memberships.len(),
                        "List membership index ready"
                    );
                    *self.write() = snapshot;
                    self.ready.store(true, Ordering::SeqCst);
                    Ok(())
                }
                Ok(_) => {
                    info!("Discarding membership crawl superseded by reset");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Failed to build list membership index");
                    Err(e)
                }
            }
        };

        guard.finished = true;
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    async fn crawl(&self) -> Result<Snapshot, ApiError> {
        info!("Building list membership index");
        let lists = self.api.list_lists().await?;
        info!(lists = lists.len(), "Fetching membership for each list");

        let api = &self.api;
        let fetched: Vec<(String, Result<Vec<String>, ApiError>)> =
            stream::iter(lists.iter().map(|l| l.id.clone()))
                .map(|list_id| async move {
                    let result = api.list_bookmarks_in_list(&list_id).await;
                    (list_id, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut snapshot = Snapshot {
            memberships: HashMap::new(),
            smart_lists: lists
                .iter()
                .filter(|l| l.kind == ListKind::Smart)
                .map(|l| l.id.clone())
                .collect(),
        };

        for (list_id, result) in fetched {
            match result {
                Ok(bookmark_ids) => {
                    for bookmark_id in bookmark_ids {
                        snapshot
                            .memberships
                            .entry(bookmark_id)
                            .or_default()
                            .insert(list_id.clone());
                    }
                }
                Err(e) => {
                    warn!(list_id = %list_id, error = %e, "Failed to fetch bookmarks for list; skipping");
                }
            }
        }

        Ok(snapshot)
    }

    /// Ids of the lists containing `bookmark_id`.
    ///
    /// Returns a snapshot; empty when the bookmark is unknown or the index is
    /// not ready yet (the latter also logs a warning).
    /// Apply a confirmed write locally, journaling it for any crawl in
    /// flight. The phase lock is held across both so the crawl install
    /// cannot slip in between.
    fn commit(&self, op: MembershipOp) {
        let mut phase = self.lock_phase();
        if let InitPhase::InFlight { journal, .. } = &mut *phase {
            journal.push(op.clone());
        }
        self.write().apply(&op);
    }

    pub fn lists_for_bookmark(&self, bookmark_id: &str) -> BTreeSet<String> {
        if !self.is_ready() {
            warn!("List membership index not initialized yet");
            return BTreeSet::new();
        }
        self.read()
            .memberships
            .get(bookmark_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Attach `bookmark_id` to `list_id` remotely, then record it locally.
    ///
    /// On failure the local index is left untouched.
    pub async fn add_bookmark_to_list(&self, bookmark_id: &str, list_id: &str) -> Result<(), ApiError> {
        if let Err(e) = self.api.attach_bookmark_to_list(bookmark_id, list_id).await {
            error!(bookmark_id, list_id, error = %e, "Failed to add bookmark to list");
            return Err(e);
        }

        self.commit(MembershipOp::Add {
            bookmark_id: bookmark_id.to_string(),
            list_id: list_id.to_string(),
        });
        debug!(bookmark_id, list_id, "Added bookmark to list");
        Ok(())
    }

    /// Detach `bookmark_id` from `list_id` remotely, then drop it locally.
    ///
    /// A bookmark left with no lists is removed from the index entirely.
    pub async fn remove_bookmark_from_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), ApiError> {
        if let Err(e) = self.api.detach_bookmark_from_list(bookmark_id, list_id).await {
            error!(bookmark_id, list_id, error = %e, "Failed to remove bookmark from list");
            return Err(e);
        }

        self.commit(MembershipOp::Remove {
            bookmark_id: bookmark_id.to_string(),
            list_id: list_id.to_string(),
        });
        debug!(bookmark_id, list_id, "Removed bookmark from list");
        Ok(())
    }

    /// Attach `bookmark_id` to every list in `list_ids` concurrently.
    ///
    /// Waits for all attaches to settle. Attaches that succeed stay
    /// committed even when others fail; the error lists both sides.
    pub async fn add_bookmark_to_lists(
        &self,
        bookmark_id: &str,
        list_ids: &[String],
    ) -> Result<(), BatchAddError> {
        let results = join_all(
            list_ids
                .iter()
                .map(|list_id| async move {
                    (list_id.clone(), self.add_bookmark_to_list(bookmark_id, list_id).await)
                }),
        )
        .await;

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (list_id, result) in results {
            match result {
                Ok(()) => succeeded.push(list_id),
                Err(e) => failures.push((list_id, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchAddError {
                bookmark_id: bookmark_id.to_string(),
                succeeded,
                failures,
            })
        }
    }

    /// Keep only bookmarks that belong to no manual list.
    ///
    /// Smart lists are query-backed (an inbox, for example), so membership
    /// in them does not count as being filed.
    pub fn bookmarks_without_lists(&self, candidates: &[Bookmark]) -> Vec<Bookmark> {
        let snapshot = self.read();
        candidates
            .iter()
            .filter(|b| {
                snapshot
                    .memberships
                    .get(&b.id)
                    .map(|lists| lists.iter().all(|l| snapshot.smart_lists.contains(l)))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Drop all cached memberships and the ready flag.
    pub fn reset(&self) {
        let mut phase = self.lock_phase();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *phase = InitPhase::Idle;
        *self.write() = Snapshot::default();
        self.ready.store(false, Ordering::SeqCst);
        info!("List membership index reset");
    }

    pub fn debug_info(&self) -> MembershipStats {
        let snapshot = self.read();
        MembershipStats {
            bookmark_count: snapshot.memberships.len(),
            total_memberships: snapshot.memberships.values().map(BTreeSet::len).sum(),
        }
    }
}
