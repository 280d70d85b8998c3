//! Headless triage session.
//!
//! Drives the "sort unfiled bookmarks into lists" workflow independent of
//! any front end: a queue of bookmarks, a cursor, the set of lists picked
//! for the current bookmark, and the smart key bindings used to pick them.
//!
//! Picking a list by key records a use of that list so frequently chosen
//! lists win mnemonic keys next session. Applying goes through the
//! [`MembershipIndex`], which confirms each attach with the API before
//! caching it. Lists the bookmark already belongs to are reported as such
//! and not sent again.

use std::fmt;

use tracing::{info, warn};

use crate::error::BatchAddError;
use crate::keybind::{binding_for_key, KeyBinding};
use crate::keymap::{KeyEvent, KeyboardLayout, TriageAction};
use crate::membership::MembershipIndex;
use crate::models::Bookmark;
use crate::store::KeyValueStore;
use crate::usage::save_list_usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of applying the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No list was selected; nothing happened.
    NothingSelected,
    /// The queue is exhausted.
    NoBookmark,
    /// The bookmark was filed. `already_member` holds selected lists it was
    /// in before, which were not sent.
    Applied {
        bookmark_id: String,
        added: Vec<String>,
        already_member: Vec<String>,
    },
}

impl ApplyOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            ApplyOutcome::NothingSelected => {
                Notice::new(NoticeLevel::Warning, "Please select at least one list")
            }
            ApplyOutcome::NoBookmark => Notice::new(NoticeLevel::Info, "No more bookmarks to process"),
            ApplyOutcome::Applied {
                added,
                already_member,
                ..
            } if added.is_empty() => Notice::new(
                NoticeLevel::Info,
                format!("Already in that list ({})", already_member.join(", ")),
            ),
            ApplyOutcome::Applied { added, .. } => Notice::new(
                NoticeLevel::Success,
                format!("Bookmark assigned to {} list(s)", added.len()),
            ),
        }
    }
}

/// Notice for a failed apply.
pub fn failure_notice(err: &BatchAddError) -> Notice {
    if err.only_already_member() {
        Notice::new(NoticeLevel::Info, "Already in that list")
    } else {
        Notice::new(NoticeLevel::Error, format!("Failed to add: {}", err))
    }
}

/// A list toggled in or out of the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub list_id: String,
    pub list_name: String,
    pub selected: bool,
}

/// What a key press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Toggled(Toggle),
    Applied(ApplyOutcome),
    Moved,
    Quit,
    Ignored,
}

pub struct TriageSession<'a> {
    index: &'a MembershipIndex,
    usage: &'a dyn KeyValueStore,
    bindings: Vec<KeyBinding>,
    queue: Vec<Bookmark>,
    position: usize,
    selected: Vec<String>,
    completed: usize,
}

impl<'a> TriageSession<'a> {
    pub fn new(
        index: &'a MembershipIndex,
        usage: &'a dyn KeyValueStore,
        bindings: Vec<KeyBinding>,
        queue: Vec<Bookmark>,
    ) -> Self {
        Self {
            index,
            usage,
            bindings,
            queue,
            position: 0,
            selected: Vec::new(),
            completed: 0,
        }
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    /// The bookmark being triaged, or `None` once past the end.
    pub fn current(&self) -> Option<&Bookmark> {
        self.queue.get(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Bookmarks still in the queue, including the current one.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn selected_lists(&self) -> &[String] {
        &self.selected
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_none()
    }

    fn toggle(&mut self, binding: &KeyBinding) -> Toggle {
        let selected = match self.selected.iter().position(|id| *id == binding.list_id) {
            Some(i) => {
                self.selected.remove(i);
                false
            }
            None => {
                self.selected.push(binding.list_id.clone());
                true
            }
        };
        Toggle {
            list_id: binding.list_id.clone(),
            list_name: binding.list_name.clone(),
            selected,
        }
    }

    /// Toggle the list bound to `key` and record a use of it.
    ///
    /// Returns `None` for unbound keys. A failure to persist the usage
    /// counter is logged, not returned.
    pub fn toggle_by_key(&mut self, key: char) -> Option<Toggle> {
        let binding = binding_for_key(&self.bindings, key)?.clone();
        let toggle = self.toggle(&binding);
        if let Err(e) = save_list_usage(self.usage, &binding.list_id) {
            warn!(list_id = %binding.list_id, error = %e, "Failed to record list usage");
        }
        Some(toggle)
    }

    /// Toggle the list at `index` in the binding order. Does not count as a
    /// use.
    pub fn toggle_by_index(&mut self, index: usize) -> Option<Toggle> {
        let binding = self.bindings.get(index)?.clone();
        Some(self.toggle(&binding))
    }

    /// Advance without applying. Clears the selection.
    pub fn skip(&mut self) {
        if self.position < self.queue.len() {
            self.position += 1;
        }
        self.selected.clear();
    }

    /// Step back one bookmark. Clears the selection.
    pub fn previous(&mut self) {
        if self.position > 0 {
            self.position -= 1;
        }
        self.selected.clear();
    }

    /// File the current bookmark into the selected lists and move on.
    ///
    /// On success the bookmark leaves the queue and the next one becomes
    /// current. On failure nothing moves and the selection is kept so the
    /// user can retry; attaches that did succeed remain committed.
    pub async fn apply_and_next(&mut self) -> Result<ApplyOutcome, BatchAddError> {
        self.apply().await
    }

    /// Like [`apply_and_next`](Self::apply_and_next), then step back.
    pub async fn apply_and_previous(&mut self) -> Result<ApplyOutcome, BatchAddError> {
        let outcome = self.apply().await?;
        if matches!(outcome, ApplyOutcome::Applied { .. }) && self.position > 0 {
            self.position -= 1;
        }
        Ok(outcome)
    }

    async fn apply(&mut self) -> Result<ApplyOutcome, BatchAddError> {
        let bookmark_id = match self.current() {
            Some(b) => b.id.clone(),
            None => return Ok(ApplyOutcome::NoBookmark),
        };
        if self.selected.is_empty() {
            return Ok(ApplyOutcome::NothingSelected);
        }

        let existing = self.index.lists_for_bookmark(&bookmark_id);
        let (already_member, to_add): (Vec<String>, Vec<String>) = self
            .selected
            .iter()
            .cloned()
            .partition(|id| existing.contains(id));

        if !to_add.is_empty() {
            self.index.add_bookmark_to_lists(&bookmark_id, &to_add).await?;
        }

        info!(
            bookmark_id = %bookmark_id,
            added = to_add.len(),
            already = already_member.len(),
            "Bookmark triaged"
        );

        self.queue.remove(self.position);
        self.completed += 1;
        self.selected.clear();

        Ok(ApplyOutcome::Applied {
            bookmark_id,
            added: to_add,
            already_member,
        })
    }

    /// Dispatch a key press through `layout`.
    ///
    /// Action keys are checked first. List keys resolve to the binding at
    /// their `list_index`, so a layout built by
    /// [`smart_keyboard_config`](crate::keymap::smart_keyboard_config) over
    /// the same bindings toggles exactly the advertised list. That config
    /// keeps list keys off the layout's unmodified action keys, so no
    /// advertised list key is shadowed by an action.
    pub async fn handle_key(
        &mut self,
        layout: &KeyboardLayout,
        event: &KeyEvent,
    ) -> Result<KeyOutcome, BatchAddError> {
        if let Some(action) = layout.action_for_event(event) {
            return Ok(match action {
                TriageAction::ApplyAndNext => KeyOutcome::Applied(self.apply_and_next().await?),
                TriageAction::ApplyAndPrev => {
                    KeyOutcome::Applied(self.apply_and_previous().await?)
                }
                TriageAction::SkipToNext | TriageAction::Next => {
                    self.skip();
                    KeyOutcome::Moved
                }
                TriageAction::Previous => {
                    self.previous();
                    KeyOutcome::Moved
                }
                TriageAction::Quit => KeyOutcome::Quit,
                TriageAction::ToggleList => KeyOutcome::Ignored,
            });
        }

        let toggled = layout
            .list_index_for_event(event)
            .and_then(|i| self.bindings.get(i).map(|b| b.key))
            .and_then(|key| self.toggle_by_key(key));
        Ok(toggled.map(KeyOutcome::Toggled).unwrap_or(KeyOutcome::Ignored))
    }

    /// Summary shown when leaving the session.
    pub fn quit_notice(&self) -> Option<Notice> {
        (self.completed > 0).then(|| {
            Notice::new(
                NoticeLevel::Info,
                format!("Processed {} bookmarks", self.completed),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::api::ListsApi;
    use crate::error::ApiError;
    use crate::keybind::generate_smart_key_bindings;
    use crate::keymap::{smart_keyboard_config, LayoutName};
    use crate::models::List;
    use crate::store::memory::InMemoryStore;
    use crate::usage::{load_list_usage, usage_count};

    struct StaticApi {
        lists: Vec<List>,
        members: Vec<(&'static str, &'static str)>,
        reject: Option<&'static str>,
    }

    #[async_trait]
    impl ListsApi for StaticApi {
        async fn list_lists(&self) -> Result<Vec<List>, ApiError> {
            Ok(self.lists.clone())
        }

        async fn list_bookmarks_in_list(&self, list_id: &str) -> Result<Vec<String>, ApiError> {
            Ok(self
                .members
                .iter()
                .filter(|(l, _)| *l == list_id)
                .map(|(_, b)| b.to_string())
                .collect())
        }

        async fn attach_bookmark_to_list(
            &self,
            _bookmark_id: &str,
            list_id: &str,
        ) -> Result<(), ApiError> {
            match self.reject {
                Some(r) if r == list_id => Err(ApiError::transport("timeout")),
                _ => Ok(()),
            }
        }

        async fn detach_bookmark_from_list(&self, _: &str, _: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn list_inbox_bookmarks(&self) -> Result<Vec<Bookmark>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn lists() -> Vec<List> {
        vec![List::manual("L1", "Work"), List::manual("L2", "Reading")]
    }

    async fn ready_index(reject: Option<&'static str>) -> MembershipIndex {
        let api = StaticApi {
            lists: lists(),
            members: vec![("L2", "B2")],
            reject,
        };
        let index = MembershipIndex::new(Arc::new(api), 2);
        index.initialize().await.unwrap();
        index
    }

    fn queue() -> Vec<Bookmark> {
        vec![Bookmark::new("B1"), Bookmark::new("B2"), Bookmark::new("B3")]
    }

    #[tokio::test]
    async fn test_toggle_records_usage() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let bindings = generate_smart_key_bindings(&lists(), &[]);
        let mut session = TriageSession::new(&index, &store, bindings, queue());

        let t = session.toggle_by_key('w').unwrap();
        assert!(t.selected);
        assert_eq!(session.selected_lists().to_vec(), vec!["L1".to_string()]);
        let t = session.toggle_by_key('w').unwrap();
        assert!(!t.selected);
        assert!(session.selected_lists().is_empty());
        assert!(session.toggle_by_key('z').is_none());

        let stats = load_list_usage(&store).unwrap();
        assert_eq!(usage_count("L1", &stats), 2);
    }

    #[tokio::test]
    async fn test_apply_requires_selection() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let bindings = generate_smart_key_bindings(&lists(), &[]);
        let mut session = TriageSession::new(&index, &store, bindings, queue());

        let outcome = session.apply_and_next().await.unwrap();
        assert_eq!(outcome, ApplyOutcome::NothingSelected);
        assert_eq!(outcome.notice().level, NoticeLevel::Warning);
        assert_eq!(session.remaining(), 3);
    }

    #[tokio::test]
    async fn test_apply_files_and_advances() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let bindings = generate_smart_key_bindings(&lists(), &[]);
        let mut session = TriageSession::new(&index, &store, bindings, queue());

        session.toggle_by_key('w');
        session.toggle_by_key('r');
        let outcome = session.apply_and_next().await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                bookmark_id: "B1".into(),
                added: vec!["L1".into(), "L2".into()],
                already_member: vec![],
            }
        );
        assert_eq!(outcome.notice().level, NoticeLevel::Success);
        assert_eq!(session.current().map(|b| b.id.as_str()), Some("B2"));
        assert_eq!(session.completed_count(), 1);
        assert!(session.selected_lists().is_empty());
        assert_eq!(index.lists_for_bookmark("B1").len(), 2);
    }

    #[tokio::test]
    async fn test_apply_skips_existing_membership() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let bindings = generate_smart_key_bindings(&lists(), &[]);
        let mut session = TriageSession::new(&index, &store, bindings, queue());

        session.skip();
        assert_eq!(session.current().map(|b| b.id.as_str()), Some("B2"));
        session.toggle_by_key('r');
        let outcome = session.apply_and_next().await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                bookmark_id: "B2".into(),
                added: vec![],
                already_member: vec!["L2".into()],
            }
        );
        assert_eq!(outcome.notice().level, NoticeLevel::Info);
        assert!(outcome.notice().message.starts_with("Already in that list"));
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_state() {
        let index = ready_index(Some("L2")).await;
        let store = InMemoryStore::new();
        let bindings = generate_smart_key_bindings(&lists(), &[]);
        let mut session = TriageSession::new(&index, &store, bindings, queue());

        session.toggle_by_key('w');
        session.toggle_by_key('r');
        let err = session.apply_and_next().await.unwrap_err();
        assert_eq!(err.succeeded, vec!["L1".to_string()]);
        assert_eq!(failure_notice(&err).level, NoticeLevel::Error);

        assert_eq!(session.current().map(|b| b.id.as_str()), Some("B1"));
        assert_eq!(session.selected_lists().len(), 2);
        assert_eq!(session.completed_count(), 0);
        assert!(index.lists_for_bookmark("B1").contains("L1"));
    }

    #[tokio::test]
    async fn test_navigation_bounds() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let mut session = TriageSession::new(&index, &store, Vec::new(), queue());

        session.previous();
        assert_eq!(session.position(), 0);
        session.skip();
        session.skip();
        session.skip();
        assert!(session.is_finished());
        session.skip();
        assert_eq!(session.position(), 3);
        assert_eq!(
            session.apply_and_next().await.unwrap(),
            ApplyOutcome::NoBookmark
        );
        session.previous();
        assert_eq!(session.current().map(|b| b.id.as_str()), Some("B3"));
        assert!(session.quit_notice().is_none());
    }

    #[tokio::test]
    async fn test_handle_key_with_smart_layout() {
        let index = ready_index(None).await;
        let store = InMemoryStore::new();
        let config = smart_keyboard_config(LayoutName::Numbers, &lists(), &[]);
        let layout = config.layout.clone();
        let mut session = TriageSession::new(&index, &store, config.bindings, queue());

        let out = session
            .handle_key(&layout, &KeyEvent::plain("w"))
            .await
            .unwrap();
        assert!(matches!(out, KeyOutcome::Toggled(ref t) if t.list_id == "L1" && t.selected));

        let apply = KeyEvent {
            key: "Enter".into(),
            ctrl: true,
            ..KeyEvent::default()
        };
        let out = session.handle_key(&layout, &apply).await.unwrap();
        assert!(matches!(out, KeyOutcome::Applied(ApplyOutcome::Applied { .. })));

        let out = session
            .handle_key(&layout, &KeyEvent::plain("Escape"))
            .await
            .unwrap();
        assert_eq!(out, KeyOutcome::Moved);
        assert_eq!(session.current().map(|b| b.id.as_str()), Some("B3"));

        let out = session
            .handle_key(&layout, &KeyEvent::plain("q"))
            .await
            .unwrap();
        assert_eq!(out, KeyOutcome::Quit);
        assert_eq!(
            session.quit_notice().map(|n| n.message),
            Some("Processed 1 bookmarks".to_string())
        );
    }
    #[tokio::test]
    async fn test_lists_named_like_action_keys_stay_reachable() {
        let journal_quotes = vec![List::manual("J", "Journal"), List::manual("Q", "Quotes")];
        let api = StaticApi {
            lists: journal_quotes.clone(),
            members: vec![],
            reject: None,
        };
        let index = MembershipIndex::new(Arc::new(api), 2);
        index.initialize().await.unwrap();
        let store = InMemoryStore::new();
        let config = smart_keyboard_config(LayoutName::Numbers, &journal_quotes, &[]);
        let layout = config.layout.clone();
        let mut session = TriageSession::new(&index, &store, config.bindings, queue());

        for binding in session.bindings().to_vec() {
            let out = session
                .handle_key(&layout, &KeyEvent::plain(binding.key.to_string()))
                .await
                .unwrap();
            assert!(
                matches!(out, KeyOutcome::Toggled(ref t) if t.list_id == binding.list_id && t.selected),
                "key {} did not toggle {}",
                binding.key,
                binding.list_name
            );
        }
        assert_eq!(session.selected_lists().len(), 2);

        // The action keys keep their actions.
        let out = session
            .handle_key(&layout, &KeyEvent::plain("j"))
            .await
            .unwrap();
        assert_eq!(out, KeyOutcome::Moved);
        let out = session
            .handle_key(&layout, &KeyEvent::plain("q"))
            .await
            .unwrap();
        assert_eq!(out, KeyOutcome::Quit);
    }
}
