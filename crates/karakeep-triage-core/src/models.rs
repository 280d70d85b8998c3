//! Core data models shared by the triage tooling.
//!
//! These mirror the subset of the Karakeep API payloads that triage needs:
//! lists (with their manual/smart variant) and bookmark identifiers.

use serde::{Deserialize, Serialize};

/// Variant tag of a Karakeep list.
///
/// Smart lists are query-backed (e.g. "Inbox") and cannot be assigned to
/// by hand, so they are never offered as triage targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[default]
    Manual,
    Smart,
}

/// A bookmark list as returned by `GET /lists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ListKind,
}

impl List {
    /// Convenience constructor for a manual list.
    pub fn manual(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            parent_id: None,
            kind: ListKind::Manual,
        }
    }

    /// Whether a bookmark can be attached to this list by the user.
    pub fn is_assignable(&self) -> bool {
        self.kind == ListKind::Manual
    }
}

/// Keep only lists a user may assign bookmarks to, preserving order.
pub fn assignable_lists(lists: &[List]) -> Vec<List> {
    lists.iter().filter(|l| l.is_assignable()).cloned().collect()
}

/// A bookmark reference with optional display fields.
///
/// Triage only needs the identifier; title and url are carried along for
/// presenting the current item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Bookmark {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: None,
        }
    }

    /// Title if present, otherwise url, otherwise the id.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_deserializes_api_shape() {
        let json = r#"{"id":"l1","name":"Inbox","icon":"📥","parentId":null,"type":"smart"}"#;
        let list: List = serde_json::from_str(json).unwrap();
        assert_eq!(list.id, "l1");
        assert_eq!(list.icon.as_deref(), Some("📥"));
        assert_eq!(list.kind, ListKind::Smart);
        assert!(!list.is_assignable());
    }

    #[test]
    fn test_list_kind_defaults_to_manual() {
        let list: List = serde_json::from_str(r#"{"id":"l2","name":"Work"}"#).unwrap();
        assert_eq!(list.kind, ListKind::Manual);
        assert!(list.is_assignable());
    }

    #[test]
    fn test_assignable_lists_drops_smart() {
        let mut inbox = List::manual("s", "Inbox");
        inbox.kind = ListKind::Smart;
        let lists = vec![List::manual("a", "Work"), inbox, List::manual("b", "Read")];
        let ids: Vec<String> = assignable_lists(&lists).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_bookmark_label_fallbacks() {
        let mut b = Bookmark::new("b1");
        assert_eq!(b.label(), "b1");
        b.url = Some("https://example.com".into());
        assert_eq!(b.label(), "https://example.com");
        b.title = Some("Example".into());
        assert_eq!(b.label(), "Example");
    }
}
