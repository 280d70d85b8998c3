//! Keyboard layouts for triage mode.
//!
//! A [`KeyboardLayout`] names the key (plus modifiers) for each triage
//! action and the keys that toggle target lists. Four presets are built in
//! ([`LayoutName`]); the user's choice is persisted under
//! [`LAYOUT_STORAGE_KEY`]. [`smart_keyboard_config`] swaps a preset's static
//! list keys for the mnemonic bindings produced by
//! [`generate_smart_key_bindings`](crate::keybind::generate_smart_key_bindings).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::keybind::{generate_smart_key_bindings_reserving, KeyBinding};
use crate::models::List;
use crate::store::KeyValueStore;
use crate::usage::ListUsage;

/// Storage key for the persisted layout preference.
pub const LAYOUT_STORAGE_KEY: &str = "triageKeyboardLayout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Cmd,
    Ctrl,
    Shift,
    Alt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriageAction {
    ApplyAndNext,
    SkipToNext,
    ApplyAndPrev,
    Quit,
    Next,
    Previous,
    ToggleList,
}

/// Key (with modifiers) bound to a triage action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBinding {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<ModifierKey>,
    pub description: String,
    pub action: TriageAction,
}

impl ActionBinding {
    fn new(key: &str, modifiers: &[ModifierKey], description: &str, action: TriageAction) -> Self {
        Self {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
            description: description.to_string(),
            action,
        }
    }
}

/// Key that toggles the list at `list_index` in the active binding set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListKeyBinding {
    pub key: String,
    pub list_index: usize,
    #[serde(default)]
    pub description: Option<String>,
}

/// A pressed key and the modifier state at the time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyEvent {
    /// A key press with no modifiers held.
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// The key press that triggers `binding`.
    pub fn for_binding(binding: &ActionBinding) -> Self {
        let has = |m: ModifierKey| binding.modifiers.contains(&m);
        Self {
            key: binding.key.clone(),
            meta: has(ModifierKey::Cmd),
            ctrl: has(ModifierKey::Ctrl),
            shift: has(ModifierKey::Shift),
            alt: has(ModifierKey::Alt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    pub apply_and_next: ActionBinding,
    pub skip_to_next: ActionBinding,
    pub apply_and_prev: ActionBinding,
    pub quit: ActionBinding,
    #[serde(default)]
    pub next: Option<ActionBinding>,
    #[serde(default)]
    pub previous: Option<ActionBinding>,
    pub list_keys: Vec<ListKeyBinding>,
}

impl KeyboardLayout {
    /// Action bindings in match priority order.
    pub fn actions(&self) -> Vec<&ActionBinding> {
        let mut out = vec![
            &self.apply_and_next,
            &self.skip_to_next,
            &self.apply_and_prev,
            &self.quit,
        ];
        out.extend(self.next.as_ref());
        out.extend(self.previous.as_ref());
        out
    }

    /// The first action whose binding matches `event`.
    pub fn action_for_event(&self, event: &KeyEvent) -> Option<TriageAction> {
        self.actions()
            .into_iter()
            .find(|b| matches_binding(event, b))
            .map(|b| b.action)
    }

    /// Single-character action keys pressed without modifiers, lowercased.
    /// List bindings must stay clear of these or the action would shadow
    /// them.
    pub fn reserved_keys(&self) -> BTreeSet<char> {
        self.actions()
            .into_iter()
            .filter(|b| b.modifiers.is_empty())
            .filter_map(|b| {
                let mut chars = b.key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c.to_ascii_lowercase()),
                    _ => None,
                }
            })
            .collect()
    }

    /// Index of the list toggled by `event`, if any. List keys never match
    /// while cmd/ctrl/alt is held.
    pub fn list_index_for_event(&self, event: &KeyEvent) -> Option<usize> {
        if event.meta || event.ctrl || event.alt {
            return None;
        }
        self.list_keys
            .iter()
            .find(|b| b.key.eq_ignore_ascii_case(&event.key))
            .map(|b| b.list_index)
    }
}

/// Built-in layout presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutName {
    #[default]
    Numbers,
    HomeRow,
    Qwerty,
    Minimal,
}

impl LayoutName {
    pub const ALL: [LayoutName; 4] = [
        LayoutName::Numbers,
        LayoutName::HomeRow,
        LayoutName::Qwerty,
        LayoutName::Minimal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutName::Numbers => "numbers",
            LayoutName::HomeRow => "home-row",
            LayoutName::Qwerty => "qwerty",
            LayoutName::Minimal => "minimal",
        }
    }

    pub fn layout(self) -> KeyboardLayout {
        match self {
            LayoutName::Numbers => numbers_layout(),
            LayoutName::HomeRow => home_row_layout(),
            LayoutName::Qwerty => qwerty_layout(),
            LayoutName::Minimal => minimal_layout(),
        }
    }
}

impl fmt::Display for LayoutName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "numbers" => Ok(LayoutName::Numbers),
            "home-row" => Ok(LayoutName::HomeRow),
            "qwerty" => Ok(LayoutName::Qwerty),
            "minimal" => Ok(LayoutName::Minimal),
            other => bail!(
                "Unknown keyboard layout: '{}'. Must be numbers, home-row, qwerty, or minimal.",
                other
            ),
        }
    }
}

fn list_keys(keys: &[&str]) -> Vec<ListKeyBinding> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| ListKeyBinding {
            key: k.to_string(),
            list_index: i,
            description: None,
        })
        .collect()
}

fn numbers_layout() -> KeyboardLayout {
    use ModifierKey::*;
    KeyboardLayout {
        apply_and_next: ActionBinding::new(
            "Enter",
            &[Cmd],
            "Apply & next",
            TriageAction::ApplyAndNext,
        ),
        skip_to_next: ActionBinding::new("Escape", &[], "Skip to next", TriageAction::SkipToNext),
        apply_and_prev: ActionBinding::new(
            "Enter",
            &[Cmd, Shift],
            "Apply & previous",
            TriageAction::ApplyAndPrev,
        ),
        quit: ActionBinding::new("q", &[], "Quit triage", TriageAction::Quit),
        next: Some(ActionBinding::new(
            "j",
            &[],
            "Next bookmark",
            TriageAction::Next,
        )),
        previous: Some(ActionBinding::new(
            "k",
            &[],
            "Previous bookmark",
            TriageAction::Previous,
        )),
        list_keys: list_keys(&["1", "2", "3", "4", "5", "6", "7", "8", "9"]),
    }
}

fn home_row_layout() -> KeyboardLayout {
    let mut layout = numbers_layout();
    layout.list_keys = list_keys(&["a", "s", "d", "f", "g", "h", "j", "k", "l"]);
    layout.list_keys[0].description = Some("First list".to_string());
    layout.list_keys[8].description = Some("Ninth list".to_string());
    // j/k now select lists.
    layout.next = Some(ActionBinding::new(
        "n",
        &[],
        "Next bookmark",
        TriageAction::Next,
    ));
    layout.previous = Some(ActionBinding::new(
        "p",
        &[],
        "Previous bookmark",
        TriageAction::Previous,
    ));
    layout
}

fn qwerty_layout() -> KeyboardLayout {
    let mut layout = numbers_layout();
    layout.list_keys = list_keys(&["q", "w", "e", "r", "t", "y", "u", "i", "o"]);
    layout.quit = ActionBinding::new("x", &[], "Exit triage", TriageAction::Quit);
    layout
}

fn minimal_layout() -> KeyboardLayout {
    KeyboardLayout {
        apply_and_next: ActionBinding::new("Enter", &[], "Apply & next", TriageAction::ApplyAndNext),
        skip_to_next: ActionBinding::new(
            "ArrowRight",
            &[],
            "Skip to next",
            TriageAction::SkipToNext,
        ),
        apply_and_prev: ActionBinding::new(
            "Enter",
            &[ModifierKey::Shift],
            "Apply & previous",
            TriageAction::ApplyAndPrev,
        ),
        quit: ActionBinding::new("Escape", &[], "Quit triage", TriageAction::Quit),
        next: Some(ActionBinding::new(
            "ArrowDown",
            &[],
            "Next bookmark",
            TriageAction::Next,
        )),
        previous: Some(ActionBinding::new(
            "ArrowUp",
            &[],
            "Previous bookmark",
            TriageAction::Previous,
        )),
        list_keys: (1..=9)
            .map(|i| ListKeyBinding {
                key: i.to_string(),
                list_index: i - 1,
                description: Some(format!("List {} (with Space)", i)),
            })
            .collect(),
    }
}

/// Whether `event` triggers `binding`.
///
/// Cmd and Ctrl are interchangeable so bindings work across platforms.
/// Modifiers must match exactly: an extra held modifier is a mismatch.
pub fn matches_binding(event: &KeyEvent, binding: &ActionBinding) -> bool {
    if event.key != binding.key {
        return false;
    }

    let wants_cmd = binding
        .modifiers
        .iter()
        .any(|m| matches!(m, ModifierKey::Cmd | ModifierKey::Ctrl));
    let wants_shift = binding.modifiers.contains(&ModifierKey::Shift);
    let wants_alt = binding.modifiers.contains(&ModifierKey::Alt);
    let cmd_or_ctrl = event.meta || event.ctrl;

    wants_cmd == cmd_or_ctrl && wants_shift == event.shift && wants_alt == event.alt
}

/// Render a binding for display, e.g. `⌘⇧↩`.
pub fn format_key_combo(binding: &ActionBinding) -> String {
    let mut out = String::new();
    if binding
        .modifiers
        .iter()
        .any(|m| matches!(m, ModifierKey::Cmd | ModifierKey::Ctrl))
    {
        out.push('⌘');
    }
    if binding.modifiers.contains(&ModifierKey::Shift) {
        out.push('⇧');
    }
    if binding.modifiers.contains(&ModifierKey::Alt) {
        out.push('⌥');
    }

    let key = match binding.key.as_str() {
        "Enter" => "↩",
        "Escape" => "esc",
        "ArrowUp" => "↑",
        "ArrowDown" => "↓",
        "ArrowLeft" => "←",
        "ArrowRight" => "→",
        other => other,
    };
    out.push_str(key);
    out
}

/// Load the persisted layout preference; missing or unknown values fall
/// back to [`LayoutName::Numbers`].
pub fn load_layout(store: &dyn KeyValueStore) -> Result<LayoutName> {
    Ok(store
        .get(LAYOUT_STORAGE_KEY)?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default())
}

pub fn save_layout(store: &dyn KeyValueStore, name: LayoutName) -> Result<()> {
    store.set(LAYOUT_STORAGE_KEY, name.as_str())
}

/// A layout paired with the smart bindings that replace its list keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartKeyboardConfig {
    pub layout: KeyboardLayout,
    pub bindings: Vec<KeyBinding>,
}

/// Build a layout whose list keys come from the smart binding engine.
///
/// `list_index` of each list key is the position of the binding in
/// `bindings`. Keys the layout uses for unmodified actions are withheld
/// from the engine.
pub fn smart_keyboard_config(
    base: LayoutName,
    lists: &[List],
    usage: &[ListUsage],
) -> SmartKeyboardConfig {
    let mut layout = base.layout();
    let bindings = generate_smart_key_bindings_reserving(lists, usage, &layout.reserved_keys());
    layout.list_keys = bindings
        .iter()
        .enumerate()
        .map(|(i, b)| ListKeyBinding {
            key: b.key.to_string(),
            list_index: i,
            description: Some(b.description.clone()),
        })
        .collect();
    SmartKeyboardConfig { layout, bindings }
}
