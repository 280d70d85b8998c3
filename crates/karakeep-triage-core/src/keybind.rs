//! Smart key assignment for triage targets.
//!
//! Maps each candidate list to a single-character shortcut that is easy to
//! remember, degrading gracefully as the number of lists grows.
//!
//! # Algorithm
//!
//! 1. Order lists by usage count (descending), ties broken by
//!    case-insensitive name. Higher-usage lists pick keys first.
//! 2. For each list, reduce its name to lowercase ASCII letters and try:
//!    the first letter, then each later letter left to right, then each
//!    consonant in order of appearance, then the first free letter `a..=z`.
//!    A name with no letters gets nothing in this pass.
//! 3. Lists still without a key get `1`..=`9` in sorted order. Anything past
//!    the ninth is left unbound; keys are never reused.
//!
//! The output is a pure function of its inputs: no hash iteration order is
//! involved, so the same lists and usage always yield the same bindings.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::List;
use crate::usage::{usage_count, ListUsage};

const CONSONANTS: &str = "bcdfghjklmnpqrstvwxyz";
const MAX_NUMBER_KEYS: usize = 9;

/// Why a particular key was chosen for a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentReason {
    FirstLetter,
    SecondLetter,
    Consonant,
    Fallback,
    Number,
}

impl AssignmentReason {
    /// Short label shown next to a binding.
    pub fn reason_text(self) -> &'static str {
        match self {
            AssignmentReason::FirstLetter => "first letter",
            AssignmentReason::SecondLetter => "alt letter",
            AssignmentReason::Consonant => "consonant",
            AssignmentReason::Fallback => "available",
            AssignmentReason::Number => "number",
        }
    }
}

impl fmt::Display for AssignmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentReason::FirstLetter => "first-letter",
            AssignmentReason::SecondLetter => "second-letter",
            AssignmentReason::Consonant => "consonant",
            AssignmentReason::Fallback => "fallback",
            AssignmentReason::Number => "number",
        };
        f.write_str(s)
    }
}

/// A shortcut key bound to one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBinding {
    pub key: char,
    pub list_id: String,
    pub list_name: String,
    pub description: String,
    pub reason: AssignmentReason,
    /// Usage count of the list at the time of assignment.
    pub priority: u64,
}

impl KeyBinding {
    fn new(list: &List, key: char, reason: AssignmentReason, priority: u64) -> Self {
        Self {
            key,
            list_id: list.id.clone(),
            list_name: list.name.clone(),
            description: format!("{} ({})", list.name, key),
            reason,
            priority,
        }
    }
}

/// Pick the best free key for `name`, or `None` if the name has no ASCII
/// letters or every letter is taken.
pub fn find_best_key(name: &str, used: &BTreeSet<char>) -> Option<(char, AssignmentReason)> {
    let letters: Vec<char> = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();

    let first = *letters.first()?;
    if !used.contains(&first) {
        return Some((first, AssignmentReason::FirstLetter));
    }

    if let Some(&c) = letters[1..].iter().find(|c| !used.contains(*c)) {
        return Some((c, AssignmentReason::SecondLetter));
    }

    // Reconsiders letters already tried above; the passes are independent.
    if let Some(&c) = letters
        .iter()
        .filter(|c| CONSONANTS.contains(**c))
        .find(|c| !used.contains(*c))
    {
        return Some((c, AssignmentReason::Consonant));
    }

    ('a'..='z')
        .find(|c| !used.contains(c))
        .map(|c| (c, AssignmentReason::Fallback))
}

fn priority_order(a: &List, b: &List, stats: &[ListUsage]) -> Ordering {
    usage_count(&b.id, stats)
        .cmp(&usage_count(&a.id, stats))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Assign a shortcut key to each list.
///
/// Returns mnemonic bindings in priority order followed by numeric ones.
/// Lists that could not be bound (more than nine left after the letters run
/// out) are absent from the result.
pub fn generate_smart_key_bindings(lists: &[List], stats: &[ListUsage]) -> Vec<KeyBinding> {
    generate_smart_key_bindings_reserving(lists, stats, &BTreeSet::new())
}

/// Like [`generate_smart_key_bindings`], but never hands out a key in
/// `reserved` (lowercase letters or digits already taken by actions).
pub fn generate_smart_key_bindings_reserving(
    lists: &[List],
    stats: &[ListUsage],
    reserved: &BTreeSet<char>,
) -> Vec<KeyBinding> {
    let mut sorted: Vec<&List> = lists.iter().collect();
    sorted.sort_by(|a, b| priority_order(a, b, stats));

    let mut bindings = Vec::with_capacity(sorted.len());
    let mut used = reserved.clone();
    let mut remaining = Vec::new();

    for list in sorted {
        match find_best_key(&list.name, &used) {
            Some((key, reason)) => {
                used.insert(key);
                bindings.push(KeyBinding::new(
                    list,
                    key,
                    reason,
                    usage_count(&list.id, stats),
                ));
            }
            None => remaining.push(list),
        }
    }

    let digits = ('1'..='9')
        .filter(|d| !reserved.contains(d))
        .take(MAX_NUMBER_KEYS);
    for (key, list) in digits.zip(remaining) {
        bindings.push(KeyBinding::new(
            list,
            key,
            AssignmentReason::Number,
            usage_count(&list.id, stats),
        ));
    }

    bindings
}

/// Find the binding for a pressed key. Letter keys match case-insensitively.
pub fn binding_for_key(bindings: &[KeyBinding], key: char) -> Option<&KeyBinding> {
    let key = key.to_ascii_lowercase();
    bindings.iter().find(|b| b.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lists(names: &[&str]) -> Vec<List> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| List::manual(format!("L{:02}", i), *n))
            .collect()
    }

    fn usage(list_id: &str, count: u64) -> ListUsage {
        ListUsage {
            list_id: list_id.to_string(),
            count,
            last_used: Utc::now(),
        }
    }

    fn keys(bindings: &[KeyBinding]) -> Vec<(String, char, AssignmentReason)> {
        bindings
            .iter()
            .map(|b| (b.list_name.clone(), b.key, b.reason))
            .collect()
    }

    #[test]
    fn test_find_best_key_first_letter() {
        let used = BTreeSet::new();
        assert_eq!(
            find_best_key("Work", &used),
            Some(('w', AssignmentReason::FirstLetter))
        );
    }

    #[test]
    fn test_find_best_key_skips_non_letters() {
        let used = BTreeSet::new();
        assert_eq!(
            find_best_key("2024 Taxes", &used),
            Some(('t', AssignmentReason::FirstLetter))
        );
        assert_eq!(find_best_key("2024 !!", &used), None);
        assert_eq!(find_best_key("", &used), None);
    }

    #[test]
    fn test_find_best_key_later_letter() {
        let used: BTreeSet<char> = ['w'].into_iter().collect();
        assert_eq!(
            find_best_key("Wishlist", &used),
            Some(('i', AssignmentReason::SecondLetter))
        );
    }

    #[test]
    fn test_find_best_key_fallback() {
        let used: BTreeSet<char> = ['a', 'b', 'c'].into_iter().collect();
        assert_eq!(
            find_best_key("Cab", &used),
            Some(('d', AssignmentReason::Fallback))
        );
    }

    #[test]
    fn test_find_best_key_alphabet_exhausted() {
        let used: BTreeSet<char> = ('a'..='z').collect();
        assert_eq!(find_best_key("Anything", &used), None);
    }

    #[test]
    fn test_reading_recipes_research() {
        let input = lists(&["Research", "Reading", "Recipes"]);
        let first = generate_smart_key_bindings(&input, &[]);
        assert_eq!(
            keys(&first),
            vec![
                ("Reading".to_string(), 'r', AssignmentReason::FirstLetter),
                ("Recipes".to_string(), 'e', AssignmentReason::SecondLetter),
                ("Research".to_string(), 's', AssignmentReason::SecondLetter),
            ]
        );
        for _ in 0..5 {
            assert_eq!(generate_smart_key_bindings(&input, &[]), first);
        }
    }

    #[test]
    fn test_usage_gives_first_pick() {
        let input = lists(&["Reading", "Recipes"]);
        let stats = vec![usage("L01", 7)];
        let bindings = generate_smart_key_bindings(&input, &stats);
        assert_eq!(bindings[0].list_name, "Recipes");
        assert_eq!(bindings[0].key, 'r');
        assert_eq!(bindings[0].priority, 7);
        assert_eq!(bindings[1].list_name, "Reading");
        assert_eq!(bindings[1].key, 'e');
        assert_eq!(bindings[1].priority, 0);
    }

    #[test]
    fn test_ties_sort_case_insensitively() {
        let input = lists(&["beta", "Alpha", "alps"]);
        let names: Vec<String> = generate_smart_key_bindings(&input, &[])
            .into_iter()
            .map(|b| b.list_name)
            .collect();
        assert_eq!(names, vec!["Alpha", "alps", "beta"]);
    }

    #[test]
    fn test_consonant_pass_after_letters_taken() {
        // Both letters of "Ba" are taken by then; the consonant pass finds
        // nothing free and the fallback picks 'c'.
        let input = lists(&["Ab", "Ba", "Abba"]);
        let bindings = generate_smart_key_bindings(&input, &[]);
        assert_eq!(
            keys(&bindings),
            vec![
                ("Ab".to_string(), 'a', AssignmentReason::FirstLetter),
                ("Abba".to_string(), 'b', AssignmentReason::SecondLetter),
                ("Ba".to_string(), 'c', AssignmentReason::Fallback),
            ]
        );
    }

    #[test]
    fn test_non_alphabetic_names_get_numbers() {
        let input = lists(&["2023", "Work", "2024"]);
        let bindings = generate_smart_key_bindings(&input, &[]);
        assert_eq!(
            keys(&bindings),
            vec![
                ("Work".to_string(), 'w', AssignmentReason::FirstLetter),
                ("2023".to_string(), '1', AssignmentReason::Number),
                ("2024".to_string(), '2', AssignmentReason::Number),
            ]
        );
        assert_eq!(bindings[1].description, "2023 (1)");
    }

    #[test]
    fn test_thirty_identical_names() {
        let names = vec!["List"; 30];
        let input = lists(&names);
        let bindings = generate_smart_key_bindings(&input, &[]);
        assert_eq!(bindings.len(), 30);

        let letters: Vec<char> = bindings[..26].iter().map(|b| b.key).collect();
        assert_eq!(&letters[..4], &['l', 'i', 's', 't']);
        assert_eq!(bindings[0].reason, AssignmentReason::FirstLetter);
        assert_eq!(bindings[1].reason, AssignmentReason::SecondLetter);
        assert!(bindings[4..26]
            .iter()
            .all(|b| b.reason == AssignmentReason::Fallback));
        let numbers: Vec<char> = bindings[26..].iter().map(|b| b.key).collect();
        assert_eq!(numbers, vec!['1', '2', '3', '4']);
    }

    #[test]
    fn test_pool_exhaustion_leaves_lists_unbound() {
        let names = vec!["List"; 40];
        let input = lists(&names);
        let bindings = generate_smart_key_bindings(&input, &[]);
        assert_eq!(bindings.len(), 26 + 9);

        let unique: BTreeSet<char> = bindings.iter().map(|b| b.key).collect();
        assert_eq!(unique.len(), bindings.len());
        // Same names: ids decide the order, so the tail is deterministic.
        assert_eq!(bindings.last().map(|b| b.list_id.as_str()), Some("L34"));
    }

    #[test]
    fn test_reserved_keys_are_skipped() {
        let reserved: BTreeSet<char> = ['j', 'q', '1'].into_iter().collect();
        let bindings =
            generate_smart_key_bindings_reserving(&lists(&["Journal", "Quotes", "42"]), &[], &reserved);
        let keys: Vec<(char, AssignmentReason)> =
            bindings.iter().map(|b| (b.key, b.reason)).collect();
        assert_eq!(
            keys,
            vec![
                ('o', AssignmentReason::SecondLetter),
                ('u', AssignmentReason::SecondLetter),
                ('2', AssignmentReason::Number),
            ]
        );
    }

    #[test]
    fn test_binding_for_key_case_insensitive() {
        let bindings = generate_smart_key_bindings(&lists(&["Work"]), &[]);
        assert_eq!(binding_for_key(&bindings, 'W').map(|b| b.key), Some('w'));
        assert!(binding_for_key(&bindings, 'x').is_none());
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(AssignmentReason::SecondLetter.reason_text(), "alt letter");
        assert_eq!(AssignmentReason::Fallback.reason_text(), "available");
        assert_eq!(AssignmentReason::Consonant.to_string(), "consonant");
    }
}
