//! Implementations of the `kktriage` subcommands.
//!
//! Each `run_*` function takes the loaded [`Config`], does its work through
//! the library types, and prints human-readable output to stdout. Logs go to
//! stderr via `tracing`.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{KarakeepClient, ListsApi};
use crate::config::Config;
use crate::keybind::KeyBinding;
use crate::keymap::{
    format_key_combo, load_layout, save_layout, smart_keyboard_config, KeyEvent, KeyboardLayout,
    LayoutName, SmartKeyboardConfig,
};
use crate::membership::MembershipIndex;
use crate::models::{assignable_lists, ListKind};
use crate::storage::JsonFileStore;
use crate::triage::{failure_notice, ApplyOutcome, KeyOutcome, TriageSession};
use crate::usage::load_list_usage;

/// Runtime objects shared by the API-backed commands.
pub struct Session {
    pub api: Arc<dyn ListsApi>,
    pub index: MembershipIndex,
    pub store: JsonFileStore,
}

impl Session {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api: Arc<dyn ListsApi> = Arc::new(KarakeepClient::from_config(config)?);
        Ok(Self::with_api(config, api))
    }

    /// Build around an existing API implementation.
    pub fn with_api(config: &Config, api: Arc<dyn ListsApi>) -> Self {
        Self {
            index: MembershipIndex::new(api.clone(), config.crawl.concurrency),
            store: JsonFileStore::new(&config.storage.path),
            api,
        }
    }

    /// The stored layout with smart bindings for the assignable lists,
    /// ranked by stored usage.
    pub async fn keyboard(&self) -> Result<SmartKeyboardConfig> {
        let lists = self.api.list_lists().await?;
        let usage = load_list_usage(&self.store)?;
        let layout = load_layout(&self.store)?;
        Ok(smart_keyboard_config(layout, &assignable_lists(&lists), &usage))
    }
}

pub async fn run_lists(config: &Config) -> Result<()> {
    let session = Session::from_config(config)?;
    let lists = session.api.list_lists().await?;

    println!("{:<8} {:<28} NAME", "KIND", "ID");
    for list in &lists {
        let kind = match list.kind {
            ListKind::Manual => "manual",
            ListKind::Smart => "smart",
        };
        let name = match &list.icon {
            Some(icon) => format!("{} {}", icon, list.name),
            None => list.name.clone(),
        };
        println!("{:<8} {:<28} {}", kind, list.id, name);
    }
    Ok(())
}

pub fn print_bindings(out: &mut impl Write, bindings: &[KeyBinding]) -> Result<()> {
    writeln!(out, "{:<4} {:<14} {:<6} LIST", "KEY", "REASON", "USES")?;
    for b in bindings {
        writeln!(
            out,
            "{:<4} {:<14} {:<6} {}",
            b.key,
            b.reason.reason_text(),
            b.priority,
            b.list_name
        )?;
    }
    Ok(())
}

pub async fn run_keys(config: &Config) -> Result<()> {
    let session = Session::from_config(config)?;
    let keyboard = session.keyboard().await?;
    print_bindings(&mut std::io::stdout(), &keyboard.bindings)
}

pub async fn run_memberships(config: &Config, bookmark_id: &str) -> Result<()> {
    let session = Session::from_config(config)?;
    session.index.initialize().await?;

    let lists = session.index.lists_for_bookmark(bookmark_id);
    if lists.is_empty() {
        println!("Bookmark {} is not in any list.", bookmark_id);
    }
    for list_id in lists {
        println!("{}", list_id);
    }
    Ok(())
}

pub async fn run_add(config: &Config, bookmark_id: &str, list_ids: &[String]) -> Result<()> {
    let session = Session::from_config(config)?;
    session.index.initialize().await?;

    let existing = session.index.lists_for_bookmark(bookmark_id);
    let (already, to_add): (Vec<String>, Vec<String>) =
        list_ids.iter().cloned().partition(|id| existing.contains(id));
    for list_id in &already {
        println!("Already in list {}", list_id);
    }
    if to_add.is_empty() {
        return Ok(());
    }

    match session.index.add_bookmark_to_lists(bookmark_id, &to_add).await {
        Ok(()) => {
            println!("Added {} to {} list(s).", bookmark_id, to_add.len());
            Ok(())
        }
        Err(e) => {
            for list_id in &e.succeeded {
                println!("Added {} to {}", bookmark_id, list_id);
            }
            Err(e.into())
        }
    }
}

pub async fn run_remove(config: &Config, bookmark_id: &str, list_id: &str) -> Result<()> {
    let session = Session::from_config(config)?;
    session.index.initialize().await?;
    session
        .index
        .remove_bookmark_from_list(bookmark_id, list_id)
        .await
        .with_context(|| format!("Failed to remove {} from list {}", bookmark_id, list_id))?;
    println!("Removed {} from list {}.", bookmark_id, list_id);
    Ok(())
}

pub fn run_usage(config: &Config) -> Result<()> {
    let store = JsonFileStore::new(&config.storage.path);
    let mut usage = load_list_usage(&store)?;
    usage.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.list_id.cmp(&b.list_id)));

    if usage.is_empty() {
        println!("No list usage recorded yet.");
        return Ok(());
    }
    println!("{:<28} {:<6} LAST USED", "LIST", "COUNT");
    for u in usage {
        println!(
            "{:<28} {:<6} {}",
            u.list_id,
            u.count,
            u.last_used.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let session = Session::from_config(config)?;
    session.index.initialize().await?;
    let stats = session.index.debug_info();
    println!("bookmarks:   {}", stats.bookmark_count);
    println!("memberships: {}", stats.total_memberships);
    Ok(())
}

pub fn run_layout(config: &Config, name: Option<&str>) -> Result<()> {
    let store = JsonFileStore::new(&config.storage.path);
    let layout_name = match name {
        Some(n) => {
            let parsed: LayoutName = n.parse()?;
            save_layout(&store, parsed)?;
            println!("Keyboard layout set to {}.", parsed);
            parsed
        }
        None => load_layout(&store)?,
    };

    let layout = layout_name.layout();
    println!("Layout: {}", layout_name);
    for b in layout.actions() {
        println!("  {:<8} {}", format_key_combo(b), b.description);
    }
    let keys: Vec<&str> = layout.list_keys.iter().map(|k| k.key.as_str()).collect();
    println!("  lists    {}", keys.join(" "));
    Ok(())
}

/// Interactive triage over every unarchived bookmark that is in no manual
/// list, reading commands from stdin.
pub async fn run_triage(config: &Config) -> Result<()> {
    let session = Session::from_config(config)?;
    session.index.initialize().await?;

    let inbox = session.api.list_inbox_bookmarks().await?;
    let queue = session.index.bookmarks_without_lists(&inbox);
    let keyboard = session.keyboard().await?;

    let mut triage = TriageSession::new(&session.index, &session.store, keyboard.bindings, queue);
    let stdin = std::io::stdin();
    triage_loop(
        &mut triage,
        &keyboard.layout,
        stdin.lock(),
        &mut std::io::stdout(),
    )
    .await
}

const TRIAGE_HELP: &str = "\
Type a key and press Enter. List keys toggle a list; single-key actions of
the layout work as typed. An empty line applies and moves on.
  /skip   next bookmark without applying
  /prev   previous bookmark
  /back   apply, then go to the previous bookmark
  /keys   show keys
  /quit   leave triage";

fn print_current(out: &mut impl Write, triage: &TriageSession<'_>) -> Result<()> {
    match triage.current() {
        Some(b) => {
            write!(
                out,
                "[{}/{}] {}",
                triage.position() + 1,
                triage.remaining(),
                b.label()
            )?;
            if !triage.selected_lists().is_empty() {
                let names: Vec<&str> = triage
                    .bindings()
                    .iter()
                    .filter(|k| triage.selected_lists().contains(&k.list_id))
                    .map(|k| k.list_name.as_str())
                    .collect();
                write!(out, "  -> {}", names.join(", "))?;
            }
            writeln!(out)?;
        }
        None => writeln!(out, "No more bookmarks to process.")?,
    }
    Ok(())
}

/// The key event a line of input stands for.
///
/// Named commands send the layout's own binding for the action, so they go
/// through the same dispatch as a typed key. `None` for lines that are not
/// a key.
fn line_event(layout: &KeyboardLayout, line: &str) -> Option<KeyEvent> {
    let binding = match line {
        "" => Some(&layout.apply_and_next),
        "/skip" => Some(&layout.skip_to_next),
        "/back" => Some(&layout.apply_and_prev),
        "/quit" => Some(&layout.quit),
        "/prev" => layout.previous.as_ref(),
        _ => None,
    };
    if let Some(b) = binding {
        return Some(KeyEvent::for_binding(b));
    }
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Some(KeyEvent::plain(key.to_string())),
        _ => None,
    }
}

fn print_keys(out: &mut impl Write, layout: &KeyboardLayout, bindings: &[KeyBinding]) -> Result<()> {
    for b in layout.actions() {
        writeln!(out, "{:<8} {}", format_key_combo(b), b.description)?;
    }
    print_bindings(out, bindings)
}

/// Drive `triage` from line-oriented `input`, dispatching each line as a
/// key press through `layout`, and write prompts to `out`.
pub async fn triage_loop<R: BufRead>(
    triage: &mut TriageSession<'_>,
    layout: &KeyboardLayout,
    input: R,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", TRIAGE_HELP)?;
    print_keys(out, layout, triage.bindings())?;
    print_current(out, triage)?;

    for line in input.lines() {
        let line = line?;
        let cmd = line.trim();

        if cmd == "/keys" {
            print_keys(out, layout, triage.bindings())?;
            continue;
        }
        if cmd == "/prev" && layout.previous.is_none() {
            triage.previous();
            print_current(out, triage)?;
            continue;
        }
        let Some(event) = line_event(layout, cmd) else {
            writeln!(out, "Unknown command: {}", cmd)?;
            continue;
        };

        match triage.handle_key(layout, &event).await {
            Ok(KeyOutcome::Quit) => break,
            Ok(KeyOutcome::Ignored) => {
                writeln!(out, "No list bound to '{}'.", event.key)?;
                continue;
            }
            Ok(KeyOutcome::Applied(outcome)) => {
                writeln!(out, "{}", outcome.notice())?;
                if outcome == ApplyOutcome::NoBookmark {
                    break;
                }
            }
            Ok(KeyOutcome::Toggled(_)) | Ok(KeyOutcome::Moved) => {}
            Err(e) => writeln!(out, "{}", failure_notice(&e))?,
        }

        print_current(out, triage)?;
    }

    if let Some(notice) = triage.quit_notice() {
        writeln!(out, "{}", notice)?;
    }
    Ok(())
}
