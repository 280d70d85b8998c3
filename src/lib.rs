//! # Karakeep Triage
//!
//! Client-side core for sorting unfiled Karakeep bookmarks into lists.
//!
//! Karakeep's API only answers "which bookmarks are in list L", so answering
//! "which lists is bookmark B in" means crawling every list. This crate keeps
//! that reverse mapping in a [`membership::MembershipIndex`] built once per
//! session and updated only after the server confirms each change. On top of
//! it, [`keybind`] assigns each list a single mnemonic key, ranked by how often
//! the user picks it, and [`triage`] drives the file-and-advance loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Karakeep API │──▶│ MembershipIndex  │──▶│ TriageSession│
//! │  (reqwest)   │   │ bookmark → lists │   │ queue + keys │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  │
//!                    ┌──────────────┐              │
//!                    │ usage store  │◀─────────────┘
//!                    │ (JSON file)  │──▶ key bindings
//!                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`api`] | Karakeep HTTP client and the [`api::ListsApi`] seam |
//! | [`membership`] | Bookmark → lists cache with single-flight initialization |
//! | [`triage`] | Headless triage session |
//! | [`keybind`] | Smart key assignment (re-exported from the core crate) |
//! | [`keymap`] | Keyboard layouts and key matching (core crate) |
//! | [`usage`] | Persisted list usage statistics (core crate) |
//! | [`storage`] | JSON-file key-value store |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed API errors |
//! | [`commands`] | `kktriage` subcommand implementations |
//! | [`logging`] | Tracing subscriber setup |

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod membership;
pub mod storage;
pub mod triage;

pub use karakeep_triage_core::{keybind, keymap, models, store, usage};
