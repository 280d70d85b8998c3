//! # Karakeep Triage Core
//!
//! Runtime-free logic for Karakeep triage: list models, the smart key
//! assignment engine, usage counters, keyboard layouts, and the key-value
//! store trait they persist through.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O, so it can be
//! embedded in a browser build or any other front end.

pub mod keybind;
pub mod keymap;
pub mod models;
pub mod store;
pub mod usage;
