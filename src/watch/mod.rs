// src/watch/mod.rs

//! File watching and change routing.
//!
//! This module is responsible for:
//! - Compiling watch rules and exclude globs (`patterns`).
//! - Turning changed paths into coalesced run requests (`router`).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does **not** know about task dependencies; it only turns filesystem
//! changes into requests for the tasks named by matching rules.

pub mod path_utils;
pub mod patterns;
pub mod router;
pub mod watcher;

pub use patterns::{build_globset, compile_glob, split_glob_base, RuleSet, WatchRule};
pub use router::WatchRouter;
pub use watcher::{spawn_watcher, WatcherHandle};
