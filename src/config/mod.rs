// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references, stage fields and acyclicity (`validate.rs`).
//! - Read the bundle manifest used by script bundles (`manifest.rs`).

pub mod loader;
pub mod manifest;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use manifest::BundleManifest;
pub use model::{
    BackendConfig, BackendSection, ConfigFile, ConfigSection, DefaultSection, RawConfigFile,
    StageKindConfig, TaskConfig, WatchRuleConfig,
};
