// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::manifest::BundleManifest;
use crate::config::model::{ConfigFile, RawConfigFile, StageKindConfig};
use crate::errors::{AssetdagError, Result};
use crate::types::Environment;

/// Environment variable overriding `[config].environment`.
pub const ENVIRONMENT_ENV_VAR: &str = "ASSETDAG_ENVIRONMENT";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (DAG correctness, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        AssetdagError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML and applies the `ASSETDAG_ENVIRONMENT` override.
/// - Checks task references, stage fields, watch rules and acyclicity.
/// - Roots all relative paths at the config file's directory.
/// - Reads the bundle manifest and checks every bundle task against it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;

    if let Some(env) = environment_override()? {
        debug!(%env, "environment overridden by {ENVIRONMENT_ENV_VAR}");
        raw_config.config.environment = env;
    }

    let config = ConfigFile::try_from(raw_config)?.with_root(config_root_dir(path));
    attach_manifest(config)
}

/// Read the manifest (if configured) and make sure every bundle task names a
/// bundle it contains.
pub fn attach_manifest(config: ConfigFile) -> Result<ConfigFile> {
    let manifest = match config.manifest_path() {
        Some(path) => BundleManifest::load(&path)?,
        None => BundleManifest::default(),
    };

    for (name, task) in config.tasks() {
        if task.stage != StageKindConfig::Bundle {
            continue;
        }
        let bundle = task.bundle.as_deref().unwrap_or(name);
        if config.config.manifest.is_none() {
            return Err(AssetdagError::ConfigError(format!(
                "task '{name}' is a bundle but [config].manifest is not set"
            )));
        }
        if !manifest.contains(bundle) {
            return Err(AssetdagError::ConfigError(format!(
                "task '{name}' refers to bundle '{bundle}' which is not in the manifest"
            )));
        }
    }

    Ok(config.with_manifest(manifest))
}

fn environment_override() -> Result<Option<Environment>> {
    match std::env::var(ENVIRONMENT_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => value
            .parse::<Environment>()
            .map(Some)
            .map_err(|e| AssetdagError::ConfigError(format!("{ENVIRONMENT_ENV_VAR}: {e}"))),
        _ => Ok(None),
    }
}

/// Figure out the project root for a config path.
///
/// - If the config path has a non-empty parent (e.g. "configs/Assetdag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetdag.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
