//! Config file discovery and layered loading.
//!
//! Implements the `KernelConfig::load()` algorithm (SPEC_FULL §10):
//! 1. Parse embedded defaults → base
//! 2. Merge `/etc/mozi/config.toml` (system)
//! 3. Merge `${MOZI_HOME:-~/.mozi}/config.toml` (user)
//! 4. Merge `{workspace}/.mozi/config.toml` (workspace)
//! 5. Apply `MOZI_*` env var fallbacks for unset fields
//! 6. Resolve `${VAR}` references
//! 7. Deserialize merged tree → `KernelConfig`
//! 8. Validate
//! 9. Return

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::KernelConfig;
use crate::validate;

const DEFAULTS_TOML: &str = "";

/// Load the unified configuration with layered file precedence.
///
/// `workspace_root` is the root of the current project; if `None`, the
/// workspace layer is skipped. `mozi_home_override` provides an alternate
/// home directory for user-level config discovery, bypassing the default
/// search logic and `MOZI_HOME`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, mozi_home_override: Option<&Path>) -> ConfigResult<KernelConfig> {
    let env_vars = collect_env_vars();
    let home_dir = if let Some(h) = mozi_home_override {
        h.to_path_buf()
    } else {
        home_directory()?
    };

    let mut merged: toml::Value = if DEFAULTS_TOML.is_empty() {
        toml::Value::Table(toml::map::Map::new())
    } else {
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?
    };

    let system_path = PathBuf::from("/etc/mozi/config.toml");
    if let Some(overlay) = try_load_file(&system_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %system_path.display(), "loaded system config");
    }

    let user_path = if let Some(h) = mozi_home_override {
        h.join("config.toml")
    } else if let Some(mozi_home) = env_vars.get("MOZI_HOME") {
        PathBuf::from(mozi_home).join("config.toml")
    } else {
        home_dir.join(".mozi").join("config.toml")
    };
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(".mozi").join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    resolve_env_references(&mut merged, &env_vars);

    let config: KernelConfig = merged.try_into().map_err(|e: toml::de::Error| ConfigError::ParseError {
        path: "<merged config>".to_owned(),
        source: e,
    })?;

    validate::validate(&config)?;

    Ok(config)
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<KernelConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: KernelConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if it doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races between an existence
/// check and the read.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_files_uses_defaults() {
        let config = KernelConfig::default();
        assert!(validate::validate(&config).is_ok());
    }

    #[test]
    fn load_file_nonexistent_errors() {
        let result = load_file(Path::new("/nonexistent/mozi-config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn try_load_file_missing_returns_none() {
        let result = try_load_file(Path::new("/nonexistent/mozi-config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_file_rejects_invalid_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[queue]\nmode = \"bogus\"\n").unwrap();
        let result = load_file(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn load_file_merges_with_defaults_for_unset_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[queue]\nmode = \"collect\"\n").unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.queue.mode, "collect");
        assert_eq!(config.queue.poll_interval_ms, 250);
    }

    #[test]
    fn load_with_home_override_reads_user_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[agent]\ndefault_agent_id = \"otto\"\n").unwrap();
        let config = load(None, Some(dir.path())).unwrap();
        assert_eq!(config.agent.default_agent_id, "otto");
    }
}
