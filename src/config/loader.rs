// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::defaults::DEFAULT_CONFIG;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TickdagError};
use crate::fs::FileSystem;

/// Parse a schedule document without semantic validation.
pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Parse and fully validate a schedule document held in memory.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    ConfigFile::try_from(parse_raw(contents)?)
}

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (DAG correctness, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs
        .read_to_string(path)
        .map_err(|e| TickdagError::ConfigError(format!("cannot read {}: {e:#}", path.display())))?;
    parse_raw(&contents)
}

/// Load a configuration file from path and run full validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Builds job definitions and checks ids, triggers, dependencies and cycles.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(fs, &path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Like [`load_and_validate`], but writes [`DEFAULT_CONFIG`] first when the
/// file does not exist.
pub fn load_or_init(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !fs.exists(path) {
        fs.write(path, DEFAULT_CONFIG.as_bytes())?;
        info!(path = %path.display(), "schedule file not found; wrote default schedule");
    }
    load_and_validate(fs, path)
}

/// Default schedule path: `Tickdag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Tickdag.toml")
}

/// Resolve `state_dir` against the directory holding the config file.
pub fn resolve_state_dir(config_path: &Path, state_dir: &str) -> PathBuf {
    let state_dir = Path::new(state_dir);
    if state_dir.is_absolute() {
        return state_dir.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(state_dir),
        _ => state_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::schedule::TriggerSpec;

    #[test]
    fn default_document_is_valid() {
        let cfg = load_from_str(DEFAULT_CONFIG).unwrap();
        let ids: Vec<&str> = cfg.jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "start_trading",
                "stop_trading",
                "evaluate",
                "report",
                "maintenance",
                "health_check"
            ]
        );

        let health = &cfg.jobs[5];
        assert_eq!(health.priority, 0);
        assert_eq!(
            health.trigger,
            TriggerSpec::Interval(std::time::Duration::from_secs(60))
        );
        assert_eq!(cfg.jobs[2].depends_on[0].job, "start_trading");
    }

    #[test]
    fn load_or_init_writes_default_when_missing() {
        let fs = MockFileSystem::new();
        let path = Path::new("/etc/tickdag/Tickdag.toml");

        let cfg = load_or_init(&fs, path).unwrap();
        assert_eq!(cfg.jobs.len(), 6);
        assert_eq!(fs.contents(path).as_deref(), Some(DEFAULT_CONFIG));
    }

    #[test]
    fn load_or_init_keeps_existing_file() {
        let fs = MockFileSystem::new();
        let path = Path::new("Tickdag.toml");
        fs.add_file(
            path,
            "[[job]]\nid = \"only\"\ntask = \"log\"\ntrigger = \"interval\"\ninterval = { seconds = 10 }\n",
        );

        let cfg = load_or_init(&fs, path).unwrap();
        assert_eq!(cfg.jobs.len(), 1);
        assert_eq!(cfg.jobs[0].id, "only");
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let fs = MockFileSystem::new();
        let err = load_and_validate(&fs, "missing.toml").unwrap_err();
        assert!(matches!(err, TickdagError::ConfigError(_)));
    }

    #[test]
    fn state_dir_is_relative_to_config_dir() {
        assert_eq!(
            resolve_state_dir(Path::new("conf/Tickdag.toml"), ".tickdag"),
            PathBuf::from("conf/.tickdag")
        );
        assert_eq!(
            resolve_state_dir(Path::new("Tickdag.toml"), ".tickdag"),
            PathBuf::from(".tickdag")
        );
        assert_eq!(
            resolve_state_dir(Path::new("conf/Tickdag.toml"), "/var/lib/tickdag"),
            PathBuf::from("/var/lib/tickdag")
        );
    }
}
