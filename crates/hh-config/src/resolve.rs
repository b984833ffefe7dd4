//! Locating `engine.json`.
//!
//! Candidates are tried in a fixed order and the first file that exists
//! wins: `--config`, `HH_CONFIG`, `HH_CONFIG_DIR/engine.json`,
//! `~/.config/hot-hand/engine.json`, `/etc/hot-hand/engine.json`. When none
//! exists the engine runs on built-in defaults.

use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "HH_CONFIG";
pub const ENV_CONFIG_DIR: &str = "HH_CONFIG_DIR";

pub const ENGINE_FILENAME: &str = "engine.json";

const APP_DIR: &str = "hot-hand";

/// Outcome of the search.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// None when the defaults apply.
    pub engine: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Which rung of the search produced the config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    /// `HH_CONFIG` or `HH_CONFIG_DIR`.
    Environment,
    XdgConfig,
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl ConfigSource {
    /// Token used in run summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::CliArgument => "cli",
            Self::Environment => "env",
            Self::XdgConfig => "xdg",
            Self::SystemConfig => "system",
            Self::BuiltinDefault => "default",
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Search for the engine config using the process environment.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    resolve_with(cli_path, |key| std::env::var(key).ok(), xdg_config_dir())
}

/// Search with an injected environment and user config dir.
pub fn resolve_with<F>(cli_path: Option<&Path>, env: F, xdg_dir: Option<PathBuf>) -> ConfigPaths
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates: Vec<(ConfigSource, PathBuf)> = Vec::with_capacity(5);
    if let Some(path) = cli_path {
        candidates.push((ConfigSource::CliArgument, path.to_path_buf()));
    }
    if let Some(path) = env(ENV_CONFIG_PATH) {
        candidates.push((ConfigSource::Environment, PathBuf::from(path)));
    }
    if let Some(dir) = env(ENV_CONFIG_DIR) {
        candidates.push((ConfigSource::Environment, Path::new(&dir).join(ENGINE_FILENAME)));
    }
    if let Some(dir) = xdg_dir {
        candidates.push((ConfigSource::XdgConfig, dir.join(ENGINE_FILENAME)));
    }
    candidates.push((
        ConfigSource::SystemConfig,
        system_config_dir().join(ENGINE_FILENAME),
    ));

    candidates
        .into_iter()
        .find(|(_, path)| path.is_file())
        .map(|(source, path)| ConfigPaths {
            engine: Some(path),
            source,
        })
        .unwrap_or_default()
}

/// `$XDG_CONFIG_HOME/hot-hand` (or the platform equivalent).
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

pub fn system_config_dir() -> PathBuf {
    Path::new("/etc").join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn labels() {
        assert_eq!(ConfigSource::CliArgument.to_string(), "cli");
        assert_eq!(ConfigSource::BuiltinDefault.to_string(), "default");
        assert_eq!(ConfigSource::default(), ConfigSource::BuiltinDefault);
    }

    #[test]
    fn cli_path_wins_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("cli.json");
        let env_file = dir.path().join("env.json");
        std::fs::write(&cli, "{}").unwrap();
        std::fs::write(&env_file, "{}").unwrap();
        let env_str = env_file.to_string_lossy().into_owned();

        let paths = resolve_with(
            Some(&cli),
            |key| (key == ENV_CONFIG_PATH).then(|| env_str.clone()),
            None,
        );
        assert_eq!(paths.source, ConfigSource::CliArgument);
        assert_eq!(paths.engine.as_deref(), Some(cli.as_path()));
    }

    #[test]
    fn missing_cli_path_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let xdg = dir.path().join("xdg");
        std::fs::create_dir_all(&xdg).unwrap();
        std::fs::write(xdg.join(ENGINE_FILENAME), "{}").unwrap();

        let paths = resolve_with(Some(&dir.path().join("absent.json")), no_env, Some(xdg.clone()));
        assert_eq!(paths.source, ConfigSource::XdgConfig);
        assert_eq!(paths.engine, Some(xdg.join(ENGINE_FILENAME)));
    }

    #[test]
    fn config_dir_env_is_searched_for_engine_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENGINE_FILENAME), "{}").unwrap();
        let dir_str = dir.path().to_string_lossy().into_owned();

        let paths = resolve_with(
            None,
            |key| (key == ENV_CONFIG_DIR).then(|| dir_str.clone()),
            None,
        );
        assert_eq!(paths.source, ConfigSource::Environment);
    }

    #[test]
    fn directory_is_not_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = resolve_with(Some(dir.path()), no_env, None);
        assert_ne!(paths.source, ConfigSource::CliArgument);
    }

    #[test]
    fn system_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/hot-hand"));
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_DIR));
        }
    }
}
