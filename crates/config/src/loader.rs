use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    anyhow::Context,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::ChromaConfig};

/// File names tried in each directory; the first match wins.
const CONFIG_FILENAMES: &[&str] = &["chroma.toml", "chroma.yaml", "chroma.yml", "chroma.json"];

/// Environment variable pointing discovery at a single directory.
const CONFIG_DIR_ENV: &str = "CHROMA_CONFIG_DIR";

/// Directory pinned by `set_config_dir()`, taking precedence over the env var.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Restrict discovery to `path`. The working directory and `~/.config/chroma`
/// are no longer searched.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path);
}

/// Undo [`set_config_dir`].
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
    {
        return Some(dir);
    }
    std::env::var_os(CONFIG_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Read one config file; the extension picks the format.
pub fn load_config(path: &Path) -> anyhow::Result<ChromaConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Locate and load the active config.
///
/// Search order:
/// 1. `./chroma.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/chroma/chroma.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to the built-in testnet defaults, writing them out when no file
/// exists yet.
pub fn discover_and_load() -> ChromaConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, writing default config");
        let config = ChromaConfig::default();
        if let Err(e) = write_default_config(&config) {
            warn!(error = %e, "failed to write default config file");
        }
        return config;
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            ChromaConfig::default()
        },
    }
}

/// First existing config file, honouring the directory override.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    let first_in = |dir: &Path| {
        CONFIG_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
    };

    if let Some(dir) = config_dir_override() {
        return first_in(&dir);
    }

    first_in(Path::new(".")).or_else(|| home_config_dir().and_then(|dir| first_in(&dir)))
}

/// Returns the config directory: override, or `~/.config/chroma/`.
pub fn config_dir() -> Option<PathBuf> {
    config_dir_override().or_else(home_config_dir)
}

fn home_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("chroma"))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chroma.toml")
}

/// Write the default config file. Only called when no config file exists yet.
fn write_default_config(config: &ChromaConfig) -> anyhow::Result<()> {
    let path = find_or_default_config_path();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(&path, &toml_str)?;
    debug!(path = %path.display(), "wrote default config file");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ChromaConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("chroma.toml");
        std::fs::write(&toml_path, "[contract]\ncontract_id = \"a.testnet\"\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().contract.contract_id, "a.testnet");

        let yaml_path = dir.path().join("chroma.yaml");
        std::fs::write(&yaml_path, "wallet:\n  callback_port: 4000\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().wallet.callback_port, 4000);

        let json_path = dir.path().join("chroma.json");
        std::fs::write(&json_path, r#"{"network":{"network_id":"mainnet"}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().network.network_id, "mainnet");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chroma.ini");
        std::fs::write(&path, "").unwrap();
        let err = format!("{:#}", load_config(&path).unwrap_err());
        assert!(err.contains("unsupported config format"), "{err}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("chroma.toml")).is_err());
    }

    #[test]
    fn discovery_writes_defaults_into_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        set_config_dir(dir.path().to_path_buf());

        let cfg = discover_and_load();
        assert_eq!(cfg, ChromaConfig::default());
        let written = dir.path().join("chroma.toml");
        assert!(written.exists());
        assert_eq!(load_config(&written).unwrap(), ChromaConfig::default());

        clear_config_dir();
    }
}
