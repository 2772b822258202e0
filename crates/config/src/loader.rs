use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    error::{ConfigError, Result},
    env_subst::substitute_env,
    schema::RingleConfig,
};

/// Config file names, checked in order in each search directory.
pub const CONFIG_FILENAMES: &[&str] = &["ringle.toml", "ringle.yaml", "ringle.yml", "ringle.json"];

const APP_NAME: &str = "ringle";

/// Read, env-substitute and parse a config file. The format follows the
/// file extension.
pub fn load_config(path: &Path) -> Result<RingleConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Load from `explicit` when given, otherwise from the first file found in
/// `./` then the user config directory. A broken or missing file yields the
/// defaults. Environment overrides are applied last.
pub fn discover_and_load(explicit: Option<&Path>) -> RingleConfig {
    let path = explicit.map(Path::to_path_buf).or_else(find_config_file);
    let mut cfg = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                RingleConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            RingleConfig::default()
        },
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// First existing config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// User-global config directory, e.g. `~/.config/ringle/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|d| d.config_dir().to_path_buf())
}

/// User-global data directory holding the memory database.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ringle"))
}

/// Memory database path: the configured one or `<data dir>/memory.db`.
pub fn memory_db_path(cfg: &RingleConfig) -> PathBuf {
    cfg.memory
        .db_path
        .clone()
        .unwrap_or_else(|| data_dir().join("memory.db"))
}

/// Apply well-known environment variables on top of the file config.
pub fn apply_env_overrides(cfg: &mut RingleConfig) {
    apply_env_overrides_with(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_with(
    cfg: &mut RingleConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("OPENAI_API_KEY") {
        cfg.provider.api_key = Some(Secret::new(key));
    }
    if let Some(model) = get("RINGLE_MODEL") {
        cfg.provider.model = model;
    }
    if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
        cfg.channels.telegram.token = Some(Secret::new(token));
        cfg.channels.telegram.enabled = true;
    }
    if let Some(target) = get("TARGET_PHONE_NUMBER") {
        cfg.channels.imessage.target = Some(target);
        cfg.channels.imessage.enabled = true;
    }
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> Result<RingleConfig> {
    match extension(path) {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

pub(crate) fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}
