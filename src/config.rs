use crate::types::*;
use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        repo_root().join(path)
    }
}

/// `AUCTION_CONFIG` overrides the default `config.json` next to the manifest.
pub fn config_path() -> PathBuf {
    match env_default("AUCTION_CONFIG") {
        Some(raw) => resolve_repo_path(&raw),
        None => repo_root().join("config.json"),
    }
}

pub fn env_default(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
    if config.backend_host.trim().is_empty() {
        if let Some(value) = env_default("BACKEND_HOST") {
            config.backend_host = value;
        }
    }
    if config.backend_port == 0 {
        if let Some(port) = env_default("BACKEND_PORT").and_then(|value| value.parse::<u16>().ok()) {
            config.backend_port = port;
        }
    }
    config
}

pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
    if !path.is_file() {
        return Ok(apply_env_defaults(AppConfig::default()));
    }
    let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
    let config =
        serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
    Ok(apply_env_defaults(config))
}

pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
    fs::write(path, payload).map_err(|e| format!("write config {}: {e}", path.display()))
}

/// Host and port the client talks to, falling back to the local defaults.
pub fn backend_address(config: &AppConfig) -> (String, u16) {
    let host = if config.backend_host.trim().is_empty() {
        DEFAULT_BACKEND_HOST.to_string()
    } else {
        config.backend_host.trim().to_string()
    };
    let port = if config.backend_port == 0 {
        DEFAULT_BACKEND_PORT
    } else {
        config.backend_port
    };
    (host, port)
}

/// `.env` files to read, nearest first: the working directory, then the
/// manifest directory when it differs.
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join(".env"));
    }
    let manifest = repo_root().join(".env");
    if !candidates.contains(&manifest) {
        candidates.push(manifest);
    }
    candidates
}

pub fn load_env_file() {
    for path in env_file_candidates() {
        load_env_from(&path);
    }
}

/// Applies one `.env` file and returns how many variables it set. Variables
/// already in the environment, including ones set by a nearer file, win.
pub fn load_env_from(path: &Path) -> usize {
    let contents = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return 0,
    };
    let mut applied = 0;
    for (key, value) in contents.lines().filter_map(parse_env_line) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
            applied += 1;
        }
    }
    applied
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, raw_value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let mut value = raw_value.trim();
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value = &value[1..value.len() - 1];
    } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
        value = &value[1..value.len() - 1];
    } else if let Some(idx) = value.find('#') {
        value = value[..idx].trim_end();
    }
    Some((key.to_string(), value.to_string()))
}

pub fn log_env_warnings(config: &AppConfig) {
    let mut warnings = Vec::new();

    if config.backend_host.trim().is_empty() {
        warnings.push(format!("BACKEND_HOST not set and no host in config, using {DEFAULT_BACKEND_HOST}"));
    }
    if config.backend_port == 0 {
        warnings.push(format!("BACKEND_PORT not set and no port in config, using {DEFAULT_BACKEND_PORT}"));
    }
    if config.quick_bid_increments.iter().any(|step| *step == 0) {
        warnings.push("quickBidIncrements contains 0, those buttons will always be rejected".to_string());
    }

    for msg in warnings {
        tracing::warn!("{}", msg);
    }
}
