use crate::homebrew;
use crate::platform::HostEnv;
use crate::types::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = ".autonomix";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// `$AUTONOMIX_HOME`, or `~/.autonomix`.
pub fn get_config_dir() -> Result<PathBuf> {
    let path = match std::env::var_os("AUTONOMIX_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(CONFIG_DIR_NAME),
    };
    tracing::debug!("Config directory: {}", path.display());
    Ok(path)
}

pub fn get_config_file_path() -> Result<PathBuf> {
    let path = get_config_dir()?.join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

pub fn load_app_store() -> Result<AppStore> {
    let mut store = load_from(&get_config_file_path()?)?;
    apply_env_overrides(&mut store.settings);
    Ok(store)
}

pub fn load_from(config_path: &Path) -> Result<AppStore> {
    if !config_path.exists() {
        return Ok(AppStore::default());
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Could not read config file at {}", config_path.display()))?;

    serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(method) = std::env::var("AUTONOMIX_INSTALL_METHOD") {
        match method.parse::<InstallMethod>() {
            Ok(method) => settings.default_method = method,
            Err(e) => tracing::warn!("Ignoring AUTONOMIX_INSTALL_METHOD: {}", e),
        }
    }

    if let Ok(api) = std::env::var("AUTONOMIX_GITHUB_API") {
        if !api.trim().is_empty() {
            settings.github_api_url = api.trim().to_string();
        }
    }
}

pub fn save_app_store(store: &mut AppStore, env: &HostEnv) -> Result<()> {
    backfill_install_methods(store, env);
    save_to(&get_config_file_path()?, store)
}

pub fn save_to(config_path: &Path, store: &AppStore) -> Result<()> {
    let config_dir = config_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Invalid config path"))?;

    fs::create_dir_all(config_dir)?;

    let content = serde_json::to_string_pretty(store)?;
    fs::write(config_path, content)
        .with_context(|| format!("Could not write config file at {}", config_path.display()))?;

    Ok(())
}

/// Records that were installed outside autonomix get a method and path from
/// whatever `PATH` turns up.
pub fn backfill_install_methods(store: &mut AppStore, env: &HostEnv) {
    for app in store
        .apps
        .iter_mut()
        .filter(|a| a.install_method.is_none() && !a.installed_version.is_empty())
    {
        let Some(path) = env.find_executable(&app.name) else {
            continue;
        };
        let path_str = path.to_string_lossy().to_string();

        let under_brew = path_str.contains("/Cellar/") || path_str.contains("/homebrew/");
        let method = if under_brew && homebrew::is_installed_via_brew(&app.name) {
            Strategy::Homebrew
        } else {
            Strategy::Binary
        };

        tracing::debug!("Detected {} install of {} at {}", method, app.name, path_str);
        app.install_method = Some(method);
        app.binary_path = Some(path_str);
    }
}
