use anyhow::{bail, Context};
use std::path::PathBuf;

const APP_DIR: &str = "glyph";
const CONFIG_FILE: &str = "config.toml";

/// `<user config dir>/glyph/config.toml`. The file may not exist.
pub fn config_path() -> anyhow::Result<PathBuf> {
    config_path_from(|key| std::env::var_os(key).map(PathBuf::from))
}

fn config_path_from(lookup: impl Fn(&str) -> Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let base = user_config_dir(lookup).context("cannot locate config dir")?;
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}

/// The platform's per-user config directory.
#[cfg(target_os = "windows")]
fn user_config_dir(lookup: impl Fn(&str) -> Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match lookup("APPDATA").filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => Ok(dir),
        None => bail!("%AppData% is not defined"),
    }
}

#[cfg(target_os = "macos")]
fn user_config_dir(lookup: impl Fn(&str) -> Option<PathBuf>) -> anyhow::Result<PathBuf> {
    Ok(home(&lookup)?.join("Library").join("Application Support"))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn user_config_dir(lookup: impl Fn(&str) -> Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match lookup("XDG_CONFIG_HOME").filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) if dir.is_absolute() => Ok(dir),
        Some(dir) => bail!("path in $XDG_CONFIG_HOME is relative: {}", dir.display()),
        None => Ok(home(&lookup)?.join(".config")),
    }
}

#[cfg(not(target_os = "windows"))]
fn home(lookup: &impl Fn(&str) -> Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match lookup("HOME").filter(|p| !p.as_os_str().is_empty()) {
        Some(home) => Ok(home),
        None => bail!("neither $XDG_CONFIG_HOME nor $HOME are defined"),
    }
}
