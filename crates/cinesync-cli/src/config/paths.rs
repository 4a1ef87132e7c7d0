//! Config file location.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Resolves the config file path.
///
/// - `{dir}/config.toml` when `--dir` is given;
/// - else `$XDG_CONFIG_HOME/cinesync/config.toml` when that is set;
/// - else `~/.config/cinesync/config.toml`.
///
/// # Errors
///
/// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set (when `dir` is `None`).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    let xdg = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    config_path_from(dir.map(PathBuf::as_path), xdg.as_deref(), home.as_deref())
}

fn config_path_from(dir: Option<&Path>, xdg: Option<&Path>, home: Option<&Path>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(CONFIG_FILE));
    }
    // An empty XDG_CONFIG_HOME counts as unset.
    if let Some(base) = xdg.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(base.join("cinesync").join(CONFIG_FILE));
    }
    match home {
        Some(home) => Ok(home.join(".config").join("cinesync").join(CONFIG_FILE)),
        None => bail!("HOME environment variable is not set"),
    }
}
