//! Default on-disk locations.

use std::path::{Component, Path, PathBuf};

pub const APP_NAME: &str = "orchestrator";

/// True when `name` joins onto a directory as exactly one ordinary entry.
/// Names joined into state paths must pass this to stay under their base.
pub fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `<config_dir>/orchestrator/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_NAME).join("config.toml");
    }
    match dirs::home_dir() {
        Some(home) => home.join(".config").join(APP_NAME).join("config.toml"),
        None => PathBuf::from(format!("{APP_NAME}.toml")),
    }
}

/// `<cache_dir>/orchestrator/state`, falling back to `./state`.
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = dirs::cache_dir() {
        return dir.join(APP_NAME).join("state");
    }
    match dirs::home_dir() {
        Some(home) => home.join(".cache").join(APP_NAME).join("state"),
        None => PathBuf::from(".").join("state"),
    }
}
