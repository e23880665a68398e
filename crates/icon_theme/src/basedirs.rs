//! The directories icon themes are searched in.

use std::path::{Path, PathBuf};

/// Always searched first, whether it exists or not.
pub const PIXMAPS_DIR: &str = "/usr/share/pixmaps";

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// Base directories derived from `$HOME`, `$XDG_DATA_HOME` and `$XDG_DATA_DIRS`.
pub fn base_dirs() -> Vec<PathBuf> {
    let home = env_non_empty("HOME");
    let data_home = env_non_empty("XDG_DATA_HOME");
    let data_dirs = env_non_empty("XDG_DATA_DIRS");
    base_dirs_from(home.as_deref(), data_home.as_deref(), data_dirs.as_deref())
}

/// Build the base directory list, in the order the [`crate::lookup`] functions expect:
///
/// 1. [`PIXMAPS_DIR`]
/// 2. `$XDG_DATA_HOME/icons`, or `$HOME/.local/share/icons` if `$XDG_DATA_HOME` is unset
/// 3. `<dir>/icons` for every `<dir>` in `$XDG_DATA_DIRS` (defaulting to `/usr/local/share:/usr/share`)
///
/// Candidates from 2. and 3. that are not existing directories are left out.
pub fn base_dirs_from(home: Option<&str>, data_home: Option<&str>, data_dirs: Option<&str>) -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(PIXMAPS_DIR)];

    let data_home_icons = match (data_home, home) {
        (Some(data_home), _) => Some(Path::new(data_home).join("icons")),
        (None, Some(home)) => Some(Path::new(home).join(".local/share/icons")),
        (None, None) => None,
    };
    dirs.extend(data_home_icons.filter(|dir| dir.is_dir()));

    let data_dirs = data_dirs.filter(|dirs| !dirs.is_empty()).unwrap_or(DEFAULT_DATA_DIRS);
    dirs.extend(
        data_dirs.split(':').filter(|dir| !dir.is_empty()).map(|dir| Path::new(dir).join("icons")).filter(|dir| dir.is_dir()),
    );

    dirs
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
