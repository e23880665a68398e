//! Finding the best matching icon file for a name and size.
//!
//! Only `.png` files are ever considered. All checks hit the filesystem synchronously.

use std::path::{Path, PathBuf};

use nix::unistd::AccessFlags;

use crate::Theme;

/// Theme that is searched when the requested theme doesn't have an icon.
pub const FALLBACK_THEME: &str = "Hicolor";

/// Find an icon, trying `theme` (and whatever it inherits) first, then [`FALLBACK_THEME`], then any
/// `<name>.png` directly inside a base directory or inside any subdirectory of any theme.
pub fn find_icon(themes: &[Theme], basedirs: &[PathBuf], name: &str, size: i32, theme: &str) -> Option<PathBuf> {
    lookup_in_theme(themes, basedirs, name, size, theme)
        .or_else(|| {
            if theme != FALLBACK_THEME {
                lookup_in_theme(themes, basedirs, name, size, FALLBACK_THEME)
            } else {
                None
            }
        })
        .or_else(|| fallback_icon(themes, basedirs, name))
}

/// Look up an icon in the theme whose `Name` is `theme`, falling back to the themes it inherits.
pub fn lookup_in_theme(themes: &[Theme], basedirs: &[PathBuf], name: &str, size: i32, theme: &str) -> Option<PathBuf> {
    let mut visited = Vec::new();
    lookup_inherited(themes, basedirs, name, size, theme, &mut visited)
}

fn lookup_inherited<'t>(
    themes: &'t [Theme],
    basedirs: &[PathBuf],
    name: &str,
    size: i32,
    theme_name: &str,
    visited: &mut Vec<&'t str>,
) -> Option<PathBuf> {
    let theme = themes.iter().find(|theme| theme.name == theme_name)?;
    if visited.contains(&theme.name.as_str()) {
        log::debug!("icon theme {:?} inherits itself", theme.name);
        return None;
    }
    visited.push(&theme.name);

    exact_match(theme, basedirs, name, size)
        .or_else(|| closest_match(theme, basedirs, name, size))
        .or_else(|| {
            theme.inherits.iter().find_map(|parent| lookup_inherited(themes, basedirs, name, size, parent, visited))
        })
}

/// First icon in a subdirectory whose size range contains `size`. Later declared subdirectories win.
fn exact_match(theme: &Theme, basedirs: &[PathBuf], name: &str, size: i32) -> Option<PathBuf> {
    basedirs.iter().find_map(|basedir| {
        theme
            .subdirs
            .iter()
            .rev()
            .filter(|subdir| subdir.matches_size(size))
            .find_map(|subdir| icon_file(&basedir.join(&theme.dir).join(&subdir.name), name))
    })
}

/// The icon from the subdirectory closest to `size`. On equal distance the first one found is kept.
fn closest_match(theme: &Theme, basedirs: &[PathBuf], name: &str, size: i32) -> Option<PathBuf> {
    let mut best: Option<(u32, PathBuf)> = None;

    for theme_dir in basedirs.iter().map(|basedir| basedir.join(&theme.dir)).filter(|dir| dir.is_dir()) {
        for subdir in theme.subdirs.iter().rev() {
            let distance = subdir.size_distance(size);
            if best.as_ref().is_some_and(|(smallest, _)| distance >= *smallest) {
                continue;
            }
            if let Some(path) = icon_file(&theme_dir.join(&subdir.name), name) {
                best = Some((distance, path));
            }
        }
    }

    best.map(|(_, path)| path)
}

/// Last resort, ignoring sizes: `<basedir>/<name>.png` (last base directory first), then every subdirectory of
/// every theme.
fn fallback_icon(themes: &[Theme], basedirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    basedirs.iter().rev().find_map(|basedir| icon_file(basedir, name)).or_else(|| {
        basedirs.iter().find_map(|basedir| {
            themes.iter().find_map(|theme| {
                let theme_dir = basedir.join(&theme.dir);
                theme.subdirs.iter().rev().find_map(|subdir| icon_file(&theme_dir.join(&subdir.name), name))
            })
        })
    })
}

fn icon_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let path = dir.join(format!("{name}.png"));
    nix::unistd::access(path.as_path(), AccessFlags::R_OK).is_ok().then_some(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Subdir, SubdirType};
    use pretty_assertions::assert_eq;

    fn fixed(name: &str, size: i32) -> Subdir {
        Subdir { name: name.to_owned(), kind: SubdirType::Fixed, size, min_size: size, max_size: size, threshold: 2 }
    }

    fn theme(name: &str, dir: &str, inherits: &[&str], subdirs: Vec<Subdir>) -> Theme {
        Theme {
            name: name.to_owned(),
            comment: String::new(),
            dir: dir.to_owned(),
            directories: subdirs.iter().map(|s| s.name.clone()).collect(),
            inherits: inherits.iter().map(|s| s.to_string()).collect(),
            subdirs,
        }
    }

    fn touch(path: PathBuf) -> PathBuf {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_exact_match() {
        let basedir = tempfile::tempdir().unwrap();
        let icon = touch(basedir.path().join("t/16/firefox.png"));
        touch(basedir.path().join("t/48/firefox.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16), fixed("48", 48)])];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "firefox", 16, "T"), Some(icon));
    }

    #[test]
    fn test_inexact_picks_closest_existing() {
        let basedir = tempfile::tempdir().unwrap();
        let icon = touch(basedir.path().join("t/48/firefox.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16), fixed("48", 48)])];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "firefox", 24, "T"), Some(icon));
    }

    #[test]
    fn test_inexact_ties_keep_first_found() {
        let basedir = tempfile::tempdir().unwrap();
        touch(basedir.path().join("t/16/firefox.png"));
        let later = touch(basedir.path().join("t/32/firefox.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16), fixed("32", 32)])];
        let basedirs = vec![basedir.path().to_owned()];

        // both are 8 away from 24, subdirectories are visited last to first
        assert_eq!(lookup_in_theme(&themes, &basedirs, "firefox", 24, "T"), Some(later));
    }

    #[test]
    fn test_later_subdir_wins_exact_match() {
        let basedir = tempfile::tempdir().unwrap();
        touch(basedir.path().join("t/apps/firefox.png"));
        let status = touch(basedir.path().join("t/status/firefox.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("apps", 22), fixed("status", 22)])];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "firefox", 22, "T"), Some(status));
    }

    #[test]
    fn test_inheritance() {
        let basedir = tempfile::tempdir().unwrap();
        let icon = touch(basedir.path().join("b/32/x.png"));
        std::fs::create_dir_all(basedir.path().join("a/32")).unwrap();
        let themes = vec![
            theme("A", "a", &["B"], vec![fixed("32", 32)]),
            theme("B", "b", &[], vec![fixed("32", 32)]),
        ];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(find_icon(&themes, &basedirs, "x", 32, "A"), Some(icon));
    }

    #[test]
    fn test_inheritance_cycle_terminates() {
        let basedir = tempfile::tempdir().unwrap();
        let themes = vec![
            theme("A", "a", &["B"], vec![fixed("32", 32)]),
            theme("B", "b", &["A"], vec![fixed("32", 32)]),
        ];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "x", 32, "A"), None);
    }

    #[test]
    fn test_unknown_theme() {
        let basedir = tempfile::tempdir().unwrap();
        touch(basedir.path().join("t/16/x.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16)])];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "x", 16, "t"), None);
    }

    #[test]
    fn test_hicolor_fallback() {
        let basedir = tempfile::tempdir().unwrap();
        let icon = touch(basedir.path().join("hicolor/16x16/apps/x.png"));
        let themes = vec![
            theme("Adwaita", "Adwaita", &[], vec![fixed("16x16/apps", 16)]),
            theme("Hicolor", "hicolor", &[], vec![fixed("16x16/apps", 16)]),
        ];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(find_icon(&themes, &basedirs, "x", 16, "Adwaita"), Some(icon));
    }

    #[test]
    fn test_generic_fallback_prefers_last_basedir() {
        let first = tempfile::tempdir().unwrap();
        let last = tempfile::tempdir().unwrap();
        touch(first.path().join("x.png"));
        let icon = touch(last.path().join("x.png"));
        let basedirs = vec![first.path().to_owned(), last.path().to_owned()];

        assert_eq!(find_icon(&[], &basedirs, "x", 16, "Hicolor"), Some(icon));
    }

    #[test]
    fn test_generic_fallback_ignores_size_and_theme() {
        let basedir = tempfile::tempdir().unwrap();
        let icon = touch(basedir.path().join("other/16/x.png"));
        let themes = vec![
            theme("Requested", "requested", &[], vec![]),
            theme("Other", "other", &[], vec![fixed("16", 16)]),
        ];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(lookup_in_theme(&themes, &basedirs, "x", 64, "Requested"), None);
        assert_eq!(find_icon(&themes, &basedirs, "x", 64, "Requested"), Some(icon));
    }

    #[test]
    fn test_only_png_is_found() {
        let basedir = tempfile::tempdir().unwrap();
        touch(basedir.path().join("t/16/x.svg"));
        touch(basedir.path().join("x.xpm"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16)])];
        let basedirs = vec![basedir.path().to_owned()];

        assert_eq!(find_icon(&themes, &basedirs, "x", 16, "T"), None);
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let basedir = tempfile::tempdir().unwrap();
        touch(basedir.path().join("t/16/x.png"));
        touch(basedir.path().join("t/48/x.png"));
        let themes = vec![theme("T", "t", &[], vec![fixed("16", 16), fixed("48", 48)])];
        let basedirs = vec![basedir.path().to_owned()];

        let first = find_icon(&themes, &basedirs, "x", 30, "T");
        assert!(first.is_some());
        for _ in 0..5 {
            assert_eq!(find_icon(&themes, &basedirs, "x", 30, "T"), first);
        }
    }
}
