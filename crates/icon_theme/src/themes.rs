use std::path::{Path, PathBuf};

use crate::{basedirs, lookup, Theme};

/// Every theme found in a list of base directories.
#[derive(Debug, Clone, Default)]
pub struct IconThemes {
    basedirs: Vec<PathBuf>,
    themes: Vec<Theme>,
}

impl IconThemes {
    /// Load the themes of the base directories given by the environment (see [`basedirs::base_dirs`]).
    pub fn load() -> Self {
        Self::load_from(basedirs::base_dirs())
    }

    /// Load the themes of every directory in `basedirs`.
    pub fn load_from(basedirs: Vec<PathBuf>) -> Self {
        let themes: Vec<Theme> = basedirs.iter().flat_map(|basedir| load_themes(basedir)).collect();
        log::info!("loaded {} icon themes from {} base directories", themes.len(), basedirs.len());
        Self { basedirs, themes }
    }

    pub fn from_parts(basedirs: Vec<PathBuf>, themes: Vec<Theme>) -> Self {
        Self { basedirs, themes }
    }

    pub fn basedirs(&self) -> &[PathBuf] {
        &self.basedirs
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    /// The first loaded theme called `name`.
    pub fn theme(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|theme| theme.name == name)
    }

    /// See [`lookup::find_icon`].
    pub fn lookup(&self, name: &str, size: i32, theme: &str) -> Option<PathBuf> {
        lookup::find_icon(&self.themes, &self.basedirs, name, size, theme)
    }

    /// Like [`IconThemes::lookup`], with `extra_dir` searched as an additional, last base directory.
    pub fn lookup_with_dir(&self, name: &str, size: i32, theme: &str, extra_dir: &Path) -> Option<PathBuf> {
        let mut basedirs = self.basedirs.clone();
        basedirs.push(extra_dir.to_owned());
        lookup::find_icon(&self.themes, &basedirs, name, size, theme)
    }
}

/// Parse `<basedir>/*/index.theme`, in directory name order. Hidden directories are skipped, and files that
/// fail to parse are logged and left out.
pub fn load_themes(basedir: &Path) -> Vec<Theme> {
    let entries = match std::fs::read_dir(basedir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("cannot read icon base directory {}: {}", basedir.display(), e);
            return Vec::new();
        }
    };

    let mut dirs: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    dirs.sort();

    dirs.into_iter()
        .filter_map(|dir| {
            let index = basedir.join(&dir).join("index.theme");
            if !index.is_file() {
                return None;
            }
            match Theme::from_file(&index, &dir) {
                Ok(theme) => Some(theme),
                Err(e) => {
                    log::debug!("ignoring icon theme: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(path: PathBuf, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_rejected_theme_does_not_stop_loading() {
        let basedir = tempfile::tempdir().unwrap();
        write(basedir.path().join("a-broken/index.theme"), "[Icon Theme]\nName=Broken\nDirectories=16\n");
        write(basedir.path().join("b-good/index.theme"), "[Icon Theme]\nName=Good\nComment=c\nDirectories=16\n[16]\nSize=16\n");
        write(basedir.path().join(".hidden/index.theme"), "[Icon Theme]\nName=Hidden\nComment=c\nDirectories=16\n");
        write(basedir.path().join("no-index/16/x.png"), "");
        write(basedir.path().join("c-good/index.theme"), "[Icon Theme]\nName=Other\nComment=c\nDirectories=16\n");

        let themes = load_themes(basedir.path());
        let names: Vec<_> = themes.iter().map(|t| (t.name.as_str(), t.dir.as_str())).collect();
        assert_eq!(names, vec![("Good", "b-good"), ("Other", "c-good")]);
    }

    #[test]
    fn test_missing_basedir() {
        assert!(load_themes(Path::new("/nonexistent/icons")).is_empty());
    }

    #[test]
    fn test_lookup_with_dir() {
        let basedir = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        write(basedir.path().join("hicolor/index.theme"), "[Icon Theme]\nName=Hicolor\nComment=c\nDirectories=16\n[16]\nSize=16\n");
        write(extra.path().join("app-icon.png"), "");

        let themes = IconThemes::load_from(vec![basedir.path().to_owned()]);
        assert!(themes.theme("Hicolor").is_some());
        assert_eq!(themes.lookup("app-icon", 16, "Hicolor"), None);
        assert_eq!(themes.lookup_with_dir("app-icon", 16, "Hicolor", extra.path()), Some(extra.path().join("app-icon.png")));
    }
}
