use std::path::Path;

use crate::{LoadError, ParseError};

const ICON_THEME_GROUP: &str = "Icon Theme";

/// Value of the `Type` key of a theme subdirectory.
///
/// When a directory doesn't declare its type it is treated as [`SubdirType::Scalable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdirType {
    /// Icons in the directory are only used at exactly `Size`.
    Fixed,
    /// Icons can be scaled to anything between `MinSize` and `MaxSize`.
    #[default]
    Scalable,
    /// Icons can be used if the requested size is within `Threshold` of `Size`.
    Threshold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseSubdirTypeError;

impl std::str::FromStr for SubdirType {
    type Err = ParseSubdirTypeError;

    fn from_str(s: &str) -> Result<Self, ParseSubdirTypeError> {
        match s {
            "Fixed" => Ok(SubdirType::Fixed),
            "Scalable" => Ok(SubdirType::Scalable),
            "Threshold" => Ok(SubdirType::Threshold),
            _ => Err(ParseSubdirTypeError),
        }
    }
}

/// One sized directory of a theme, e.g. `48x48/apps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subdir {
    /// Path of the directory relative to the theme directory.
    pub name: String,
    pub kind: SubdirType,
    pub size: i32,
    pub min_size: i32,
    pub max_size: i32,
    pub threshold: i32,
}

impl Subdir {
    /// Whether icons of this directory can be used for `size` without any error.
    pub fn matches_size(&self, size: i32) -> bool {
        self.min_size <= size && size <= self.max_size
    }

    /// How far `size` lies outside of `min_size..=max_size`.
    pub fn size_distance(&self, size: i32) -> u32 {
        let above = size.saturating_sub(self.max_size).max(0);
        let below = self.min_size.saturating_sub(size).max(0);
        above.unsigned_abs() + below.unsigned_abs()
    }
}

/// A parsed `index.theme` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Value of `Name`, which is what themes are looked up (and inherited) by.
    pub name: String,
    pub comment: String,
    /// Name of the directory containing the `index.theme` file.
    pub dir: String,
    /// Value of `Directories`, in declaration order.
    pub directories: Vec<String>,
    /// Value of `Inherits`, in declaration order.
    pub inherits: Vec<String>,
    /// The groups that are listed in `Directories`, in the order their groups appear in the file.
    pub subdirs: Vec<Subdir>,
}

impl Theme {
    /// Parse the contents of the `index.theme` file found in the theme directory `dir`.
    pub fn parse(dir: &str, source: &str) -> Result<Theme, ParseError> {
        let mut parser = Parser::default();
        for (idx, line) in source.lines().enumerate() {
            parser.line(idx + 1, line)?;
        }
        parser.finish(dir)
    }

    /// Read and parse the `index.theme` at `path`, which lives in the theme directory `dir`.
    pub fn from_file(path: &Path, dir: &str) -> Result<Theme, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io { path: path.to_owned(), source })?;
        Theme::parse(dir, &String::from_utf8_lossy(&bytes)).map_err(|source| LoadError::Parse { path: path.to_owned(), source })
    }

    pub fn subdir(&self, name: &str) -> Option<&Subdir> {
        self.subdirs.iter().find(|subdir| subdir.name == name)
    }
}

#[derive(Debug)]
struct SubdirBuilder {
    name: String,
    kind: SubdirType,
    size: Option<i32>,
    min_size: Option<i32>,
    max_size: Option<i32>,
    threshold: i32,
}

impl SubdirBuilder {
    fn new(name: &str) -> Self {
        Self { name: name.to_owned(), kind: SubdirType::default(), size: None, min_size: None, max_size: None, threshold: 2 }
    }

    fn build(self) -> Result<Subdir, ParseError> {
        let size = match self.size {
            Some(size) if size != 0 => size,
            _ => return Err(ParseError::MissingKey { group: self.name, key: "Size" }),
        };

        // zero means unset, same as a missing key
        let min_size = self.min_size.filter(|s| *s != 0);
        let max_size = self.max_size.filter(|s| *s != 0);

        let (min_size, max_size) = match self.kind {
            SubdirType::Fixed => (size, size),
            SubdirType::Scalable => (min_size.unwrap_or(size), max_size.unwrap_or(size)),
            SubdirType::Threshold => {
                let bounds = size.checked_sub(self.threshold).zip(size.checked_add(self.threshold));
                bounds.ok_or_else(|| ParseError::SizeOutOfRange { group: self.name.clone() })?
            }
        };

        Ok(Subdir { name: self.name, kind: self.kind, size, min_size, max_size, threshold: self.threshold })
    }
}

#[derive(Debug, Default)]
struct Parser {
    /// Every group header seen so far, the last one being the currently open group.
    groups: Vec<String>,
    name: Option<String>,
    comment: Option<String>,
    directories: Vec<String>,
    inherits: Vec<String>,
    /// The open group, if it is one of `directories`.
    current: Option<SubdirBuilder>,
    subdirs: Vec<Subdir>,
}

impl Parser {
    fn line(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(header) = line.strip_prefix('[') {
            let group = header
                .strip_suffix(']')
                .filter(|group| !group.chars().any(|c| c.is_control() || c == '[' || c == ']'))
                .ok_or(ParseError::MalformedHeader { line: line_no })?;
            self.begin_group(line_no, group)
        } else {
            if self.groups.is_empty() {
                return Err(ParseError::ContentBeforeHeader { line: line_no });
            }
            let (key, value) = split_entry(line).ok_or(ParseError::MalformedEntry { line: line_no })?;
            self.entry(line_no, key, value)
        }
    }

    fn begin_group(&mut self, line_no: usize, group: &str) -> Result<(), ParseError> {
        if self.groups.iter().any(|g| g == group) {
            return Err(ParseError::DuplicateGroup { line: line_no, group: group.to_owned() });
        }

        if self.groups.is_empty() {
            if group != ICON_THEME_GROUP {
                return Err(ParseError::FirstGroupNotIconTheme { line: line_no });
            }
        } else {
            self.close_group()?;
        }

        if self.directories.iter().any(|dir| dir == group) {
            self.current = Some(SubdirBuilder::new(group));
        }
        self.groups.push(group.to_owned());
        Ok(())
    }

    /// Validate the group that is currently open.
    fn close_group(&mut self) -> Result<(), ParseError> {
        match self.groups.last() {
            Some(group) if group == ICON_THEME_GROUP => {
                let missing = |key| ParseError::MissingKey { group: ICON_THEME_GROUP.to_owned(), key };
                let name = self.name.as_deref().ok_or_else(|| missing("Name"))?;
                if self.comment.is_none() {
                    return Err(missing("Comment"));
                }
                if self.directories.is_empty() {
                    return Err(missing("Directories"));
                }
                if name.contains([',', ' ']) {
                    return Err(ParseError::MalformedName(name.to_owned()));
                }
            }
            Some(_) => {
                if let Some(subdir) = self.current.take() {
                    self.subdirs.push(subdir.build()?);
                }
            }
            None => {}
        }
        Ok(())
    }

    fn entry(&mut self, line_no: usize, key: &str, value: &str) -> Result<(), ParseError> {
        let in_theme_group = self.groups.last().is_some_and(|g| g == ICON_THEME_GROUP);
        if in_theme_group {
            match key {
                "Name" => self.name = Some(value.to_owned()),
                "Comment" => self.comment = Some(value.to_owned()),
                "Inherits" => self.inherits = split_list(value),
                "Directories" => self.directories = split_list(value),
                _ => {}
            }
            return Ok(());
        }

        let Some(subdir) = self.current.as_mut() else {
            return Ok(());
        };

        let number = || value.parse::<i32>().map_err(|_| ParseError::InvalidNumber { line: line_no, key: key.to_owned() });
        match key {
            "Type" => {
                subdir.kind =
                    value.parse().map_err(|_| ParseError::InvalidType { line: line_no, value: value.to_owned() })?;
            }
            "Size" => subdir.size = Some(number()?),
            "MinSize" => subdir.min_size = Some(number()?),
            "MaxSize" => subdir.max_size = Some(number()?),
            "Threshold" => subdir.threshold = number()?,
            // Context, Scale, ...
            _ => {}
        }
        Ok(())
    }

    fn finish(mut self, dir: &str) -> Result<Theme, ParseError> {
        if self.groups.is_empty() {
            return Err(ParseError::EmptyFile);
        }
        self.close_group()?;

        Ok(Theme {
            // close_group made sure these are set
            name: self.name.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
            dir: dir.to_owned(),
            directories: self.directories,
            inherits: self.inherits,
            subdirs: self.subdirs,
        })
    }
}

/// Split `Key = value`, where the key is made of ASCII alphanumerics and dashes only.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let key_len = line.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-')).unwrap_or(line.len());
    if key_len == 0 {
        return None;
    }
    let (key, rest) = line.split_at(key_len);
    let value = rest.trim_start().strip_prefix('=')?.trim_start();
    Some((key, value))
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const HICOLOR: &str = "
# comments and blank lines are skipped
[Icon Theme]
Name=Hicolor
Comment=Fallback icon theme
Hidden=true
Directories=16x16/apps,scalable/apps,24x24/status

[16x16/apps]
Size=16
Context=Applications
Type=Fixed

[scalable/apps]
Size = 128
Type = Scalable
MinSize = 8
MaxSize = 512
Context = Applications

[24x24/status]
Size=24
Type=Threshold
Scale=1

[48x48/unlisted]
Size=not even a number
";

    #[test]
    fn test_parse_well_formed() {
        let theme = Theme::parse("hicolor", HICOLOR).unwrap();
        assert_eq!(theme.name, "Hicolor");
        assert_eq!(theme.comment, "Fallback icon theme");
        assert_eq!(theme.dir, "hicolor");
        assert_eq!(theme.directories, vec!["16x16/apps", "scalable/apps", "24x24/status"]);
        assert!(theme.inherits.is_empty());
        assert_eq!(
            theme.subdirs,
            vec![
                Subdir {
                    name: "16x16/apps".into(),
                    kind: SubdirType::Fixed,
                    size: 16,
                    min_size: 16,
                    max_size: 16,
                    threshold: 2
                },
                Subdir {
                    name: "scalable/apps".into(),
                    kind: SubdirType::Scalable,
                    size: 128,
                    min_size: 8,
                    max_size: 512,
                    threshold: 2
                },
                Subdir {
                    name: "24x24/status".into(),
                    kind: SubdirType::Threshold,
                    size: 24,
                    min_size: 22,
                    max_size: 26,
                    threshold: 2
                },
            ]
        );
    }

    #[test]
    fn test_scalable_bounds_default_to_size() {
        let theme =
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a,b\n[a]\nSize=32\nType=Scalable\n[b]\nSize=48\n")
                .unwrap();
        assert_eq!((theme.subdirs[0].min_size, theme.subdirs[0].max_size), (32, 32));
        // no Type behaves like Scalable
        assert_eq!(theme.subdirs[1].kind, SubdirType::Scalable);
        assert_eq!((theme.subdirs[1].min_size, theme.subdirs[1].max_size), (48, 48));
    }

    #[test]
    fn test_custom_threshold() {
        let theme =
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nSize=32\nType=Threshold\nThreshold=8\n")
                .unwrap();
        assert_eq!((theme.subdirs[0].min_size, theme.subdirs[0].max_size), (24, 40));
    }

    #[test]
    fn test_threshold_bounds_out_of_range() {
        let header = "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n";
        assert_eq!(
            Theme::parse("t", &format!("{header}[a]\nSize=2147483647\nType=Threshold\n")),
            Err(ParseError::SizeOutOfRange { group: "a".into() })
        );
        assert_eq!(
            Theme::parse("t", &format!("{header}[a]\nSize=-2147483647\nType=Threshold\nThreshold=5\n")),
            Err(ParseError::SizeOutOfRange { group: "a".into() })
        );
        // the same size is fine where no threshold applies
        let theme = Theme::parse("t", &format!("{header}[a]\nSize=2147483647\nType=Fixed\n")).unwrap();
        assert_eq!(theme.subdirs[0].max_size, i32::MAX);
    }

    #[test]
    fn test_localized_keys_are_malformed() {
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nComment[de]=Rückfall-Symbolthema\nDirectories=a\n"),
            Err(ParseError::MalformedEntry { line: 4 })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nSize[x]=1\n"),
            Err(ParseError::MalformedEntry { line: 6 })
        );
    }

    #[test]
    fn test_inherits_and_empty_directories_list_entries() {
        let theme = Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nInherits=Adwaita, Hicolor\nDirectories=a,,\n[a]\nSize=1\n")
            .unwrap();
        assert_eq!(theme.inherits, vec!["Adwaita", "Hicolor"]);
        assert_eq!(theme.directories, vec!["a"]);
    }

    #[test]
    fn test_theme_without_subdir_groups() {
        let theme = Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n").unwrap();
        assert!(theme.subdirs.is_empty());
    }

    #[test]
    fn test_missing_keys() {
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nDirectories=a\n"),
            Err(ParseError::MissingKey { group: "Icon Theme".into(), key: "Comment" })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nComment=c\nDirectories=a\n"),
            Err(ParseError::MissingKey { group: "Icon Theme".into(), key: "Name" })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\n[a]\nSize=3\n"),
            Err(ParseError::MissingKey { group: "Icon Theme".into(), key: "Directories" })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nType=Fixed\n"),
            Err(ParseError::MissingKey { group: "a".into(), key: "Size" })
        );
    }

    #[test]
    fn test_malformed_name() {
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=Breeze Dark\nComment=c\nDirectories=a\n"),
            Err(ParseError::MalformedName("Breeze Dark".into()))
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(Theme::parse("t", ""), Err(ParseError::EmptyFile));
        assert_eq!(Theme::parse("t", "# only a comment\n\n"), Err(ParseError::EmptyFile));
        assert_eq!(Theme::parse("t", "Name=T\n[Icon Theme]\n"), Err(ParseError::ContentBeforeHeader { line: 1 }));
        assert_eq!(Theme::parse("t", "[Other]\n"), Err(ParseError::FirstGroupNotIconTheme { line: 1 }));
        assert_eq!(Theme::parse("t", "[Icon Theme\n"), Err(ParseError::MalformedHeader { line: 1 }));
        assert_eq!(Theme::parse("t", "[Icon [Theme]\n"), Err(ParseError::MalformedHeader { line: 1 }));
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nSize=1\n[a]\n"),
            Err(ParseError::DuplicateGroup { line: 7, group: "a".into() })
        );
        assert_eq!(Theme::parse("t", "[Icon Theme]\nName: T\n"), Err(ParseError::MalformedEntry { line: 2 }));
        assert_eq!(Theme::parse("t", "[Icon Theme]\n=T\n"), Err(ParseError::MalformedEntry { line: 2 }));
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nType=Huge\n"),
            Err(ParseError::InvalidType { line: 6, value: "Huge".into() })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nSize=12px\n"),
            Err(ParseError::InvalidNumber { line: 6, key: "Size".into() })
        );
        assert_eq!(
            Theme::parse("t", "[Icon Theme]\nName=T\nComment=c\nDirectories=a\n[a]\nSize=12\nMaxSize=\n"),
            Err(ParseError::InvalidNumber { line: 7, key: "MaxSize".into() })
        );
    }

    #[test]
    fn test_size_distance() {
        let subdir = Subdir { name: "a".into(), kind: SubdirType::Fixed, size: 48, min_size: 48, max_size: 48, threshold: 2 };
        assert_eq!(subdir.size_distance(24), 24);
        assert_eq!(subdir.size_distance(48), 0);
        assert_eq!(subdir.size_distance(64), 16);
        assert!(subdir.matches_size(48));
        assert!(!subdir.matches_size(47));
    }
}
