//! Loads the theme: the page templates and the stylesheet. The built-in theme
//! is compiled into the binary; a theme directory may override any of its
//! files by name.

use gtmpl::Template;
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BASE: &str = "base.html";
pub const ENTRY_PARTIAL: &str = "_entry.html";
pub const LIST: &str = "list.html";
pub const DETAIL: &str = "detail.html";
pub const NOT_FOUND: &str = "404.html";
pub const STYLESHEET: &str = "style.css";

const BUILTIN: &[(&str, &str)] = &[
    (BASE, include_str!("../theme/base.html")),
    (ENTRY_PARTIAL, include_str!("../theme/_entry.html")),
    (LIST, include_str!("../theme/list.html")),
    (DETAIL, include_str!("../theme/detail.html")),
    (NOT_FOUND, include_str!("../theme/404.html")),
    (STYLESHEET, include_str!("../theme/style.css")),
];

/// The theme sources by file name, plus the page templates parsed from them.
/// Created once at start-up and shared by reference for the rest of the run.
pub struct Templates {
    sources: HashMap<&'static str, String>,
    list: Template,
    detail: Template,
    not_found: Template,
}

/// The page kinds, each parsed from the base layout plus its own file(s).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    List,
    Detail,
    NotFound,
}

impl Templates {
    /// Loads the built-in theme, overriding each file that exists in
    /// `theme_directory`.
    pub fn load(theme_directory: Option<&Path>) -> Result<Templates> {
        let mut sources: HashMap<&'static str, String> = HashMap::with_capacity(BUILTIN.len());
        for (name, builtin) in BUILTIN {
            let source = match theme_directory.map(|dir| dir.join(name)) {
                Some(path) if path.is_file() => {
                    debug!(path = %path.display(), "using theme override");
                    read_to_string(&path).map_err(|err| Error::Read { path, err })?
                }
                _ => builtin.to_string(),
            };
            sources.insert(*name, source);
        }

        Ok(Templates {
            list: parse(&sources, &[BASE, ENTRY_PARTIAL, LIST])?,
            detail: parse(&sources, &[BASE, ENTRY_PARTIAL, DETAIL])?,
            not_found: parse(&sources, &[BASE, NOT_FOUND])?,
            sources,
        })
    }

    /// The built-in theme with no overrides.
    pub fn builtin() -> Result<Templates> {
        Templates::load(None)
    }

    /// The source text of a theme file, e.g. [`STYLESHEET`].
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    pub fn page(&self, kind: PageKind) -> &Template {
        match kind {
            PageKind::List => &self.list,
            PageKind::Detail => &self.detail,
            PageKind::NotFound => &self.not_found,
        }
    }
}

/// Concatenates the named sources and parses the result into a single
/// template, so later files can use the `define`s of earlier ones.
fn parse(sources: &HashMap<&'static str, String>, names: &[&'static str]) -> Result<Template> {
    let mut contents = String::new();
    for name in names {
        // Every name is in `BUILTIN`, so the lookup can't miss.
        if let Some(source) = sources.get(name) {
            contents.push_str(source);
            contents.push('\n');
        }
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(|err| Error::Parse {
        name: names.last().copied().unwrap_or_default(),
        err,
    })?;
    Ok(template)
}

/// The result of a fallible theme-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the theme.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a theme override file can't be read.
    #[error("reading template file `{}`: {err}", path.display())]
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when a page template doesn't parse.
    #[error("parsing template `{name}`: {err}")]
    Parse { name: &'static str, err: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_theme_parses() -> Result<()> {
        let templates = Templates::builtin()?;
        assert!(templates.source(STYLESHEET).unwrap().contains("body {"));
        assert!(templates.source("nope.html").is_none());
        Ok(())
    }

    #[test]
    fn test_theme_directory_overrides_by_name() -> Result<()> {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STYLESHEET), "body { color: red; }").unwrap();
        let templates = Templates::load(Some(dir.path()))?;
        assert_eq!(Some("body { color: red; }"), templates.source(STYLESHEET));
        assert_eq!(
            Some(include_str!("../theme/base.html")),
            templates.source(BASE),
        );
        Ok(())
    }

    #[test]
    fn test_missing_theme_directory_falls_back_to_builtin() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let templates = Templates::load(Some(&dir.path().join("missing")))?;
        assert_eq!(Some(include_str!("../theme/404.html")), templates.source(NOT_FOUND));
        Ok(())
    }

    #[test]
    fn test_broken_override_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DETAIL), "{{if .entry}}unterminated").unwrap();
        match Templates::load(Some(dir.path())) {
            Err(Error::Parse { name, .. }) => assert_eq!(DETAIL, name),
            Err(err) => panic!("wanted Parse error; found {}", err),
            Ok(_) => panic!("wanted Parse error; found Ok"),
        }
    }
}
