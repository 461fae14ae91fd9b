//! Site configuration. A project is described by a `reprise.yaml` file; the
//! directories it names are resolved relative to that file.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::read_to_string;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "reprise.yaml";

/// The birthdate used in the root feed's identifier when the project file
/// doesn't set one. Changing it changes every subscriber's feed identity.
pub const DEFAULT_FEED_EPOCH: (i32, u32, u32) = (2009, 3, 4);

/// How entry pages are laid out in the output tree.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryLayout {
    /// `public/{slug}.html`, linked as `/{slug}.html`.
    File,

    /// `public/{slug}/index.html`, linked as `/{slug}/`.
    Directory,
}

impl Default for EntryLayout {
    fn default() -> Self {
        EntryLayout::File
    }
}

/// Someone else's page the author wants linked from every page.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// The blog's (single) author.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub elsewhere: Vec<Link>,
}

#[derive(Deserialize)]
struct Directories {
    #[serde(default = "Directories::entries")]
    entries: PathBuf,
    #[serde(default = "Directories::assets")]
    assets: PathBuf,
    #[serde(default = "Directories::public")]
    public: PathBuf,
    #[serde(default = "Directories::theme")]
    theme: PathBuf,
}

impl Directories {
    fn entries() -> PathBuf {
        PathBuf::from("entries")
    }
    fn assets() -> PathBuf {
        PathBuf::from("assets")
    }
    fn public() -> PathBuf {
        PathBuf::from("public")
    }
    fn theme() -> PathBuf {
        PathBuf::from("theme")
    }
}

impl Default for Directories {
    fn default() -> Self {
        Directories {
            entries: Directories::entries(),
            assets: Directories::assets(),
            public: Directories::public(),
            theme: Directories::theme(),
        }
    }
}

#[derive(Deserialize, Default)]
struct Serve {
    address: Option<SocketAddr>,
}

/// The raw contents of a project file.
#[derive(Deserialize)]
struct Project {
    title: String,
    url: Url,
    author: Author,

    #[serde(default)]
    stylesheet: Option<String>,

    #[serde(default)]
    feed_epoch: Option<NaiveDate>,

    #[serde(default)]
    entry_layout: EntryLayout,

    #[serde(default)]
    directories: Directories,

    #[serde(default)]
    serve: Serve,
}

/// The resolved site configuration. Immutable once loaded; the assembler,
/// the writer, and the dispatcher all borrow it.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,

    /// The public base URL, e.g. `http://journal.example.org/`. Its host is
    /// the domain in every feed identifier.
    pub url: Url,
    pub author: Author,

    /// The stylesheet's file name in the output tree (and its URL path).
    pub stylesheet: String,
    pub feed_epoch: NaiveDate,
    pub entry_layout: EntryLayout,

    pub entries_directory: PathBuf,
    pub assets_directory: PathBuf,
    pub public_directory: PathBuf,
    pub theme_directory: PathBuf,

    pub serve_address: SocketAddr,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a [`PROJECT_FILE`]
    /// and loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path);
            }
            current = dir.parent();
        }
        Err(anyhow!(
            "Could not find `{}` in `{}` or any parent directory",
            PROJECT_FILE,
            dir.display()
        ))
    }

    /// Loads a project file. Relative directories are resolved against the
    /// file's parent directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let yaml = read_to_string(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;
        Config::from_yaml(&yaml, root)
            .with_context(|| format!("Loading configuration from `{}`", path.display()))
    }

    /// Parses project YAML held in memory, for embedding the engine without a
    /// project file on disk. `root` anchors the relative directories.
    pub fn from_yaml(yaml: &str, root: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_str(yaml).context("Parsing project YAML")?;
        Config::from_project(project, root)
    }

    fn from_project(project: Project, root: &Path) -> Result<Config> {
        if project.url.host_str().is_none() {
            return Err(anyhow!("Site url `{}` has no host", project.url));
        }
        let (year, month, day) = DEFAULT_FEED_EPOCH;
        Ok(Config {
            title: project.title,
            url: project.url,
            author: project.author,
            stylesheet: project
                .stylesheet
                .unwrap_or_else(|| crate::template::STYLESHEET.to_owned()),
            feed_epoch: match project.feed_epoch {
                Some(epoch) => epoch,
                None => NaiveDate::from_ymd_opt(year, month, day)
                    .ok_or_else(|| anyhow!("invalid default feed epoch"))?,
            },
            entry_layout: project.entry_layout,
            entries_directory: root.join(project.directories.entries),
            assets_directory: root.join(project.directories.assets),
            public_directory: root.join(project.directories.public),
            theme_directory: root.join(project.directories.theme),
            serve_address: project
                .serve
                .address
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080))),
        })
    }

    /// The domain used in feed identifiers.
    pub fn domain(&self) -> &str {
        // `from_project` rejects URLs without a host.
        self.url.host_str().unwrap_or_default()
    }
}
