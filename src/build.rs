//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the static site: loading the entries
//! ([`crate::repository`]), rendering every page and feed
//! ([`crate::assemble`]), copying the static assets, and publishing the result.
//!
//! The site is built in a staging directory next to the public directory and
//! only swapped into place once every file has been written, so a failed
//! build never leaves a half-written public tree behind.

use crate::assemble::{self, Assembler, FeedScope};
use crate::config::Config;
use crate::repository::{self, LoadPolicy, Repository};
use crate::template::{Templates, NOT_FOUND};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What a successful build produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub entries: usize,
    pub tags: usize,
    pub assets: usize,
}

/// Builds the site described by `config` and publishes it to
/// `config.public_directory`. Entries are loaded once with
/// [`LoadPolicy::FailFast`], so any malformed entry aborts the build before
/// anything is published.
pub fn build_site(config: &Config, templates: &Templates) -> Result<Summary> {
    let assembler = Assembler::new(config, templates);
    let repo = Repository::load(&config.entries_directory, LoadPolicy::FailFast)?;
    info!(
        entries = repo.len(),
        directory = %config.entries_directory.display(),
        "loaded entries"
    );

    let (staging, previous) = sibling_directories(&config.public_directory)?;
    rmdir(&staging)?;
    create_dir(&staging)?;

    let summary = match write_site(config, &assembler, &repo, &staging) {
        Ok(summary) => summary,
        Err(err) => {
            // Leave the public tree as it was; the staging tree is garbage.
            discard(&staging);
            return Err(err);
        }
    };

    publish(&staging, &config.public_directory, &previous)?;
    info!(
        entries = summary.entries,
        tags = summary.tags,
        assets = summary.assets,
        directory = %config.public_directory.display(),
        "published site"
    );
    Ok(summary)
}

/// Writes every output file into `root`, in order: stylesheet, not-found
/// page, index and its feed, each tag index and feed, each entry page, then
/// the static assets.
fn write_site(
    config: &Config,
    assembler: &Assembler,
    repo: &Repository,
    root: &Path,
) -> Result<Summary> {
    let mut out = Output::new(root);
    out.write(Path::new(&config.stylesheet), assembler.stylesheet())?;
    out.render(Path::new(NOT_FOUND), assembler.not_found())?;
    out.render(Path::new("index.html"), assembler.index(repo.entries()))?;
    out.render(
        Path::new("index.atom"),
        assembler.feed(FeedScope::Index, repo.entries()),
    )?;

    let tag_index = repo.tag_index();
    let tags_dir = Path::new("tags");
    for (tag, entries) in &tag_index {
        out.render(
            &tags_dir.join(tag).join("index.html"),
            assembler.tag_index(tag, entries.iter().copied()),
        )?;
        out.render(
            &tags_dir.join(format!("{}.atom", tag)),
            assembler.feed(FeedScope::Tag(*tag), entries.iter().copied()),
        )?;
    }

    for entry in repo.entries() {
        out.render(&assembler.entry_path(entry), assembler.entry(entry))?;
    }

    let assets = copy_assets(&config.assets_directory, root)?;

    Ok(Summary {
        entries: repo.len(),
        tags: tag_index.len(),
        assets,
    })
}

/// The output tree being written. Every generated file may be written once;
/// a second write to the same path is a [`Error::Collision`].
struct Output<'r> {
    root: &'r Path,
    written: HashSet<PathBuf>,
}

impl<'r> Output<'r> {
    fn new(root: &'r Path) -> Self {
        Output {
            root,
            written: HashSet::new(),
        }
    }

    fn render(&mut self, relative: &Path, rendered: assemble::Result<String>) -> Result<()> {
        let contents = rendered.map_err(|err| Error::Render {
            path: relative.to_owned(),
            err,
        })?;
        self.write(relative, &contents)
    }

    fn write(&mut self, relative: &Path, contents: &str) -> Result<()> {
        if !self.written.insert(relative.to_owned()) {
            return Err(Error::Collision(relative.to_owned()));
        }
        let path = self.root.join(relative);
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        debug!(path = %relative.display(), "writing");
        fs::write(&path, contents).map_err(|err| Error::Io { path, err })
    }
}

/// Swaps `staging` into place at `public`. The old tree is moved aside to
/// `previous` first and only deleted once the new one is in place. On
/// failure the staging tree is removed and the old tree is put back.
fn publish(staging: &Path, public: &Path, previous: &Path) -> Result<()> {
    rmdir(previous)?;
    let had_public = public.exists();
    if had_public {
        if let Err(err) = rename(public, previous) {
            discard(staging);
            return Err(err);
        }
    }
    if let Err(err) = rename(staging, public) {
        if had_public {
            if let Err(restore) = fs::rename(previous, public) {
                error!(
                    error = %restore,
                    previous = %previous.display(),
                    "restoring the previous site failed; the public directory is missing"
                );
            }
        }
        discard(staging);
        return Err(err);
    }
    if had_public {
        rmdir(previous)?;
    }
    Ok(())
}

/// Best-effort removal of a staging tree that will never be published.
fn discard(staging: &Path) {
    if let Err(err) = rmdir(staging) {
        warn!(error = %err, "removing staging directory");
    }
}

/// The staging and previous-site directories sit next to the public
/// directory so the final renames stay on one filesystem.
fn sibling_directories(public: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = public
        .file_name()
        .ok_or_else(|| Error::InvalidOutputDirectory(public.to_owned()))?
        .to_string_lossy()
        .into_owned();
    let parent = public.parent().unwrap_or_else(|| Path::new("."));
    Ok((
        parent.join(format!(".{}.staging", name)),
        parent.join(format!(".{}.previous", name)),
    ))
}

/// Recursively copies the assets directory into the output root. A missing
/// assets directory is fine. Assets never overwrite generated files.
fn copy_assets(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        debug!(directory = %src.display(), "no assets directory");
        return Ok(0);
    }

    let mut copied = 0;
    for result in WalkDir::new(src).min_depth(1) {
        let entry = result?;
        // strip_prefix() can't fail; WalkDir yields paths under `src`.
        let relative = entry.path().strip_prefix(src).unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else if target.exists() {
            warn!(asset = %relative.display(), "asset collides with a generated file; skipping");
        } else {
            fs::copy(entry.path(), &target).map_err(|err| Error::Io {
                path: target.clone(),
                err,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir(dir).map_err(|err| Error::Io {
        path: dir.to_owned(),
        err,
    })
}

fn create_dir_all(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|err| Error::Io {
        path: dir.to_owned(),
        err,
    })
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|err| Error::Io {
        path: from.to_owned(),
        err,
    })
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// The result of a fallible build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can come from loading entries,
/// rendering pages, writing or copying files, and cleaning up directories.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the entries can't be loaded.
    #[error("loading entries: {0}")]
    Load(#[from] repository::Error),

    /// Returned when a page or feed fails to render.
    #[error("rendering `{}`: {err}", path.display())]
    Render { path: PathBuf, err: assemble::Error },

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory `{}`: {err}", path.display())]
    Clean { path: PathBuf, err: io::Error },

    /// Returned when the public directory has no name to derive the staging
    /// directory from (e.g. `/`).
    #[error("invalid output directory `{}`", .0.display())]
    InvalidOutputDirectory(PathBuf),

    /// Returned when two generated files land on the same path, e.g. a
    /// stylesheet configured as `index.html`.
    #[error("`{}` would be written twice", .0.display())]
    Collision(PathBuf),

    /// Returned for errors walking the assets directory.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// Returned for other I/O errors.
    #[error("writing `{}`: {err}", path.display())]
    Io { path: PathBuf, err: io::Error },
}
