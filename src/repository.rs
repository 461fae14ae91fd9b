//! Loads [`Entry`] objects from the entries directory and provides the views
//! the rest of the engine is built from (all entries, entries by tag, the tag
//! index, lookup by slug).

use crate::entry::{Entry, ParseError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{read_dir, read_to_string};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What [`Repository::load`] does with an entry that can't be published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Fail the whole load. Used for batch builds so a site is never
    /// published with entries silently missing.
    FailFast,

    /// Drop the offending file and log a warning. Used by the dynamic server
    /// so one bad file doesn't take the whole site down.
    SkipInvalid,
}

/// Slugs owned by the site's own pages (`index.html`, `404.html`). An entry
/// with one of these would overwrite that page in the output tree.
pub const RESERVED_SLUGS: &[&str] = &["index", "404"];

/// Maps each tag to the entries carrying it, in repository order.
pub type TagIndex<'a> = BTreeMap<&'a str, Vec<&'a Entry>>;

/// An ordered snapshot of the entries directory. Entries are sorted by file
/// name, newest (lexicographically greatest) first.
#[derive(Clone, Debug, Default)]
pub struct Repository {
    entries: Vec<Entry>,
}

impl Repository {
    /// Reads every file directly inside `directory` (no recursion) and parses
    /// it into an [`Entry`]. Sub-directories and hidden files are ignored.
    ///
    /// Slugs are checked for integrity after parsing: an empty slug, or a slug
    /// already claimed by a newer entry, is an error under
    /// [`LoadPolicy::FailFast`] and skipped under [`LoadPolicy::SkipInvalid`].
    /// I/O errors fail the load under either policy.
    pub fn load(directory: &Path, policy: LoadPolicy) -> Result<Repository> {
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        let dir_entries = read_dir(directory).map_err(|err| Error::Io {
            path: directory.to_owned(),
            err,
        })?;
        for result in dir_entries {
            let dir_entry = result.map_err(|err| Error::Io {
                path: directory.to_owned(),
                err,
            })?;
            let path = dir_entry.path();
            if path.is_dir() {
                debug!(path = %path.display(), "skipping sub-directory");
                continue;
            }
            let file_name = match dir_entry.file_name().into_string() {
                Ok(file_name) => file_name,
                Err(os) => {
                    policy.handle(Error::Parse(ParseError::NonUtf8Filename(os)))?;
                    continue;
                }
            };
            if file_name.starts_with('.') {
                debug!(file = %file_name, "skipping hidden file");
                continue;
            }
            files.push((file_name, path));
        }

        files.sort_by(|a, b| b.0.cmp(&a.0));

        let mut entries = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            let contents = match read_to_string(&path) {
                Ok(contents) => contents,
                // Non-UTF-8 contents make the entry invalid, not the directory.
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    policy.handle(Error::Io { path, err })?;
                    continue;
                }
                Err(err) => return Err(Error::Io { path, err }),
            };
            match Entry::parse(&file_name, &contents) {
                Ok(entry) => entries.push(entry),
                Err(err) => policy.handle(Error::Parse(err))?,
            }
        }

        Ok(Repository {
            entries: dedupe_slugs(entries, policy)?,
        })
    }

    /// Wraps an already-ordered list of entries, checking slugs under
    /// [`LoadPolicy::FailFast`].
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<Entry>) -> Result<Repository> {
        Ok(Repository {
            entries: dedupe_slugs(entries, LoadPolicy::FailFast)?,
        })
    }

    /// All entries, newest first.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries tagged `tag`, in the same relative order as
    /// [`Repository::entries`].
    pub fn by_tag(&self, tag: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.has_tag(tag)).collect()
    }

    /// The union of every entry's tags.
    pub fn all_tags(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .flat_map(|e| e.tags.iter().map(String::as_str))
            .collect()
    }

    /// Groups the entries by tag in a single pass.
    pub fn tag_index(&self) -> TagIndex<'_> {
        let mut index = TagIndex::new();
        for entry in &self.entries {
            for tag in &entry.tags {
                index.entry(tag.as_str()).or_default().push(entry);
            }
        }
        index
    }

    /// Looks up the entry whose slug is `slug`.
    pub fn find(&self, slug: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.slug == slug)
    }
}

impl LoadPolicy {
    /// Either propagates `err` or logs it and lets the caller skip the entry.
    fn handle(self, err: Error) -> Result<()> {
        match self {
            LoadPolicy::FailFast => Err(err),
            LoadPolicy::SkipInvalid => {
                warn!(error = %err, "skipping entry");
                Ok(())
            }
        }
    }
}

/// Rejects empty slugs, reserved slugs, and slugs claimed by an earlier
/// (newer) entry.
fn dedupe_slugs(entries: Vec<Entry>, policy: LoadPolicy) -> Result<Vec<Entry>> {
    let mut seen: HashMap<String, String> = HashMap::with_capacity(entries.len());
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.slug.is_empty() {
            policy.handle(Error::EmptySlug(entry.filename))?;
            continue;
        }
        if RESERVED_SLUGS.contains(&entry.slug.as_str()) {
            policy.handle(Error::ReservedSlug {
                slug: entry.slug,
                filename: entry.filename,
            })?;
            continue;
        }
        if let Some(first) = seen.get(&entry.slug) {
            policy.handle(Error::DuplicateSlug {
                slug: entry.slug.clone(),
                first: first.clone(),
                second: entry.filename,
            })?;
            continue;
        }
        seen.insert(entry.slug.clone(), entry.filename.clone());
        kept.push(entry);
    }
    Ok(kept)
}

/// The result of a fallible repository operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the entries directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when an entry's file name or header block is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Returned when two entries normalize to the same slug and would
    /// overwrite each other's page.
    #[error("`{first}` and `{second}` both have slug `{slug}`")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },

    /// Returned when an entry's title has no characters that survive
    /// slugification.
    #[error("`{0}` has a title that produces an empty slug")]
    EmptySlug(String),

    /// Returned when an entry's slug is one of [`RESERVED_SLUGS`].
    #[error("`{filename}` has slug `{slug}`, which is reserved for a site page")]
    ReservedSlug { slug: String, filename: String },

    /// Returned when the directory or one of its files can't be read.
    #[error("reading `{}`: {err}", path.display())]
    Io { path: PathBuf, err: io::Error },
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_entries(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn titles(entries: &[&Entry]) -> Vec<String> {
        entries.iter().map(|e| e.title.clone()).collect()
    }

    #[test]
    fn test_load_orders_by_filename_descending() -> Result<()> {
        let dir = write_entries(&[
            ("2009.01.01.A", "a"),
            ("2009.03.04.B", "b"),
            ("2008.12.31.C", "c"),
        ]);
        let repo = Repository::load(dir.path(), LoadPolicy::FailFast)?;
        let all: Vec<&Entry> = repo.entries().iter().collect();
        assert_eq!(vec!["B", "A", "C"], titles(&all));
        assert_eq!(3, repo.len());
        Ok(())
    }

    #[test]
    fn test_load_orders_by_filename_not_date() -> Result<()> {
        // Same date; the title breaks the tie lexicographically.
        let dir = write_entries(&[("2009.01.01.Apple", ""), ("2009.01.01.Zebra", "")]);
        let repo = Repository::load(dir.path(), LoadPolicy::FailFast)?;
        assert_eq!("Zebra", repo.entries()[0].title);
        Ok(())
    }

    #[test]
    fn test_load_fail_fast_on_bad_filename() {
        let dir = write_entries(&[("2009.01.01.A", "a"), ("notes.txt", "n")]);
        match Repository::load(dir.path(), LoadPolicy::FailFast) {
            Err(Error::Parse(ParseError::FilenameShape(name))) => assert_eq!("notes.txt", name),
            other => panic!("wanted FilenameShape; found {:?}", other),
        }
    }

    #[test]
    fn test_load_skip_invalid() -> Result<()> {
        let dir = write_entries(&[
            ("2009.01.01.A", "a"),
            ("notes.txt", "n"),
            ("2009.13.01.Bad.Month", "x"),
        ]);
        let repo = Repository::load(dir.path(), LoadPolicy::SkipInvalid)?;
        assert_eq!(1, repo.len());
        assert_eq!("a", repo.entries()[0].slug);
        Ok(())
    }

    #[test]
    fn test_non_utf8_contents() -> Result<()> {
        let dir = write_entries(&[("2009.01.01.A", "a")]);
        fs::write(dir.path().join("2009.02.01.Binary"), [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            Repository::load(dir.path(), LoadPolicy::FailFast),
            Err(Error::Io { .. }),
        ));
        assert_eq!(1, Repository::load(dir.path(), LoadPolicy::SkipInvalid)?.len());
        Ok(())
    }

    #[test]
    fn test_load_ignores_hidden_files_and_directories() -> Result<()> {
        let dir = write_entries(&[("2009.01.01.A", "a"), (".2009.01.01.A.swp", "")]);
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("drafts").join("2010.01.01.Draft"), "").unwrap();
        let repo = Repository::load(dir.path(), LoadPolicy::FailFast)?;
        assert_eq!(1, repo.len());
        Ok(())
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Repository::load(&dir.path().join("nope"), LoadPolicy::SkipInvalid),
            Err(Error::Io { .. }),
        ));
    }

    #[test]
    fn test_duplicate_slug_fails_fast() {
        let dir = write_entries(&[("2009.01.01.Hello.World", ""), ("2010.01.01.Hello,.World!", "")]);
        match Repository::load(dir.path(), LoadPolicy::FailFast) {
            Err(Error::DuplicateSlug { slug, first, second }) => {
                assert_eq!("hello-world", slug);
                assert_eq!("2010.01.01.Hello,.World!", first);
                assert_eq!("2009.01.01.Hello.World", second);
            }
            other => panic!("wanted DuplicateSlug; found {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_slug_keeps_newest_when_skipping() -> Result<()> {
        let dir = write_entries(&[("2009.01.01.Hello.World", "old"), ("2010.01.01.Hello,.World!", "new")]);
        let repo = Repository::load(dir.path(), LoadPolicy::SkipInvalid)?;
        assert_eq!(1, repo.len());
        assert_eq!("new", repo.find("hello-world").unwrap().body);
        Ok(())
    }

    #[test]
    fn test_empty_slug() {
        let dir = write_entries(&[("2009.01.01.!!!", "")]);
        assert!(matches!(
            Repository::load(dir.path(), LoadPolicy::FailFast),
            Err(Error::EmptySlug(_)),
        ));
    }

    #[test]
    fn test_reserved_slugs() -> Result<()> {
        let dir = write_entries(&[
            ("2009.01.01.Index", "i"),
            ("2009.02.01.404", "n"),
            ("2009.03.01.Other", "o"),
        ]);
        match Repository::load(dir.path(), LoadPolicy::FailFast) {
            Err(Error::ReservedSlug { slug, filename }) => {
                assert_eq!("404", slug);
                assert_eq!("2009.02.01.404", filename);
            }
            other => panic!("wanted ReservedSlug; found {:?}", other),
        }

        let repo = Repository::load(dir.path(), LoadPolicy::SkipInvalid)?;
        assert_eq!(1, repo.len());
        assert_eq!("other", repo.entries()[0].slug);
        Ok(())
    }

    #[test]
    fn test_tag_views() -> Result<()> {
        let dir = write_entries(&[
            ("2009.01.01.A", "Tags: rust go\n\na"),
            ("2009.02.01.B", "b"),
            ("2009.03.01.C", "Tags: rust\n\nc"),
            ("2009.04.01.D", "Tags: go\n\nd"),
        ]);
        let repo = Repository::load(dir.path(), LoadPolicy::FailFast)?;

        assert_eq!(vec!["C", "A"], titles(&repo.by_tag("rust")));
        assert_eq!(vec!["D", "A"], titles(&repo.by_tag("go")));
        assert!(repo.by_tag("python").is_empty());

        let all_tags: Vec<&str> = repo.all_tags().into_iter().collect();
        assert_eq!(vec!["go", "rust"], all_tags);

        let index = repo.tag_index();
        assert_eq!(2, index.len());
        assert_eq!(titles(&repo.by_tag("rust")), titles(&index["rust"]));
        assert_eq!(titles(&repo.by_tag("go")), titles(&index["go"]));
        Ok(())
    }

    #[test]
    fn test_find() -> Result<()> {
        let dir = write_entries(&[("2009.03.04.My.Entry.Title", "body")]);
        let repo = Repository::load(dir.path(), LoadPolicy::FailFast)?;
        assert_eq!("body", repo.find("my-entry-title").unwrap().body);
        assert!(repo.find("nope").is_none());
        Ok(())
    }
}
