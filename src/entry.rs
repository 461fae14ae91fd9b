//! Defines the [`Entry`] type and the logic for deriving an entry's metadata
//! from its filename (`YYYY.MM.DD.Some.Title.Parts`) and its contents (an
//! optional mail-like header block followed by a markdown body).

use crate::slug::slugify;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Filenames must look like `2009.03.04.Title.Words`. Only ASCII digits are
/// accepted for the date fields.
static FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})\.([0-9]{2})\.([0-9]{2})\.(.+)$").unwrap());

/// The header holding an entry's whitespace-separated tags.
const TAGS_HEADER: &str = "tags";

/// One blog post, backed by one file in the entries directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// The raw on-disk file name. Entries are ordered by this, not by `date`.
    pub filename: String,

    /// The date from the filename prefix.
    pub date: NaiveDate,

    /// The title from the remainder of the filename, dots replaced by spaces.
    pub title: String,

    /// `slugify(title)`. Unique within a loaded
    /// [`crate::repository::Repository`].
    pub slug: String,

    /// The markdown body, without the header block.
    pub body: String,

    /// The entry's tags. Empty for untagged entries.
    pub tags: BTreeSet<String>,
}

impl Entry {
    /// Builds an [`Entry`] from a file name and the file's contents.
    pub fn parse(filename: &str, contents: &str) -> Result<Entry> {
        let (date, title) = parse_filename(filename)?;
        let document = parse_document(contents).map_err(|err| match err {
            ParseError::MalformedHeader { line, .. } => ParseError::MalformedHeader {
                filename: filename.to_owned(),
                line,
            },
            err => err,
        })?;
        if let Some(tag) = document.tags.iter().find(|tag| !is_valid_tag(tag)) {
            return Err(ParseError::InvalidTag {
                filename: filename.to_owned(),
                tag: tag.clone(),
            });
        }
        Ok(Entry {
            filename: filename.to_owned(),
            date,
            slug: slugify(&title),
            title,
            body: document.body,
            tags: document.tags,
        })
    }

    /// Returns `true` if the entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Tags become path components in the output tree (`tags/{tag}/`), so they
/// may not contain path separators or be `.`/`..`.
fn is_valid_tag(tag: &str) -> bool {
    !(tag == "." || tag == ".." || tag.contains(&['/', '\\'][..]))
}

/// Splits a file name of the form `YYYY.MM.DD.Some.Title.Parts` into its date
/// and its title (`"Some Title Parts"`). Every dot in the title portion
/// becomes one space, so `A..B` yields `"A  B"`.
pub fn parse_filename(filename: &str) -> Result<(NaiveDate, String)> {
    let caps = FILENAME
        .captures(filename)
        .ok_or_else(|| ParseError::FilenameShape(filename.to_owned()))?;

    // The regex guarantees ASCII digits of bounded width, so these cannot
    // overflow.
    let field = |i: usize| caps[i].parse::<u32>().unwrap_or_default();
    let (year, month, day) = (field(1), field(2), field(3));
    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| {
        ParseError::InvalidDate {
            filename: filename.to_owned(),
            year,
            month,
            day,
        }
    })?;

    Ok((date, caps[4].replace('.', " ")))
}

/// Formats a date for display and for feed identifiers, e.g. `2009-03-04`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The parsed contents of an entry file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub tags: BTreeSet<String>,
    pub body: String,
}

/// Parses entry file contents. A file whose first line looks like a header
/// (`Name: value`) starts with a header block that runs until the first blank
/// line:
///
/// ```text
/// Tags: rust blogging
///
/// The body, in *markdown*.
/// ```
///
/// Lines beginning with a space or tab continue the preceding header. Header
/// names are case-insensitive and only `Tags` is interpreted. Files that don't
/// open with a header line have no header block at all; their whole contents
/// are the body.
pub fn parse_document(contents: &str) -> Result<Document> {
    let mut document = Document::default();
    if !contents.lines().next().map_or(false, is_header_line) {
        document.body = contents.to_owned();
        return Ok(document);
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    let mut offset = 0;
    let mut body_start = contents.len();
    for (number, raw_line) in contents.split_inclusive('\n').enumerate() {
        let line = raw_line.trim_end_matches(&['\n', '\r'][..]);
        offset += raw_line.len();
        if line.is_empty() {
            body_start = offset;
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                None => unreachable!("the first line is a header line"),
            }
        } else if is_header_line(line) {
            // `is_header_line` guarantees the colon exists.
            let (name, value) = line.split_at(line.find(':').unwrap_or_default());
            headers.push((name.to_ascii_lowercase(), value[1..].trim().to_owned()));
        } else {
            return Err(ParseError::MalformedHeader {
                filename: String::new(),
                line: number + 1,
            });
        }
    }

    for (name, value) in &headers {
        if name == TAGS_HEADER {
            document
                .tags
                .extend(value.split_whitespace().map(str::to_owned));
        }
    }
    document.body = contents[body_start..].to_owned();
    Ok(document)
}

/// A header line is a non-empty run of printable ASCII other than `:` and
/// space, followed by a colon.
fn is_header_line(line: &str) -> bool {
    match line.find(':') {
        Some(0) | None => false,
        Some(i) => line[..i].bytes().all(|b| b.is_ascii_graphic() && b != b':'),
    }
}

/// The result of a fallible entry-parsing operation.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Represents an entry whose file name or header block has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Returned when a file name doesn't match `YYYY.MM.DD.Title`.
    #[error("file name `{0}` doesn't match `YYYY.MM.DD.Title`")]
    FilenameShape(String),

    /// Returned when the date prefix is not a real calendar date.
    #[error("file name `{filename}` has invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate {
        filename: String,
        year: u32,
        month: u32,
        day: u32,
    },

    /// Returned when a line inside the header block is neither a header nor a
    /// continuation.
    #[error("`{filename}` line {line}: expected `Header: value` or a blank line")]
    MalformedHeader { filename: String, line: usize },

    /// Returned when a tag can't be used as a path component.
    #[error("`{filename}` has invalid tag `{tag}`")]
    InvalidTag { filename: String, tag: String },

    /// Returned when a file name isn't valid UTF-8.
    #[error("file name {0:?} is not valid UTF-8")]
    NonUtf8Filename(std::ffi::OsString),
}
