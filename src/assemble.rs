//! Composes entries, the site [`Config`], and the theme [`Templates`] into
//! finished output documents. Everything here is a pure function of its
//! inputs; writing the results to disk or to a socket is left to
//! [`crate::build`] and [`crate::serve`].

use crate::config::{Config, EntryLayout};
use crate::entry::{format_date, Entry};
use crate::feed::{self, FeedConfig, FeedItem};
use crate::markdown;
use crate::template::{PageKind, Templates, STYLESHEET};
use crate::value::{object, raw, text};
use gtmpl::Context;
use gtmpl_value::Value;
use std::path::PathBuf;

/// The path of the main index's feed.
pub const INDEX_FEED: &str = "/index.atom";

/// Which entries a feed covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedScope<'t> {
    Index,
    Tag(&'t str),
}

/// Renders every kind of output document. See the module documentation.
pub struct Assembler<'a> {
    config: &'a Config,
    templates: &'a Templates,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a Config, templates: &'a Templates) -> Self {
        Assembler { config, templates }
    }

    /// The main index: every entry in order, only the first with its body.
    pub fn index<'e, I>(&self, entries: I) -> Result<String>
    where
        I: IntoIterator<Item = &'e Entry>,
    {
        self.list(None, entries)
    }

    /// The index for a single tag. Same shape as [`Assembler::index`], with
    /// the tag marked active.
    pub fn tag_index<'e, I>(&self, tag: &str, entries: I) -> Result<String>
    where
        I: IntoIterator<Item = &'e Entry>,
    {
        self.list(Some(tag), entries)
    }

    fn list<'e, I>(&self, active_tag: Option<&str>, entries: I) -> Result<String>
    where
        I: IntoIterator<Item = &'e Entry>,
    {
        let (head_title, feed_url) = match active_tag {
            None => (self.config.title.clone(), INDEX_FEED.to_owned()),
            Some(tag) => (self.head_title(tag), tag_feed_href(tag)),
        };
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| self.entry_value(entry, i == 0, false, active_tag))
            .collect();

        let mut context = self.base_context(&head_title, &feed_url);
        context.extend(vec![
            ("entries", Value::Array(entries)),
            ("active_tag", text(active_tag.unwrap_or_default())),
        ]);
        self.render(PageKind::List, context)
    }

    /// The page for a single entry, with its full body.
    pub fn entry(&self, entry: &Entry) -> Result<String> {
        let mut context = self.base_context(&self.head_title(&entry.title), INDEX_FEED);
        context.push(("entry", self.entry_value(entry, true, true, None)));
        self.render(PageKind::Detail, context)
    }

    /// The static not-found page.
    pub fn not_found(&self) -> Result<String> {
        let context = self.base_context(&self.head_title("Resource not found"), INDEX_FEED);
        self.render(PageKind::NotFound, context)
    }

    /// The theme's stylesheet.
    pub fn stylesheet(&self) -> &str {
        self.templates.source(STYLESHEET).unwrap_or_default()
    }

    /// The Atom feed for `scope`. `entries` must already be filtered to the
    /// scope and in repository order.
    pub fn feed<'e, I>(&self, scope: FeedScope, entries: I) -> Result<String>
    where
        I: IntoIterator<Item = &'e Entry>,
    {
        let domain = self.config.domain();
        let epoch = self.config.feed_epoch;
        let config = match scope {
            FeedScope::Index => FeedConfig {
                title: self.config.title.clone(),
                id: feed::feed_id(domain, epoch, None),
                author: self.config.author.name.clone(),
                home_page: self.absolute("/"),
                feed_url: self.absolute(INDEX_FEED),
                epoch,
            },
            FeedScope::Tag(tag) => FeedConfig {
                title: self.head_title(tag),
                id: feed::tag_feed_id(domain, epoch, tag),
                author: self.config.author.name.clone(),
                home_page: self.absolute(&tag_href(tag)),
                feed_url: self.absolute(&tag_feed_href(tag)),
                epoch,
            },
        };
        let items = entries
            .into_iter()
            .map(|entry| FeedItem {
                title: entry.title.clone(),
                id: feed::feed_id(domain, epoch, Some(entry)),
                link: self.absolute(&self.entry_href(entry)),
                date: entry.date,
                content_html: render_body(entry),
            })
            .collect();

        let xml = feed::write_feed(config, items, Vec::new())?;
        String::from_utf8(xml).map_err(|err| Error::Encoding(err.to_string()))
    }

    /// The root-relative link to an entry's page.
    pub fn entry_href(&self, entry: &Entry) -> String {
        match self.config.entry_layout {
            EntryLayout::File => format!("/{}.html", entry.slug),
            EntryLayout::Directory => format!("/{}/", entry.slug),
        }
    }

    /// Where an entry's page lives, relative to the output root.
    pub fn entry_path(&self, entry: &Entry) -> PathBuf {
        match self.config.entry_layout {
            EntryLayout::File => PathBuf::from(format!("{}.html", entry.slug)),
            EntryLayout::Directory => PathBuf::from(&entry.slug).join("index.html"),
        }
    }

    /// Resolves a root-relative link against the site URL.
    pub fn absolute(&self, href: &str) -> String {
        match self.config.url.join(href) {
            Ok(url) => url.to_string(),
            Err(_) => href.to_owned(),
        }
    }

    fn head_title(&self, suffix: &str) -> String {
        format!("{}: {}", self.config.title, suffix)
    }

    fn base_context(&self, head_title: &str, feed_url: &str) -> Vec<(&'static str, Value)> {
        vec![
            ("site_title", text(&self.config.title)),
            ("head_title", text(head_title)),
            ("stylesheet_url", raw(format!("/{}", self.config.stylesheet))),
            ("feed_url", raw(self.absolute(feed_url))),
            ("author", Value::from(&self.config.author)),
        ]
    }

    /// Converts an entry into a template value. Only entries with
    /// `display_content` carry a rendered body.
    fn entry_value(
        &self,
        entry: &Entry,
        display_content: bool,
        plain_title: bool,
        active_tag: Option<&str>,
    ) -> Value {
        let tags = entry
            .tags
            .iter()
            .map(|tag| {
                object(vec![
                    ("name", text(tag)),
                    ("url", raw(tag_href(tag))),
                    ("active", Value::Bool(active_tag == Some(tag.as_str()))),
                ])
            })
            .collect();
        let content = match display_content {
            true => render_body(entry),
            false => String::new(),
        };

        object(vec![
            ("title", text(&entry.title)),
            ("slug", raw(entry.slug.as_str())),
            ("url", raw(self.entry_href(entry))),
            (
                "date",
                object(vec![
                    ("display", raw(format_date(entry.date))),
                    ("iso8601", raw(format!("{}T00:00:00", format_date(entry.date)))),
                ]),
            ),
            ("tags", Value::Array(tags)),
            ("display_content", Value::Bool(display_content)),
            ("plain_title", Value::Bool(plain_title)),
            ("content", raw(content)),
        ])
    }

    fn render(&self, kind: PageKind, context: Vec<(&'static str, Value)>) -> Result<String> {
        let context = Context::from(object(context)).map_err(Error::Template)?;
        let mut out: Vec<u8> = Vec::new();
        self.templates
            .page(kind)
            .execute(&mut out, &context)
            .map_err(Error::Template)?;
        let html = String::from_utf8(out).map_err(|err| Error::Encoding(err.to_string()))?;
        // The `define`s ahead of the layout leave blank lines behind.
        Ok(html.trim_start().to_owned())
    }
}

/// The root-relative link to a tag's index page.
pub fn tag_href(tag: &str) -> String {
    format!("/tags/{}/", urlencoding::encode(tag))
}

/// The root-relative link to a tag's feed.
pub fn tag_feed_href(tag: &str) -> String {
    format!("/tags/{}.atom", urlencoding::encode(tag))
}

/// Renders an entry's markdown body to HTML.
pub fn render_body(entry: &Entry) -> String {
    let mut html = String::new();
    markdown::to_html(&mut html, &entry.body);
    html
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to render a page or feed. No partial output is
/// produced when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a template fails to execute.
    #[error("executing template: {0}")]
    Template(String),

    /// Returned when the Atom feed can't be serialized.
    #[error(transparent)]
    Feed(#[from] feed::Error),

    /// Returned when rendered output isn't valid UTF-8.
    #[error("rendered output is not valid UTF-8: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::Repository;
    use std::path::Path;

    const CONFIG: &str = "
title: Journal
url: http://journal.example.org
author:
  name: Jane Doe
  email: jane@example.org
";

    fn config() -> Config {
        Config::from_yaml(CONFIG, Path::new("/blog")).unwrap()
    }

    fn repository() -> Repository {
        let entry = |name: &str, contents: &str| Entry::parse(name, contents).unwrap();
        Repository::from_entries(vec![
            entry("2009.03.04.Newest", "Tags: rust\n\n# Newest body"),
            entry("2009.02.01.Middle", "Tags: go rust\n\nMiddle body"),
            entry("2009.01.01.Fish.&.Chips", "Oldest body"),
        ])
        .unwrap()
    }

    #[test]
    fn test_index_shows_only_first_body() -> Result<()> {
        let config = config();
        let templates = Templates::builtin().unwrap();
        let assembler = Assembler::new(&config, &templates);
        let repo = repository();
        let html = assembler.index(repo.entries())?;

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Journal</title>"));
        assert!(html.contains("<h3>Newest body</h3>"));
        assert!(!html.contains("Middle body"));
        assert!(!html.contains("Oldest body"));
        assert!(html.contains(r#"<a href="/middle.html" rel="bookmark">Middle</a>"#));
        assert!(html.contains("Fish &amp; Chips"));
        assert!(html.contains(r#"href="/tags/go/""#));
        assert!(html.contains("http://journal.example.org/index.atom"));

        let newest = html.find("Newest").unwrap();
        let middle = html.find("Middle").unwrap();
        let oldest = html.find("Fish").unwrap();
        assert!(newest < middle && middle < oldest);
        Ok(())
    }

    #[test]
    fn test_tag_index() -> Result<()> {
        let config = config();
        let templates = Templates::builtin().unwrap();
        let assembler = Assembler::new(&config, &templates);
        let repo = repository();
        let html = assembler.tag_index("go", repo.by_tag("go"))?;

        assert!(html.contains("<title>Journal: go</title>"));
        assert!(html.contains(r#"<h1><a href="/">Journal</a></h1>"#));
        assert!(html.contains("Middle body"));
        assert!(!html.contains("Newest"));
        assert!(html.contains(r#"<li class="active"><a href="/tags/go/" rel="tag">go</a></li>"#));
        assert!(html.contains("http://journal.example.org/tags/go.atom"));
        Ok(())
    }

    #[test]
    fn test_entry_page() -> Result<()> {
        let config = config();
        let templates = Templates::builtin().unwrap();
        let assembler = Assembler::new(&config, &templates);
        let repo = repository();
        let html = assembler.entry(repo.find("middle").unwrap())?;

        assert!(html.contains("<title>Journal: Middle</title>"));
        assert!(html.contains("<h2>Middle</h2>"));
        assert!(html.contains("<p>Middle body</p>"));
        assert!(html.contains(r#"title="2009-02-01T00:00:00">2009-02-01</abbr>"#));
        assert!(html.contains("mailto:jane@example.org"));
        Ok(())
    }

    #[test]
    fn test_not_found_page() -> Result<()> {
        let config = config();
        let templates = Templates::builtin().unwrap();
        let html = Assembler::new(&config, &templates).not_found()?;
        assert!(html.contains("<title>Journal: Resource not found</title>"));
        assert!(html.contains("Resource not found. Go back to"));
        Ok(())
    }

    #[test]
    fn test_feed() -> Result<()> {
        let config = config();
        let templates = Templates::builtin().unwrap();
        let assembler = Assembler::new(&config, &templates);
        let repo = repository();

        let xml = assembler.feed(FeedScope::Index, repo.entries())?;
        assert!(xml.contains("<id>tag:journal.example.org,2009-03-04:/</id>"));
        assert!(xml.contains("<id>tag:journal.example.org,2009-02-01:/middle</id>"));
        assert!(xml.contains(r#"href="http://journal.example.org/middle.html""#));
        assert!(xml.contains("<updated>2009-03-04T00:00:00+00:00</updated>"));
        assert_eq!(xml, assembler.feed(FeedScope::Index, repo.entries())?);

        let xml = assembler.feed(FeedScope::Tag("go"), repo.by_tag("go"))?;
        assert!(xml.contains("<id>tag:journal.example.org,2009-03-04:/tags/go</id>"));
        assert!(xml.contains("<updated>2009-02-01T00:00:00+00:00</updated>"));
        assert!(!xml.contains("/newest.html"));
        Ok(())
    }

    #[test]
    fn test_directory_layout_links() {
        let mut config = config();
        config.entry_layout = EntryLayout::Directory;
        let templates = Templates::builtin().unwrap();
        let assembler = Assembler::new(&config, &templates);
        let repo = repository();
        let entry = repo.find("newest").unwrap();
        assert_eq!("/newest/", assembler.entry_href(entry));
        assert_eq!(PathBuf::from("newest").join("index.html"), assembler.entry_path(entry));
    }

    #[test]
    fn test_tag_hrefs_are_encoded() {
        assert_eq!("/tags/c%2B%2B/", tag_href("c++"));
        assert_eq!("/tags/rust.atom", tag_feed_href("rust"));
    }
}
