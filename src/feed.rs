//! Support for creating Atom feeds from a list of entries, and for the stable
//! identifiers that let feed readers recognize an entry across rebuilds.

use crate::entry::{format_date, Entry};
use crate::value::escape;
use atom_syndication::{Content, Entry as AtomEntry, Error as AtomError, Feed, Link, Person};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::io::Write;

/// Returns the tag URI identifying `entry`, or the root feed itself when
/// `entry` is `None`:
///
/// * entry: `tag:{domain},{YYYY-MM-DD}:/{slug}`
/// * feed: `tag:{domain},{epoch}:/`
///
/// The result only depends on its arguments, so an unchanged entry keeps its
/// identifier across regenerations.
pub fn feed_id(domain: &str, epoch: NaiveDate, entry: Option<&Entry>) -> String {
    match entry {
        Some(entry) => format!("tag:{},{}:/{}", domain, format_date(entry.date), entry.slug),
        None => format!("tag:{},{}:/", domain, format_date(epoch)),
    }
}

/// Returns the identifier of the feed for `tag`. Tag feeds hang off the root
/// feed's identifier so each feed keeps a distinct identity.
pub fn tag_feed_id(domain: &str, epoch: NaiveDate, tag: &str) -> String {
    format!("{}tags/{}", feed_id(domain, epoch, None), tag)
}

/// Interprets a calendar date as midnight UTC.
pub fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default())).into()
}

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: String,

    /// The page the feed mirrors (the site, or a tag's index page).
    pub home_page: String,

    /// The feed's own URL, emitted as the `self` link.
    pub feed_url: String,

    /// Used as the feed's `updated` time when there are no entries.
    pub epoch: NaiveDate,
}

/// One rendered feed item.
pub struct FeedItem {
    pub title: String,
    pub id: String,
    pub link: String,
    pub date: NaiveDate,
    pub content_html: String,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and rendered
/// [`FeedItem`]s (newest first) and writes the result to `w`.
pub fn write_feed<W: Write>(config: FeedConfig, items: Vec<FeedItem>, w: W) -> Result<W> {
    Ok(feed(config, items).write_to(w)?)
}

fn feed(config: FeedConfig, items: Vec<FeedItem>) -> Feed {
    let updated = items.first().map_or(config.epoch, |item| item.date);
    let authors = vec![person(&config.author)];

    let mut feed = Feed::default();
    feed.set_title(config.title);
    feed.set_id(config.id);
    feed.set_updated(midnight_utc(updated));
    feed.set_authors(authors);
    feed.set_links(vec![
        link(config.home_page, "alternate"),
        link(config.feed_url, "self"),
    ]);
    feed.set_entries(items.into_iter().map(feed_entry).collect::<Vec<AtomEntry>>());
    feed
}

fn feed_entry(item: FeedItem) -> AtomEntry {
    let mut content = Content::default();
    content.set_content_type("html".to_owned());
    content.set_value(item.content_html);

    let mut entry = AtomEntry::default();
    entry.set_title(item.title);
    entry.set_id(item.id);
    entry.set_updated(midnight_utc(item.date));
    entry.set_links(vec![link(item.link, "alternate")]);
    entry.set_content(content);
    entry
}

fn link(href: String, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link
}

/// `Person` names are written verbatim, unlike titles, so they are escaped
/// here.
fn person(name: &str) -> Person {
    let mut person = Person::default();
    person.set_name(escape(name));
    person
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem serializing a feed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    #[error(transparent)]
    Atom(#[from] AtomError),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry() -> Entry {
        Entry {
            filename: "2009.03.04.My.Entry".to_owned(),
            date: date(2009, 3, 4),
            title: "My Entry".to_owned(),
            slug: "my-entry".to_owned(),
            body: String::new(),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_entry_feed_id() {
        let e = entry();
        let id = feed_id("journal.example.org", date(2000, 1, 1), Some(&e));
        assert_eq!("tag:journal.example.org,2009-03-04:/my-entry", id);
        assert_eq!(id, feed_id("journal.example.org", date(2000, 1, 1), Some(&e.clone())));
    }

    #[test]
    fn test_root_feed_id_uses_epoch() {
        assert_eq!(
            "tag:journal.example.org,2009-03-04:/",
            feed_id("journal.example.org", date(2009, 3, 4), None),
        );
        assert_eq!(
            "tag:journal.example.org,2009-03-04:/tags/rust",
            tag_feed_id("journal.example.org", date(2009, 3, 4), "rust"),
        );
    }

    fn config() -> FeedConfig {
        FeedConfig {
            title: "Journal".to_owned(),
            id: "tag:example.org,2009-03-04:/".to_owned(),
            author: "Jane & co".to_owned(),
            home_page: "http://example.org/".to_owned(),
            feed_url: "http://example.org/index.atom".to_owned(),
            epoch: date(2009, 3, 4),
        }
    }

    #[test]
    fn test_write_feed() -> Result<()> {
        let items = vec![
            FeedItem {
                title: "Newer".to_owned(),
                id: "tag:example.org,2010-05-06:/newer".to_owned(),
                link: "http://example.org/newer.html".to_owned(),
                date: date(2010, 5, 6),
                content_html: "<p>new</p>".to_owned(),
            },
            FeedItem {
                title: "Older".to_owned(),
                id: "tag:example.org,2009-05-06:/older".to_owned(),
                link: "http://example.org/older.html".to_owned(),
                date: date(2009, 5, 6),
                content_html: "<p>old</p>".to_owned(),
            },
        ];
        let xml = String::from_utf8(write_feed(config(), items, Vec::new())?).unwrap();

        assert!(xml.contains("<id>tag:example.org,2009-03-04:/</id>"));
        assert!(xml.contains("<updated>2010-05-06T00:00:00+00:00</updated>"));
        assert!(xml.contains("<name>Jane &amp; co</name>"));
        assert!(xml.contains(r#"rel="self""#));
        assert!(xml.contains("<id>tag:example.org,2010-05-06:/newer</id>"));
        assert!(xml.contains(r#"type="html""#));
        assert!(xml.find("Newer").unwrap() < xml.find("Older").unwrap());
        Ok(())
    }

    #[test]
    fn test_empty_feed_uses_epoch() -> Result<()> {
        let xml = String::from_utf8(write_feed(config(), Vec::new(), Vec::new())?).unwrap();
        assert!(xml.contains("<updated>2009-03-04T00:00:00+00:00</updated>"));
        Ok(())
    }
}
