//! Converts entry titles into URL-safe identifiers.

/// Normalizes `title` into a slug: every character that isn't an ASCII word
/// character (`[A-Za-z0-9_]`), whitespace (`[ \t\n\r\x0B\x0C]`), or a hyphen
/// is dropped, each run of whitespace becomes a single `-`, and the result is
/// lowercased.
///
/// Non-ASCII letters are dropped rather than transliterated, so `"Café"`
/// becomes `"caf"`. An empty (or all-punctuation) title yields an empty slug;
/// [`crate::repository::Repository::load`] refuses to publish those.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for c in title.chars() {
        if is_whitespace(c) {
            in_whitespace = true;
            continue;
        }
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if in_whitespace {
            slug.push('-');
            in_whitespace = false;
        }
        slug.push(c.to_ascii_lowercase());
    }
    if in_whitespace {
        slug.push('-');
    }
    slug
}

/// `char::is_ascii_whitespace` plus the vertical tab.
fn is_whitespace(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0B'
}
