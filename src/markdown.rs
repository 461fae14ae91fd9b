use pulldown_cmark::{html, Event, Options, Parser, Tag};

/// Headings in an entry body sit below both the site title (h1) and the entry
/// title (h2), so `#` is rendered as h3.
const HEADING_OFFSET: u32 = 2;

/// Converts markdown to HTML, appending the result to `out`.
pub fn to_html(out: &mut String, markdown: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    html::push_html(out, Parser::new_ext(markdown, options).map(demote_headings));
}

fn demote_headings(ev: Event) -> Event {
    match ev {
        Event::Start(Tag::Heading(level)) => Event::Start(Tag::Heading(demote(level))),
        Event::End(Tag::Heading(level)) => Event::End(Tag::Heading(demote(level))),
        _ => ev,
    }
}

fn demote(level: u32) -> u32 {
    (level + HEADING_OFFSET).min(6)
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown);
        out
    }

    #[test]
    fn test_headings_are_demoted() {
        assert_eq!("<h3>Title</h3>\n", render("# Title"));
        assert_eq!("<h6>Deep</h6>\n", render("##### Deep"));
    }

    #[test]
    fn test_smart_punctuation() {
        assert_eq!("<p>“quoted” – dash</p>\n", render("\"quoted\" -- dash"));
    }

    #[test]
    fn test_fenced_code_language() {
        assert_eq!(
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>\n",
            render("```rust\nfn main() {}\n```"),
        );
    }
}
