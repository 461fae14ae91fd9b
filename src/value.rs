use crate::config::{Author, Link};
use gtmpl_value::Value;
use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;

/// Escapes text for inclusion in HTML. Templates print values verbatim, so
/// every plain-text field is escaped on its way into a [`Value`].
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // Writing into a `String` can't fail.
    let _ = escape_html(&mut out, s);
    out
}

/// Builds a [`Value::Object`] from field/value pairs.
pub fn object<I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<HashMap<String, Value>>(),
    )
}

/// Escapes `s` and wraps it in a [`Value::String`].
pub fn text(s: &str) -> Value {
    Value::String(escape(s))
}

/// Wraps already-safe markup (rendered HTML, URLs we built) without escaping.
pub fn raw<S: Into<String>>(s: S) -> Value {
    Value::String(s.into())
}

impl From<&Link> for Value {
    fn from(link: &Link) -> Value {
        object(vec![("name", text(&link.name)), ("url", text(&link.url))])
    }
}

impl From<&Author> for Value {
    /// Missing optional fields become empty strings so templates can test
    /// them with `if`.
    fn from(author: &Author) -> Value {
        let optional = |field: &Option<String>| text(field.as_deref().unwrap_or_default());
        object(vec![
            ("name", text(&author.name)),
            ("email", optional(&author.email)),
            ("url", optional(&author.url)),
            (
                "elsewhere",
                Value::Array(author.elsewhere.iter().map(Value::from).collect()),
            ),
        ])
    }
}
