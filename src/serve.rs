//! Serves the site dynamically: every request reloads the entries from disk
//! and renders the matching page on the fly, so edits show up without a
//! rebuild.
//!
//! Routing is an explicit, ordered table of `(method, pattern, handler)`
//! triples; the first matching route wins. Patterns are `/`-separated
//! segments where a literal must match exactly, `:name` captures one segment
//! (optionally with a literal suffix, as in `:tag.atom`), and a trailing
//! `*name` captures the rest of the path. `HEAD` requests are routed as
//! `GET`.

use crate::assemble::{self, Assembler, FeedScope, INDEX_FEED};
use crate::config::Config;
use crate::repository::{self, LoadPolicy, Repository};
use crate::template::Templates;
use anyhow::anyhow;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info};

const HTML: &str = "text/html; charset=utf-8";
const CSS: &str = "text/css; charset=utf-8";
const ATOM: &str = "application/atom+xml; charset=utf-8";
const PLAIN: &str = "text/plain; charset=utf-8";

/// A finished response, independent of the HTTP server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Reply {
        Reply {
            status: 200,
            content_type,
            body: body.into(),
        }
    }
}

type Handler<'a> = fn(&Dispatcher<'a>, &[&str]) -> Result<Option<Reply>>;

/// One row of the route table. A handler returning `Ok(None)` means the
/// route matched but the resource doesn't exist.
struct Route<'a> {
    method: Method,
    pattern: String,
    handler: Handler<'a>,
}

/// Maps requests to rendered pages. See the module documentation.
pub struct Dispatcher<'a> {
    config: &'a Config,
    assembler: Assembler<'a>,
    routes: Vec<Route<'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a Config, templates: &'a Templates) -> Self {
        let route = |pattern: &str, handler: Handler<'a>| Route {
            method: Method::Get,
            pattern: pattern.to_owned(),
            handler,
        };
        let routes = vec![
            route("/", Self::index),
            route("/index.html", Self::index),
            route(INDEX_FEED, Self::index_feed),
            route(&format!("/{}", config.stylesheet), Self::stylesheet),
            route("/tags/:tag.atom", Self::tag_feed),
            route("/tags/:tag", Self::tag_index),
            route("/:slug", Self::entry),
            route("/*path", Self::asset),
        ];
        Dispatcher {
            config,
            assembler: Assembler::new(config, templates),
            routes,
        }
    }

    /// Answers one request. Never fails: unmatched requests get the
    /// not-found page and internal errors are logged and answered with a 500.
    pub fn dispatch(&self, method: &Method, url: &str) -> Reply {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let path = match urlencoding::decode(path) {
            Ok(path) => path,
            Err(_) => return self.not_found(),
        };

        for route in self.routes.iter().filter(|r| method_matches(method, &r.method)) {
            let captures = match match_route(&route.pattern, &path) {
                Some(captures) => captures,
                None => continue,
            };
            debug!(pattern = %route.pattern, path = %path, "matched route");
            return match (route.handler)(self, &captures) {
                Ok(Some(reply)) => reply,
                Ok(None) => self.not_found(),
                Err(err) => {
                    error!(path = %path, error = %err, "handling request");
                    internal_error()
                }
            };
        }
        self.not_found()
    }

    fn load(&self) -> Result<Repository> {
        Ok(Repository::load(
            &self.config.entries_directory,
            LoadPolicy::SkipInvalid,
        )?)
    }

    fn index(&self, _: &[&str]) -> Result<Option<Reply>> {
        let repo = self.load()?;
        Ok(Some(Reply::ok(HTML, self.assembler.index(repo.entries())?)))
    }

    fn index_feed(&self, _: &[&str]) -> Result<Option<Reply>> {
        let repo = self.load()?;
        let xml = self.assembler.feed(FeedScope::Index, repo.entries())?;
        Ok(Some(Reply::ok(ATOM, xml)))
    }

    fn stylesheet(&self, _: &[&str]) -> Result<Option<Reply>> {
        Ok(Some(Reply::ok(CSS, self.assembler.stylesheet())))
    }

    fn tag_index(&self, captures: &[&str]) -> Result<Option<Reply>> {
        let tag = captures[0];
        let repo = self.load()?;
        let entries = repo.by_tag(tag);
        if entries.is_empty() {
            return Ok(None);
        }
        let html = self.assembler.tag_index(tag, entries)?;
        Ok(Some(Reply::ok(HTML, html)))
    }

    fn tag_feed(&self, captures: &[&str]) -> Result<Option<Reply>> {
        let tag = captures[0];
        let repo = self.load()?;
        let entries = repo.by_tag(tag);
        if entries.is_empty() {
            return Ok(None);
        }
        let xml = self.assembler.feed(FeedScope::Tag(tag), entries)?;
        Ok(Some(Reply::ok(ATOM, xml)))
    }

    /// `/<slug>`, `/<slug>.html`, and `/<slug>/` all name the same entry.
    /// Anything else at the top level may still be an asset.
    fn entry(&self, captures: &[&str]) -> Result<Option<Reply>> {
        let name = captures[0];
        let slug = name.strip_suffix(".html").unwrap_or(name);
        let repo = self.load()?;
        match repo.find(slug) {
            Some(entry) => Ok(Some(Reply::ok(HTML, self.assembler.entry(entry)?))),
            None => self.asset(captures),
        }
    }

    fn asset(&self, captures: &[&str]) -> Result<Option<Reply>> {
        let relative = match safe_relative_path(captures[0]) {
            Some(relative) => relative,
            None => return Ok(None),
        };
        let path = self.config.assets_directory.join(relative);
        if !path.is_file() {
            return Ok(None);
        }
        let body = fs::read(&path).map_err(|err| Error::Io {
            path: path.clone(),
            err,
        })?;
        Ok(Some(Reply::ok(guess_content_type(&path), body)))
    }

    fn not_found(&self) -> Reply {
        match self.assembler.not_found() {
            Ok(html) => Reply {
                status: 404,
                content_type: HTML,
                body: html.into_bytes(),
            },
            Err(err) => {
                error!(error = %err, "rendering not-found page");
                internal_error()
            }
        }
    }
}

fn method_matches(method: &Method, route: &Method) -> bool {
    method == route || (*method == Method::Head && *route == Method::Get)
}

fn internal_error() -> Reply {
    Reply {
        status: 500,
        content_type: PLAIN,
        body: b"500 Internal Server Error".to_vec(),
    }
}

/// Matches `path` against `pattern`, returning the captured segments in
/// order. A trailing slash on the path is ignored.
fn match_route<'p>(pattern: &str, path: &'p str) -> Option<Vec<&'p str>> {
    let path = match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    };
    if pattern == "/" {
        return if path == "/" { Some(Vec::new()) } else { None };
    }

    let mut rest = path.strip_prefix('/')?;
    let mut captures = Vec::new();
    for segment in pattern.trim_start_matches('/').split('/') {
        if segment.starts_with('*') {
            if rest.is_empty() {
                return None;
            }
            captures.push(rest);
            return Some(captures);
        }

        let (head, tail) = rest.split_once('/').unwrap_or((rest, ""));
        if head.is_empty() {
            return None;
        }
        match segment.strip_prefix(':') {
            Some(param) => {
                let capture = match param.find('.') {
                    Some(dot) => head.strip_suffix(&param[dot..])?,
                    None => head,
                };
                if capture.is_empty() {
                    return None;
                }
                captures.push(capture);
            }
            None if segment == head => {}
            None => return None,
        }
        rest = tail;
    }
    if rest.is_empty() {
        Some(captures)
    } else {
        None
    }
}

/// Turns a request path into a path relative to the assets directory,
/// refusing anything that could climb out of it.
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with('.') {
                    return None;
                }
                relative.push(part);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => HTML,
        Some("css") => CSS,
        Some("atom") => ATOM,
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => PLAIN,

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Listens on `address` and answers requests until the process is stopped.
pub fn serve_site(
    config: &Config,
    templates: &Templates,
    address: std::net::SocketAddr,
) -> anyhow::Result<()> {
    let server = Server::http(address).map_err(|err| anyhow!("binding {}: {}", address, err))?;
    let dispatcher = Dispatcher::new(config, templates);
    info!(address = %address, "serving {}", config.title);

    for request in server.incoming_requests() {
        let reply = dispatcher.dispatch(request.method(), request.url());
        info!(
            method = %request.method(),
            url = %request.url(),
            status = reply.status,
            "request"
        );
        let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
            .map_err(|_| anyhow!("invalid content type `{}`", reply.content_type))?;
        let response = Response::from_data(reply.body)
            .with_status_code(StatusCode(reply.status))
            .with_header(header);
        if let Err(err) = request.respond(response) {
            error!(error = %err, "writing response");
        }
    }
    Ok(())
}

/// The result of a fallible request handler.
pub type Result<T> = std::result::Result<T, Error>;

/// Problems that turn a request into a 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the entries directory can't be read.
    #[error("loading entries: {0}")]
    Load(#[from] repository::Error),

    /// Returned when a page or feed fails to render.
    #[error("rendering: {0}")]
    Render(#[from] assemble::Error),

    /// Returned when an asset can't be read.
    #[error("reading `{}`: {err}", path.display())]
    Io { path: PathBuf, err: io::Error },
}
