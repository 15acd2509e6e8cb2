//! Request path handling.
//!
//! Every path that reaches the filesystem goes through [`normalize`] first:
//! the result is POSIX-style, starts with `/`, has no `.`/`..` or empty
//! segments, and carries no trailing slash (the root being the one
//! exception). Normalized paths are the only strings that end up in SQL
//! parameters.

use std::fmt;

use http::uri::Uri;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters that get percent-encoded when a path is rendered as an href.
/// `/` stays literal so the path shape survives.
const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Tolerant percent-decoder: invalid escapes or non-UTF-8 output leave the
/// input untouched instead of failing the request.
pub fn decode_uri(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(s) => s.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Percent-encode a decoded path (or path segment) for use in hrefs.
pub fn href_encode(path: &str) -> String {
    utf8_percent_encode(path, HREF_ENCODE).to_string()
}

/// Canonicalize a POSIX-style path: collapse `//`, resolve `.` and `..`,
/// force a leading `/`, strip the trailing `/` (except for the root).
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Escape `\`, `%` and `_` for use in a LIKE pattern with `ESCAPE '\'`.
/// Keeps a file literally named `/a%b` from matching as a wildcard.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A decoded, normalized request path.
///
/// Remembers whether the original spelling ended in `/`, which the browser
/// branch uses to decide on the `index.html` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavPath {
    path: String,
    collection: bool,
}

impl DavPath {
    /// Build from an already percent-decoded path.
    pub fn new(decoded: &str) -> DavPath {
        let path = normalize(decoded);
        let collection = decoded.ends_with('/') || path == "/";
        DavPath { path, collection }
    }

    /// Build from a request URI (tolerantly decoding the path component).
    pub fn from_uri(uri: &Uri) -> DavPath {
        DavPath::new(&decode_uri(uri.path()))
    }

    /// The normalized path.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Whether the request spelled the path with a trailing slash.
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Final path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    pub fn parent(&self) -> DavPath {
        let path = match self.path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => self.path[..idx].to_string(),
        };
        DavPath {
            path,
            collection: true,
        }
    }

    /// Percent-encoded form for response headers and XML hrefs.
    pub fn as_url_string(&self) -> String {
        href_encode(&self.path)
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
