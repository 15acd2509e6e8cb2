//! GET for browsers: static file serving and the optional directory index.

use std::str::FromStr;

use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::conditional::not_modified;
use crate::davpath::{href_encode, DavPath};
use crate::util::systemtime_to_httpdate;
use crate::DavResult;

/// What a browser user-agent gets on GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserMode {
    /// Browsers go through the plain webdav GET path.
    #[default]
    Disabled,
    /// Serve files (with `index.html` rewriting); directories are 404.
    Enabled,
    /// Like `Enabled`, plus an HTML listing for directories.
    List,
}

impl FromStr for BrowserMode {
    type Err = String;

    fn from_str(s: &str) -> Result<BrowserMode, String> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(BrowserMode::Disabled),
            "enabled" => Ok(BrowserMode::Enabled),
            "list" => Ok(BrowserMode::List),
            other => Err(format!("unknown browser mode '{other}'")),
        }
    }
}

impl crate::DavHandler {
    pub(crate) async fn handle_browser(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);

        // Directory-looking requests get the index.html treatment.
        let target = if path.is_root() {
            "/index.html".to_string()
        } else if path.is_collection() {
            format!("{}/index.html", path.as_str())
        } else {
            path.as_str().to_string()
        };

        match self.fs.stat(&target).await {
            Ok(stat) if stat.is_file() => {
                if not_modified(req.headers(), stat.etag.as_deref(), stat.modified()) {
                    let mut res = Response::builder()
                        .status(StatusCode::NOT_MODIFIED)
                        .header("Content-Length", "0");
                    if let Some(etag) = &stat.etag {
                        res = res.header("ETag", etag);
                    }
                    return Ok(res.body(Body::empty()).unwrap());
                }
                let mime = mime_guess::from_path(&target).first_or_octet_stream();
                let mut res = Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", mime.to_string())
                    .header("Content-Length", stat.size.to_string())
                    .header("Last-Modified", systemtime_to_httpdate(stat.modified()));
                if let Some(etag) = &stat.etag {
                    res = res.header("ETag", etag);
                }
                let body = self.file_body(&target, stat.size).await?;
                Ok(res.body(body).unwrap())
            }
            _ => match self.browser {
                BrowserMode::List => self.handle_listing(&path).await,
                _ => Err(StatusCode::NOT_FOUND.into()),
            },
        }
    }

    async fn handle_listing(&self, path: &DavPath) -> DavResult<Response<Body>> {
        // The root lists fine even when the table is empty.
        if !path.is_root() {
            let stat = self.fs.stat(path.as_str()).await?;
            if !stat.is_dir() {
                return Err(StatusCode::NOT_FOUND.into());
            }
        }
        let entries = self.fs.read_dir(path.as_str(), false).await?;

        let title = htmlescape::encode_minimal(path.as_str());
        let mut html = String::with_capacity(256 + entries.len() * 64);
        html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
        html.push_str(&format!("<title>Index of {title}</title></head><body>\n"));
        html.push_str(&format!("<h1>Index of {title}</h1>\n<ul>\n"));
        if !path.is_root() {
            html.push_str("<li><a href=\"../\">..</a></li>\n");
        }
        let base = if path.is_root() {
            String::new()
        } else {
            path.as_url_string()
        };
        // entries arrive subdirectories first, then files.
        for entry in entries {
            let name = htmlescape::encode_minimal(entry.name());
            let href = format!("{base}/{}", href_encode(entry.name()));
            if entry.is_dir() {
                html.push_str(&format!("<li><a href=\"{href}/\">{name}/</a></li>\n"));
            } else {
                html.push_str(&format!("<li><a href=\"{href}\">{name}</a></li>\n"));
            }
        }
        html.push_str("</ul>\n</body></html>\n");

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .header("Content-Length", html.len().to_string())
            .body(Body::from(html))
            .unwrap())
    }
}
