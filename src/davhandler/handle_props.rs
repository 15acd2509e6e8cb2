use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davpath::href_encode;
use crate::fs::{FsErrorKind, Stat};
use crate::multierror::{multistatus_response, propfind_body, PropEntry};
use crate::DavResult;

impl crate::DavHandler {
    /// PROPFIND: the target plus, for collections, its immediate children.
    /// The request body (property filters) is ignored; every response
    /// carries the full property set.
    pub(crate) async fn handle_propfind(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let stat = match self.fs.stat(path.as_str()).await {
            Ok(stat) => Some(stat),
            // The root is always browsable, even over an empty table.
            Err(ref e) if e.kind == FsErrorKind::NotFound && path.is_root() => None,
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        if let Some(stat) = &stat {
            entries.push(prop_entry(path.as_str(), stat));
            if stat.is_dir() {
                for child in self.fs.read_dir(path.as_str(), false).await? {
                    let child_path = child.path();
                    match self.fs.stat(&child_path).await {
                        Ok(child_stat) => entries.push(prop_entry(&child_path, &child_stat)),
                        // listing raced a concurrent delete.
                        Err(ref e) if e.kind == FsErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        let body = propfind_body(&entries)?;
        Ok(multistatus_response(body))
    }

    pub(crate) async fn handle_proppatch(&self, _req: &Request<()>) -> DavResult<Response<Body>> {
        Err(StatusCode::NOT_IMPLEMENTED.into())
    }
}

fn prop_entry(path: &str, stat: &Stat) -> PropEntry {
    let mut href = href_encode(path);
    if stat.is_dir() && !href.ends_with('/') {
        href.push('/');
    }
    let displayname = if path == "/" {
        "/".to_string()
    } else {
        path.rsplit('/').next().unwrap_or("").to_string()
    };
    PropEntry {
        href,
        displayname,
        is_dir: stat.is_dir(),
        size: if stat.is_dir() { 0 } else { stat.size },
        modified: stat.modified(),
    }
}
