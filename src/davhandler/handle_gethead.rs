use std::io;

use futures_util::StreamExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::conditional::not_modified;
use crate::util::systemtime_to_httpdate;
use crate::DavResult;

impl crate::DavHandler {
    /// WebDAV GET: files only, served as an attachment. HEAD is the same
    /// minus the body.
    pub(crate) async fn handle_get(
        &self,
        req: &Request<()>,
        head: bool,
    ) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let stat = self.fs.stat(path.as_str()).await?;
        if !stat.is_file() {
            return Err(StatusCode::NOT_FOUND.into());
        }

        if not_modified(req.headers(), stat.etag.as_deref(), stat.modified()) {
            let mut res = Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header("Content-Length", "0");
            if let Some(etag) = &stat.etag {
                res = res.header("ETag", etag);
            }
            return Ok(res.body(Body::empty()).unwrap());
        }

        let mut res = Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Disposition", "attachment")
            .header("Content-Length", stat.size.to_string())
            .header("Last-Modified", systemtime_to_httpdate(stat.modified()));
        if let Some(etag) = &stat.etag {
            res = res.header("ETag", etag);
        }

        let body = if head {
            Body::empty()
        } else {
            self.file_body(path.as_str(), stat.size).await?
        };
        Ok(res.body(body).unwrap())
    }

    /// Materialize small files, stream everything above the threshold.
    pub(crate) async fn file_body(&self, path: &str, size: u64) -> DavResult<Body> {
        if size > self.stream_threshold as u64 {
            let chunks = self.fs.read_stream(path, self.stream_threshold).await?;
            Ok(Body::stream(chunks.map(|res| {
                res.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            })))
        } else {
            Ok(Body::from(self.fs.read_file(path).await?))
        }
    }
}
