use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davpath::{decode_uri, DavPath};
use crate::errors::{fs_to_status, DavError};
use crate::fs::RemoveOptions;
use crate::multierror::{multistatus_error_body, multistatus_response, ResourceError};
use crate::util::DavMethod;
use crate::DavResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Zero,
    Infinity,
}

impl crate::DavHandler {
    /// COPY and MOVE. Preconditions fail the whole request; failures below
    /// a directory copy are collected per resource and reported in a 207.
    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        method: DavMethod,
    ) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let dest = parse_destination(req)?;

        let overwrite = match req
            .headers()
            .get("overwrite")
            .and_then(|v| v.to_str().ok())
        {
            None => true,
            Some(v) if v.eq_ignore_ascii_case("T") => true,
            Some(v) if v.eq_ignore_ascii_case("F") => false,
            Some(_) => return Err(StatusCode::BAD_REQUEST.into()),
        };
        let depth = match req.headers().get("depth").and_then(|v| v.to_str().ok()) {
            None => Depth::Infinity,
            Some(v) if v.eq_ignore_ascii_case("infinity") => Depth::Infinity,
            Some("0") => Depth::Zero,
            Some(_) => return Err(StatusCode::BAD_REQUEST.into()),
        };

        // Source first: a missing source is 404, everything else 403/409.
        let src = self.fs.stat(path.as_str()).await?;
        if path.as_str() == dest.as_str() {
            return Err(StatusCode::FORBIDDEN.into());
        }
        if src.is_dir() && dest.as_str().starts_with(&format!("{}/", path.as_str())) {
            // destination inside the source tree
            return Err(StatusCode::FORBIDDEN.into());
        }
        if dest.is_root() {
            return Err(StatusCode::FORBIDDEN.into());
        }
        if method == DavMethod::Move {
            if path.is_root() {
                return Err(StatusCode::FORBIDDEN.into());
            }
            if src.is_dir() && depth == Depth::Zero {
                return Err(StatusCode::BAD_REQUEST.into());
            }
        }
        if !self.has_parent(&dest).await {
            return Err(StatusCode::CONFLICT.into());
        }
        let dest_existed = self.fs.stat(dest.as_str()).await.is_ok();
        if dest_existed && !overwrite {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }
        if dest_existed && overwrite {
            self.fs
                .rm(
                    dest.as_str(),
                    RemoveOptions {
                        recursive: true,
                        force: true,
                    },
                )
                .await?;
        }

        let errors = if src.is_file() {
            self.fs.copy_file(path.as_str(), dest.as_str()).await?;
            Vec::new()
        } else {
            self.copy_collection(
                path.as_str().to_string(),
                dest.as_str().to_string(),
                depth,
            )
            .await
        };

        if method == DavMethod::Move {
            if !errors.is_empty() {
                // don't drop a source that did not fully arrive.
                return Ok(multistatus_response(multistatus_error_body(&errors)?));
            }
            self.fs
                .rm(
                    path.as_str(),
                    RemoveOptions {
                        recursive: true,
                        force: false,
                    },
                )
                .await?;
        }

        if !errors.is_empty() {
            return Ok(multistatus_response(multistatus_error_body(&errors)?));
        }

        let status = if dest_existed {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        let mut res = Response::builder()
            .status(status)
            .header("Content-Length", "0");
        if status == StatusCode::CREATED {
            res = res.header("Location", dest.as_url_string());
        }
        Ok(res.body(Body::empty()).unwrap())
    }

    /// Recursive directory copy. Collects per-resource failures instead of
    /// aborting, so siblings still get copied.
    fn copy_collection<'a>(
        &'a self,
        src: String,
        dst: String,
        depth: Depth,
    ) -> BoxFuture<'a, Vec<ResourceError>> {
        async move {
            let mut errors = Vec::new();
            if let Err(e) = self.fs.mkdir(&dst, false).await {
                // EEXIST is tolerated but still reported per resource.
                errors.push(ResourceError {
                    href: collection_href(&dst),
                    status: fs_to_status(e.kind),
                    description: e.to_string(),
                });
                if e.kind != crate::fs::FsErrorKind::Exists {
                    return errors;
                }
            }
            if depth == Depth::Zero {
                return errors;
            }

            let children = match self.fs.read_dir(&src, false).await {
                Ok(children) => children,
                Err(e) => {
                    errors.push(ResourceError {
                        href: collection_href(&src),
                        status: fs_to_status(e.kind),
                        description: e.to_string(),
                    });
                    return errors;
                }
            };
            for child in children {
                let child_src = join(&src, child.name());
                let child_dst = join(&dst, child.name());
                if child.is_dir() {
                    let nested = self
                        .copy_collection(child_src, child_dst, Depth::Infinity)
                        .await;
                    errors.extend(nested);
                } else if let Err(e) = self.fs.copy_file(&child_src, &child_dst).await {
                    errors.push(ResourceError {
                        href: crate::davpath::href_encode(&child_dst),
                        status: fs_to_status(e.kind),
                        description: e.to_string(),
                    });
                }
            }
            errors
        }
        .boxed()
    }
}

/// The Destination header: absolute URIs must point back at this server.
fn parse_destination(req: &Request<()>) -> DavResult<DavPath> {
    let raw = req
        .headers()
        .get("destination")
        .and_then(|v| v.to_str().ok())
        .ok_or(DavError::Status(StatusCode::BAD_REQUEST))?;
    let uri: http::Uri = raw
        .parse()
        .map_err(|_| DavError::Status(StatusCode::BAD_REQUEST))?;
    if let Some(authority) = uri.authority() {
        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok());
        let same_origin = host
            .map(|h| h.eq_ignore_ascii_case(authority.as_str()))
            .unwrap_or(false);
        if !same_origin {
            return Err(StatusCode::BAD_GATEWAY.into());
        }
    }
    Ok(DavPath::new(&decode_uri(uri.path())))
}

fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

fn collection_href(path: &str) -> String {
    let mut href = crate::davpath::href_encode(path);
    if !href.ends_with('/') {
        href.push('/');
    }
    href
}
