//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use bytes::buf::Buf;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::auth::{self, AuthGate};
use crate::body::Body;
use crate::browse::BrowserMode;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs::DavFileSystem;
use crate::util::{dav_method, DavMethod, DavMethodSet, ALLOW_HEADER};
use crate::DavResult;

pub mod handle_copymove;
pub mod handle_delete;
pub mod handle_gethead;
pub mod handle_mkcol;
pub mod handle_options;
pub mod handle_props;
pub mod handle_put;

/// Default threshold above which GET bodies are streamed chunk by chunk,
/// and the size of one streamed chunk.
pub(crate) const STREAM_THRESHOLD: usize = 1024 * 1024;

/// Cap for request bodies of methods that are not PUT.
const MAX_XML_BODY: usize = 65536;

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Filesystem backend.
    fs: Arc<dyn DavFileSystem>,
    /// Set of allowed methods (defaults to everything class-1).
    allow: DavMethodSet,
    /// Optional basic-auth gate.
    auth: Option<AuthGate>,
    /// Does GET from a browser serve files / directory indexes.
    browser: BrowserMode,
    /// Stream bodies larger than this, in chunks of this size.
    stream_threshold: usize,
}

impl DavBuilder {
    /// Create a new configuration builder.
    pub fn new(fs: Arc<dyn DavFileSystem>) -> DavBuilder {
        Self {
            fs,
            allow: DavMethodSet::WEBDAV,
            auth: None,
            browser: BrowserMode::Disabled,
            stream_threshold: STREAM_THRESHOLD,
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Which methods to allow (default is all class-1 methods).
    pub fn methods(self, allow: DavMethodSet) -> Self {
        let mut this = self;
        this.allow = allow;
        this
    }

    /// Require basic authentication on every non-browser request.
    pub fn auth(self, gate: AuthGate) -> Self {
        let mut this = self;
        this.auth = Some(gate);
        this
    }

    /// How GET requests from browsers are treated.
    pub fn browser(self, mode: BrowserMode) -> Self {
        let mut this = self;
        this.browser = mode;
        this
    }

    /// Streaming threshold and chunk size in bytes.
    pub fn stream_threshold(self, size: usize) -> Self {
        let mut this = self;
        this.stream_threshold = size;
        this
    }
}

/// The webdav handler struct.
///
/// Feed it `http::Request`s via [`DavHandler::handle`]; every response is a
/// complete `http::Response<Body>`, including error statuses.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) fs: Arc<dyn DavFileSystem>,
    pub(crate) allow: DavMethodSet,
    pub(crate) auth: Option<AuthGate>,
    pub(crate) browser: BrowserMode,
    pub(crate) stream_threshold: usize,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        Self {
            fs: cfg.fs,
            allow: cfg.allow,
            auth: cfg.auth,
            browser: cfg.browser,
            stream_threshold: cfg.stream_threshold,
        }
    }
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder(fs: Arc<dyn DavFileSystem>) -> DavBuilder {
        DavBuilder::new(fs)
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_inner(req).await
    }
}

impl DavHandler {
    // helper.
    pub(crate) fn path(&self, req: &Request<()>) -> DavPath {
        DavPath::from_uri(req.uri())
    }

    // helper: does the parent of `path` exist and is it a directory?
    pub(crate) async fn has_parent(&self, path: &DavPath) -> bool {
        let parent = path.parent();
        if parent.is_root() {
            // The root is always a directory, rows or not.
            return true;
        }
        self.fs
            .stat(parent.as_str())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    // drain request body and return it as one buffer.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|_| {
                DavError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "UnexpectedEof",
                ))
            })?;
            while buf.has_remaining() {
                if buf.remaining() > max_size || data.len() > max_size - buf.remaining() {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher: turn any DavError results into a HTTP response.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                let status = err.statuscode();
                let mut resp = Response::builder()
                    .status(status)
                    .header("Content-Length", "0");
                if status == StatusCode::METHOD_NOT_ALLOWED {
                    resp = resp.header("Allow", ALLOW_HEADER);
                }
                resp.body(Body::empty()).unwrap()
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.allow.contains(method.as_set()) {
            debug!(
                "method {} not allowed on request {}",
                req.method(),
                req.uri()
            );
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }

        let is_browser = req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.starts_with("Mozilla/"))
            .unwrap_or(false);
        let browser_get =
            is_browser && self.browser != BrowserMode::Disabled && method == DavMethod::Get;

        // The auth gate covers everything except browser static serving.
        if let Some(gate) = &self.auth {
            if !browser_get && !gate.check(req.headers()) {
                return Ok(auth::challenge());
            }
        }

        // PUT is the only handler that consumes the body itself; the rest
        // either expect none or tolerate a small ignored one (PROPFIND).
        let (put_body, body_data) = match method {
            DavMethod::Put => (Some(body), Vec::new()),
            _ => (None, self.read_request(body, MAX_XML_BODY).await?),
        };
        match method {
            DavMethod::Put | DavMethod::PropFind | DavMethod::PropPatch => {}
            _ => {
                if !body_data.is_empty() {
                    return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
                }
            }
        }

        debug!("== START REQUEST {:?} {}", method, req.uri());

        if browser_get {
            return self.handle_browser(&req).await;
        }

        match method {
            DavMethod::Options => self.handle_options(&req).await,
            DavMethod::PropFind => self.handle_propfind(&req).await,
            DavMethod::PropPatch => self.handle_proppatch(&req).await,
            DavMethod::MkCol => self.handle_mkcol(&req).await,
            DavMethod::Delete => self.handle_delete(&req).await,
            DavMethod::Head | DavMethod::Get => {
                self.handle_get(&req, method == DavMethod::Head).await
            }
            DavMethod::Copy | DavMethod::Move => self.handle_copymove(&req, method).await,
            DavMethod::Put => self.handle_put(&req, put_body.unwrap()).await,
            // class 1 only.
            DavMethod::Lock | DavMethod::Unlock => {
                Err(StatusCode::METHOD_NOT_ALLOWED.into())
            }
        }
    }
}
