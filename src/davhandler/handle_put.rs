use std::error::Error as StdError;

use bytes::{Buf, Bytes};
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::DavResult;

impl crate::DavHandler {
    /// PUT: create or overwrite, no MKCOL required for deep paths.
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        body: ReqBody,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let path = self.path(req);
        let data = self.read_request(body, usize::MAX).await?;
        self.fs.write_file(path.as_str(), Bytes::from(data)).await?;

        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("Content-Length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
