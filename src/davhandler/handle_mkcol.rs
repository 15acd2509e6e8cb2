use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::DavResult;

impl crate::DavHandler {
    /// MKCOL: persist an explicit directory row. Intermediate directories
    /// do not need rows of their own, so creation is always recursive.
    pub(crate) async fn handle_mkcol(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        self.fs.mkdir(path.as_str(), true).await?;

        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("Content-Length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
