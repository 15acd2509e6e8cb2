use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::fs::RemoveOptions;
use crate::DavResult;

impl crate::DavHandler {
    /// DELETE: recursive and forgiving; deleting the absent succeeds.
    pub(crate) async fn handle_delete(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        self.fs
            .rm(
                path.as_str(),
                RemoveOptions {
                    recursive: true,
                    force: true,
                },
            )
            .await?;

        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("Content-Length", "0")
            .body(Body::empty())
            .unwrap())
    }
}
