use headers::HeaderMapExt;
use http::{Request, Response};

use crate::body::Body;
use crate::util::ALLOW_HEADER;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_options(&self, _req: &Request<()>) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        let h = res.headers_mut();
        h.insert("Allow", ALLOW_HEADER.parse().unwrap());
        // Class 1: no locking.
        h.insert("DAV", "1".parse().unwrap());
        h.insert("MS-Author-Via", "DAV".parse().unwrap());
        h.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
        h.insert("Access-Control-Allow-Methods", ALLOW_HEADER.parse().unwrap());
        h.insert("Access-Control-Allow-Headers", "*".parse().unwrap());
        h.typed_insert(headers::ContentLength(0));

        Ok(res)
    }
}
