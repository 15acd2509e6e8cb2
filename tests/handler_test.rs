use std::sync::Arc;

use futures_util::StreamExt;
use http::{Request, StatusCode};
use sha2::{Digest, Sha256};

use sqldav::body::Body;
use sqldav::fs::TableFs;
use sqldav::{AuthGate, BrowserMode, DavHandler};
use tempfile::TempDir;

async fn fresh_fs(name: &str) -> (TableFs, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}/{name}.db?mode=rwc", dir.path().display());
    let fs = TableFs::connect(&url, "filesystem").await.unwrap();
    (fs, dir)
}

async fn handler(name: &str) -> (DavHandler, TempDir) {
    let (fs, dir) = fresh_fs(name).await;
    (DavHandler::builder(Arc::new(fs)).build(), dir)
}

fn req(method: &str, uri: &str) -> http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn empty(builder: http::request::Builder) -> Request<hyper::Body> {
    builder.body(hyper::Body::empty()).unwrap()
}

fn with_body(builder: http::request::Builder, body: impl Into<hyper::Body>) -> Request<hyper::Body> {
    builder.body(body.into()).unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    let mut out = Vec::new();
    let mut stream = body;
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

async fn body_string(body: Body) -> String {
    String::from_utf8(body_bytes(body).await).unwrap()
}

#[tokio::test]
async fn put_get_etag_and_conditional() {
    let (dav, _tmp) = handler("h_putget").await;

    let res = dav
        .handle(with_body(req("PUT", "/hello.txt"), "hi"))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("GET", "/hello.txt"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let etag = res.headers()["etag"].to_str().unwrap().to_string();
    let expected = format!("\"{}\"", hex::encode(Sha256::digest(b"hi")));
    assert_eq!(etag, expected);
    assert_eq!(res.headers()["content-disposition"], "attachment");
    assert_eq!(body_bytes(res.into_body()).await, b"hi");

    let res = dav
        .handle(empty(req("GET", "/hello.txt").header("If-None-Match", &etag)))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn propfind_lists_collections() {
    let (dav, _tmp) = handler("h_propfind").await;

    let res = dav
        .handle(with_body(req("PUT", "/a/b/c.bin"), vec![0u8, 1, 2]))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(req("PROPFIND", "/a").header("Depth", "1")))
        .await;
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = body_string(res.into_body()).await;
    assert!(body.contains("<d:href>/a/</d:href>"));
    assert!(body.contains("<d:href>/a/b/</d:href>"));
    assert!(body.contains("<d:collection"));

    let res = dav.handle(empty(req("PROPFIND", "/a/b"))).await;
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = body_string(res.into_body()).await;
    assert!(body.contains("<d:href>/a/b/c.bin</d:href>"));
    assert!(body.contains("<d:getcontentlength>3</d:getcontentlength>"));
    assert!(body.contains("httpd/unix-directory"));
    assert!(body.contains("application/octet-stream"));
}

#[tokio::test]
async fn propfind_root_of_empty_table() {
    let (dav, _tmp) = handler("h_propfind_root").await;
    let res = dav.handle(empty(req("PROPFIND", "/"))).await;
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = body_string(res.into_body()).await;
    assert!(body.contains("multistatus"));
    // a missing non-root path is still a 404
    let res = dav.handle(empty(req("PROPFIND", "/nope"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mkcol_delete_lifecycle() {
    let (dav, _tmp) = handler("h_mkcol").await;

    let res = dav.handle(empty(req("MKCOL", "/d"))).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("MKCOL", "/d"))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = dav.handle(empty(req("DELETE", "/d"))).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = dav.handle(empty(req("PROPFIND", "/d"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // DELETE of the absent is forgiving
    let res = dav.handle(empty(req("DELETE", "/d"))).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn copy_directory_and_overwrite_precondition() {
    let (dav, _tmp) = handler("h_copy").await;

    let res = dav.handle(with_body(req("PUT", "/x/y.txt"), "Y")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(
            req("COPY", "/x")
                .header("Destination", "/z")
                .header("Depth", "infinity"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.headers()["location"], "/z");

    let res = dav.handle(empty(req("GET", "/z/y.txt"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res.into_body()).await, b"Y");

    // the source is untouched
    let res = dav.handle(empty(req("GET", "/x/y.txt"))).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = dav
        .handle(empty(
            req("COPY", "/x")
                .header("Destination", "/z")
                .header("Overwrite", "F"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);

    // with overwrite the destination is replaced
    let res = dav
        .handle(empty(req("COPY", "/x").header("Destination", "/z")))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn copy_depth_zero_creates_bare_collection() {
    let (dav, _tmp) = handler("h_copy0").await;
    let res = dav.handle(with_body(req("PUT", "/src/f.txt"), "F")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(
            req("COPY", "/src")
                .header("Destination", "/flat")
                .header("Depth", "0"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("GET", "/flat/f.txt"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = dav.handle(empty(req("PROPFIND", "/flat"))).await;
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn move_semantics() {
    let (dav, _tmp) = handler("h_move").await;
    let res = dav.handle(with_body(req("PUT", "/a/f.txt"), "data")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // self-containment
    let res = dav
        .handle(empty(req("MOVE", "/a").header("Destination", "/a/sub")))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // depth 0 moves of a collection are malformed
    let res = dav
        .handle(empty(
            req("MOVE", "/a")
                .header("Destination", "/b")
                .header("Depth", "0"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = dav
        .handle(empty(req("MOVE", "/a").header("Destination", "/b")))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("GET", "/b/f.txt"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = dav.handle(empty(req("GET", "/a/f.txt"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn move_to_missing_parent_conflicts() {
    let (dav, _tmp) = handler("h_move_parent").await;
    let res = dav.handle(with_body(req("PUT", "/f"), "x")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(
            req("MOVE", "/f").header("Destination", "/no/such/parent/f"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn destination_must_share_origin() {
    let (dav, _tmp) = handler("h_origin").await;
    let res = dav.handle(with_body(req("PUT", "/f"), "x")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(
            req("COPY", "/f")
                .header("Host", "localhost:3000")
                .header("Destination", "http://evil.example.com/f2"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    let res = dav
        .handle(empty(
            req("COPY", "/f")
                .header("Host", "localhost:3000")
                .header("Destination", "http://localhost:3000/f2"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn large_bodies_are_streamed() {
    let (dav, _tmp) = handler("h_stream").await;
    const MIB: usize = 1024 * 1024;
    let data: Vec<u8> = (0..2 * MIB + 7).map(|i| (i % 249) as u8).collect();

    let res = dav.handle(with_body(req("PUT", "/big"), data.clone())).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("GET", "/big"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-length"],
        (2 * MIB + 7).to_string().as_str()
    );

    // the body arrives as multiple bounded chunks, not one buffer
    let mut stream = res.into_body();
    let mut chunks = 0usize;
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= MIB);
        collected.extend_from_slice(&chunk);
        chunks += 1;
    }
    assert!(chunks >= 3);
    assert_eq!(collected, data);
}

#[tokio::test]
async fn options_advertises_class_one() {
    let (dav, _tmp) = handler("h_options").await;
    let res = dav.handle(empty(req("OPTIONS", "/"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["dav"], "1");
    let allow = res.headers()["allow"].to_str().unwrap();
    assert!(allow.contains("PROPFIND"));
    assert!(allow.contains("MKCOL"));
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn lock_and_proppatch_are_out_of_scope() {
    let (dav, _tmp) = handler("h_lock").await;
    let res = dav.handle(empty(req("LOCK", "/f"))).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key("allow"));

    let res = dav.handle(empty(req("PROPPATCH", "/f"))).await;
    assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn auth_gate_challenges_and_accepts() {
    let (fs, _tmp) = fresh_fs("h_auth").await;
    let dav = DavHandler::builder(Arc::new(fs))
        .auth(AuthGate::credentials("user", "pass"))
        .build();

    let res = dav.handle(empty(req("OPTIONS", "/"))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["www-authenticate"], "Basic realm=\"\"");

    // dXNlcjpwYXNz = user:pass
    let res = dav
        .handle(empty(
            req("OPTIONS", "/").header("Authorization", "Basic dXNlcjpwYXNz"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = dav
        .handle(empty(
            req("OPTIONS", "/").header("Authorization", "Basic bm86bm8="),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn browser_listing_and_static_serve() {
    let (fs, _tmp) = fresh_fs("h_browser").await;
    let dav = DavHandler::builder(Arc::new(fs))
        .browser(BrowserMode::List)
        .build();

    let res = dav
        .handle(with_body(req("PUT", "/site/index.html"), "<h1>home</h1>"))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = dav
        .handle(with_body(req("PUT", "/site/notes.txt"), "n"))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // a trailing slash picks up index.html, with the right mime type
    let res = dav
        .handle(empty(
            req("GET", "/site/").header("User-Agent", "Mozilla/5.0"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(body_bytes(res.into_body()).await, b"<h1>home</h1>");

    // a directory without index.html renders a listing
    let res = dav
        .handle(with_body(req("PUT", "/docs/readme.md"), "r"))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = dav
        .handle(empty(
            req("GET", "/docs/").header("User-Agent", "Mozilla/5.0"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    let html = body_string(res.into_body()).await;
    assert!(html.contains("readme.md"));
    assert!(html.contains("<a href=\"../\">"));

    // non-browser agents still get the attachment path
    let res = dav.handle(empty(req("GET", "/docs/readme.md"))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-disposition"], "attachment");
}

#[tokio::test]
async fn browser_enabled_mode_hides_listings() {
    let (fs, _tmp) = fresh_fs("h_browser_en").await;
    let dav = DavHandler::builder(Arc::new(fs))
        .browser(BrowserMode::Enabled)
        .build();

    let res = dav.handle(with_body(req("PUT", "/dir/file"), "x")).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav
        .handle(empty(
            req("GET", "/dir/").header("User-Agent", "Mozilla/5.0"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_methods_are_rejected() {
    let (dav, _tmp) = handler("h_unknown").await;
    let res = dav.handle(empty(req("BREW", "/"))).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key("allow"));
}

#[tokio::test]
async fn get_of_missing_or_collection_is_404() {
    let (dav, _tmp) = handler("h_get404").await;
    let res = dav.handle(empty(req("GET", "/nope"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = dav.handle(with_body(req("PUT", "/dir/f"), "x")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = dav.handle(empty(req("GET", "/dir"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_into_deep_path_needs_no_mkcol() {
    let (dav, _tmp) = handler("h_deep").await;
    let res = dav
        .handle(with_body(req("PUT", "/very/deep/path/file.txt"), "ok"))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = dav.handle(empty(req("PROPFIND", "/very"))).await;
    assert_eq!(res.status(), StatusCode::MULTI_STATUS);
    let body = body_string(res.into_body()).await;
    assert!(body.contains("<d:href>/very/deep/</d:href>"));
}
