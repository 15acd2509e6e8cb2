//! ## Webdav over a single database table
//!
//! [Webdav] (RFC4918) is HTTP (GET/HEAD/PUT/DELETE) plus a bunch of
//! extension methods (PROPFIND, MKCOL, COPY, MOVE, ...) that give the
//! protocol filesystem semantics, so that Linux, Windows and macOS can all
//! mount a server as a network share.
//!
//! This library is a `handler` that maps the HTTP/Webdav protocol onto a
//! filesystem stored in **one relational table**: every file and every
//! explicit directory is a row keyed by its normalized path, and the
//! hierarchy is derived from key prefixes. Directories therefore also exist
//! *implicitly*: writing `/a/b/c.txt` makes `/a` and `/a/b` browsable
//! without any MKCOL, which gives S3-style "no mkdir required" semantics
//! behind a standards-compliant class-1 DAV interface.
//!
//! The handler works with the standard types from the `http` and
//! `http_body` crates, so it plugs straight into hyper or any framework
//! built on those types. The storage side is behind the
//! [`DavFileSystem`][fs::DavFileSystem] trait; the shipped implementation,
//! [`TableFs`][fs::TableFs], speaks a small portable SQL subset and runs
//! against SQLite, PostgreSQL or MySQL through one connection URL.
//!
//! ## Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use sqldav::{fs::TableFs, DavHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fs = TableFs::connect("sqlite:dav.db?mode=rwc", "filesystem")
//!         .await
//!         .unwrap();
//!     let dav_server = DavHandler::builder(Arc::new(fs)).build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let dav_server = dav_server.clone();
//!         async move {
//!             let func = move |req| {
//!                 let dav_server = dav_server.clone();
//!                 async move { Ok::<_, Infallible>(dav_server.handle(req).await) }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     let addr = ([127, 0, 0, 1], 3000).into();
//!     let _ = hyper::Server::bind(&addr)
//!         .serve(make_service)
//!         .await
//!         .map_err(|e| eprintln!("server error: {}", e));
//! }
//! ```

#[macro_use]
extern crate log;

mod auth;
mod browse;
mod conditional;
mod davhandler;
mod errors;
mod multierror;
mod util;

pub mod body;
pub mod davpath;
pub mod fs;

pub use crate::auth::AuthGate;
pub use crate::browse::BrowserMode;
pub use crate::davhandler::{DavBuilder, DavHandler};
pub use crate::errors::{DavError, DavResult};
pub use crate::util::{DavMethod, DavMethodSet};
