//! Conditional request evaluation for GET.

use std::time::SystemTime;

use headers::{ETag, HeaderMapExt, IfModifiedSince, IfNoneMatch};
use http::HeaderMap;

/// Whether the request's preconditions say the cached copy is still good,
/// i.e. the response should be 304 Not Modified.
///
/// `If-None-Match` wins over `If-Modified-Since` when both are present.
pub(crate) fn not_modified(
    headers: &HeaderMap,
    etag: Option<&str>,
    modified: SystemTime,
) -> bool {
    if let Some(if_none_match) = headers.typed_get::<IfNoneMatch>() {
        if let Some(tag) = etag.and_then(|t| t.parse::<ETag>().ok()) {
            return !if_none_match.precondition_passes(&tag);
        }
        return false;
    }
    if let Some(if_modified_since) = headers.typed_get::<IfModifiedSince>() {
        return !if_modified_since.is_modified(modified);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn headers_with(name: &str, value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
        h
    }

    #[test]
    fn matching_etag_is_not_modified() {
        let h = headers_with("if-none-match", "\"abc\"");
        assert!(not_modified(&h, Some("\"abc\""), UNIX_EPOCH));
        assert!(!not_modified(&h, Some("\"def\""), UNIX_EPOCH));
        assert!(!not_modified(&h, None, UNIX_EPOCH));
    }

    #[test]
    fn if_modified_since_compares_dates() {
        let h = headers_with("if-modified-since", "Fri, 15 May 2015 15:34:21 GMT");
        // modified long before the header date -> 304
        assert!(not_modified(&h, None, UNIX_EPOCH));
        // modified after the header date -> serve
        let recent = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        assert!(!not_modified(&h, None, recent));
    }

    #[test]
    fn no_preconditions_means_serve() {
        assert!(!not_modified(&HeaderMap::new(), Some("\"abc\""), UNIX_EPOCH));
    }
}
