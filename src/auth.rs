//! Basic authentication gate.

use std::sync::Arc;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine};
use http::{HeaderMap, Response, StatusCode};

use crate::body::Body;

/// Clients are sloppy about padding, and some send the URL-safe alphabet.
const BASIC_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Credential check for incoming requests: a fixed username/password pair,
/// or an arbitrary predicate.
#[derive(Clone)]
pub enum AuthGate {
    Credentials { username: String, password: String },
    Predicate(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>),
}

impl AuthGate {
    pub fn credentials(username: impl Into<String>, password: impl Into<String>) -> AuthGate {
        AuthGate::Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn predicate(check: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> AuthGate {
        AuthGate::Predicate(Arc::new(check))
    }

    fn verify(&self, user: &str, pass: &str) -> bool {
        match self {
            AuthGate::Credentials { username, password } => user == username && pass == password,
            AuthGate::Predicate(check) => check(user, pass),
        }
    }

    /// True when the request carries acceptable credentials.
    pub(crate) fn check(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        match decode_basic(value) {
            Some((user, pass)) => self.verify(&user, &pass),
            None => false,
        }
    }
}

/// The 401 reply asking for credentials.
pub(crate) fn challenge() -> Response<Body> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("WWW-Authenticate", "Basic realm=\"\"")
        .header("Content-Length", "0")
        .body(Body::empty())
        .unwrap()
}

fn decode_basic(value: &str) -> Option<(String, String)> {
    let rest = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let normalized: String = rest
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    let raw = BASIC_B64.decode(normalized.as_bytes()).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_and_urlsafe() {
        // "user:pass"
        assert_eq!(
            decode_basic("Basic dXNlcjpwYXNz"),
            Some(("user".to_string(), "pass".to_string()))
        );
        // unpadded
        assert_eq!(
            decode_basic("Basic dTpw"),
            Some(("u".to_string(), "p".to_string()))
        );
        // url-safe alphabet: "u:~?>" -> dTp+Pz4= -> dTp-Pz4
        assert_eq!(
            decode_basic("Basic dTp-Pz4"),
            Some(("u".to_string(), "~?>".to_string()))
        );
        assert_eq!(decode_basic("Bearer abc"), None);
        assert_eq!(decode_basic("Basic !!!"), None);
    }

    #[test]
    fn password_may_contain_colons() {
        // "u:a:b"
        assert_eq!(
            decode_basic("Basic dTphOmI="),
            Some(("u".to_string(), "a:b".to_string()))
        );
    }

    #[test]
    fn gate_verifies() {
        let gate = AuthGate::credentials("u", "p");
        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, "Basic dTpw".parse().unwrap());
        assert!(gate.check(&headers));

        headers.insert(http::header::AUTHORIZATION, "Basic eDp5".parse().unwrap());
        assert!(!gate.check(&headers));
        assert!(!gate.check(&HeaderMap::new()));

        let gate = AuthGate::predicate(|u, _| u == "x");
        headers.insert(http::header::AUTHORIZATION, "Basic eDp5".parse().unwrap());
        assert!(gate.check(&headers));
    }
}
