//! Basic-Auth passthrough policy.
//!
//! When enabled, a request carrying well-formed `Basic` credentials in one of
//! the configured headers, on a path matching the configured pattern, skips JWT
//! verification entirely. The credentials themselves are not checked here; the
//! upstream service owns that.
use std::fmt;

use axum::http::{HeaderMap, HeaderName};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

const BASIC_PREFIX: &str = "Basic ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Disabled,
    NoBasicCredentials,
    PathNotAllowed,
    InvalidEncoding,
    MissingSeparator,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Disabled => "basic auth passthrough disabled",
            Self::NoBasicCredentials => "no basic auth credentials supplied",
            Self::PathNotAllowed => "request path does not allow basic auth",
            Self::InvalidEncoding => "basic auth value can not be base64 decoded",
            Self::MissingSeparator => "basic auth value is not a username:password pair",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughDecision {
    /// Credentials in `header` passed every check.
    Allowed { header: HeaderName },
    /// Last recorded reason, or why nothing was inspected.
    Denied(DenyReason),
}

#[derive(Debug, Clone)]
pub struct PassthroughPolicy {
    enabled: bool,
    headers: Vec<HeaderName>,
    path_pattern: Regex,
}

impl PassthroughPolicy {
    pub fn new(enabled: bool, headers: Vec<HeaderName>, path_pattern: Regex) -> Self {
        Self {
            enabled,
            headers,
            path_pattern,
        }
    }

    pub fn evaluate(&self, path: &str, headers: &HeaderMap) -> PassthroughDecision {
        if !self.enabled {
            return PassthroughDecision::Denied(DenyReason::Disabled);
        }

        let mut reason = DenyReason::NoBasicCredentials;

        for name in &self.headers {
            let Some(credentials) = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix(BASIC_PREFIX))
            else {
                tracing::trace!(header = %name, "no basic auth value in header");
                continue;
            };

            match self.check(path, credentials) {
                Ok(()) => {
                    tracing::trace!(header = %name, path, "basic auth allowed");
                    return PassthroughDecision::Allowed {
                        header: name.clone(),
                    };
                }
                Err(rejected) => {
                    tracing::trace!(header = %name, path, reason = %rejected, "basic auth rejected");
                    reason = rejected;
                }
            }
        }

        PassthroughDecision::Denied(reason)
    }

    fn check(&self, path: &str, credentials: &str) -> Result<(), DenyReason> {
        if !self.path_pattern.is_match(path) {
            return Err(DenyReason::PathNotAllowed);
        }

        let decoded = STANDARD
            .decode(credentials)
            .map_err(|_| DenyReason::InvalidEncoding)?;

        split_credentials(&decoded)
            .map(|_| ())
            .ok_or(DenyReason::MissingSeparator)
    }
}

// (username, password) split on the first colon.
fn split_credentials(decoded: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = decoded.iter().position(|b| *b == b':')?;
    let (username, rest) = decoded.split_at(colon);
    Some((username, rest.get(1..)?))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header};

    use super::*;

    fn policy(headers: &[&str], pattern: &str) -> PassthroughPolicy {
        PassthroughPolicy::new(
            true,
            headers
                .iter()
                .map(|h| HeaderName::from_bytes(h.as_bytes()).unwrap())
                .collect(),
            Regex::new(pattern).unwrap(),
        )
    }

    fn basic(user_pass: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(user_pass))).unwrap()
    }

    fn headers_with(name: HeaderName, value: HeaderValue) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        headers
    }

    #[test]
    fn allowed_on_matching_path() {
        let headers = headers_with(header::AUTHORIZATION, basic("user:pass"));
        let decision = policy(&["Authorization"], r"^/admin.*").evaluate("/admin/x", &headers);
        assert_eq!(
            decision,
            PassthroughDecision::Allowed {
                header: header::AUTHORIZATION
            }
        );
    }

    #[test]
    fn denied_on_other_path() {
        let headers = headers_with(header::AUTHORIZATION, basic("user:pass"));
        let decision = policy(&["Authorization"], r"^/admin.*").evaluate("/public/x", &headers);
        assert_eq!(decision, PassthroughDecision::Denied(DenyReason::PathNotAllowed));
    }

    #[test]
    fn disabled_policy_never_allows() {
        let headers = headers_with(header::AUTHORIZATION, basic("user:pass"));
        let mut p = policy(&["Authorization"], r"^/.*");
        p.enabled = false;
        assert_eq!(
            p.evaluate("/admin", &headers),
            PassthroughDecision::Denied(DenyReason::Disabled)
        );
        assert!(matches!(
            p.evaluate("/", &headers),
            PassthroughDecision::Denied(_)
        ));
    }

    #[test]
    fn malformed_values_are_denied() {
        let p = policy(&["Authorization"], r"^/.*");

        let headers = headers_with(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic !!!not-base64!!!"),
        );
        assert_eq!(
            p.evaluate("/x", &headers),
            PassthroughDecision::Denied(DenyReason::InvalidEncoding)
        );

        let headers = headers_with(header::AUTHORIZATION, basic("no-colon-here"));
        assert_eq!(
            p.evaluate("/x", &headers),
            PassthroughDecision::Denied(DenyReason::MissingSeparator)
        );
    }

    #[test]
    fn bearer_value_is_skipped() {
        let headers = headers_with(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(
            policy(&["Authorization"], r"^/.*").evaluate("/x", &headers),
            PassthroughDecision::Denied(DenyReason::NoBasicCredentials)
        );
    }

    #[test]
    fn later_header_can_allow_after_earlier_rejection() {
        let proxy = HeaderName::from_static("x-forwarded-authorization");
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, basic("broken"));
        headers.insert(proxy.clone(), basic("svc:secret"));

        let decision = policy(&["Authorization", "X-Forwarded-Authorization"], r"^/.*")
            .evaluate("/x", &headers);
        assert_eq!(decision, PassthroughDecision::Allowed { header: proxy });
    }

    #[test]
    fn password_may_contain_colons() {
        assert_eq!(
            split_credentials(b"user:pa:ss"),
            Some((&b"user"[..], &b"pa:ss"[..]))
        );
        assert_eq!(split_credentials(b"user:"), Some((&b"user"[..], &b""[..])));
        assert_eq!(split_credentials(b"user"), None);
    }
}
