//! Identity resolution for usage attribution
//!
//! Resolves the caller's user id from request headers and cookies, in a
//! fixed priority order. Resolution is best-effort and never rejects a
//! request: ingestion paths fall back to the shared `"anonymous"` bucket,
//! while query paths decide themselves how to treat a missing identity.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

/// Bucket that collects traffic with no resolvable identity
pub const ANONYMOUS_USER: &str = "anonymous";

/// Header set by the authentication layer
const AUTH_USER_HEADER: &str = "x-auth-user-id";

/// Generic user id header
const USER_HEADER: &str = "x-user-id";

/// Cookie names checked in order: auth cookies first, then the generic one
const IDENTITY_COOKIES: [&str; 3] = ["auth_user_id", "session_user_id", "user_id"];

/// Axum extractor carrying the resolved user id, if any.
///
/// Never rejects; callers choose between `"anonymous"` fallback (ingestion)
/// and a 400 response (stats queries).
pub struct UserIdentity(pub Option<String>);

impl UserIdentity {
    /// The resolved id, or the anonymous bucket
    #[must_use]
    pub fn or_anonymous(self) -> String {
        self.0.unwrap_or_else(|| ANONYMOUS_USER.to_string())
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(UserIdentity(resolve_user_id(parts)))
    }
}

/// Resolve a user id from headers and cookies (first match wins)
pub fn resolve_user_id(parts: &Parts) -> Option<String> {
    for name in [AUTH_USER_HEADER, USER_HEADER] {
        if let Some(value) = parts.headers.get(name) {
            if let Ok(value) = value.to_str() {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    if let Some(cookies) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for name in IDENTITY_COOKIES {
            if let Some(value) = cookie_value(cookies, name) {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}
