//! Shared-secret scheduler authentication and the role gate.
//!
//! The authenticator runs on every inbound request. Requests carrying
//! the scheduler marker header have their body buffered and inspected
//! for a `secret:<value>` token; on an exact match a synthetic
//! scheduler principal is attached to the request's extensions. All
//! failure modes are silent here — a missing header, wrong secret, or
//! unconfigured secret all pass through unauthenticated, and rejection
//! only happens later at the authorization gate on protected routes.

use std::{error::Error as _, sync::Arc};

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use postbox_core::{Principal, Role};
use tracing::debug;

use crate::secret::SharedSecret;

/// Marker header identifying scheduler invocations.
///
/// Only its presence matters; the value (the scheduler's job ID) is
/// ignored.
pub const SCHEDULER_JOB_HEADER: &str = "x-ms-scheduler-jobid";

/// Literal prefix the request body must carry for authentication.
const SECRET_PREFIX: &str = "secret:";

/// Upper bound when buffering a request body for inspection.
const MAX_BUFFERED_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Extracts the candidate secret from a request body.
///
/// Returns `None` when the body is not UTF-8 or lacks the `secret:`
/// prefix. The value after the prefix is trimmed of surrounding
/// whitespace.
fn extract_candidate_secret(body: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(body).ok()?;
    text.strip_prefix(SECRET_PREFIX).map(str::trim)
}

/// Axum middleware that authenticates scheduler requests.
///
/// Requests without the marker header pass through untouched — the
/// body is never read. Otherwise the body is buffered, inspected, and
/// restored so downstream handlers still see it.
pub async fn scheduler_auth(
    State(secret): State<Arc<SharedSecret>>,
    req: Request,
    next: Next,
) -> Response {
    if !req.headers().contains_key(SCHEDULER_JOB_HEADER) {
        return next.run(req).await;
    }

    debug!("scheduler marker header present, inspecting request body");

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => return body_read_failure(&err),
    };

    let authenticated = extract_candidate_secret(&bytes)
        .is_some_and(|candidate| secret.matches(candidate));

    let mut req = Request::from_parts(parts, Body::from(bytes));
    if authenticated {
        req.extensions_mut().insert(Principal::scheduler());
        debug!("identified scheduler, principal attached to request");
    }

    next.run(req).await
}

/// Maps a body buffering failure to a response.
///
/// Exceeding the buffering bound answers 413; any other read failure
/// (the client dropped the connection mid-body, a malformed chunked
/// encoding) answers 400.
fn body_read_failure(err: &axum::Error) -> Response {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
        source = e.source();
    }
    StatusCode::BAD_REQUEST.into_response()
}

/// Authorization gate requiring the `scheduler` role.
///
/// Applied as a `route_layer` on protected routes. Rejects with 401
/// before the handler runs unless the authenticator attached a
/// principal bearing the scheduler role.
pub async fn require_scheduler(req: Request, next: Next) -> Response {
    match req.extensions().get::<Principal>() {
        Some(principal) if principal.has_role(Role::Scheduler) => next.run(req).await,
        _ => (StatusCode::UNAUTHORIZED, "scheduler role required").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn candidate_extracted_after_prefix_and_trimmed() {
        assert_eq!(extract_candidate_secret(b"secret:topsecret"), Some("topsecret"));
        assert_eq!(extract_candidate_secret(b"secret:  topsecret \n"), Some("topsecret"));
        assert_eq!(extract_candidate_secret(b"secret:"), Some(""));
    }

    #[test]
    fn bodies_without_prefix_yield_nothing() {
        assert_eq!(extract_candidate_secret(b""), None);
        assert_eq!(extract_candidate_secret(b"topsecret"), None);
        assert_eq!(extract_candidate_secret(b" secret:topsecret"), None);
        assert_eq!(extract_candidate_secret(b"SECRET:topsecret"), None);
    }

    #[test]
    fn non_utf8_body_yields_nothing() {
        assert_eq!(extract_candidate_secret(&[0x73, 0x65, 0xff, 0xfe]), None);
    }

    #[tokio::test]
    async fn oversize_body_maps_to_payload_too_large() {
        let body = Body::from("0123456789");
        let err = axum::body::to_bytes(body, 4).await.expect_err("body exceeds limit");
        assert_eq!(body_read_failure(&err).status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn transport_read_failure_maps_to_bad_request() {
        let err = axum::Error::new(std::io::Error::other("connection reset"));
        assert_eq!(body_read_failure(&err).status(), StatusCode::BAD_REQUEST);
    }

    proptest! {
        #[test]
        fn prefixed_bodies_always_parse_to_trimmed_suffix(suffix in "[ -~]{0,64}") {
            let body = format!("secret:{suffix}");
            prop_assert_eq!(extract_candidate_secret(body.as_bytes()), Some(suffix.trim()));
        }

        #[test]
        fn unprefixed_bodies_never_parse(body in "[ -~]{0,64}") {
            prop_assume!(!body.starts_with("secret:"));
            prop_assert_eq!(extract_candidate_secret(body.as_bytes()), None);
        }
    }
}
