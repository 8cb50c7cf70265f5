//! # Identity Resolution Middleware
//!
//! Resolves the `Authorization: Bearer <token>` header into the request's
//! [`Caller`] before any handler runs.
//!
//! | Header                         | Outcome                         |
//! |--------------------------------|---------------------------------|
//! | absent or empty                | anonymous caller                |
//! | not `Bearer <token>` (len > 8) | 400 `BAD_REQUEST`               |
//! | well-formed but unknown token  | 401 `UNAUTHORIZED`              |
//! | known token                    | caller bound to that account    |
//!
//! Handlers take [`Caller`] as an extractor and hand the inner
//! `Option<Principal>` to the service layer. Authorization decisions are
//! made there, never here.

use axum::extract::{Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dph_core::Principal;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

// ── Caller ──────────────────────────────────────────────────────────────────

/// The resolved identity of the current request. `None` is anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caller(pub Option<Principal>);

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

/// Reads the [`Caller`] injected by [`identity_middleware`]. Requests that
/// bypassed the middleware are anonymous.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().copied().unwrap_or_default())
    }
}

// ── Token Comparison ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ, performs a dummy comparison so the timing does not
/// depend on where the mismatch is.
pub(crate) fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the credential header and inject the [`Caller`].
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw = match request.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                tracing::warn!("authentication failed: non-ASCII authorization header");
                return AppError::BadRequest("malformed credential: non-ASCII header".into())
                    .into_response();
            }
        },
    };

    match state.accounts.resolve(raw.as_deref()).await {
        Ok(principal) => {
            request.extensions_mut().insert(Caller(principal));
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(error = %err, "authentication failed");
            AppError::from(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(caller: Caller) -> String {
        match caller.principal() {
            Some(p) => format!("{}:{}", p.id, p.role),
            None => "anonymous".to_string(),
        }
    }

    fn test_app(state: AppState) -> Router {
        Router::new()
            .route("/test", get(whoami))
            .layer(from_fn_with_state(state.clone(), identity_middleware))
            .with_state(state)
    }

    fn request(auth: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/test");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let app = test_app(AppState::new());
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn known_token_binds_principal() {
        let state = AppState::new();
        let reg = state
            .accounts
            .register("alice", "hunter2hunter2", None)
            .await
            .unwrap();
        let app = test_app(state);

        let header = format!("Bearer {}", reg.token);
        let response = app.oneshot(request(Some(&header))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("{}:default", reg.user.id));
    }

    #[tokio::test]
    async fn malformed_header_rejected_with_400() {
        let app = test_app(AppState::new());
        for header in ["Basic dXNlcjpwYXNz", "Bearer short", "Bearer a b c", "bearer abcdefghijk"] {
            let response = app.clone().oneshot(request(Some(header))).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{header}");
        }
    }

    #[tokio::test]
    async fn unknown_token_rejected_with_401() {
        let app = test_app(AppState::new());
        let response = app
            .oneshot(request(Some("Bearer definitely-not-issued")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_token_eq("abcdefghij", "abcdefghij"));
        assert!(!constant_time_token_eq("abcdefghij", "abcdefghik"));
        assert!(!constant_time_token_eq("abc", "abcdefghij"));
    }
}
