/**
 * Routes Module
 * API route handlers and the extractors they share
 */
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AppError;

pub mod auth;
pub mod categories;
pub mod health;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

// ============================================================================
// Extractors
// ============================================================================
//
// axum's own rejections are plain text. These wrappers turn them into the
// JSON envelope so clients always get `{success: false, message}`.

/// JSON body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// Query string.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// `{id}` path segment.
pub struct IdPath(pub Uuid);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        raw.parse()
            .map(IdPath)
            .map_err(|_| AppError::bad_request("Invalid id"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

lazy_static::lazy_static! {
    /// No tags allowed. Script and style bodies are dropped with their tags.
    static ref PLAIN_TEXT: ammonia::Builder<'static> = {
        let mut builder = ammonia::Builder::default();
        builder.tags(HashSet::<&str>::new());
        builder
    };
}

/// Sanitising passes before giving up on input that keeps decoding to markup.
const CLEAN_PASSES: usize = 4;

/// Reverse the escaping the sanitiser applies to text nodes. `&amp;` goes last.
fn unescape_text(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Reduce free text to plain text before it is stored. Markup is removed and
/// characters such as `&` and `<` are kept as typed. Escaped markup that would
/// decode into tags is stripped on a later pass.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw.to_string();
    for _ in 0..CLEAN_PASSES {
        let cleaned = unescape_text(&PLAIN_TEXT.clean(&text).to_string());
        if cleaned == text {
            break;
        }
        text = cleaned;
    }
    text.trim().to_string()
}

/// Treat blank query values as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared helpers for router tests.

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::seed_admin;
    use crate::state::AppState;

    /// Router over a fresh in-memory store plus a token for the seeded admin.
    pub async fn admin_app() -> (Router, AppState, String) {
        let state = AppState::for_tests();
        let admin = seed_admin(&state).await.unwrap().unwrap();
        let token = state.keys.issue(&admin).unwrap();
        (crate::create_app(state.clone()), state, token)
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
