//! Request pipeline pieces: global CORS policy, the bearer-token gate for
//! admin routes, and the typed request scope handlers read the caller from.
//!
//! Order, outermost first: request timeout -> `cors_layer` -> router ->
//! `require_bearer` (admin routes only) -> handler.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::models::AuthenticatedUser;
use crate::rest::AppState;

/// Any origin may call the API; browsers may send the JSON content type and
/// a bearer token. Preflight `OPTIONS` requests are answered here.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

/// Admit the request only if its bearer token passes every check.
///
/// On success the caller's identity is attached to the request extensions;
/// on failure the first failing check decides the status and the handler never runs.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let outcome = state
        .validator
        .authorize(req.headers().get(header::AUTHORIZATION), Utc::now().timestamp());

    let mut response = match outcome {
        Ok(user) => {
            tracing::info!(user_id = user.user_id, "valid user");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, path = %req.uri().path(), "rejected admin request");
            ApiError::Auth(err).into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| ApiError::Internal("route is not behind the auth gate".to_string()))
    }
}

/// Per-request values for a protected route: typed path parameters plus the
/// authenticated caller. Dropped with the request.
#[derive(Debug)]
pub struct RequestScope<P> {
    pub params: P,
    pub user: AuthenticatedUser,
}

#[async_trait]
impl<S, P> FromRequestParts<S> for RequestScope<P>
where
    S: Send + Sync,
    P: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let Path(params) = Path::<P>::from_request_parts(parts, state)
            .await
            .map_err(|err| ApiError::BadRequest(err.body_text()))?;
        Ok(Self { params, user })
    }
}
