//! Cookie-based auth for the end-user surface.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::error::AppError;
use crate::middleware::scope::RequestScope;
use crate::models::User;
use crate::AppState;

/// Name of the app session cookie.
pub const SESSION_COOKIE: &str = "keygate_session";

/// Require a valid session cookie unless the path is explicitly exempt.
/// All failures collapse to the same generic 401.
pub async fn app_auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.app_exemptions.is_exempt(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(AppError::unauthenticated)?;

    let (user, session) = state.auth.authenticate(&session_id).await?;

    let scope = RequestScope::for_app_user(
        user.user_id,
        session.active_membership_id,
        session.session_id.clone(),
    );
    req.extensions_mut().insert(scope);
    req.extensions_mut().insert(AuthUser(user));
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated user resolved by the middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(AppError::unauthenticated)
    }
}
