//! End-user auth endpoints: Google login, callback, session info, logout.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration as CookieDuration;

use crate::dtos::auth::{GoogleCallbackQuery, MessageResponse};
use crate::error::AppError;
use crate::middleware::app::{AuthUser, SESSION_COOKIE};
use crate::models::UserResponse;
use crate::AppState;

/// Start the Google login flow by redirecting to the authorization URL.
#[utoipa::path(
    get,
    path = "/v1/app/auth/google/login",
    responses((status = 302, description = "Redirect to Google")),
    tag = "app-auth"
)]
pub async fn google_login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let start = state.auth.start_login().await?;
    Ok(Redirect::temporary(&start.auth_url))
}

/// Provider callback: burn the state, exchange the code, mint a session and
/// send the browser on to the app with the session cookie set.
#[utoipa::path(
    get,
    path = "/v1/app/auth/google/callback",
    params(GoogleCallbackQuery),
    responses(
        (status = 302, description = "Session created, redirect to app"),
        (status = 401, description = "State invalid, expired or replayed")
    ),
    tag = "app-auth"
)]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    let (_user, session) = state.auth.handle_callback(&query.code, &query.state).await?;

    let max_age = session.expires_at - session.created_at;
    let cookie = session_cookie(
        session.session_id,
        max_age.num_seconds(),
        state.config.security.cookie_secure,
    );

    Ok((
        jar.add(cookie),
        Redirect::temporary(&state.config.google.app_redirect_url),
    ))
}

/// The authenticated user's own profile.
#[utoipa::path(
    get,
    path = "/v1/app/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "app-auth"
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Revoke the current session and clear the cookie.
#[utoipa::path(
    post,
    path = "/v1/app/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "app-auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.auth.logout(cookie.value()).await?;
    }

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");

    Ok((
        jar.remove(removal),
        Json(MessageResponse::new("Logged out")),
    ))
}

fn session_cookie(value: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::seconds(max_age_seconds));
    cookie.set_secure(secure);
    cookie
}
