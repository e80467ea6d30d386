//! Operator-console auth endpoints.

use axum::{extract::State, http::HeaderMap, Json};
use validator::Validate;

use crate::dtos::auth::{ConsoleLoginRequest, ConsoleLoginResponse, MessageResponse};
use crate::error::AppError;
use crate::middleware::console::bearer_token;
use crate::AppState;

/// Exchange the pre-shared organization credentials for a console token.
#[utoipa::path(
    post,
    path = "/v1/console/auth/login",
    request_body = ConsoleLoginRequest,
    responses(
        (status = 200, description = "Console session created", body = ConsoleLoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "console-auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<ConsoleLoginRequest>,
) -> Result<Json<ConsoleLoginResponse>, AppError> {
    request.validate()?;

    let login = state
        .console
        .login(request.organization_id, &request.organization_key)
        .await?;

    Ok(Json(ConsoleLoginResponse {
        session_token: login.session_token,
        expires_in_seconds: login.expires_in_seconds,
    }))
}

/// Revoke the console session behind the presented token.
#[utoipa::path(
    post,
    path = "/v1/console/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Invalid or expired token")
    ),
    tag = "console-auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    let token = bearer_token(&headers)?;
    state.console.logout(token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}
