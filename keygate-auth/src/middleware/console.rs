//! Bearer-token auth for the operator-console surface.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::middleware::scope::RequestScope;
use crate::AppState;

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))
}

/// Require a valid console token unless the path is explicitly exempt.
pub async fn console_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.console_exemptions.is_exempt(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let token = bearer_token(req.headers())?.to_string();
    let claims = state.console.validate_session(&token).await?;

    let scope = RequestScope::for_console(claims.org, claims.sid.clone());
    req.extensions_mut().insert(scope);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        let headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer x"));
        assert!(bearer_token(&headers).is_err());
    }
}
