//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Query parameters Google sends to the callback endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GoogleCallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConsoleLoginRequest {
    pub organization_id: Uuid,
    #[validate(length(min = 1, message = "Organization key is required"))]
    pub organization_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsoleLoginResponse {
    pub session_token: String,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_login_request_validation() {
        let valid = ConsoleLoginRequest {
            organization_id: Uuid::new_v4(),
            organization_key: "key".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty_key = ConsoleLoginRequest {
            organization_id: Uuid::new_v4(),
            organization_key: String::new(),
        };
        assert!(empty_key.validate().is_err());
    }
}
