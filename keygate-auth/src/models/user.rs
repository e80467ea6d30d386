//! User and external identity models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// User entity resolved from an OAuth identity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: Option<String>, picture_url: Option<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            display_name,
            picture_url,
            created_at: Utc::now(),
        }
    }
}

/// Link between a user and an external provider subject.
#[derive(Debug, Clone, FromRow)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_subject: String,
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    pub fn new(user_id: Uuid, provider: String, provider_subject: String) -> Self {
        Self {
            user_id,
            provider,
            provider_subject,
            created_at: Utc::now(),
        }
    }
}

/// User response for API (no internal fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            display_name: u.display_name,
            picture_url: u.picture_url,
        }
    }
}
