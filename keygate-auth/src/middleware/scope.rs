//! Typed per-request tenant scope.
//!
//! Auth middleware resolves the caller and inserts a [`RequestScope`] into
//! request extensions; handlers extract it and hand it to the database
//! layer, which stamps it onto the connection for row-level security.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Identity facts established for one request. Fields are optional because
/// the two surfaces establish different subsets: app auth knows the user,
/// console auth knows the organization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestScope {
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub membership_id: Option<Uuid>,
    pub session_id: Option<String>,
}

impl RequestScope {
    pub fn for_app_user(
        user_id: Uuid,
        membership_id: Option<Uuid>,
        session_id: String,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            organization_id: None,
            membership_id,
            session_id: Some(session_id),
        }
    }

    pub fn for_console(organization_id: Uuid, session_id: String) -> Self {
        Self {
            user_id: None,
            organization_id: Some(organization_id),
            membership_id: None,
            session_id: Some(session_id),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestScope>()
            .cloned()
            .ok_or_else(AppError::unauthenticated)
    }
}
