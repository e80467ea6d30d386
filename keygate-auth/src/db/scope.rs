//! Tenant-scoped connection checkout.
//!
//! Row-level-security policies read `keygate.organization_id` and
//! `keygate.membership_id` via `current_setting(...)`. [`TenantPool`] stamps
//! those settings onto a connection at acquire time from the request's
//! [`RequestScope`]; the pool's `after_release` hook resets them before the
//! connection can be reused.

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::ops::{Deref, DerefMut};

use crate::error::AppError;
use crate::middleware::scope::RequestScope;

const ORGANIZATION_SETTING: &str = "keygate.organization_id";
const MEMBERSHIP_SETTING: &str = "keygate.membership_id";

/// Wrapper over the shared pool that only hands out scoped connections.
#[derive(Clone)]
pub struct TenantPool {
    pool: PgPool,
}

impl TenantPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check out a connection with the scope's settings applied. Any failure
    /// while stamping aborts the checkout; a half-scoped connection is never
    /// returned to the caller.
    pub async fn acquire(&self, scope: &RequestScope) -> Result<ScopedConnection, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from)?;

        for (name, value) in scope_settings(scope) {
            sqlx::query("SELECT set_config($1, $2, false)")
                .bind(name)
                .bind(value)
                .execute(&mut *conn)
                .await?;
        }

        Ok(ScopedConnection { conn })
    }
}

/// Settings to apply for a scope. Unset fields are simply not stamped; the
/// release hook resets both regardless.
fn scope_settings(scope: &RequestScope) -> Vec<(&'static str, String)> {
    let mut settings = Vec::new();
    if let Some(organization_id) = scope.organization_id {
        settings.push((ORGANIZATION_SETTING, organization_id.to_string()));
    }
    if let Some(membership_id) = scope.membership_id {
        settings.push((MEMBERSHIP_SETTING, membership_id.to_string()));
    }
    settings
}

/// A pooled connection carrying tenant settings. Dropping it returns the
/// connection to the pool, which resets the settings on release.
pub struct ScopedConnection {
    conn: PoolConnection<Postgres>,
}

impl Deref for ScopedConnection {
    type Target = PoolConnection<Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
