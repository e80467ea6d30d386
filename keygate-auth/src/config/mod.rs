use std::env;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub google: GoogleOAuthConfig,
    pub console: ConsoleConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Compact-token signing configuration. The secret has no default in any
/// environment: a missing secret is a startup failure, never a fallback.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub app_session_ttl_hours: i64,
    pub console_session_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Where the browser lands after a successful callback.
    pub app_redirect_url: String,
}

/// Expected operator-console credentials. Like the signing secret these are
/// mandatory explicit configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub organization_id: Uuid,
    pub organization_key: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub cookie_secure: bool,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Config(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let console_org_id = get_env("CONSOLE_ORGANIZATION_ID", None, is_prod)?;
        let console_org_id = console_org_id.parse::<Uuid>().map_err(|e| {
            AppError::Config(anyhow::anyhow!(
                "CONSOLE_ORGANIZATION_ID is not a valid UUID: {}",
                e
            ))
        })?;

        let config = AuthConfig {
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("keygate-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("PORT", Some("8080"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::Config(anyhow::anyhow!(e.to_string()))
                })?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            token: TokenConfig {
                secret: get_env("TOKEN_SECRET", None, is_prod)?,
                app_session_ttl_hours: get_env("APP_SESSION_TTL_HOURS", Some("24"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::Config(anyhow::anyhow!(e.to_string()))
                    })?,
                console_session_ttl_hours: get_env(
                    "CONSOLE_SESSION_TTL_HOURS",
                    Some("24"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::Config(anyhow::anyhow!(e.to_string()))
                })?,
            },
            google: GoogleOAuthConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?,
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
                app_redirect_url: get_env(
                    "APP_REDIRECT_URL",
                    Some("http://localhost:3000/app"),
                    is_prod,
                )?,
            },
            console: ConsoleConfig {
                organization_id: console_org_id,
                organization_key: get_env("CONSOLE_ORGANIZATION_KEY", None, is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                cookie_secure: get_env("COOKIE_SECURE", Some(if is_prod { "true" } else { "false" }), is_prod)?
                    .parse()
                    .unwrap_or(is_prod),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.token.secret.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "TOKEN_SECRET must not be empty"
            )));
        }

        if self.console.organization_key.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "CONSOLE_ORGANIZATION_KEY must not be empty"
            )));
        }

        if self.token.app_session_ttl_hours <= 0 || self.token.console_session_ttl_hours <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "session TTLs must be positive"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Config(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.security.cookie_secure {
                return Err(AppError::Config(anyhow::anyhow!(
                    "COOKIE_SECURE must be true in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_requires_secret_even_in_dev() {
        // No default is registered for secrets, so a missing variable is an
        // error in every environment.
        std::env::remove_var("TEST_ONLY_SECRET");
        let result = get_env("TEST_ONLY_SECRET", None, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
