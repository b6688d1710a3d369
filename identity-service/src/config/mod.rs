use platform_core::config as core_config;
use platform_core::error::AppError;
use rand::RngCore;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Unset disables the shared revocation cache; the service then runs on
    /// the process-local store only.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret_key: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub window_seconds: u64,
}

/// Environment reader with dev-friendly defaults.
///
/// A missing variable falls back to its default in dev and is a startup
/// error in prod, so production deployments must spell every setting out.
struct Env {
    is_prod: bool,
}

impl Env {
    fn string(&self, key: &str, default: &str) -> Result<String, AppError> {
        match env::var(key) {
            Ok(value) => Ok(value),
            Err(_) if self.is_prod => Err(missing(key)),
            Err(_) => Ok(default.to_string()),
        }
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.string(key, default)?;
        raw.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        })
    }

    fn optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

fn missing(key: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!("{} must be set when ENVIRONMENT=prod", key))
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let vars = Env {
            is_prod: environment == Environment::Prod,
        };

        let secret_key = match Env::optional("SECRET_KEY") {
            Some(key) => key,
            None if vars.is_prod => return Err(missing("SECRET_KEY")),
            None => {
                tracing::warn!("SECRET_KEY not set; generated a throwaway dev signing key");
                generate_dev_secret()
            }
        };

        let database = DatabaseConfig {
            url: match Env::optional("DATABASE_URL") {
                Some(url) => url,
                None => {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "DATABASE_URL is not set"
                    )))
                }
            },
            max_connections: vars.parsed("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: vars.parsed("DATABASE_MIN_CONNECTIONS", "1")?,
        };

        let config = Self {
            common,
            environment,
            service_name: vars.string("SERVICE_NAME", "identity-service")?,
            service_version: vars.string("SERVICE_VERSION", env!("CARGO_PKG_VERSION"))?,
            log_level: vars.string("LOG_LEVEL", "info")?,
            database,
            redis: RedisConfig {
                url: Env::optional("REDIS_URL"),
            },
            jwt: JwtConfig {
                secret_key,
                access_token_expiry_minutes: vars.parsed("ACCESS_TOKEN_EXPIRY_MINUTES", "30")?,
                refresh_token_expiry_days: vars.parsed("REFRESH_TOKEN_EXPIRY_DAYS", "7")?,
            },
            security: SecurityConfig {
                allowed_origins: vars
                    .string("ALLOWED_ORIGINS", "http://localhost:3000")?
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            },
            swagger: SwaggerConfig {
                enabled: vars.parsed("ENABLE_SWAGGER", "public")?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: vars.parsed("RATE_LIMIT_PER_MINUTE", "100")?,
                window_seconds: vars.parsed("RATE_LIMIT_WINDOW_SECONDS", "60")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    fn validate(&self) -> Result<(), AppError> {
        let fail = |msg: &str| Err(AppError::ConfigError(anyhow::anyhow!(msg.to_string())));

        if self.common.port == 0 {
            return fail("PORT must not be 0");
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return fail("ACCESS_TOKEN_EXPIRY_MINUTES must be a positive number of minutes");
        }
        if self.jwt.refresh_token_expiry_days <= 0 {
            return fail("REFRESH_TOKEN_EXPIRY_DAYS must be a positive number of days");
        }
        if self.rate_limit.requests_per_minute == 0 {
            return fail("RATE_LIMIT_PER_MINUTE must be at least 1");
        }

        if self.is_prod() {
            if self.jwt.secret_key.len() < 32 {
                return fail("production SECRET_KEY must be at least 32 bytes");
            }
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return fail("ALLOWED_ORIGINS must not contain a wildcard in production");
            }
        }

        Ok(())
    }
}

/// 32 random bytes, hex-encoded. Dev only; restarting invalidates every
/// outstanding token.
fn generate_dev_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(format!(
                "unknown environment '{}', expected 'dev' or 'prod'",
                other
            )),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown swagger mode '{}', expected 'public' or 'disabled'",
                other
            )),
        }
    }
}
