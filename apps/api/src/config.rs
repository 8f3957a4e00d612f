use std::fmt;

use chrono::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_API_PREFIX: &str = "/api";
const DEFAULT_ACCESS_TTL: &str = "7d";
const DEFAULT_REFRESH_TTL: &str = "30d";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_SESSION_MAX_AGE: &str = "30d";
const DEFAULT_API_URL: &str = "http://localhost:3001/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// A secret value that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
            AppEnv::Test => "test",
        }
    }
}

/// Signing material and lifetimes for the access/refresh token pair.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: Secret,
    pub access_ttl: Duration,
    pub refresh_secret: Secret,
    pub refresh_ttl: Duration,
}

/// Application configuration loaded from environment variables.
/// Every problem is collected before startup fails, so one run reports them all.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub port: u16,
    pub api_prefix: String,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_origin: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let app_env = match env.optional("APP_ENV").as_deref() {
            None | Some("development") => AppEnv::Development,
            Some("production") => AppEnv::Production,
            Some("test") => AppEnv::Test,
            Some(other) => {
                env.problem(format!(
                    "APP_ENV: expected development, production or test, got '{other}'"
                ));
                AppEnv::Development
            }
        };

        let port = match env.optional("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                env.problem(format!("PORT: '{raw}' is not a valid port number"));
                DEFAULT_PORT
            }),
        };

        let api_prefix = normalize_prefix(
            &env.optional("API_PREFIX")
                .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string()),
        );
        let database_url = env.required("DATABASE_URL");
        let access_secret = env.required("JWT_SECRET");
        let access_ttl = env.duration("JWT_EXPIRES_IN", DEFAULT_ACCESS_TTL);
        let refresh_secret = env.required("JWT_REFRESH_SECRET");
        let refresh_ttl = env.duration("JWT_REFRESH_EXPIRES_IN", DEFAULT_REFRESH_TTL);

        if !access_secret.is_empty() && access_secret == refresh_secret {
            env.problem("JWT_REFRESH_SECRET: must differ from JWT_SECRET".to_string());
        }

        let cors_origin = env
            .optional("CORS_ORIGIN")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        let rust_log = env
            .optional("RUST_LOG")
            .unwrap_or_else(|| "info".to_string());

        env.finish()?;

        Ok(Config {
            app_env,
            port,
            api_prefix,
            database_url,
            jwt: JwtConfig {
                access_secret: Secret::new(access_secret),
                access_ttl,
                refresh_secret: Secret::new(refresh_secret),
                refresh_ttl,
            },
            cors_origin,
            rust_log,
        })
    }
}

/// Configuration of the web tier that wraps backend tokens in its own session.
#[derive(Debug, Clone)]
pub struct WebSessionConfig {
    pub session_secret: Secret,
    pub session_max_age: Duration,
    pub api_url: String,
}

impl WebSessionConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);
        let session_secret = env.required("SESSION_SECRET");
        let session_max_age = env.duration("SESSION_MAX_AGE", DEFAULT_SESSION_MAX_AGE);
        let api_url = env
            .optional("API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        env.finish()?;

        Ok(WebSessionConfig {
            session_secret: Secret::new(session_secret),
            session_max_age,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

struct EnvReader<F> {
    lookup: F,
    problems: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            problems: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.problem(format!("{key}: required environment variable is not set"));
                String::new()
            }
        }
    }

    fn duration(&mut self, key: &str, default: &str) -> Duration {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        match parse_duration(&raw) {
            Some(d) => d,
            None => {
                self.problem(format!(
                    "{key}: '{raw}' is not a duration (expected e.g. 3600, 15m, 12h, 7d)"
                ));
                Duration::zero()
            }
        }
    }

    fn problem(&mut self, message: String) {
        self.problems.push(message);
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.problems))
        }
    }
}

/// Parses `<n>[s|m|h|d]` or bare seconds into a positive duration.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: i64 = digits.parse().ok()?;
    if n <= 0 || n > 999_999_999 {
        return None;
    }
    match unit {
        "" | "s" => Some(Duration::seconds(n)),
        "m" => Some(Duration::minutes(n)),
        "h" => Some(Duration::hours(n)),
        "d" => Some(Duration::days(n)),
        _ => None,
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_PREFIX.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
