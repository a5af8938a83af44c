//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Session token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `DATABASE_URL` - Store location (default: `memory://`, local development only)
//!   - `postgres://...` - `PostgreSQL`
//!   - `file:///path/to/shop.json` - Flat JSON file
//!   - `memory://` - In-process JSON document, lost on exit
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 4000)
//! - `GOOGLE_CLIENT_ID` - OAuth client ID; Google sign-in is refused without it
//! - `GOOGLE_JWKS_URL` - Google signing keys endpoint
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins (default: any origin)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Seed an administrator at startup
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking
//! - `LOG_FORMAT` - `pretty` (default) or `json`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Google's published ID token signing keys.
pub const DEFAULT_GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Store used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "memory://";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Store connection URL (may contain a password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Session token signing secret
    pub jwt_secret: SecretString,
    /// Google sign-in configuration
    pub google: GoogleConfig,
    /// Origins allowed by CORS; empty means any origin
    pub cors_allowed_origins: Vec<String>,
    /// Administrator created at startup if missing
    pub admin_seed: Option<AdminSeed>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

/// Google ID token verification settings.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Expected `aud` claim.
    pub client_id: Option<String>,
    /// Where to fetch the signing keys from.
    pub jwks_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            jwks_url: DEFAULT_GOOGLE_JWKS_URL.to_owned(),
        }
    }
}

/// Credentials of the administrator seeded at startup.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: SecretString,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_env_or_default(
            "DATABASE_URL",
            DEFAULT_DATABASE_URL,
        ));
        let host = get_env_or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let google = GoogleConfig {
            client_id: get_optional_env("GOOGLE_CLIENT_ID"),
            jwks_url: get_env_or_default("GOOGLE_JWKS_URL", DEFAULT_GOOGLE_JWKS_URL),
        };

        let cors_allowed_origins = get_optional_env("CORS_ALLOWED_ORIGINS")
            .map(|raw| parse_origin_list(&raw))
            .unwrap_or_default();

        let admin_seed = match (
            get_optional_env("ADMIN_EMAIL"),
            get_optional_env("ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        let log_format = match get_env_or_default("LOG_FORMAT", "pretty").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'pretty' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            google,
            cors_allowed_origins,
            admin_seed,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the store location fell back to the development default.
    #[must_use]
    pub fn uses_default_store(&self) -> bool {
        self.database_url.expose_secret() == DEFAULT_DATABASE_URL
    }

    /// Local development settings: in-memory store, no Google client, no
    /// Sentry, permissive CORS. Used by tests that boot the server in-process.
    #[must_use]
    pub fn local(jwt_secret: SecretString) -> Self {
        Self {
            database_url: SecretString::from(DEFAULT_DATABASE_URL),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 4000,
            jwt_secret,
            google: GoogleConfig::default(),
            cors_allowed_origins: Vec::new(),
            admin_seed: None,
            sentry_dsn: None,
            sentry_environment: None,
            log_format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_rejects_well_known_default_secret() {
        let result = validate_secret_strength("watch-shop-secret-key-2025", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_rejects_low_entropy_secret() {
        let result = validate_secret_strength(&"ab".repeat(20), "JWT_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_accepts_random_secret() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_origin_list() {
        assert_eq!(
            parse_origin_list(" http://localhost:5173, ,https://shop.test "),
            vec!["http://localhost:5173", "https://shop.test"]
        );
        assert!(parse_origin_list("").is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = ApiConfig::local(SecretString::from("x".repeat(32)));
        config.port = 4001;

        let addr = config.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:4001");
        assert!(config.uses_default_store());
    }

    #[test]
    fn test_admin_seed_debug_redacts_password() {
        let seed = AdminSeed {
            email: "admin@gmail.com".to_string(),
            password: SecretString::from("hunter2-but-longer"),
        };

        let debug_output = format!("{seed:?}");
        assert!(debug_output.contains("admin@gmail.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }
}
