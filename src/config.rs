//! Environment-based configuration types for the client registry runtime settings.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::oauth::cors::OriginPattern;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Certificate bundles for HTTPS connections
#[derive(Clone)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Scope assigned to clients registered without one
#[derive(Clone)]
pub struct DefaultClientScopes(String);

/// OpenID Connect subject identifier types the provider supports
#[derive(Clone, Debug)]
pub struct SubjectTypesSupported(Vec<String>);

/// Server-wide CORS allow-list
#[derive(Clone, Default)]
pub struct CorsAllowedOrigins(Vec<OriginPattern>);

/// Bearer tokens accepted on the administrative API
#[derive(Clone, Default)]
pub struct AdminTokens(Vec<String>);

/// Argon2 cost parameters for client secret hashing
#[derive(Clone, Copy)]
pub struct SecretHashCost {
    pub iterations: u32,
    pub memory_kib: u32,
}

/// Upper bound on retained rotated secrets; `None` keeps every generation
#[derive(Clone, Copy, Default)]
pub struct RotatedSecretsLimit(Option<usize>);

/// Boolean switch parsed from true/false/1/0/yes/no/on/off
#[derive(Clone, Copy, Default)]
pub struct Flag(bool);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub external_base: String,
    pub certificate_bundles: CertificateBundles,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub default_client_scopes: DefaultClientScopes,
    pub subject_types_supported: SubjectTypesSupported,
    pub enable_dynamic_registration: Flag,
    pub disallow_private_ip_ranges: Flag,
    pub cors_enabled: Flag,
    pub cors_allowed_origins: CorsAllowedOrigins,
    pub secret_hash_cost: SecretHashCost,
    pub rotated_secrets_limit: RotatedSecretsLimit,
    pub registration_token_secret: String,
    pub admin_tokens: AdminTokens,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let certificate_bundles: CertificateBundles =
            optional_env("CERTIFICATE_BUNDLES").try_into()?;
        let default_user_agent = format!("oidc-registry/{}", version()?);
        let external_base = require_env("EXTERNAL_BASE")?;
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let redis_url = optional_env("REDIS_URL");
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let default_client_scopes: DefaultClientScopes =
            default_env("OAUTH_DEFAULT_CLIENT_SCOPES", "offline_access offline openid")
                .try_into()?;
        let subject_types_supported: SubjectTypesSupported =
            default_env("OIDC_SUBJECT_TYPES_SUPPORTED", "public").try_into()?;
        let enable_dynamic_registration: Flag =
            default_env("ENABLE_DYNAMIC_REGISTRATION", "false").try_into()?;
        let disallow_private_ip_ranges: Flag =
            default_env("DISALLOW_PRIVATE_IP_RANGES", "false").try_into()?;
        let cors_enabled: Flag = default_env("CORS_ENABLED", "false").try_into()?;
        let cors_allowed_origins: CorsAllowedOrigins =
            optional_env("CORS_ALLOWED_ORIGINS").try_into()?;
        let secret_hash_cost = SecretHashCost::from_env(
            &default_env("SECRET_HASH_COST", "2"),
            &default_env("SECRET_HASH_MEMORY_KIB", "19456"),
        )?;
        let rotated_secrets_limit: RotatedSecretsLimit =
            optional_env("ROTATED_SECRETS_MAX").try_into()?;
        let registration_token_secret = require_env("REGISTRATION_TOKEN_SECRET")?;
        let admin_tokens: AdminTokens = optional_env("ADMIN_TOKENS").try_into()?;

        Ok(Self {
            version: version()?,
            http_port,
            external_base,
            certificate_bundles,
            user_agent,
            http_client_timeout,
            storage_backend,
            database_url,
            redis_url,
            default_client_scopes,
            subject_types_supported,
            enable_dynamic_registration,
            disallow_private_ip_ranges,
            cors_enabled,
            cors_allowed_origins,
            secret_hash_cost,
            rotated_secrets_limit,
            registration_token_secret,
            admin_tokens,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        Ok(Self(split_list(&value.unwrap_or_default(), ';')))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        duration_str::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for DefaultClientScopes {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(
            value.split_whitespace().collect::<Vec<&str>>().join(" "),
        ))
    }
}

impl AsRef<str> for DefaultClientScopes {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectTypesSupported {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let types = split_list(&value, ',');
        if let Some(unsupported) = types
            .iter()
            .find(|t| t.as_str() != "public" && t.as_str() != "pairwise")
        {
            return Err(ConfigError::UnsupportedSubjectType(unsupported.clone()).into());
        }
        if types.is_empty() {
            return Ok(Self(vec!["public".to_string()]));
        }
        Ok(Self(types))
    }
}

impl AsRef<Vec<String>> for SubjectTypesSupported {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<Option<String>> for CorsAllowedOrigins {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let patterns = split_list(&value.unwrap_or_default(), ',')
            .into_iter()
            .map(|pattern| {
                OriginPattern::parse(&pattern)
                    .ok_or(ConfigError::InvalidOriginPattern(pattern))
            })
            .collect::<Result<Vec<OriginPattern>, ConfigError>>()?;
        Ok(Self(patterns))
    }
}

impl TryFrom<String> for CorsAllowedOrigins {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(Some(value))
    }
}

impl AsRef<Vec<OriginPattern>> for CorsAllowedOrigins {
    fn as_ref(&self) -> &Vec<OriginPattern> {
        &self.0
    }
}

impl TryFrom<Option<String>> for AdminTokens {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        Ok(Self(split_list(&value.unwrap_or_default(), ',')))
    }
}

impl AsRef<Vec<String>> for AdminTokens {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl SecretHashCost {
    fn from_env(iterations: &str, memory_kib: &str) -> Result<Self> {
        let iterations = iterations
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::NumberParsingFailed("SECRET_HASH_COST".to_string(), e))?;
        let memory_kib = memory_kib.trim().parse::<u32>().map_err(|e| {
            ConfigError::NumberParsingFailed("SECRET_HASH_MEMORY_KIB".to_string(), e)
        })?;
        Ok(Self {
            iterations,
            memory_kib,
        })
    }
}

impl Default for SecretHashCost {
    fn default() -> Self {
        Self {
            iterations: 2,
            memory_kib: 19456,
        }
    }
}

impl TryFrom<Option<String>> for RotatedSecretsLimit {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Self(None)),
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(|limit| Self(Some(limit)))
                .map_err(|e| {
                    ConfigError::NumberParsingFailed("ROTATED_SECRETS_MAX".to_string(), e).into()
                }),
        }
    }
}

impl AsRef<Option<usize>> for RotatedSecretsLimit {
    fn as_ref(&self) -> &Option<usize> {
        &self.0
    }
}

impl TryFrom<String> for Flag {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for Flag {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Self(value)
    }
}
