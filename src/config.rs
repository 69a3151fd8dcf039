/*
 * Responsibility
 * - Load environment variables (.env via dotenvy) into one immutable Config
 * - Validate values up front (missing issuer / bad URL / bad regex => startup failure)
 * - Lenient flags keep the historical behavior: unparseable values fall back to defaults with a warning
 */
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderName;
use axum::http::header;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::services::auth::issuer::{IssuerId, IssuerRecord, IssuerResolver, IssuerRoute};

pub const DEFAULT_ISSUER_ID: &str = "default";
pub const DEFAULT_OUTBOUND_HEADER: &str = "x-jwt-payload";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PATH_REGEX: &str = r"^/.*";
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    /// Unset or unknown values mean production; development has to be asked for.
    fn parse(value: Option<String>) -> Self {
        match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("development" | "dev" | "local") => Self::Development,
            _ => Self::Production,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Logging settings, read before `Config` so its parse warnings are not lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: &'static str,
    /// Production logs are JSON lines.
    pub app_env: AppEnv,
}

impl LogConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = match lookup("LOG_LEVEL")
            .map(|v| v.trim().to_ascii_uppercase())
            .as_deref()
        {
            Some("TRACE") => "trace",
            Some("DEBUG") => "debug",
            Some("WARN") => "warn",
            Some("ERROR" | "FATAL" | "PANIC") => "error",
            _ => "info",
        };

        Self {
            level,
            app_env: AppEnv::parse(lookup("APP_ENV")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct PassthroughConfig {
    pub enabled: bool,
    pub headers: Vec<HeaderName>,
    pub path_pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub issuers: Vec<IssuerRecord>,
    pub issuer_resolver: IssuerResolver,

    pub outbound_header: HeaderName,
    pub check_expiry: bool,
    pub passthrough: PassthroughConfig,
    pub new_error_message_regex: Regex,

    pub jwks_fetch_timeout: Duration,
    pub jwks_min_refresh_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("LISTEN_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unable to convert LISTEN_PORT to integer, defaulting to port {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
        };
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let app_env = AppEnv::parse(get("APP_ENV"));

        let (issuers, issuer_resolver) = parse_issuers(
            get("JWT_ISSUER"),
            get("JWT_ISSUERS"),
            get("JWT_ISSUER_ROUTES"),
        )?;

        let outbound_header = match get("JWT_OUTBOUND_HEADER") {
            None => HeaderName::from_static(DEFAULT_OUTBOUND_HEADER),
            Some(raw) => HeaderName::from_bytes(raw.as_bytes())
                .map_err(|_| ConfigError::Invalid("JWT_OUTBOUND_HEADER"))?,
        };

        let check_expiry = parse_flag("CHECK_EXP", get("CHECK_EXP"), true);

        let passthrough = PassthroughConfig {
            enabled: parse_flag(
                "ALLOW_BASIC_AUTH_PASSTHROUGH",
                get("ALLOW_BASIC_AUTH_PASSTHROUGH"),
                false,
            ),
            headers: parse_header_list(get("ALLOW_BASIC_AUTH_HEADERS"))?,
            path_pattern: parse_regex(
                "ALLOW_BASIC_AUTH_PATH_REGEX",
                get("ALLOW_BASIC_AUTH_PATH_REGEX"),
            )?,
        };

        let new_error_message_regex =
            parse_regex("NEW_ERROR_MESSAGE_REGEX", get("NEW_ERROR_MESSAGE_REGEX"))?;

        let jwks_fetch_timeout = Duration::from_secs(parse_seconds(
            "JWKS_FETCH_TIMEOUT_SECONDS",
            get("JWKS_FETCH_TIMEOUT_SECONDS"),
            DEFAULT_FETCH_TIMEOUT_SECONDS,
        )?);
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("JWKS_FETCH_TIMEOUT_SECONDS"));
        }

        let jwks_min_refresh_interval = Duration::from_secs(parse_seconds(
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS",
            get("JWKS_MIN_REFRESH_INTERVAL_SECONDS"),
            0,
        )?);

        Ok(Self {
            addr,
            app_env,
            issuers,
            issuer_resolver,
            outbound_header,
            check_expiry,
            passthrough,
            new_error_message_regex,
            jwks_fetch_timeout,
            jwks_min_refresh_interval,
        })
    }
}

fn parse_issuers(
    single: Option<String>,
    multi: Option<String>,
    routes: Option<String>,
) -> Result<(Vec<IssuerRecord>, IssuerResolver), ConfigError> {
    match (single, multi) {
        (Some(_), Some(_)) => Err(ConfigError::Invalid("JWT_ISSUERS")),
        (None, None) => Err(ConfigError::Missing("JWT_ISSUER")),
        (Some(url), None) => {
            let id = IssuerId::new(DEFAULT_ISSUER_ID);
            let url = Url::parse(&url).map_err(|_| ConfigError::Invalid("JWT_ISSUER"))?;
            Ok((
                vec![IssuerRecord {
                    id: id.clone(),
                    url,
                }],
                IssuerResolver::Single(id),
            ))
        }
        (None, Some(multi)) => {
            let mut issuers: Vec<IssuerRecord> = Vec::new();
            for (id, url) in pairs(&multi, "JWT_ISSUERS")? {
                let url = Url::parse(url).map_err(|_| ConfigError::Invalid("JWT_ISSUERS"))?;
                if issuers.iter().any(|r| r.id.as_str() == id) {
                    return Err(ConfigError::Invalid("JWT_ISSUERS"));
                }
                issuers.push(IssuerRecord {
                    id: IssuerId::new(id),
                    url,
                });
            }

            let routes = routes.ok_or(ConfigError::Missing("JWT_ISSUER_ROUTES"))?;
            let mut resolved = Vec::new();
            for (pattern, id) in pairs(&routes, "JWT_ISSUER_ROUTES")? {
                let issuer = issuers
                    .iter()
                    .find(|r| r.id.as_str() == id)
                    .map(|r| r.id.clone())
                    .ok_or(ConfigError::Invalid("JWT_ISSUER_ROUTES"))?;
                resolved.push(IssuerRoute {
                    pattern: pattern.to_string(),
                    issuer,
                });
            }

            Ok((issuers, IssuerResolver::Multi(resolved)))
        }
    }
}

// Comma-separated `left=right` pairs, declared order preserved.
fn pairs<'a>(raw: &'a str, key: &'static str) -> Result<Vec<(&'a str, &'a str)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(l, r)| (l.trim(), r.trim()))
                .filter(|(l, r)| !l.is_empty() && !r.is_empty())
                .ok_or(ConfigError::Invalid(key))
        })
        .collect()
}

/// Accepts the usual spellings (`1`, `t`, `true`, `TRUE`, `0`, `f`, `false`, ...).
fn parse_flag(key: &str, value: Option<String>, default: bool) -> bool {
    let Some(raw) = value else {
        return default;
    };
    match raw.as_str() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
        "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
        _ => {
            tracing::warn!(key, value = %raw, default, "unable to convert flag to bool, using default");
            default
        }
    }
}

fn parse_header_list(value: Option<String>) -> Result<Vec<HeaderName>, ConfigError> {
    let Some(raw) = value else {
        return Ok(vec![header::AUTHORIZATION]);
    };
    let headers = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::Invalid("ALLOW_BASIC_AUTH_HEADERS"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if headers.is_empty() {
        return Ok(vec![header::AUTHORIZATION]);
    }
    Ok(headers)
}

fn parse_regex(key: &'static str, value: Option<String>) -> Result<Regex, ConfigError> {
    Regex::new(value.as_deref().unwrap_or(DEFAULT_PATH_REGEX)).map_err(|_| ConfigError::Invalid(key))
}

fn parse_seconds(key: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    value
        .map(|raw| raw.parse::<u64>().map_err(|_| ConfigError::Invalid(key)))
        .unwrap_or(Ok(default))
}
