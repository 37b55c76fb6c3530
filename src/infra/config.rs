//! Process configuration: defaults, then an optional TOML file named by
//! `GATEWAY_CONFIG`, then environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::session::CredentialPair;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_URL: &str = "https://api.x.com";
pub const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid MODE: {0}. Must be 'server' or 'stdio'")]
    InvalidMode(String),
    #[error("PORT cannot be 0")]
    ZeroPort,
    #[error("{name} must be {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Stdio,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Server => "server",
            Mode::Stdio => "stdio",
        })
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "server" => Ok(Mode::Server),
            "stdio" => Ok(Mode::Stdio),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub language: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            bearer_token: None,
            language: DEFAULT_LANGUAGE.into(),
            connect_timeout: Duration::from_millis(2_000),
            timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Reclaim cache entries unused for this long. `None` keeps them for the
    /// life of the process.
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialConfig {
    /// Let tool calls without cookies use the process-wide pair below.
    pub allow_environment_fallback: bool,
    /// `TWITTER_CT0` / `TWITTER_AUTH_TOKEN`, when both are set.
    pub environment: Option<CredentialPair>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
    pub credentials: CredentialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Server,
            port: DEFAULT_PORT,
            upstream: UpstreamConfig::default(),
            session: SessionConfig::default(),
            credentials: CredentialConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    mode: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    upstream: FileUpstream,
    #[serde(default)]
    session: FileSession,
    #[serde(default)]
    credentials: FileCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileUpstream {
    base_url: Option<String>,
    bearer_token: Option<String>,
    language: Option<String>,
    connect_timeout_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSession {
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCredentials {
    allow_environment_fallback: Option<bool>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(path) = var("GATEWAY_CONFIG") {
            cfg.apply_file(PathBuf::from(path))?;
        }

        if let Some(mode) = var("MODE") {
            cfg.mode = mode.parse()?;
        }
        if let Some(port) = var("PORT") {
            cfg.port = parse_number("PORT", &port)?;
        }
        if let Some(base) = var("TWITTER_API_BASE_URL") {
            cfg.upstream.base_url = base;
        }
        if let Some(token) = var("TWITTER_BEARER_TOKEN") {
            cfg.upstream.bearer_token = Some(token);
        }
        if let Some(lang) = var("TWITTER_LANGUAGE") {
            cfg.upstream.language = lang;
        }
        if let Some(ms) = var("UPSTREAM_CONNECT_TIMEOUT_MS") {
            cfg.upstream.connect_timeout =
                Duration::from_millis(parse_number("UPSTREAM_CONNECT_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = var("UPSTREAM_TIMEOUT_MS") {
            cfg.upstream.timeout = Duration::from_millis(parse_number("UPSTREAM_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = var("SESSION_IDLE_TIMEOUT_SECS") {
            cfg.session.idle_timeout =
                idle_timeout(parse_number("SESSION_IDLE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(flag) = var("ALLOW_ENV_CREDENTIALS") {
            cfg.credentials.allow_environment_fallback = parse_bool("ALLOW_ENV_CREDENTIALS", &flag)?;
        }
        if let (Some(ct0), Some(auth)) = (var("TWITTER_CT0"), var("TWITTER_AUTH_TOKEN")) {
            cfg.credentials.environment = Some(CredentialPair::new(ct0, auth));
        }

        if cfg.mode == Mode::Server && cfg.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        Ok(cfg)
    }

    fn apply_file(&mut self, path: PathBuf) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let file: FileConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;

        if let Some(mode) = file.mode {
            self.mode = mode.parse()?;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        let up = file.upstream;
        if let Some(v) = up.base_url {
            self.upstream.base_url = v;
        }
        if up.bearer_token.is_some() {
            self.upstream.bearer_token = up.bearer_token;
        }
        if let Some(v) = up.language {
            self.upstream.language = v;
        }
        if let Some(ms) = up.connect_timeout_ms {
            self.upstream.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = up.timeout_ms {
            self.upstream.timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = file.session.idle_timeout_secs {
            self.session.idle_timeout = idle_timeout(secs);
        }
        if let Some(flag) = file.credentials.allow_environment_fallback {
            self.credentials.allow_environment_fallback = flag;
        }
        Ok(())
    }
}

fn idle_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}
