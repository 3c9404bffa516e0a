use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SMOKE_BASE_URL: &str = "http://localhost:5000";

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub default_model: String,
    /// Admit requests when the limiter store fails instead of rejecting them.
    pub rate_limit_fail_open: bool,
    pub log_dir: Option<PathBuf>,
    pub smoke_test: bool,
    pub smoke_base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            port: DEFAULT_PORT,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            default_model: DEFAULT_MODEL.to_string(),
            rate_limit_fail_open: false,
            log_dir: None,
            smoke_test: false,
            smoke_base_url: DEFAULT_SMOKE_BASE_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).and_then(normalize);

        let port = match get("PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {:?}", v))?,
            None => defaults.port,
        };

        let upstream_timeout = match get("GATEWAY_UPSTREAM_TIMEOUT_MS") {
            Some(v) => {
                let ms = v.parse::<u64>().with_context(|| {
                    format!("GATEWAY_UPSTREAM_TIMEOUT_MS must be milliseconds, got {:?}", v)
                })?;
                if ms == 0 {
                    return Err(anyhow!("GATEWAY_UPSTREAM_TIMEOUT_MS must be greater than 0"));
                }
                Duration::from_millis(ms)
            }
            None => defaults.upstream_timeout,
        };

        let rate_limit_fail_open = match get("GATEWAY_RATE_LIMIT_FAIL_OPEN") {
            Some(v) => parse_bool("GATEWAY_RATE_LIMIT_FAIL_OPEN", &v)?,
            None => defaults.rate_limit_fail_open,
        };

        let smoke_test = match get("GATEWAY_SMOKE_TEST") {
            Some(v) => parse_bool("GATEWAY_SMOKE_TEST", &v)?,
            None => defaults.smoke_test,
        };

        Ok(Self {
            api_key: get("OPENAI_API_KEY"),
            port,
            upstream_base_url: get("GATEWAY_UPSTREAM_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_base_url),
            upstream_timeout,
            default_model: get("GATEWAY_DEFAULT_MODEL").unwrap_or(defaults.default_model),
            rate_limit_fail_open,
            log_dir: get("GATEWAY_LOG_DIR").map(PathBuf::from),
            smoke_test,
            smoke_base_url: get("GATEWAY_SMOKE_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.smoke_base_url),
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is missing; set it in the environment or .env"))
    }
}

/// Load `.env` from the working directory. A missing file is fine, an
/// unreadable or malformed one fails startup.
pub fn load_dotenv() -> Result<()> {
    load_dotenv_from(Path::new(".env"))
}

pub fn load_dotenv_from(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn normalize(v: String) -> Option<String> {
    let s = v.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn parse_bool(key: &str, v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be a boolean, got {:?}", key, v)),
    }
}
