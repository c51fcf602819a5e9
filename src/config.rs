use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::access::WritePolicy;

/// Application-level constants
pub const APP_NAME: &str = "HospitalRecords";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default PBKDF2 work factor for stored password hashes.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_ACCESS_TTL_SECS: u64 = 5 * 60;
const DEFAULT_REFRESH_TTL_SECS: u64 = 24 * 60 * 60;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot determine home directory; set HOSPITAL_DATA_DIR")]
    NoHomeDir,
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime configuration, built once at startup and handed to every
/// component through `CoreState`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    /// Root for stored artifacts (QR images). References saved on records
    /// are relative to this directory.
    pub media_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub pbkdf2_iterations: u32,
    pub write_policy: WritePolicy,
    pub cors_permissive: bool,
    pub seed_admin_password: String,
    pub seed_agent_password: String,
    pub log_filter: String,
}

impl AppConfig {
    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("hospital.db"),
            media_dir: data_dir.join("media"),
            data_dir,
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000))),
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            write_policy: WritePolicy::AnyAuthenticated,
            cors_permissive: false,
            seed_admin_password: "admin123".into(),
            seed_agent_password: "agent123".into(),
            log_filter: default_log_filter().into(),
        }
    }

    /// Read `HOSPITAL_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("HOSPITAL_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let mut config = Self::with_data_dir(data_dir);

        if let Some(path) = lookup("HOSPITAL_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("HOSPITAL_MEDIA_DIR") {
            config.media_dir = PathBuf::from(path);
        }
        if let Some(addr) = lookup("HOSPITAL_BIND") {
            config.bind_addr = addr.parse().map_err(|_| ConfigError::InvalidValue {
                var: "HOSPITAL_BIND",
                value: addr.clone(),
            })?;
        }
        if let Some(secs) = lookup("HOSPITAL_ACCESS_TTL_SECS") {
            config.access_token_ttl = Duration::from_secs(parse_num("HOSPITAL_ACCESS_TTL_SECS", &secs)?);
        }
        if let Some(secs) = lookup("HOSPITAL_REFRESH_TTL_SECS") {
            config.refresh_token_ttl = Duration::from_secs(parse_num("HOSPITAL_REFRESH_TTL_SECS", &secs)?);
        }
        if let Some(iters) = lookup("HOSPITAL_PBKDF2_ITERATIONS") {
            config.pbkdf2_iterations = parse_num("HOSPITAL_PBKDF2_ITERATIONS", &iters)?;
        }
        if let Some(policy) = lookup("HOSPITAL_WRITE_POLICY") {
            config.write_policy = policy.parse().map_err(|_| ConfigError::InvalidValue {
                var: "HOSPITAL_WRITE_POLICY",
                value: policy.clone(),
            })?;
        }
        if let Some(flag) = lookup("HOSPITAL_CORS_PERMISSIVE") {
            config.cors_permissive = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Some(pw) = lookup("HOSPITAL_SEED_ADMIN_PASSWORD") {
            config.seed_admin_password = pw;
        }
        if let Some(pw) = lookup("HOSPITAL_SEED_AGENT_PASSWORD") {
            config.seed_agent_password = pw;
        }
        if let Some(filter) = lookup("HOSPITAL_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Directory holding rendered patient QR codes.
    pub fn qr_dir(&self) -> PathBuf {
        self.media_dir.join("qr_codes")
    }
}

fn parse_num<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

/// ~/HospitalRecords/ unless overridden.
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

pub fn default_log_filter() -> &'static str {
    "hospital_records=info,tower_http=info"
}
