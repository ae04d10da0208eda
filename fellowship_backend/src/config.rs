use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FellowshipConfig {
    pub api_port: u16,
    pub paths: FellowshipPaths,
    pub membership: MembershipConfig,
    pub file: FileConfig,
    pub http: HttpConfig,
}

impl FellowshipConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("FELLOWSHIP_HOME") {
            Ok(raw) if !raw.trim().is_empty() => FellowshipPaths::from_base_dir(raw.trim())?,
            _ => FellowshipPaths::discover()?,
        };
        let api_port = env::var("FELLOWSHIP_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        Ok(Self {
            api_port,
            paths,
            membership: MembershipConfig::from_env()?,
            file: FileConfig::from_env(),
            http: HttpConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: FellowshipPaths) -> Self {
        Self {
            api_port,
            paths,
            membership: MembershipConfig::default(),
            file: FileConfig::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn with_membership(mut self, membership: MembershipConfig) -> Self {
        self.membership = membership;
        self
    }
}

/// What happens when an admin joins a family that already holds the
/// configured number of admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLimitPolicy {
    /// Join succeeds; the caller is told the user acts as a member there.
    Warn,
    /// Join is refused.
    Enforce,
}

impl FromStr for AdminLimitPolicy {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            other => Err(anyhow!("unknown admin limit policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub max_admins_per_family: usize,
    pub admin_limit_policy: AdminLimitPolicy,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            max_admins_per_family: 3,
            admin_limit_policy: AdminLimitPolicy::Warn,
        }
    }
}

impl MembershipConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let max_admins_per_family = env::var("FELLOWSHIP_MAX_ADMINS_PER_FAMILY")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(defaults.max_admins_per_family);
        let admin_limit_policy = match env::var("FELLOWSHIP_ADMIN_LIMIT_POLICY") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.admin_limit_policy,
        };
        Ok(Self {
            max_admins_per_family,
            admin_limit_policy,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileConfig {
    pub max_upload_bytes: u64,
    /// Prefix prepended to media URLs handed out to clients.
    pub public_url: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            public_url: String::new(),
        }
    }
}

impl FileConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = env::var("FELLOWSHIP_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let public_url = env::var("FELLOWSHIP_PUBLIC_URL")
            .map(|raw| raw.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Self {
            max_upload_bytes,
            public_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let request_timeout = env::var("FELLOWSHIP_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Self::default().request_timeout);
        Self { request_timeout }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FellowshipPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub blobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl FellowshipPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("fellowship.db");
        let blobs_dir = base.join("blobs");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            blobs_dir,
            logs_dir,
        })
    }
}
