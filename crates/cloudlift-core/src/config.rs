use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides where jobs, logs and staged files live.
pub const STATE_DIR_ENV: &str = "CLOUDLIFT_STATE_DIR";

/// 19.5 GiB: the free-tier ceiling enforced for Cloudflare R2.
pub const DEFAULT_R2_SIZE_LIMIT_BYTES: u64 = 39 * 512 * 1024 * 1024;

/// Global configuration loaded from `~/.config/cloudlift/config.toml`.
///
/// Provider credentials are not stored here; see [`crate::destinations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftConfig {
    /// Directory for `jobs.db`, job logs and staged downloads.
    /// None = XDG state dir (`~/.local/state/cloudlift`).
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Minimum interval between progress writes to the job store.
    pub progress_interval_ms: u64,
    /// Size ceiling for the R2 destination (file bytes plus bucket usage when counted).
    pub r2_size_limit_bytes: u64,
    /// Add the bucket's current usage to the file size before checking the limit.
    pub count_bucket_usage: bool,
    /// Lifetime of presigned share URLs generated after an upload.
    pub share_url_ttl_secs: u64,
    /// Keep `<id>.out.log` / `<id>.err.log` when a job is cancelled or cleared.
    #[serde(default)]
    pub keep_job_logs: bool,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            progress_interval_ms: 500,
            r2_size_limit_bytes: DEFAULT_R2_SIZE_LIMIT_BYTES,
            count_bucket_usage: true,
            share_url_ttl_secs: 7 * 24 * 60 * 60,
            keep_job_logs: false,
        }
    }
}

impl LiftConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn share_url_ttl(&self) -> Duration {
        Duration::from_secs(self.share_url_ttl_secs)
    }

    /// Resolve the state directory: `CLOUDLIFT_STATE_DIR`, then `state_dir`, then XDG.
    pub fn resolve_state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("cloudlift")?;
        Ok(xdg_dirs.get_state_home())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cloudlift")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LiftConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LiftConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LiftConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = LiftConfig::default();
        assert_eq!(cfg.progress_interval_ms, 500);
        assert_eq!(cfg.r2_size_limit_bytes, 20_937_965_568);
        assert!(cfg.count_bucket_usage);
        assert_eq!(cfg.share_url_ttl(), Duration::from_secs(604_800));
        assert!(cfg.state_dir.is_none());
        assert!(!cfg.keep_job_logs);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = LiftConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: LiftConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.progress_interval_ms, cfg.progress_interval_ms);
        assert_eq!(parsed.r2_size_limit_bytes, cfg.r2_size_limit_bytes);
        assert_eq!(parsed.count_bucket_usage, cfg.count_bucket_usage);
        assert_eq!(parsed.share_url_ttl_secs, cfg.share_url_ttl_secs);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            state_dir = "/app/job_status"
            progress_interval_ms = 250
            r2_size_limit_bytes = 1_000_000
            count_bucket_usage = false
            share_url_ttl_secs = 3600
        "#;
        let cfg: LiftConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.state_dir.as_deref(), Some(std::path::Path::new("/app/job_status")));
        assert_eq!(cfg.progress_interval(), Duration::from_millis(250));
        assert_eq!(cfg.r2_size_limit_bytes, 1_000_000);
        assert!(!cfg.count_bucket_usage);
        assert_eq!(cfg.share_url_ttl_secs, 3600);
        assert!(!cfg.keep_job_logs);
    }
}
