use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User agent sent when the captured stream did not carry one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// How the external download tool is invoked (`[tool]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before everything else (e.g. `["-m", "yt_dlp"]` with `python3`).
    pub prefix_args: Vec<String>,
    /// Format selector passed with `-f`.
    pub format: String,
    /// Retry count passed to the tool for requests and fragments.
    pub retries: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            prefix_args: Vec::new(),
            format: "best".to_string(),
            retries: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/streamdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of downloads running at once.
    pub max_concurrent: usize,
    /// Where finished files go. Unset means the directory `streamdl serve` runs in.
    pub download_dir: Option<PathBuf>,
    pub fallback_user_agent: String,
    /// Interval of the per-job progress heartbeat in milliseconds.
    pub progress_interval_ms: u64,
    /// Interval of the safety-net state file write in seconds.
    pub persist_interval_secs: u64,
    /// Override for the persisted queue file (default: XDG state dir).
    pub state_file: Option<PathBuf>,
    /// `[tool]` table; must stay the last field for TOML output.
    pub tool: ToolConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            download_dir: None,
            fallback_user_agent: DEFAULT_USER_AGENT.to_string(),
            progress_interval_ms: 1000,
            persist_interval_secs: 30,
            state_file: None,
            tool: ToolConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Concurrency limit; never below one.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.max(1)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(50))
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs.max(1))
    }

    /// Download directory, falling back to the current working directory.
    pub fn resolved_download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("streamdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<QueueConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = QueueConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: QueueConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.max_concurrent, 3);
        assert_eq!(cfg.tool.program, "yt-dlp");
        assert_eq!(cfg.tool.retries, 10);
        assert_eq!(cfg.progress_interval(), Duration::from_secs(1));
        assert_eq!(cfg.persist_interval(), Duration::from_secs(30));
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = QueueConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: QueueConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent, cfg.max_concurrent);
        assert_eq!(parsed.tool, cfg.tool);
        assert_eq!(parsed.fallback_user_agent, cfg.fallback_user_agent);
    }

    #[test]
    fn config_toml_partial_values() {
        let toml = r#"
            max_concurrent = 0
            download_dir = "/srv/media"

            [tool]
            program = "python3"
            prefix_args = ["-m", "yt_dlp"]
        "#;
        let cfg: QueueConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent(), 1);
        assert_eq!(cfg.download_dir, Some(PathBuf::from("/srv/media")));
        assert_eq!(cfg.tool.program, "python3");
        assert_eq!(cfg.tool.prefix_args, vec!["-m", "yt_dlp"]);
        assert_eq!(cfg.tool.format, "best");
        assert_eq!(cfg.persist_interval_secs, 30);
        assert!(cfg.state_file.is_none());
    }

    #[test]
    fn resolved_download_dir_prefers_config() {
        let mut cfg = QueueConfig::default();
        cfg.download_dir = Some(PathBuf::from("/tmp/dl"));
        assert_eq!(cfg.resolved_download_dir().unwrap(), PathBuf::from("/tmp/dl"));
    }
}
