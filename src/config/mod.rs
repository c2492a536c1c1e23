//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Path (or bare name on PATH) of the yt-dlp executable
    pub ytdlp_path: String,

    /// Directory under which per-request workspaces are created
    pub workspace_root: PathBuf,

    /// Recognizable prefix for workspace directory names
    pub workspace_prefix: String,

    /// Upper bound on extractions running at the same time
    pub max_concurrent_extractions: usize,

    /// Byte limit applied to the title in the extractor output template
    pub title_max_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ytdlp_path: "yt-dlp".to_string(),
            workspace_root: env::temp_dir(),
            workspace_prefix: "yt_audio_".to_string(),
            max_concurrent_extractions: 4,
            title_max_bytes: 200,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a key lookup, falling back to defaults for
    /// missing keys. Present but unparsable numbers are errors.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),

            port: var("PORT")
                .unwrap_or_else(|| defaults.port.to_string())
                .parse()
                .context("Invalid PORT")?,

            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            workspace_root: var("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),

            workspace_prefix: var("WORKSPACE_PREFIX")
                .filter(|p| !p.is_empty() && !p.contains(['/', '\\']))
                .unwrap_or(defaults.workspace_prefix),

            max_concurrent_extractions: var("MAX_CONCURRENT_EXTRACTIONS")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("Invalid MAX_CONCURRENT_EXTRACTIONS")?
                .unwrap_or(defaults.max_concurrent_extractions)
                .max(1),

            title_max_bytes: var("TITLE_MAX_BYTES")
                .unwrap_or_else(|| defaults.title_max_bytes.to_string())
                .parse()
                .context("Invalid TITLE_MAX_BYTES")?,
        })
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
