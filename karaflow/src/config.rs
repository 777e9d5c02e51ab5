//! Engine configuration.
//!
//! All intermediate and final artifacts live at fixed, well-known filenames
//! inside [`EngineConfig::work_dir`]; external tool locations are
//! overridable for deployments where they are not on `PATH`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration for the pipeline engine and its HTTP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding every intermediate and final artifact.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// The ffmpeg binary used by the transcode stage.
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    /// The interpreter used to run the separator and renderer tools.
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
    /// Directory containing the separator and renderer tool scripts.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// The yt-dlp binary used by the source provider.
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    /// Address the HTTP adapter binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("tools")
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            ffmpeg_bin: default_ffmpeg_bin(),
            python_bin: default_python_bin(),
            scripts_dir: default_scripts_dir(),
            ytdlp_bin: default_ytdlp_bin(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from `KARAFLOW_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("KARAFLOW_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Ok(bin) = std::env::var("KARAFLOW_FFMPEG") {
            config.ffmpeg_bin = bin;
        }
        if let Ok(bin) = std::env::var("KARAFLOW_PYTHON") {
            config.python_bin = bin;
        }
        if let Ok(dir) = std::env::var("KARAFLOW_TOOLS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }
        if let Ok(bin) = std::env::var("KARAFLOW_YTDLP") {
            config.ytdlp_bin = bin;
        }
        if let Ok(addr) = std::env::var("KARAFLOW_BIND") {
            if let Ok(parsed) = addr.parse() {
                config.bind_addr = parsed;
            }
        }
        config
    }

    /// Sets the work directory.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Sets the tools directory.
    #[must_use]
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Resolves a well-known artifact filename inside the work directory.
    #[must_use]
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Resolves a tool script inside the scripts directory.
    #[must_use]
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }
}

/// Convenience accessor used in argument lists, which want owned strings.
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.bind_addr.port(), 8000);
    }

    #[test]
    fn test_artifact_path_joins_work_dir() {
        let config = EngineConfig::new().with_work_dir("/data/jobs");
        assert_eq!(
            config.artifact_path("no_vocals.wav"),
            PathBuf::from("/data/jobs/no_vocals.wav")
        );
    }

    #[test]
    fn test_builder_chain() {
        let config = EngineConfig::new()
            .with_work_dir("/w")
            .with_scripts_dir("/t")
            .with_bind_addr(SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.script_path("separate_audio.py"), PathBuf::from("/t/separate_audio.py"));
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.ytdlp_bin, "yt-dlp");
    }
}
