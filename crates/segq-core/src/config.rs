use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Segment allocation settings, read on every allocation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Download one file from several peers at once. When off, a single
    /// segment covers the next gap and further requests are refused.
    pub enable_multi_chunk: bool,
    /// Allow speculative duplicate requests for slow running segments.
    pub overlap_chunks: bool,
    /// Preferred chunk size in bytes at the start of a download; chunks shrink
    /// as the file nears completion.
    pub wanted_chunk_size: u64,
    /// Hard cap on chunk size in bytes (0 = no cap).
    pub max_chunk_size: u64,
    /// Stop opening new segments once the file already downloads faster than
    /// `dont_begin_segment_speed_kib`.
    pub dont_begin_segment: bool,
    /// Threshold for `dont_begin_segment`, in KiB/s.
    pub dont_begin_segment_speed_kib: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            enable_multi_chunk: true,
            overlap_chunks: false,
            wanted_chunk_size: 1024 * 1024,
            max_chunk_size: 0,
            dont_begin_segment: false,
            dont_begin_segment_speed_kib: 512,
        }
    }
}

/// Global configuration loaded from `~/.config/segq/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegqConfig {
    /// Maximum concurrent segments for a newly queued file.
    pub default_max_segments: usize,
    /// Newly queued files derive their priority from completion.
    #[serde(default)]
    pub auto_priority: bool,
    /// Maximum partial sources queried per scheduler pass.
    #[serde(default = "default_pfs_max_candidates")]
    pub pfs_max_candidates: usize,
    #[serde(default)]
    pub allocation: AllocationConfig,
}

fn default_pfs_max_candidates() -> usize {
    10
}

impl Default for SegqConfig {
    fn default() -> Self {
        Self {
            default_max_segments: 3,
            auto_priority: false,
            pfs_max_candidates: default_pfs_max_candidates(),
            allocation: AllocationConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SegqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SegqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<SegqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: SegqConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
