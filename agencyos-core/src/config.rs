use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::paths::SegmentPolicy;

/// Everything the core needs at runtime. Every field has a default so a
/// config file only has to name what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl PlannerConfig {
    pub fn trace_loaded(&self) {
        info!(
            root = %self.storage.root,
            segment_policy = ?self.storage.segment_policy,
            media_root = %self.media.media_root.display(),
            "Loaded PlannerConfig"
        );
        debug!(?self, "PlannerConfig loaded (full debug)");
    }
}

/// Layout of the managed tree in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub segment_policy: SegmentPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            segment_policy: SegmentPolicy::default(),
        }
    }
}

fn default_root() -> String {
    "/AgencyOS".to_string()
}

/// Where local media references (`/media/...`) resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            media_root: default_media_root(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}

/// Fixed numeric policy of the image normalizer and the grid report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_grid_bound")]
    pub grid_bound: u32,
    #[serde(default = "default_logo_bound")]
    pub logo_bound: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl ReportConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            grid_bound: default_grid_bound(),
            logo_bound: default_logo_bound(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_grid_bound() -> u32 {
    550
}

fn default_logo_bound() -> u32 {
    800
}

fn default_jpeg_quality() -> u8 {
    70
}
