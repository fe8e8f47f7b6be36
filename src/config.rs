//! Settings for the command-line tool, from a JSON file and flags.

use crate::builder::PageGeometry;
use crate::error::ConfigError;
use crate::pipeline::{ConvertOptions, PublishState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost/media";
pub const DEFAULT_MEDIA_DIR: &str = "media";

/// Every field is optional; unset values fall back to the defaults above and
/// those of [`PageGeometry`] and [`PublishState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub media_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub status: Option<PublishState>,
    pub page_width: Option<f64>,
    pub page_height: Option<f64>,
    pub publisher: Option<String>,
    pub work_root: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Values set in `other` win.
    pub fn overlay(self, other: Config) -> Config {
        Config {
            media_dir: other.media_dir.or(self.media_dir),
            base_url: other.base_url.or(self.base_url),
            status: other.status.or(self.status),
            page_width: other.page_width.or(self.page_width),
            page_height: other.page_height.or(self.page_height),
            publisher: other.publisher.or(self.publisher),
            work_root: other.work_root.or(self.work_root),
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn geometry(&self) -> PageGeometry {
        let default = PageGeometry::default();
        PageGeometry {
            width: self.page_width.filter(|w| *w > 0.0).unwrap_or(default.width),
            height: self.page_height.filter(|h| *h > 0.0).unwrap_or(default.height),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            publish_state: self.status.unwrap_or_default(),
            geometry: self.geometry(),
            work_root: self.work_root.clone(),
            publisher_name: self.publisher.clone().unwrap_or_default(),
        }
    }
}
