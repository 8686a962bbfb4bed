use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_QUALITY: u8 = 75;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    jpeg,
    webp,
}

impl ImageFormat {
    /// File extension used for cache entries.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::jpeg => "jpeg",
            ImageFormat::webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::jpeg => "image/jpeg",
            ImageFormat::webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct OptimgConfig {
    pub cache_dir: PathBuf,
    pub max_input_size: usize, // bytes
    pub fetch_timeout: Duration,
    pub default_max_width: u32,
    pub default_quality: u8,
    pub default_format: ImageFormat,
}

impl Default for OptimgConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            max_input_size: 8 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            default_max_width: DEFAULT_MAX_WIDTH,
            default_quality: DEFAULT_QUALITY,
            default_format: ImageFormat::webp,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Max input size must be > 0")] InvalidMaxInput,
    #[error("Default max width must be >= 1")] InvalidMaxWidth,
    #[error("Default quality must be in 1..=100")] InvalidQuality,
    #[error("Fetch timeout must be > 0")] InvalidTimeout,
}

impl OptimgConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_input_size == 0 { return Err(ConfigError::InvalidMaxInput); }
        if self.default_max_width == 0 { return Err(ConfigError::InvalidMaxWidth); }
        if self.default_quality == 0 || self.default_quality > 100 { return Err(ConfigError::InvalidQuality); }
        if self.fetch_timeout.is_zero() { return Err(ConfigError::InvalidTimeout); }
        Ok(())
    }
}
