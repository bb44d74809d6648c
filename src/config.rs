use crate::error::{Result, TradeMapError};
use crate::period::Period;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the optional config file
pub const DEFAULT_CONFIG_FILE: &str = "trade-map.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub geo: GeoConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub dataset: String,
    pub frequency: String,
    pub indicator: String,
    pub counterparts: Vec<String>,
    pub start_year: i32,
    pub code_list: String,
    pub timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://dataservices.imf.org/REST/SDMX_XML.svc".to_string(),
            dataset: "DOT".to_string(),
            frequency: "M".to_string(),
            indicator: "TMG_CIF_USD".to_string(),
            counterparts: vec!["US".to_string(), "CN".to_string(), "B0".to_string()],
            start_year: 2000,
            code_list: "CL_AREA_DOT".to_string(),
            timeout_seconds: 120,
            cache_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// GeoJSON with one feature per country
    pub countries_path: PathBuf,
    /// Optional GeoJSON of coastline lines drawn under the fills
    pub coastline_path: Option<PathBuf>,
    pub iso_key: String,
    pub name_key: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            countries_path: PathBuf::from("data/world-administrative-boundaries.geojson"),
            coastline_path: None,
            iso_key: "iso_3166_1_alpha_2_codes".to_string(),
            name_key: "name".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Figure size in inches
    pub figure_width: f64,
    pub figure_height: f64,
    pub dpi: u32,
    pub format: ImageFormat,
    /// TrueType fonts tried in order; the first readable one is used for text
    pub font_paths: Vec<PathBuf>,
}

impl RenderConfig {
    /// Output size in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.figure_width * self.dpi as f64).round() as u32,
            (self.figure_height * self.dpi as f64).round() as u32,
        )
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            figure_width: 14.0,
            figure_height: 8.0,
            dpi: 150,
            format: ImageFormat::Png,
            font_paths: [
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/Library/Fonts/Arial.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                "C:\\Windows\\Fonts\\arial.ttf",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub plots_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plots_dir: PathBuf::from("plots"),
        }
    }
}

/// Fraction of the image removed from each edge before display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crop {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Crop {
    pub fn none() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
        }
    }
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            left: 0.15,
            right: 0.15,
            top: 0.05,
            bottom: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub start: String,
    /// Last month on the slider; the newest image in the plots directory when unset
    pub end: Option<String>,
    pub play_interval_ms: u64,
    /// Wrap to the first month at the end of playback instead of stopping
    pub loop_playback: bool,
    /// Render missing images on demand (fetches trade data at startup)
    pub lazy_generate: bool,
    pub crop: Crop,
    pub show_info: bool,
    pub image_cache_ttl_seconds: u64,
    pub log_file: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            start: "2000-01".to_string(),
            end: None,
            play_interval_ms: 500,
            loop_playback: true,
            lazy_generate: false,
            crop: Crop::default(),
            show_info: true,
            image_cache_ttl_seconds: 600,
            log_file: PathBuf::from("trade-map.log"),
        }
    }
}

impl ViewerConfig {
    pub fn start_period(&self) -> Result<Period> {
        self.start.parse()
    }

    pub fn end_period(&self) -> Result<Option<Period>> {
        self.end.as_deref().map(str::parse).transpose()
    }
}

impl Config {
    /// Load from a TOML file; missing sections and fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path must exist; otherwise the default file is used when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let err = |message: String| Err(TradeMapError::Config { message });

        if self.render.dpi == 0 || self.render.figure_width <= 0.0 || self.render.figure_height <= 0.0 {
            return err("render size must be positive".to_string());
        }
        let crop = self.viewer.crop;
        for fraction in [crop.left, crop.right, crop.top, crop.bottom] {
            if !(0.0..0.5).contains(&fraction) {
                return err(format!("crop fractions must be in [0, 0.5), got {fraction}"));
            }
        }
        if self.viewer.play_interval_ms == 0 {
            return err("play_interval_ms must be positive".to_string());
        }
        self.viewer.start_period()?;
        self.viewer.end_period()?;
        Ok(())
    }
}
