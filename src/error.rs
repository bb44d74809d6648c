use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeMapError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] simd_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Invalid period {input:?}: expected YYYY-MM")]
    Period { input: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No map images found in {dir}")]
    NoImages { dir: String },
}

impl TradeMapError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TradeMapError>;
