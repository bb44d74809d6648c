use crate::config::{Crop, ImageFormat};
use crate::error::{Result, TradeMapError};
use crate::period::{month_labels, Period};
use image::{imageops, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of rendered maps, one file per month named `YYYY-MM.<ext>`.
/// A file being present means that month is already rendered.
#[derive(Debug, Clone)]
pub struct PlotStore {
    dir: PathBuf,
    format: ImageFormat,
}

impl PlotStore {
    pub fn new(dir: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, period: Period) -> PathBuf {
        self.dir.join(format!("{period}.{}", self.format.extension()))
    }

    pub fn exists(&self, period: Period) -> bool {
        self.path_for(period).is_file()
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Months with an image of this store's format, ascending.
    /// A missing directory holds no images.
    pub fn periods(&self) -> Result<Vec<Period>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut periods = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(self.format.extension()) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(period) = stem.parse::<Period>() {
                periods.push(period);
            }
        }
        periods.sort_unstable();
        Ok(periods)
    }

    pub fn latest_period(&self) -> Result<Option<Period>> {
        Ok(self.periods()?.last().copied())
    }

    /// Decode the image for `period` and crop it; `None` when it was never rendered
    pub fn load(&self, period: Period, crop: Crop) -> Result<Option<RgbImage>> {
        let path = self.path_for(period);
        if !path.is_file() {
            debug!(%period, path = %path.display(), "no image for period");
            return Ok(None);
        }
        let image = image::open(&path)?.to_rgb8();
        Ok(Some(crop_image(&image, crop)))
    }
}

/// Remove the given fraction of the image from each edge
pub fn crop_image(image: &RgbImage, crop: Crop) -> RgbImage {
    let (width, height) = image.dimensions();
    let left = (width as f64 * crop.left).round() as u32;
    let right = (width as f64 * crop.right).round() as u32;
    let top = (height as f64 * crop.top).round() as u32;
    let bottom = (height as f64 * crop.bottom).round() as u32;

    let kept_w = width.saturating_sub(left + right).max(1);
    let kept_h = height.saturating_sub(top + bottom).max(1);
    imageops::crop_imm(image, left.min(width.saturating_sub(1)), top.min(height.saturating_sub(1)), kept_w, kept_h)
        .to_image()
}

/// Slider months from `start` to `end`, or to the newest stored image when no
/// end is given
pub fn resolve_labels(start: Period, end: Option<Period>, store: &PlotStore) -> Result<Vec<Period>> {
    let end = match end {
        Some(end) => end,
        None => store.latest_period()?.ok_or_else(|| TradeMapError::NoImages {
            dir: store.dir().display().to_string(),
        })?,
    };

    let labels = month_labels(start, end);
    if labels.is_empty() {
        warn!(%start, %end, "start is after end; slider is empty");
    }
    Ok(labels)
}
