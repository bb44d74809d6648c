use crate::error::{Result, TradeMapError};
use crate::geo::{Atlas, LineString};
use crate::map::projection::{relative_lon, unwrap_ring, Viewport};
use crate::map::style::{
    bloc_rgb, bucket_alpha, map_title, CENTRAL_LONGITUDE, FILL_ORDER, LEGEND_ALPHAS, LEGEND_BLOCS,
    LEGEND_TITLE,
};
use crate::period::Period;
use crate::trade::ConfidenceBucket;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, warn};

/// Whether a font for plot text has been registered
static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register the first readable TrueType font for plot text. Only the first call
/// does any work; later calls report its outcome.
pub fn register_fonts(paths: &[PathBuf]) -> bool {
    *FONT_READY.get_or_init(|| {
        for path in paths {
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            // Fonts live for the whole process
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            let normal = plotters::style::register_font("sans-serif", FontStyle::Normal, bytes);
            let bold = plotters::style::register_font("sans-serif", FontStyle::Bold, bytes);
            if normal.is_ok() && bold.is_ok() {
                debug!(path = %path.display(), "registered plot font");
                return true;
            }
            warn!(path = %path.display(), "unusable font file");
        }
        warn!("no usable TrueType font found; maps are drawn without text");
        false
    })
}

fn render_error<E: std::fmt::Display>(e: E) -> TradeMapError {
    TradeMapError::render(e.to_string())
}

/// Frame layout in pixels, scaled from a 2100x1200 reference figure
struct Layout {
    scale: f64,
    title_y: i32,
    map: Viewport,
    legend_top: i32,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        let scale = (height as f64 / 1200.0).min(width as f64 / 2100.0);
        let title_h = (100.0 * scale) as i32;
        let legend_h = (200.0 * scale) as i32;
        let margin = (20.0 * scale) as i32;

        let map_w = (width as i32 - 2 * margin).max(1) as usize;
        let map_h = (height as i32 - title_h - legend_h).max(1) as usize;
        let map = Viewport::fit(CENTRAL_LONGITUDE, margin, title_h, map_w, map_h);

        Self {
            scale,
            title_y: title_h / 2,
            map,
            legend_top: title_h + map_h as i32,
        }
    }

    fn px(&self, reference: f64) -> i32 {
        (reference * self.scale).round() as i32
    }
}

/// Draws one month of the dominant-partner world map
pub struct MapRenderer {
    width: u32,
    height: u32,
    /// Outline layer; country outlines are used when empty
    coastlines: Vec<LineString>,
    text: bool,
}

impl MapRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coastlines: Vec::new(),
            text: false,
        }
    }

    pub fn with_coastlines(mut self, coastlines: Vec<LineString>) -> Self {
        self.coastlines = coastlines;
        self
    }

    /// Enable titles and legend labels; requires a registered font
    pub fn with_text(mut self, enabled: bool) -> Self {
        self.text = enabled;
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render to an image file; the format follows the file extension
    pub fn render_to_file(&self, atlas: &Atlas, period: Period, path: &Path) -> Result<()> {
        let started = Instant::now();
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        self.draw(&root, atlas, period).map_err(render_error)?;
        root.present().map_err(render_error)?;
        debug!(
            %period,
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered map"
        );
        Ok(())
    }

    /// Render to a packed RGB buffer of `width * height * 3` bytes
    pub fn render_to_buffer(&self, atlas: &Atlas, period: Period) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        {
            let root =
                BitMapBackend::with_buffer(&mut buffer, (self.width, self.height)).into_drawing_area();
            self.draw(&root, atlas, period).map_err(render_error)?;
            root.present().map_err(render_error)?;
        }
        Ok(buffer)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        atlas: &Atlas,
        period: Period,
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let layout = Layout::new(self.width, self.height);
        let vp = &layout.map;
        root.fill(&WHITE)?;

        // Fills: one pass per (bloc, bucket) pair
        let rows = atlas.for_period(period);
        for bloc in FILL_ORDER {
            let (r, g, b) = bloc_rgb(bloc);
            for bucket in ConfidenceBucket::ALL {
                let style = RGBColor(r, g, b).mix(bucket_alpha(bucket)).filled();
                for row in rows.iter().filter(|row| row.class() == Some((bloc, bucket))) {
                    for ring in &row.country.polygons {
                        for copy in unwrap_ring(ring, vp.central_lon) {
                            let points: Vec<(i32, i32)> = copy
                                .iter()
                                .map(|&(lon, lat)| vp.project_relative(lon, lat))
                                .collect();
                            if points.len() >= 3 {
                                root.draw(&Polygon::new(points, style))?;
                            }
                        }
                    }
                }
            }
        }

        // Outlines over the fills
        let outline = RGBColor(40, 40, 40).mix(0.8).stroke_width(1);
        if self.coastlines.is_empty() {
            for country in &atlas.countries {
                for ring in &country.polygons {
                    for copy in unwrap_ring(ring, vp.central_lon) {
                        let points: Vec<(i32, i32)> = copy
                            .iter()
                            .map(|&(lon, lat)| vp.project_relative(lon, lat))
                            .collect();
                        root.draw(&PathElement::new(points, outline))?;
                    }
                }
            }
        } else {
            for line in &self.coastlines {
                draw_linestring(root, line, vp, outline)?;
            }
        }
        root.draw(&PathElement::new(vp.outline(), BLACK.stroke_width(1)))?;

        self.draw_legend(root, &layout)?;

        if self.text {
            let (width, _) = root.dim_in_pixel();
            let title = TextStyle::from(FontDesc::new(
                FontFamily::SansSerif,
                layout.px(29.0) as f64,
                FontStyle::Bold,
            ))
            .pos(Pos::new(HPos::Center, VPos::Center));
            root.draw_text(&map_title(period), &title, (width as i32 / 2, layout.title_y))?;
        }

        Ok(())
    }

    /// Legend: each bloc as four touching swatches of rising opacity, then its name
    fn draw_legend<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        layout: &Layout,
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let (width, _) = root.dim_in_pixel();
        let swatch_w = layout.px(168.0);
        let swatch_h = layout.px(28.0);
        let gap = layout.px(12.0);
        let label_w = layout.px(90.0);
        let spacing = layout.px(60.0);

        let entry_w = swatch_w + gap + label_w;
        let total_w = LEGEND_BLOCS.len() as i32 * entry_w + (LEGEND_BLOCS.len() as i32 - 1) * spacing;
        let mut x = (width as i32 - total_w) / 2;
        let title_y = layout.legend_top + layout.px(40.0);
        let y = layout.legend_top + layout.px(80.0);

        let font_size = layout.px(21.0) as f64;
        if self.text {
            let title = TextStyle::from(FontDesc::new(FontFamily::SansSerif, font_size, FontStyle::Bold))
                .pos(Pos::new(HPos::Center, VPos::Center));
            root.draw_text(LEGEND_TITLE, &title, (width as i32 / 2, title_y))?;
        }

        let part_w = swatch_w / LEGEND_ALPHAS.len() as i32;
        for bloc in LEGEND_BLOCS {
            let (r, g, b) = bloc_rgb(bloc);
            for (i, alpha) in LEGEND_ALPHAS.iter().enumerate() {
                let x0 = x + i as i32 * part_w;
                let corners = [(x0, y), (x0 + part_w, y + swatch_h)];
                root.draw(&Rectangle::new(corners, RGBColor(r, g, b).mix(*alpha).filled()))?;
                root.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))?;
            }

            if self.text {
                let label = TextStyle::from(FontDesc::new(FontFamily::SansSerif, font_size, FontStyle::Normal))
                    .pos(Pos::new(HPos::Left, VPos::Center));
                root.draw_text(bloc.label(), &label, (x + swatch_w + gap, y + swatch_h / 2))?;
            }
            x += entry_w + spacing;
        }
        Ok(())
    }
}

/// Draw a line, breaking it where it jumps across the projection seam
fn draw_linestring<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    line: &LineString,
    vp: &Viewport,
    style: ShapeStyle,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let mut segment: Vec<(i32, i32)> = Vec::with_capacity(line.len());
    let mut prev: Option<f64> = None;

    for &(lon, lat) in line {
        let rel = relative_lon(lon, vp.central_lon);
        if prev.is_some_and(|p| (rel - p).abs() > 180.0) {
            let part = std::mem::take(&mut segment);
            if part.len() >= 2 {
                root.draw(&PathElement::new(part, style))?;
            }
        }
        segment.push(vp.project_relative(rel, lat));
        prev = Some(rel);
    }

    if segment.len() >= 2 {
        root.draw(&PathElement::new(segment, style))?;
    }
    Ok(())
}
