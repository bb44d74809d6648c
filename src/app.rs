use crate::cache::TtlCache;
use crate::config::{Config, Crop};
use crate::error::{Result, TradeMapError};
use crate::fetch::TradeSource;
use crate::generate::{build_atlas, build_renderer, Generator};
use crate::geo::{bloc_counts, Atlas, BlocCounts};
use crate::period::{month_labels, Period};
use crate::plots::{resolve_labels, PlotStore};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Slider position and playback state
#[derive(Debug, Clone)]
pub struct Session {
    labels: Vec<Period>,
    index: usize,
    playing: bool,
    last_tick: Instant,
    interval: Duration,
    /// Wrap to the first month after the last one instead of stopping
    loop_playback: bool,
}

impl Session {
    pub fn new(labels: Vec<Period>, interval: Duration, loop_playback: bool) -> Self {
        Self {
            labels,
            index: 0,
            playing: false,
            last_tick: Instant::now(),
            interval,
            loop_playback,
        }
    }

    pub fn labels(&self) -> &[Period] {
        &self.labels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<Period> {
        self.labels.get(self.index).copied()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Move by `delta` months, clamped to the slider ends
    pub fn step(&mut self, delta: isize) {
        let last = self.labels.len().saturating_sub(1);
        self.index = self.index.saturating_add_signed(delta).min(last);
    }

    pub fn first(&mut self) {
        self.index = 0;
    }

    pub fn last(&mut self) {
        self.index = self.labels.len().saturating_sub(1);
    }

    /// Start or stop playback. Starting at the end without looping rewinds first.
    pub fn toggle_play(&mut self, now: Instant) {
        self.playing = !self.playing;
        if self.playing {
            if !self.loop_playback && self.index + 1 >= self.labels.len() {
                self.index = 0;
            }
            self.last_tick = now;
        }
    }

    /// Advance playback if an interval has passed; true when the index moved
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.playing || now.duration_since(self.last_tick) < self.interval {
            return false;
        }
        self.last_tick = now;

        if self.index + 1 < self.labels.len() {
            self.index += 1;
            true
        } else if self.loop_playback && self.labels.len() > 1 {
            self.index = 0;
            true
        } else {
            self.playing = false;
            false
        }
    }

    /// Replace the labels, staying on the same month when it is still present
    pub fn set_labels(&mut self, labels: Vec<Period>) {
        let current = self.current();
        self.labels = labels;
        self.index = current
            .and_then(|p| self.labels.iter().position(|&l| l == p))
            .unwrap_or(0);
    }
}

/// What the image pane shows
#[derive(Debug, Clone)]
pub enum View {
    Image(Period, Arc<RgbImage>),
    Missing(Period),
    Empty,
}

/// Viewer state: the session plus image lookup, caches and on-demand generation
pub struct App {
    pub session: Session,
    pub view: View,
    pub show_info: bool,
    /// One-line message for the status bar
    pub status: Option<String>,
    pub should_quit: bool,
    config: Config,
    store: PlotStore,
    crop: Crop,
    images: TtlCache<Period, Arc<RgbImage>>,
    /// Last image scaled for the terminal, keyed by month and target size
    scaled: Option<((Period, u32, u32), RgbImage)>,
    /// Countries per leading bloc for one month
    counts: Option<(Period, BlocCounts)>,
    source: Option<Box<dyn TradeSource>>,
    generator: Option<Generator>,
    generator_failed: bool,
}

impl App {
    /// Build the viewer; `source` enables generation of missing images
    pub fn new(config: Config, source: Option<Box<dyn TradeSource>>) -> Result<Self> {
        let viewer = &config.viewer;
        let store = PlotStore::new(&config.output.plots_dir, config.render.format);
        let session = Session::new(
            Vec::new(),
            Duration::from_millis(viewer.play_interval_ms),
            viewer.loop_playback,
        );

        let mut app = Self {
            session,
            view: View::Empty,
            show_info: viewer.show_info,
            status: None,
            should_quit: false,
            crop: viewer.crop,
            images: TtlCache::new(Duration::from_secs(viewer.image_cache_ttl_seconds)),
            scaled: None,
            counts: None,
            store,
            source,
            generator: None,
            generator_failed: false,
            config,
        };

        if app.config.viewer.lazy_generate {
            // A failed fetch leaves the viewer usable on existing images
            if let Err(e) = app.ensure_generator() {
                app.status = Some(format!("on-demand generation unavailable: {e}"));
            }
        }

        let labels = app.load_labels()?;
        info!(months = labels.len(), "viewer ready");
        app.session.set_labels(labels);
        app.select();
        Ok(app)
    }

    pub fn store(&self) -> &PlotStore {
        &self.store
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Trade data behind on-demand generation, once loaded
    pub fn atlas(&self) -> Option<&Atlas> {
        self.generator.as_ref().map(Generator::atlas)
    }

    pub fn loop_playback(&self) -> bool {
        self.config.viewer.loop_playback
    }

    fn load_labels(&mut self) -> Result<Vec<Period>> {
        let start = self.config.viewer.start_period()?;
        let end = self.config.viewer.end_period()?;
        match resolve_labels(start, end, &self.store) {
            Err(TradeMapError::NoImages { dir }) if self.generator.is_some() => {
                // Nothing rendered yet: run the slider up to the newest month with data
                let latest = self
                    .generator
                    .as_ref()
                    .and_then(|g| g.atlas().periods().last().copied());
                match latest {
                    Some(end) => Ok(month_labels(start, end)),
                    None => Err(TradeMapError::NoImages { dir }),
                }
            }
            other => other,
        }
    }

    fn ensure_generator(&mut self) -> Result<&Generator> {
        if self.generator.is_none() {
            let Some(source) = self.source.as_mut() else {
                return Err(TradeMapError::Config {
                    message: "no trade data source".to_string(),
                });
            };
            let built = build_atlas(&mut **source, &self.config).and_then(|atlas| {
                let renderer = build_renderer(&self.config)?;
                Ok(Generator::new(atlas, renderer, self.store.clone()))
            });
            match built {
                Ok(generator) => {
                    self.generator_failed = false;
                    self.counts = None;
                    self.generator = Some(generator);
                }
                Err(e) => {
                    self.generator_failed = true;
                    return Err(e);
                }
            }
        }
        self.generator.as_ref().ok_or_else(|| TradeMapError::Config {
            message: "no trade data source".to_string(),
        })
    }

    /// Cached image for `period`, rendering it first when missing and on-demand
    /// generation is on
    fn image_for(&mut self, period: Period) -> Result<Option<Arc<RgbImage>>> {
        if let Some(image) = self.images.get(&period) {
            return Ok(Some(Arc::clone(image)));
        }

        if !self.store.exists(period) && self.config.viewer.lazy_generate && !self.generator_failed {
            self.ensure_generator()?.render(period)?;
        }

        let Some(image) = self.store.load(period, self.crop)? else {
            return Ok(None);
        };
        let image = Arc::new(image);
        self.images.insert(period, Arc::clone(&image));
        Ok(Some(image))
    }

    /// Look up the image for the selected month
    pub fn select(&mut self) {
        let Some(period) = self.session.current() else {
            self.view = View::Empty;
            return;
        };

        self.view = match self.image_for(period) {
            Ok(Some(image)) => View::Image(period, image),
            Ok(None) => {
                warn!(%period, "image not found");
                View::Missing(period)
            }
            Err(e) => {
                warn!(%period, error = %e, "image lookup failed");
                self.status = Some(format!("{period}: {e}"));
                View::Missing(period)
            }
        };
    }

    pub fn step(&mut self, delta: isize) {
        self.session.step(delta);
        self.select();
    }

    pub fn first(&mut self) {
        self.session.first();
        self.select();
    }

    pub fn last(&mut self) {
        self.session.last();
        self.select();
    }

    pub fn toggle_play(&mut self) {
        self.session.toggle_play(Instant::now());
        self.select();
    }

    /// Playback timer; call once per loop iteration
    pub fn tick(&mut self, now: Instant) {
        if self.session.tick(now) {
            self.select();
        }
    }

    pub fn toggle_info(&mut self) {
        self.show_info = !self.show_info;
    }

    /// Render the selected month, replacing its image
    pub fn generate_current(&mut self) {
        let Some(period) = self.session.current() else {
            return;
        };
        let outcome = self.ensure_generator().and_then(|g| g.render(period));
        match outcome {
            Ok(path) => {
                self.images.remove(&period);
                self.status = Some(format!("generated {}", path.display()));
            }
            Err(e) => {
                warn!(%period, error = %e, "generation failed");
                self.status = Some(format!("generation failed: {e}"));
            }
        }
        self.select();
    }

    /// Drop every cache and rebuild the labels
    pub fn refresh(&mut self) {
        info!("refreshing");
        self.images.clear();
        self.scaled = None;
        self.counts = None;
        if let Some(source) = self.source.as_mut() {
            source.clear_cache();
        }
        self.generator = None;
        self.generator_failed = false;
        self.status = None;

        if self.config.viewer.lazy_generate {
            if let Err(e) = self.ensure_generator() {
                self.status = Some(format!("on-demand generation unavailable: {e}"));
            }
        }
        match self.load_labels() {
            Ok(labels) => self.session.set_labels(labels),
            Err(e) => self.status = Some(e.to_string()),
        }
        self.select();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Leading-bloc counts for the selected month, once trade data is loaded
    pub fn bloc_counts(&mut self) -> Option<BlocCounts> {
        let period = self.session.current()?;
        if let Some((cached, counts)) = self.counts {
            if cached == period {
                return Some(counts);
            }
        }
        let counts = bloc_counts(&self.atlas()?.for_period(period));
        self.counts = Some((period, counts));
        Some(counts)
    }

    /// Current image scaled to fit `max_width` x `max_height`, keeping its aspect
    pub fn fitted_image(&mut self, max_width: u32, max_height: u32) -> Option<&RgbImage> {
        let View::Image(period, image) = &self.view else {
            return None;
        };
        if max_width == 0 || max_height == 0 {
            return None;
        }

        let key = (*period, max_width, max_height);
        if self.scaled.as_ref().map(|(k, _)| *k) != Some(key) {
            let (width, height) = fit_within(image.dimensions(), (max_width, max_height));
            let resized = imageops::resize(&**image, width, height, FilterType::Triangle);
            self.scaled = Some((key, resized));
        }
        self.scaled.as_ref().map(|(_, image)| image)
    }
}

/// Largest size with the aspect of `size` that fits in `bounds`
fn fit_within((width, height): (u32, u32), (max_w, max_h): (u32, u32)) -> (u32, u32) {
    let scale = (max_w as f64 / width.max(1) as f64).min(max_h as f64 / height.max(1) as f64);
    (
        ((width as f64 * scale).round() as u32).clamp(1, max_w),
        ((height as f64 * scale).round() as u32).clamp(1, max_h),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageFormat;
    use crate::data::tests::{write_temp, COUNTRIES};
    use crate::fetch::TradeQuery;
    use crate::trade::TradeRecord;
    use std::collections::HashMap;
    use std::path::Path;

    fn period(label: &str) -> Period {
        label.parse().unwrap()
    }

    fn session(months: usize, loop_playback: bool) -> Session {
        let labels = month_labels(period("2000-01"), period("2000-12"))
            .into_iter()
            .take(months)
            .collect();
        Session::new(labels, Duration::from_millis(100), loop_playback)
    }

    #[test]
    fn test_step_clamps_at_ends() {
        let mut s = session(3, true);
        s.step(-1);
        assert_eq!(s.index(), 0);
        s.step(5);
        assert_eq!(s.index(), 2);
        s.first();
        assert_eq!(s.current(), Some(period("2000-01")));
        s.last();
        assert_eq!(s.current(), Some(period("2000-03")));
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let mut s = session(3, true);
        let start = Instant::now();
        s.toggle_play(start);
        assert!(!s.tick(start + Duration::from_millis(50)));
        assert!(s.tick(start + Duration::from_millis(100)));
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn test_playback_wraps_when_looping() {
        let mut s = session(2, true);
        let start = Instant::now();
        s.toggle_play(start);
        assert!(s.tick(start + Duration::from_millis(100)));
        assert!(s.tick(start + Duration::from_millis(200)));
        assert_eq!(s.index(), 0);
        assert!(s.is_playing());
    }

    #[test]
    fn test_playback_stops_at_end_without_loop() {
        let mut s = session(2, false);
        let start = Instant::now();
        s.toggle_play(start);
        assert!(s.tick(start + Duration::from_millis(100)));
        assert!(!s.tick(start + Duration::from_millis(200)));
        assert_eq!(s.index(), 1);
        assert!(!s.is_playing());

        // Playing again from the end starts over
        s.toggle_play(start);
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn test_paused_session_does_not_advance() {
        let mut s = session(3, true);
        assert!(!s.tick(Instant::now() + Duration::from_secs(10)));
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn test_set_labels_keeps_current_month() {
        let mut s = session(6, true);
        s.step(3);
        s.set_labels(month_labels(period("2000-03"), period("2000-08")));
        assert_eq!(s.current(), Some(period("2000-04")));

        s.set_labels(month_labels(period("2001-01"), period("2001-02")));
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        assert_eq!(fit_within((200, 100), (100, 100)), (100, 50));
        assert_eq!(fit_within((100, 200), (100, 100)), (50, 100));
    }

    fn save_image(dir: &Path, label: &str) {
        RgbImage::new(40, 20).save(dir.join(format!("{label}.png"))).unwrap();
    }

    fn viewer_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.plots_dir = dir.to_path_buf();
        config.render.format = ImageFormat::Png;
        config.viewer.crop = Crop::none();
        config.viewer.start = "2000-01".to_string();
        config
    }

    #[test]
    fn test_app_shows_images_and_missing_months() {
        let dir = tempfile::tempdir().unwrap();
        save_image(dir.path(), "2000-01");
        save_image(dir.path(), "2000-03");

        let mut app = App::new(viewer_config(dir.path()), None).unwrap();
        assert_eq!(app.session.labels().len(), 3);
        assert!(matches!(app.view, View::Image(p, _) if p == period("2000-01")));

        app.step(1);
        assert!(matches!(app.view, View::Missing(p) if p == period("2000-02")));

        app.last();
        assert!(matches!(app.view, View::Image(p, _) if p == period("2000-03")));
        assert_eq!(app.fitted_image(20, 20).map(|i| i.dimensions()), Some((20, 10)));
    }

    #[test]
    fn test_app_without_images_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(App::new(viewer_config(dir.path()), None).is_err());
    }

    #[test]
    fn test_refresh_picks_up_new_images() {
        let dir = tempfile::tempdir().unwrap();
        save_image(dir.path(), "2000-02");
        let mut app = App::new(viewer_config(dir.path()), None).unwrap();
        assert_eq!(app.session.labels().len(), 2);

        save_image(dir.path(), "2000-05");
        app.refresh();
        assert_eq!(app.session.labels().len(), 5);
    }

    #[test]
    fn test_generate_without_source_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        save_image(dir.path(), "2000-01");
        let mut app = App::new(viewer_config(dir.path()), None).unwrap();
        app.generate_current();
        assert!(app.status.as_deref().unwrap_or("").starts_with("generation failed"));
    }

    struct FixedSource;

    impl TradeSource for FixedSource {
        fn trade_records(&mut self, _query: &TradeQuery) -> Result<Vec<TradeRecord>> {
            Ok(vec![TradeRecord {
                importer: "FR".to_string(),
                period: "2000-02".parse().unwrap(),
                eu: Some(5.0),
                china: Some(1.0),
                us: Some(1.0),
            }])
        }

        fn area_codes(&mut self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn test_lazy_generation_renders_missing_months() {
        let dir = tempfile::tempdir().unwrap();
        let geo = write_temp(COUNTRIES);
        let mut config = viewer_config(dir.path());
        config.geo.countries_path = geo.path().to_path_buf();
        config.render.figure_width = 3.0;
        config.render.figure_height = 2.0;
        config.render.dpi = 100;
        config.render.font_paths = Vec::new();
        config.viewer.lazy_generate = true;

        let app = App::new(config, Some(Box::new(FixedSource))).unwrap();
        assert!(app.has_generator());
        // The slider runs to the newest month with data
        assert_eq!(app.session.labels().len(), 2);
        assert!(matches!(app.view, View::Image(p, _) if p == period("2000-01")));
        assert!(app.store().exists(period("2000-01")));
    }

    #[test]
    fn test_bloc_counts_follow_selected_month() {
        let dir = tempfile::tempdir().unwrap();
        let geo = write_temp(COUNTRIES);
        let mut config = viewer_config(dir.path());
        config.geo.countries_path = geo.path().to_path_buf();
        config.render.figure_width = 3.0;
        config.render.figure_height = 2.0;
        config.render.dpi = 100;
        config.render.font_paths = Vec::new();
        config.viewer.lazy_generate = true;

        let mut app = App::new(config, Some(Box::new(FixedSource))).unwrap();
        let january = app.bloc_counts().unwrap();
        assert!(january.iter().all(|(_, count)| *count == 0));
        assert_eq!(app.counts.map(|(p, _)| p), Some(period("2000-01")));

        app.step(1);
        let february = app.bloc_counts().unwrap();
        assert_eq!(february[0], (Some(crate::trade::Bloc::Eu), 1));
        assert_eq!(app.counts.map(|(p, _)| p), Some(period("2000-02")));

        app.refresh();
        assert!(app.counts.is_none());
    }

    #[test]
    fn test_bloc_counts_need_trade_data() {
        let dir = tempfile::tempdir().unwrap();
        save_image(dir.path(), "2000-01");
        let mut app = App::new(viewer_config(dir.path()), None).unwrap();
        assert!(app.bloc_counts().is_none());
    }
}
