use crate::config::Config;
use crate::data::{load_coastlines, load_countries};
use crate::error::Result;
use crate::fetch::{TradeQuery, TradeSource};
use crate::geo::Atlas;
use crate::map::{register_fonts, MapRenderer};
use crate::period::Period;
use crate::plots::PlotStore;
use crate::trade::aggregate_all;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Fetch, aggregate and join everything needed to draw any month
pub fn build_atlas(source: &mut dyn TradeSource, config: &Config) -> Result<Atlas> {
    let query = TradeQuery::from_config(&config.source);
    let records = aggregate_all(&source.trade_records(&query)?);
    let codes = source.area_codes()?;
    let countries = load_countries(
        &config.geo.countries_path,
        &config.geo.iso_key,
        &config.geo.name_key,
    )?;
    Ok(Atlas::new(countries, records, codes))
}

/// Renderer sized and styled from the render and geo settings
pub fn build_renderer(config: &Config) -> Result<MapRenderer> {
    let (width, height) = config.render.pixel_size();
    let coastlines = match &config.geo.coastline_path {
        Some(path) => load_coastlines(path)?,
        None => Vec::new(),
    };
    let text = register_fonts(&config.render.font_paths);
    Ok(MapRenderer::new(width, height)
        .with_coastlines(coastlines)
        .with_text(text))
}

/// Outcome of a batch run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Renders months of an atlas into a plot store
pub struct Generator {
    atlas: Atlas,
    renderer: MapRenderer,
    store: PlotStore,
}

impl Generator {
    pub fn new(atlas: Atlas, renderer: MapRenderer, store: PlotStore) -> Self {
        Self {
            atlas,
            renderer,
            store,
        }
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn store(&self) -> &PlotStore {
        &self.store
    }

    /// Render one month, replacing any existing image
    pub fn render(&self, period: Period) -> Result<PathBuf> {
        self.store.ensure_dir()?;
        let path = self.store.path_for(period);
        info!(%period, path = %path.display(), "generating map");
        self.renderer.render_to_file(&self.atlas, period, &path)?;
        Ok(path)
    }

    /// Render one month unless its image already exists; true when rendered
    pub fn render_missing(&self, period: Period) -> Result<bool> {
        if self.store.exists(period) {
            info!(%period, "map already exists, skipping");
            return Ok(false);
        }
        self.render(period)?;
        Ok(true)
    }

    /// Render every month present in the trade data, in parallel.
    /// Existing images are kept unless `force` is set; a failed month is
    /// logged and counted without stopping the others.
    pub fn render_all(&self, force: bool) -> Result<GenerateSummary> {
        self.store.ensure_dir()?;
        let periods = self.atlas.periods();
        let started = Instant::now();
        info!(periods = periods.len(), dir = %self.store.dir().display(), force, "batch generation");

        let outcomes: Vec<Result<bool>> = periods
            .par_iter()
            .map(|&period| {
                if force {
                    self.render(period).map(|_| true)
                } else {
                    self.render_missing(period)
                }
                .inspect_err(|e| error!(%period, error = %e, "map generation failed"))
            })
            .collect();

        let mut summary = GenerateSummary::default();
        for outcome in outcomes {
            match outcome {
                Ok(true) => summary.rendered += 1,
                Ok(false) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        info!(
            rendered = summary.rendered,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch generation done"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Crop, ImageFormat};
    use crate::data::tests::{write_temp, COUNTRIES};
    use crate::trade::{Bloc, TradeRecord};
    use std::collections::HashMap;

    /// In-memory source counting its calls
    struct FixedSource {
        records: Vec<TradeRecord>,
        calls: usize,
    }

    impl TradeSource for FixedSource {
        fn trade_records(&mut self, _query: &TradeQuery) -> Result<Vec<TradeRecord>> {
            self.calls += 1;
            Ok(self.records.clone())
        }

        fn area_codes(&mut self) -> Result<HashMap<String, String>> {
            Ok(HashMap::from([("B0".to_string(), "European Union".to_string())]))
        }
    }

    fn record(importer: &str, period: &str, eu: f64, china: f64, us: f64) -> TradeRecord {
        TradeRecord {
            importer: importer.to_string(),
            period: period.parse().unwrap(),
            eu: Some(eu),
            china: Some(china),
            us: Some(us),
        }
    }

    fn atlas() -> (Atlas, tempfile::NamedTempFile) {
        let geo = write_temp(COUNTRIES);
        let mut config = Config::default();
        config.geo.countries_path = geo.path().to_path_buf();

        let mut source = FixedSource {
            records: vec![
                record("FR", "2000-01", 10.0, 5.0, 0.0),
                record("US", "2000-01", 3.0, 9.0, 0.0),
                record("FR", "2000-02", 1.0, 1.0, 8.0),
            ],
            calls: 0,
        };
        let atlas = build_atlas(&mut source, &config).unwrap();
        assert_eq!(source.calls, 1);
        (atlas, geo)
    }

    #[test]
    fn test_build_atlas_joins_fetched_data() {
        let (atlas, _geo) = atlas();
        assert_eq!(atlas.countries.len(), 2);
        assert_eq!(atlas.records.len(), 3);

        let january = atlas.for_period("2000-01".parse().unwrap());
        assert_eq!(january.len(), 2);
        assert_eq!(january[0].country.iso_a2, "FR");
        assert_eq!(january[0].class().map(|(bloc, _)| bloc), Some(Bloc::Eu));
        assert_eq!(january[0].partner_name, Some("European Union"));
    }

    #[test]
    fn test_render_all_skips_existing_unless_forced() {
        let (atlas, _geo) = atlas();
        let dir = tempfile::tempdir().unwrap();
        let store = PlotStore::new(dir.path().join("plots"), ImageFormat::Png);
        let generator = Generator::new(atlas, MapRenderer::new(420, 240), store);

        let first = generator.render_all(false).unwrap();
        assert_eq!(first, GenerateSummary { rendered: 2, skipped: 0, failed: 0 });

        let second = generator.render_all(false).unwrap();
        assert_eq!(second, GenerateSummary { rendered: 0, skipped: 2, failed: 0 });

        let forced = generator.render_all(true).unwrap();
        assert_eq!(forced.rendered, 2);
    }

    #[test]
    fn test_rendered_image_loads_at_fixed_size() {
        let (atlas, _geo) = atlas();
        let dir = tempfile::tempdir().unwrap();
        let store = PlotStore::new(dir.path(), ImageFormat::Png);
        let generator = Generator::new(atlas, MapRenderer::new(700, 400), store.clone());

        let period: Period = "2000-02".parse().unwrap();
        let path = generator.render(period).unwrap();
        assert_eq!(path, store.path_for(period));

        let image = store.load(period, Crop::none()).unwrap().unwrap();
        assert_eq!(image.dimensions(), (700, 400));
    }

    #[test]
    fn test_jpeg_output() {
        let (atlas, _geo) = atlas();
        let dir = tempfile::tempdir().unwrap();
        let store = PlotStore::new(dir.path(), ImageFormat::Jpg);
        let generator = Generator::new(atlas, MapRenderer::new(350, 200), store.clone());

        let period: Period = "2000-01".parse().unwrap();
        assert!(generator.render_missing(period).unwrap());
        assert!(!generator.render_missing(period).unwrap());
        assert_eq!(image::open(store.path_for(period)).unwrap().width(), 350);
    }
}
