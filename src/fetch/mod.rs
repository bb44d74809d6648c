mod codelist;
mod sdmx;

pub use codelist::parse_codes;
pub use sdmx::parse_observations;

use crate::cache::TtlCache;
use crate::config::SourceConfig;
use crate::error::Result;
use crate::trade::{pivot, TradeRecord};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Arguments of one trade-data request; also the cache key for its result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeQuery {
    pub dataset: String,
    pub frequency: String,
    pub indicator: String,
    pub counterparts: Vec<String>,
    pub start_year: i32,
}

impl TradeQuery {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            dataset: config.dataset.clone(),
            frequency: config.frequency.clone(),
            indicator: config.indicator.clone(),
            counterparts: config.counterparts.clone(),
            start_year: config.start_year,
        }
    }

    /// Path and query relative to the service base URL
    pub fn path(&self) -> String {
        format!(
            "CompactData/{}/{}..{}.{}?startPeriod={}&format=sdmx-2.1",
            self.dataset,
            self.frequency,
            self.indicator,
            self.counterparts.join("+"),
            self.start_year
        )
    }
}

impl Default for TradeQuery {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

/// Where trade records and area names come from
pub trait TradeSource {
    fn trade_records(&mut self, query: &TradeQuery) -> Result<Vec<TradeRecord>>;

    /// Area code to descriptive name
    fn area_codes(&mut self) -> Result<HashMap<String, String>>;

    /// Forget memoised results
    fn clear_cache(&mut self) {}
}

/// Blocking client for the IMF SDMX service with per-query memoisation
pub struct ImfClient {
    http: Client,
    base_url: String,
    code_list: String,
    trade_cache: TtlCache<TradeQuery, Vec<TradeRecord>>,
    code_cache: TtlCache<String, HashMap<String, String>>,
}

impl ImfClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("trade-map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let ttl = Duration::from_secs(config.cache_ttl_seconds);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            code_list: config.code_list.clone(),
            trade_cache: TtlCache::new(ttl),
            code_cache: TtlCache::new(ttl),
        })
    }
}

fn get_text(http: &Client, url: &str) -> Result<String> {
    let started = Instant::now();
    let body = http.get(url).send()?.error_for_status()?.text()?;
    debug!(
        url,
        bytes = body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fetched"
    );
    Ok(body)
}

fn fetch_trade_records(http: &Client, url: &str) -> Result<Vec<TradeRecord>> {
    info!(url, "fetching trade data");
    let observations = parse_observations(&get_text(http, url)?)?;
    let records = pivot(&observations);
    info!(
        observations = observations.len(),
        records = records.len(),
        "trade data ready"
    );
    Ok(records)
}

fn fetch_area_codes(http: &Client, url: &str) -> Result<HashMap<String, String>> {
    info!(url, "fetching area codes");
    let codes = parse_codes(&get_text(http, url)?)?;
    info!(codes = codes.len(), "area codes ready");
    Ok(codes)
}

impl TradeSource for ImfClient {
    fn trade_records(&mut self, query: &TradeQuery) -> Result<Vec<TradeRecord>> {
        let url = format!("{}/{}", self.base_url, query.path());
        let http = &self.http;
        let records = self
            .trade_cache
            .get_or_try_insert_with(query.clone(), || fetch_trade_records(http, &url))?;
        Ok(records.clone())
    }

    fn area_codes(&mut self) -> Result<HashMap<String, String>> {
        let url = format!("{}/CodeList/{}", self.base_url, self.code_list);
        let http = &self.http;
        let codes = self
            .code_cache
            .get_or_try_insert_with(self.code_list.clone(), || fetch_area_codes(http, &url))?;
        Ok(codes.clone())
    }

    fn clear_cache(&mut self) {
        self.trade_cache.clear();
        self.code_cache.clear();
    }
}
