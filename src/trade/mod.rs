mod aggregate;

pub use aggregate::{aggregate, aggregate_all, AggregatedRecord, Bloc, ConfidenceBucket, Dominant};

use crate::period::Period;
use std::collections::BTreeMap;

/// One data point of one series: imports of `importer` from `counterpart` in `period`
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub importer: String,
    pub counterpart: String,
    pub period: Period,
    /// `None` when the value was missing or not a number
    pub value: Option<f64>,
}

/// Imports of one country in one month from each tracked bloc
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub importer: String,
    pub period: Period,
    pub eu: Option<f64>,
    pub china: Option<f64>,
    pub us: Option<f64>,
}

impl TradeRecord {
    pub fn new(importer: impl Into<String>, period: Period) -> Self {
        Self {
            importer: importer.into(),
            period,
            eu: None,
            china: None,
            us: None,
        }
    }

    pub fn value(&self, bloc: Bloc) -> Option<f64> {
        match bloc {
            Bloc::Eu => self.eu,
            Bloc::China => self.china,
            Bloc::Us => self.us,
        }
    }

    fn slot_mut(&mut self, bloc: Bloc) -> &mut Option<f64> {
        match bloc {
            Bloc::Eu => &mut self.eu,
            Bloc::China => &mut self.china,
            Bloc::Us => &mut self.us,
        }
    }
}

/// Pivot long-form observations into one record per (importer, period).
///
/// Counterparts outside the three blocs are ignored. When the same
/// (importer, period, counterpart) appears more than once, the first non-missing
/// value wins.
/// Output is sorted by importer, then period.
pub fn pivot(observations: &[Observation]) -> Vec<TradeRecord> {
    let mut table: BTreeMap<(&str, Period), TradeRecord> = BTreeMap::new();

    for obs in observations {
        let Some(bloc) = Bloc::from_code(&obs.counterpart) else {
            continue;
        };
        let record = table
            .entry((obs.importer.as_str(), obs.period))
            .or_insert_with(|| TradeRecord::new(obs.importer.clone(), obs.period));

        let slot = record.slot_mut(bloc);
        if slot.is_none() {
            *slot = obs.value;
        }
    }

    table.into_values().collect()
}
