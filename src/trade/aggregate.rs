use super::TradeRecord;
use crate::period::Period;
use std::fmt;

/// A tracked trade counterparty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bloc {
    /// EU member states and institutions (IMF code `B0`)
    Eu,
    China,
    Us,
}

impl Bloc {
    /// Order in which blocs are compared; on equal values the earlier one wins
    pub const CHECK_ORDER: [Bloc; 3] = [Bloc::Eu, Bloc::China, Bloc::Us];

    pub fn code(&self) -> &'static str {
        match self {
            Bloc::Eu => "B0",
            Bloc::China => "CN",
            Bloc::Us => "US",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B0" => Some(Bloc::Eu),
            "CN" => Some(Bloc::China),
            "US" => Some(Bloc::Us),
            _ => None,
        }
    }

    /// Short display name
    pub fn label(&self) -> &'static str {
        match self {
            Bloc::Eu => "EU",
            Bloc::China => "China",
            Bloc::Us => "USA",
        }
    }
}

/// The leading bloc, or `Unknown` when no imports were recorded from any of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dominant {
    Bloc(Bloc),
    Unknown,
}

impl Dominant {
    pub fn code(&self) -> &'static str {
        match self {
            Dominant::Bloc(bloc) => bloc.code(),
            Dominant::Unknown => "Unknown",
        }
    }

    pub fn bloc(&self) -> Option<Bloc> {
        match self {
            Dominant::Bloc(bloc) => Some(*bloc),
            Dominant::Unknown => None,
        }
    }
}

impl fmt::Display for Dominant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How clearly the leading bloc leads, from 1 (share ≤ 0.25) to 4 (share > 0.75)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfidenceBucket(u8);

impl ConfidenceBucket {
    pub const ALL: [ConfidenceBucket; 4] = [
        ConfidenceBucket(1),
        ConfidenceBucket(2),
        ConfidenceBucket(3),
        ConfidenceBucket(4),
    ];

    /// Bucket for a share. Total over all inputs: NaN and values ≤ 0.25 land in bucket 1.
    pub fn from_share(share: f64) -> Self {
        if share > 0.75 {
            ConfidenceBucket(4)
        } else if share > 0.5 {
            ConfidenceBucket(3)
        } else if share > 0.25 {
            ConfidenceBucket(2)
        } else {
            ConfidenceBucket(1)
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub record: TradeRecord,
    pub dominant: Dominant,
    /// Leading bloc's share of the three-way total, in [0, 1]
    pub share: f64,
    pub bucket: ConfidenceBucket,
}

impl AggregatedRecord {
    pub fn importer(&self) -> &str {
        &self.record.importer
    }

    pub fn period(&self) -> Period {
        self.record.period
    }
}

/// Missing, non-finite and negative values count as zero
fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Pick the dominant bloc and its share for one record
pub fn aggregate(record: &TradeRecord) -> AggregatedRecord {
    let values = Bloc::CHECK_ORDER.map(|bloc| (bloc, sanitize(record.value(bloc))));
    let total: f64 = values.iter().map(|(_, v)| v).sum();

    let (dominant, share) = if total == 0.0 {
        (Dominant::Unknown, 0.0)
    } else {
        // Strict comparison keeps the first bloc in CHECK_ORDER on ties
        let (bloc, max) = values
            .iter()
            .skip(1)
            .fold(values[0], |best, &candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });
        (Dominant::Bloc(bloc), (max / total).clamp(0.0, 1.0))
    };

    AggregatedRecord {
        record: record.clone(),
        dominant,
        share,
        bucket: ConfidenceBucket::from_share(share),
    }
}

pub fn aggregate_all(records: &[TradeRecord]) -> Vec<AggregatedRecord> {
    records.iter().map(aggregate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(eu: Option<f64>, china: Option<f64>, us: Option<f64>) -> TradeRecord {
        TradeRecord {
            importer: "XX".to_string(),
            period: "2000-01".parse().unwrap(),
            eu,
            china,
            us,
        }
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(ConfidenceBucket::from_share(0.0).level(), 1);
        assert_eq!(ConfidenceBucket::from_share(0.25).level(), 1);
        assert_eq!(ConfidenceBucket::from_share(0.2501).level(), 2);
        assert_eq!(ConfidenceBucket::from_share(0.5).level(), 2);
        assert_eq!(ConfidenceBucket::from_share(0.5001).level(), 3);
        assert_eq!(ConfidenceBucket::from_share(0.75).level(), 3);
        assert_eq!(ConfidenceBucket::from_share(0.751).level(), 4);
        assert_eq!(ConfidenceBucket::from_share(1.0).level(), 4);
    }

    #[test]
    fn test_bucket_monotonic_in_share() {
        let mut previous = ConfidenceBucket::from_share(0.0);
        for step in 0..=1000 {
            let bucket = ConfidenceBucket::from_share(step as f64 / 1000.0);
            assert!(bucket >= previous);
            previous = bucket;
        }
    }

    #[test]
    fn test_eu_leads() {
        let agg = aggregate(&record(Some(10.0), Some(5.0), Some(0.0)));
        assert_eq!(agg.dominant, Dominant::Bloc(Bloc::Eu));
        assert_eq!(agg.dominant.code(), "B0");
        assert!((agg.share - 10.0 / 15.0).abs() < 1e-12);
        assert_eq!(agg.bucket.level(), 3);
    }

    #[test]
    fn test_all_zero_is_unknown() {
        let agg = aggregate(&record(Some(0.0), Some(0.0), Some(0.0)));
        assert_eq!(agg.dominant, Dominant::Unknown);
        assert_eq!(agg.share, 0.0);
        assert_eq!(agg.bucket.level(), 1);
    }

    #[test]
    fn test_missing_values_count_as_zero() {
        let agg = aggregate(&record(None, Some(f64::NAN), Some(4.0)));
        assert_eq!(agg.dominant, Dominant::Bloc(Bloc::Us));
        assert_eq!(agg.share, 1.0);
        assert_eq!(agg.bucket.level(), 4);

        let agg = aggregate(&record(None, None, None));
        assert_eq!(agg.dominant, Dominant::Unknown);
    }

    #[test]
    fn test_negative_values_count_as_zero() {
        let agg = aggregate(&record(Some(-5.0), Some(1.0), Some(1.0)));
        assert_eq!(agg.dominant, Dominant::Bloc(Bloc::China));
        assert_eq!(agg.share, 0.5);
    }

    #[test]
    fn test_ties_follow_check_order() {
        let agg = aggregate(&record(Some(3.0), Some(3.0), Some(3.0)));
        assert_eq!(agg.dominant, Dominant::Bloc(Bloc::Eu));
        assert_eq!(agg.bucket.level(), 2);

        let agg = aggregate(&record(Some(1.0), Some(3.0), Some(3.0)));
        assert_eq!(agg.dominant, Dominant::Bloc(Bloc::China));
    }

    #[test]
    fn test_codes_round_trip() {
        for bloc in Bloc::CHECK_ORDER {
            assert_eq!(Bloc::from_code(bloc.code()), Some(bloc));
        }
        assert_eq!(Bloc::from_code("DE"), None);
    }
}
