use crate::period::Period;
use crate::trade::{AggregatedRecord, Bloc, ConfidenceBucket};
use std::collections::{BTreeSet, HashMap};

/// A geographic line or ring (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// A country outline keyed by ISO 3166-1 alpha-2 code
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCountry {
    pub iso_a2: String,
    pub name: String,
    /// Exterior ring of each polygon part
    pub polygons: Vec<LineString>,
}

/// One country joined with one of its aggregated months, or with nothing
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord<'a> {
    pub country: &'a GeoCountry,
    pub trade: Option<&'a AggregatedRecord>,
    /// Descriptive name of the dominant partner from the area code list
    pub partner_name: Option<&'a str>,
}

impl MergedRecord<'_> {
    pub fn period(&self) -> Option<Period> {
        self.trade.map(|t| t.period())
    }

    /// Fill class of this row, if it has a dominant bloc
    pub fn class(&self) -> Option<(Bloc, ConfidenceBucket)> {
        let trade = self.trade?;
        Some((trade.dominant.bloc()?, trade.bucket))
    }
}

/// Left outer join of countries with aggregated records on ISO code.
///
/// Every country yields one row per matching record (in record order), or a
/// single row with no trade data. Duplicate codes are not collapsed.
pub fn join<'a>(
    countries: &'a [GeoCountry],
    records: &'a [AggregatedRecord],
    codes: &'a HashMap<String, String>,
) -> Vec<MergedRecord<'a>> {
    let mut by_importer: HashMap<&str, Vec<&AggregatedRecord>> = HashMap::new();
    for record in records {
        by_importer.entry(record.importer()).or_default().push(record);
    }

    let mut merged = Vec::with_capacity(records.len().max(countries.len()));
    for country in countries {
        match by_importer.get(country.iso_a2.as_str()) {
            Some(matches) => {
                for &trade in matches {
                    merged.push(MergedRecord {
                        country,
                        trade: Some(trade),
                        partner_name: codes.get(trade.dominant.code()).map(String::as_str),
                    });
                }
            }
            None => merged.push(MergedRecord {
                country,
                trade: None,
                partner_name: None,
            }),
        }
    }
    merged
}

/// Everything needed to draw any month: geometry, aggregated trade and code names
#[derive(Debug, Clone, Default)]
pub struct Atlas {
    pub countries: Vec<GeoCountry>,
    pub records: Vec<AggregatedRecord>,
    pub codes: HashMap<String, String>,
}

impl Atlas {
    pub fn new(
        countries: Vec<GeoCountry>,
        records: Vec<AggregatedRecord>,
        codes: HashMap<String, String>,
    ) -> Self {
        Self {
            countries,
            records,
            codes,
        }
    }

    pub fn merged(&self) -> Vec<MergedRecord<'_>> {
        join(&self.countries, &self.records, &self.codes)
    }

    /// Joined rows for one month; countries without data for it are left out
    pub fn for_period(&self, period: Period) -> Vec<MergedRecord<'_>> {
        self.merged()
            .into_iter()
            .filter(|row| row.period() == Some(period))
            .collect()
    }

    /// Distinct months present in the trade data, ascending
    pub fn periods(&self) -> Vec<Period> {
        self.records
            .iter()
            .map(|r| r.period())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Countries per leading bloc, in legend order, then `Unknown` as `None`
pub type BlocCounts = [(Option<Bloc>, usize); 4];

/// Number of countries led by each bloc (plus `Unknown`) in a set of rows
pub fn bloc_counts(rows: &[MergedRecord<'_>]) -> BlocCounts {
    let mut counts = [
        (Some(Bloc::Eu), 0),
        (Some(Bloc::China), 0),
        (Some(Bloc::Us), 0),
        (None, 0),
    ];
    for row in rows {
        let Some(trade) = row.trade else {
            continue;
        };
        let slot = match trade.dominant.bloc() {
            Some(Bloc::Eu) => 0,
            Some(Bloc::China) => 1,
            Some(Bloc::Us) => 2,
            None => 3,
        };
        counts[slot].1 += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::{aggregate, TradeRecord};

    fn country(iso: &str) -> GeoCountry {
        GeoCountry {
            iso_a2: iso.to_string(),
            name: iso.to_string(),
            polygons: vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]],
        }
    }

    fn agg(importer: &str, period: &str, eu: f64, china: f64, us: f64) -> AggregatedRecord {
        aggregate(&TradeRecord {
            importer: importer.to_string(),
            period: period.parse().unwrap(),
            eu: Some(eu),
            china: Some(china),
            us: Some(us),
        })
    }

    fn fixture() -> (Vec<GeoCountry>, Vec<AggregatedRecord>, HashMap<String, String>) {
        let countries = vec![country("FR"), country("BR"), country("JP")];
        let records = vec![
            agg("FR", "2000-01", 10.0, 5.0, 0.0),
            agg("JP", "2000-01", 1.0, 8.0, 3.0),
            agg("FR", "2000-02", 1.0, 1.0, 9.0),
            agg("ZZ", "2000-01", 1.0, 0.0, 0.0),
        ];
        let codes = HashMap::from([
            ("B0".to_string(), "European Union".to_string()),
            ("CN".to_string(), "China".to_string()),
        ]);
        (countries, records, codes)
    }

    #[test]
    fn test_left_join_keeps_all_countries() {
        let (countries, records, codes) = fixture();
        let merged = join(&countries, &records, &codes);

        // FR twice, BR unmatched once, JP once; ZZ has no polygon
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].country.iso_a2, "FR");
        assert_eq!(merged[0].partner_name, Some("European Union"));
        assert_eq!(merged[1].country.iso_a2, "FR");
        assert_eq!(merged[1].partner_name, None);
        assert_eq!(merged[2].country.iso_a2, "BR");
        assert!(merged[2].trade.is_none());
        assert_eq!(merged[3].partner_name, Some("China"));
    }

    #[test]
    fn test_join_is_idempotent() {
        let (countries, records, codes) = fixture();
        let first = join(&countries, &records, &codes);
        let second = join(&countries, &records, &codes);
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_codes_are_not_collapsed() {
        let (mut countries, records, codes) = fixture();
        countries.push(country("JP"));
        let merged = join(&countries, &records, &codes);
        assert_eq!(merged.iter().filter(|r| r.country.iso_a2 == "JP").count(), 2);
    }

    #[test]
    fn test_atlas_for_period_and_periods() {
        let (countries, records, codes) = fixture();
        let atlas = Atlas::new(countries, records, codes);

        let periods: Vec<String> = atlas.periods().iter().map(|p| p.to_string()).collect();
        assert_eq!(periods, ["2000-01", "2000-02"]);

        let january = atlas.for_period("2000-01".parse().unwrap());
        assert_eq!(january.len(), 2);
        assert_eq!(january[0].class(), Some((Bloc::Eu, ConfidenceBucket::from_share(0.67))));
        assert_eq!(january[1].class().map(|(bloc, _)| bloc), Some(Bloc::China));

        let counts = bloc_counts(&january);
        assert_eq!(counts[0], (Some(Bloc::Eu), 1));
        assert_eq!(counts[1], (Some(Bloc::China), 1));
        assert_eq!(counts[2], (Some(Bloc::Us), 0));
    }
}
