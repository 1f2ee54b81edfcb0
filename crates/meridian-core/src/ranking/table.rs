//! # Ranking Table
//!
//! Immutable lookup from a provenance key to an integer preference score.
//!
//! Lower scores are preferred. Sources absent from the table resolve to
//! `BASE_RANK`. The table is built once (builtin, from config, or by a test)
//! and handed to the `RankingEngine`; it is never global state.

use crate::primitives::{BASE_RANK, WILDCARD};
use crate::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used to look up a preference score.
///
/// `import_name` is matched exactly. `measurement_method` and
/// `observation_period` may be `*` to match any value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RankKey {
    pub import_name: String,
    pub measurement_method: String,
    pub observation_period: String,
}

impl RankKey {
    #[must_use]
    pub fn new(
        import_name: impl Into<String>,
        measurement_method: impl Into<String>,
        observation_period: impl Into<String>,
    ) -> Self {
        Self {
            import_name: import_name.into(),
            measurement_method: measurement_method.into(),
            observation_period: observation_period.into(),
        }
    }
}

/// A single configured score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    #[serde(flatten)]
    pub key: RankKey,
    pub score: i32,
}

/// Preference scores keyed by import -> method -> period.
///
/// The nested layout lets `lookup` probe with borrowed `&str` keys, so score
/// resolution never allocates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingTable {
    scores: BTreeMap<String, BTreeMap<String, BTreeMap<String, i32>>>,
}

/// Curated production preferences: (import, method, period, score).
const BUILTIN_SCORES: &[(&str, &str, &str, i32)] = &[
    // Population
    ("CensusPEP", "CensusPEPSurvey", "*", 0),
    ("CensusACS5YearSurvey", "CensusACS5yrSurvey", "*", 1),
    ("CensusACS5YearSurvey_AggCountry", "CensusACS5yrSurvey", "*", 1),
    ("CensusUSAMedianAgeIncome", "CensusACS5yrSurvey", "*", 1),
    ("USDecennialCensus_RedistrictingRelease", "USDecennialCensus", "*", 2),
    ("EurostatData", "EurostatRegionalPopulationData", "*", 3),
    ("WorldDevelopmentIndicators", "*", "*", 4),
    ("IndiaCensus_Primary", "*", "*", 5),
    ("WikipediaStatsData", "Wikipedia", "*", 1001),
    ("HumanCuratedStats", "HumanCuratedStats", "*", 1002),
    ("WikidataPopulation", "WikidataPopulation", "*", 1003),
    // Unemployment rate
    ("BLS_LAUS", "BLSSeasonallyUnadjusted", "*", 0),
    ("BLS_CPS", "BLSSeasonallyAdjusted", "*", 1),
    ("EurostatData", "", "*", 2),
    // Covid
    ("NYT_COVID19", "NYT_COVID19_GitHub", "*", 0),
    ("CDC500", "AgeAdjustedPrevalence", "*", 0),
    // Electricity
    ("UNEnergy", "", "*", 0),
    ("EIA_Electricity", "*", "*", 1),
    // Weather: observational over gridded reanalysis over projections
    ("NOAA_EPA_Observed_Historical_Weather", "*", "*", 0),
    ("Copernicus_ECMWF_ERA5_Monthly", "*", "*", 1),
    ("NASA_NEXDCP30", "NASA_Mean_CCSM4", "P1M", 2),
    ("NASA_NEXDCP30_AggrDiffStats", "*", "P1M", 3),
    ("NASA_NEXDCP30_StatVarSeriesAggr", "*", "P1M", 4),
    // Wet bulb temperature
    ("NASA_WetBulbComputation_Aggregation", "NASA_Mean_HadGEM2-AO", "*", 0),
    ("NASA_WetBulbComputation_Aggregation", "*", "*", 1),
    ("NASA_WetBulbComputation", "NASA_Mean_HadGEM2-AO", "*", 2),
    // Hate crime publications over aggregates
    ("FBIHateCrimePublications", "*", "*", 0),
    ("FBIHateCrime", "*", "*", 1),
];

impl RankingTable {
    /// Create an empty table: every source resolves to `BASE_RANK`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The curated production table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for &(import, method, period, score) in BUILTIN_SCORES {
            table.insert(RankKey::new(import, method, period), score);
        }
        table
    }

    /// Build a table from entries. Later entries win for a repeated key.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RankEntry>,
    {
        Self::new().with_overrides(entries)
    }

    /// Return a copy of this table with the given entries applied on top.
    #[must_use]
    pub fn with_overrides<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = RankEntry>,
    {
        for entry in entries {
            self.insert(entry.key, entry.score);
        }
        self
    }

    /// Insert or replace the score for a key.
    pub fn insert(&mut self, key: RankKey, score: i32) {
        self.scores
            .entry(key.import_name)
            .or_default()
            .entry(key.measurement_method)
            .or_default()
            .insert(key.observation_period, score);
    }

    /// Resolve a descriptor's score.
    ///
    /// Order: exact (method, period), (method, `*`), (`*`, period),
    /// (`*`, `*`), then `BASE_RANK`.
    #[must_use]
    pub fn resolve(&self, descriptor: &SourceDescriptor) -> i32 {
        let Some(by_method) = self.scores.get(descriptor.import_name.as_str()) else {
            return BASE_RANK;
        };
        let method = descriptor.measurement_method.as_str();
        let period = descriptor.observation_period.as_str();

        [
            (method, period),
            (method, WILDCARD),
            (WILDCARD, period),
            (WILDCARD, WILDCARD),
        ]
        .into_iter()
        .find_map(|(m, p)| by_method.get(m).and_then(|by_period| by_period.get(p)))
        .copied()
        .unwrap_or(BASE_RANK)
    }

    /// All entries in deterministic key order.
    pub fn entries(&self) -> impl Iterator<Item = RankEntry> + '_ {
        self.scores.iter().flat_map(|(import, by_method)| {
            by_method.iter().flat_map(move |(method, by_period)| {
                by_period.iter().map(move |(period, score)| RankEntry {
                    key: RankKey::new(import.as_str(), method.as_str(), period.as_str()),
                    score: *score,
                })
            })
        })
    }

    /// Number of configured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
