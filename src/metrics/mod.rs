// Metric functions over loaded records.
//
// Every function borrows its inputs and builds a new table; nothing here
// holds state between calls. Divisions with a possibly-zero denominator go
// through `Ratio` so degenerate inputs come back as `InsufficientData`
// rather than NaN or infinity.
pub mod anomaly;
pub mod outlier;
pub mod ratios;
pub mod spatial;
pub mod summary;
pub mod temporal;

pub use anomaly::{detect_anomalies, detect_rejection_anomalies};
pub use outlier::{IsolationForest, OutlierScorer, ZScoreRule};
pub use ratios::{
    age_distribution, age_transition, digital_gender_gap, mbu_forecast, migration_velocity,
    population_by_district, update_intensity,
};
pub use spatial::{geographic_clusters, state_correlation};
pub use summary::kpi_summary;
pub use temporal::{district_velocity, migration_spikes, seasonal_patterns, Season};

use crate::types::{EnrolmentRecord, UpdateRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Common view over enrolment and update rows: where, when and how many.
pub trait Record {
    fn state(&self) -> &str;
    fn district(&self) -> &str;
    fn date(&self) -> NaiveDate;
    fn volume(&self) -> u64;
}

impl Record for EnrolmentRecord {
    fn state(&self) -> &str {
        &self.state
    }
    fn district(&self) -> &str {
        &self.district
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn volume(&self) -> u64 {
        self.enrolment_count()
    }
}

impl Record for UpdateRecord {
    fn state(&self) -> &str {
        &self.state
    }
    fn district(&self) -> &str {
        &self.district
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn volume(&self) -> u64 {
        self.count
    }
}

/// A district is identified by `(state, district)`; names such as
/// Aurangabad or Bilaspur recur across states.
pub type DistrictKey = (String, String);

pub(crate) fn district_key<R: Record + ?Sized>(r: &R) -> DistrictKey {
    (r.state().to_string(), r.district().to_string())
}

/// Volume per district, ordered by state then district name.
pub(crate) fn district_totals<'a, T, I>(records: I) -> BTreeMap<DistrictKey, u64>
where
    T: Record + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut map: BTreeMap<DistrictKey, u64> = BTreeMap::new();
    for r in records {
        let e = map.entry(district_key(r)).or_default();
        *e = e.saturating_add(r.volume());
    }
    map
}

/// Volume per state, ordered by state name.
pub(crate) fn state_totals<'a, T, I>(records: I) -> BTreeMap<String, u64>
where
    T: Record + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut map: BTreeMap<String, u64> = BTreeMap::new();
    for r in records {
        let e = map.entry(r.state().to_string()).or_default();
        *e = e.saturating_add(r.volume());
    }
    map
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::types::UpdateType;

    fn key(state: &str, district: &str) -> DistrictKey {
        (state.to_string(), district.to_string())
    }

    #[test]
    fn district_totals_sum_per_district() {
        let rows = vec![
            enrol("Kerala", "Thrissur", 4),
            enrol("Kerala", "Thrissur", 6),
            enrol("Bihar", "Gaya", 1),
        ];
        let totals = district_totals(&rows);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&key("Kerala", "Thrissur")], 10);
        assert_eq!(totals[&key("Bihar", "Gaya")], 1);
    }

    #[test]
    fn same_district_name_in_two_states_stays_apart() {
        let rows = vec![
            enrol("Bihar", "Aurangabad", 1000),
            enrol("Maharashtra", "Aurangabad", 900),
        ];
        let totals = district_totals(&rows);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&key("Bihar", "Aurangabad")], 1000);
        assert_eq!(totals[&key("Maharashtra", "Aurangabad")], 900);
    }

    #[test]
    fn state_totals_sum_updates() {
        let rows = vec![
            update("Kerala", "Thrissur", UpdateType::Mobile, 2),
            update("Kerala", "Ernakulam", UpdateType::Address, 3),
        ];
        assert_eq!(state_totals(&rows)["Kerala"], 5);
    }
}
