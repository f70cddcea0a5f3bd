use super::ratios::{age_distribution, mbu_forecast};
use super::spatial::state_correlation;
use crate::loader::Dataset;
use crate::types::{Ratio, SummaryStats};
use crate::util::sum_counts;

/// Headline numbers for the current view.
pub fn kpi_summary(ds: &Dataset) -> SummaryStats {
    let total_enrolments = sum_counts(ds.enrolment.iter().map(|r| r.enrolment_count()));
    let total_rejections = sum_counts(ds.enrolment.iter().map(|r| r.rejection_count));
    let total_updates = sum_counts(ds.updates.iter().map(|r| r.count));
    let saturation_sum: f64 = ds.saturation.iter().map(|r| r.saturation_percentage).sum();

    SummaryStats {
        total_enrolments,
        total_updates,
        total_states: ds.states().len(),
        total_districts: ds.districts().len(),
        avg_saturation_pct: Ratio::of(saturation_sum, ds.saturation.len() as f64),
        rejection_rate_pct: Ratio::of(total_rejections as f64, total_enrolments as f64)
            .map(|v| v * 100.0),
        enrolment_update_correlation: state_correlation(&ds.enrolment, &ds.updates),
        age_distribution: age_distribution(&ds.enrolment),
        mbu_forecast: mbu_forecast(&ds.enrolment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::*;
    use crate::types::{SaturationRecord, UpdateType};

    #[test]
    fn summary_of_small_dataset() {
        let mut a = enrol("Kerala", "Thrissur", 150);
        a.rejection_count = 3;
        let b = enrol("Bihar", "Gaya", 50);
        let ds = Dataset {
            enrolment: vec![a, b],
            updates: vec![
                update("Kerala", "Thrissur", UpdateType::Mobile, 75),
                update("Bihar", "Gaya", UpdateType::Address, 25),
            ],
            saturation: vec![
                SaturationRecord {
                    state: "Kerala".into(),
                    district: "Thrissur".into(),
                    projected_population: 1.0,
                    aadhaar_assigned: 1.0,
                    saturation_percentage: 104.0,
                },
                SaturationRecord {
                    state: "Bihar".into(),
                    district: "Gaya".into(),
                    projected_population: 1.0,
                    aadhaar_assigned: 1.0,
                    saturation_percentage: 88.0,
                },
            ],
            ..Dataset::default()
        };
        let s = kpi_summary(&ds);
        assert_eq!(s.total_enrolments, 200);
        assert_eq!(s.total_updates, 100);
        assert_eq!(s.total_states, 2);
        assert_eq!(s.total_districts, 2);
        assert_eq!(s.avg_saturation_pct, Ratio::Value(96.0));
        assert!((s.rejection_rate_pct.value().unwrap() - 1.5).abs() < 1e-12);
        assert!((s.enrolment_update_correlation.value().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(s.age_distribution.age_0_5, 200);
    }

    #[test]
    fn empty_dataset_has_undefined_rates() {
        let s = kpi_summary(&Dataset::default());
        assert_eq!(s.total_enrolments, 0);
        assert_eq!(s.avg_saturation_pct, Ratio::InsufficientData);
        assert_eq!(s.rejection_rate_pct, Ratio::InsufficientData);
        assert_eq!(s.enrolment_update_correlation, Ratio::InsufficientData);
    }
}
