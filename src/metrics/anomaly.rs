use super::outlier::OutlierScorer;
use crate::types::{AnomalyRow, EnrolmentRecord, Ratio};
use crate::util::median;
use std::collections::BTreeMap;

struct DistrictEnrolment {
    district: String,
    state: String,
    enrolment: u64,
    rejections: u64,
}

impl DistrictEnrolment {
    fn rejection_rate(&self) -> Ratio {
        Ratio::of(self.rejections as f64, self.enrolment as f64)
    }
}

fn aggregate(enrolment: &[EnrolmentRecord]) -> Vec<DistrictEnrolment> {
    let mut map: BTreeMap<(&str, &str), DistrictEnrolment> = BTreeMap::new();
    for r in enrolment {
        let e = map
            .entry((r.state.as_str(), r.district.as_str()))
            .or_insert_with(|| DistrictEnrolment {
                district: r.district.clone(),
                state: r.state.clone(),
                enrolment: 0,
                rejections: 0,
            });
        e.enrolment = e.enrolment.saturating_add(r.enrolment_count());
        e.rejections = e.rejections.saturating_add(r.rejection_count);
    }
    map.into_values().collect()
}

fn score(
    districts: Vec<DistrictEnrolment>,
    features: impl Fn(&DistrictEnrolment) -> Vec<f64>,
    scorer: &dyn OutlierScorer,
) -> Vec<AnomalyRow> {
    if districts.len() < scorer.min_samples() {
        log::debug!(
            "Skipping {} anomaly scan: {} districts, need {}",
            scorer.name(),
            districts.len(),
            scorer.min_samples()
        );
        return Vec::new();
    }
    let samples: Vec<Vec<f64>> = districts.iter().map(&features).collect();
    let flags = scorer.flag(&samples);
    let mid = median(districts.iter().map(|d| d.enrolment as f64).collect());

    districts
        .into_iter()
        .zip(flags)
        .filter(|(_, flagged)| *flagged)
        .map(|(d, _)| AnomalyRow {
            rejection_rate: d.rejection_rate(),
            times_median: Ratio::of(d.enrolment as f64, mid),
            district: d.district,
            state: d.state,
            enrolment_count: d.enrolment,
        })
        .collect()
}

/// Districts whose total enrolment is unusual, largest first.
///
/// Returns nothing (rather than failing) when there are fewer districts
/// than the scorer needs.
pub fn detect_anomalies(enrolment: &[EnrolmentRecord], scorer: &dyn OutlierScorer) -> Vec<AnomalyRow> {
    let mut rows = score(aggregate(enrolment), |d| vec![d.enrolment as f64], scorer);
    rows.sort_by(|a, b| b.enrolment_count.cmp(&a.enrolment_count));
    rows
}

/// Districts unusual on enrolment volume and rejection rate together,
/// highest rejection rate first. A district with no enrolment scores its
/// rejection rate as zero.
pub fn detect_rejection_anomalies(
    enrolment: &[EnrolmentRecord],
    scorer: &dyn OutlierScorer,
) -> Vec<AnomalyRow> {
    let mut rows = score(
        aggregate(enrolment),
        |d| vec![d.enrolment as f64, d.rejection_rate().value().unwrap_or(0.0)],
        scorer,
    );
    rows.sort_by(|a, b| {
        let ra = a.rejection_rate.value().unwrap_or(0.0);
        let rb = b.rejection_rate.value().unwrap_or(0.0);
        rb.total_cmp(&ra)
    });
    rows
}
