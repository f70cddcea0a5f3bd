use super::{district_totals, state_totals};
use crate::types::{
    ClusterReport, EnrolmentRecord, HotspotDistrictRow, Ratio, StateActivityRow, UpdateRecord,
};
use crate::util::{average, percentile};
use std::collections::BTreeSet;

/// Percentile of state totals a state must exceed to count as high activity.
pub const HIGH_ACTIVITY_PERCENTILE: f64 = 90.0;

/// Flag states whose update total is above the 90th percentile of all
/// state totals, and break their districts out by share of the state total.
pub fn geographic_clusters(updates: &[UpdateRecord]) -> ClusterReport {
    let totals = state_totals(updates);
    let threshold = percentile(
        totals.values().map(|t| *t as f64).collect(),
        HIGH_ACTIVITY_PERCENTILE,
    );

    let states: Vec<StateActivityRow> = totals
        .iter()
        .map(|(state, total)| StateActivityRow {
            state: state.clone(),
            total_updates: *total,
            high_activity: *total as f64 > threshold,
        })
        .collect();

    let flagged: BTreeSet<&str> = states
        .iter()
        .filter(|s| s.high_activity)
        .map(|s| s.state.as_str())
        .collect();
    let in_flagged = updates.iter().filter(|r| flagged.contains(r.state.as_str()));
    let mut hotspots: Vec<HotspotDistrictRow> = district_totals(in_flagged)
        .into_iter()
        .map(|((state, district), total)| HotspotDistrictRow {
            state_share: Ratio::of(total as f64, totals[&state] as f64),
            state,
            district,
            total_updates: total,
        })
        .collect();
    hotspots.sort_by(|a, b| {
        a.state
            .cmp(&b.state)
            .then_with(|| b.total_updates.cmp(&a.total_updates))
    });

    ClusterReport {
        threshold,
        states,
        hotspots,
    }
}

/// Pearson correlation between per-state enrolment and per-state update
/// totals. A state missing from one side counts as zero there.
///
/// Undefined for fewer than two states, or when either side is constant.
pub fn state_correlation(enrolment: &[EnrolmentRecord], updates: &[UpdateRecord]) -> Ratio {
    let enr = state_totals(enrolment);
    let upd = state_totals(updates);
    let states: BTreeSet<&String> = enr.keys().chain(upd.keys()).collect();
    if states.len() < 2 {
        return Ratio::InsufficientData;
    }

    let xs: Vec<f64> = states
        .iter()
        .map(|s| enr.get(*s).copied().unwrap_or(0) as f64)
        .collect();
    let ys: Vec<f64> = states
        .iter()
        .map(|s| upd.get(*s).copied().unwrap_or(0) as f64)
        .collect();
    pearson(&xs, &ys)
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Ratio {
    if xs.len() != ys.len() || xs.len() < 2 {
        return Ratio::InsufficientData;
    }
    let (mx, my) = (average(xs), average(ys));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    Ratio::of(cov, (vx * vy).sqrt()).map(|r| r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::*;
    use crate::types::UpdateType;

    #[test]
    fn proportional_states_correlate_perfectly() {
        let states = [("Kerala", 400), ("Bihar", 1000), ("Karnataka", 260), ("Maharashtra", 2200)];
        let enrolment: Vec<_> = states.iter().map(|(s, n)| enrol(s, "D", *n)).collect();
        let updates: Vec<_> = states
            .iter()
            .map(|(s, n)| update(s, "D", UpdateType::Mobile, n / 2))
            .collect();
        let r = state_correlation(&enrolment, &updates).value().unwrap();
        assert!((r - 1.0).abs() < 1e-9, "r = {r}");
    }

    #[test]
    fn inverse_relationship_is_negative() {
        let r = pearson(&[1.0, 2.0, 3.0], &[30.0, 20.0, 10.0]);
        assert!((r.value().unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_state_or_constant_side_is_undefined() {
        let enrolment = vec![enrol("Kerala", "Thrissur", 10)];
        let updates = vec![update("Kerala", "Thrissur", UpdateType::Name, 4)];
        assert_eq!(state_correlation(&enrolment, &updates), Ratio::InsufficientData);

        let enrolment = vec![enrol("Kerala", "A", 10), enrol("Bihar", "B", 10)];
        let updates = vec![
            update("Kerala", "A", UpdateType::Name, 4),
            update("Bihar", "B", UpdateType::Name, 9),
        ];
        assert_eq!(state_correlation(&enrolment, &updates), Ratio::InsufficientData);
    }

    #[test]
    fn state_missing_from_one_side_counts_as_zero() {
        let enrolment = vec![enrol("Kerala", "A", 10), enrol("Bihar", "B", 20)];
        let updates = vec![
            update("Kerala", "A", UpdateType::Name, 5),
            update("Bihar", "B", UpdateType::Name, 10),
            update("Goa", "C", UpdateType::Name, 0),
        ];
        let r = state_correlation(&enrolment, &updates).value().unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clusters_flag_top_decile_states() {
        let mut updates = Vec::new();
        for (i, state) in ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"].iter().enumerate() {
            updates.push(update(state, &format!("{state}-1"), UpdateType::Address, 10 + i as u64));
        }
        updates.push(update("J", "J-2", UpdateType::Mobile, 500));

        let report = geographic_clusters(&updates);
        assert_eq!(report.states.len(), 10);
        let flagged: Vec<_> = report.states.iter().filter(|s| s.high_activity).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].state, "J");
        assert!(report.threshold > 18.0 && report.threshold < 519.0);

        assert_eq!(report.hotspots.len(), 2);
        assert_eq!(report.hotspots[0].district, "J-2");
        let share: f64 = report
            .hotspots
            .iter()
            .map(|h| h.state_share.value().unwrap())
            .sum();
        assert!((share - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hotspot_shares_stay_within_their_state() {
        let mut updates: Vec<_> = (0..19)
            .map(|i| update(&format!("S{i:02}"), "D", UpdateType::Address, 10))
            .collect();
        updates.push(update("Bihar", "Aurangabad", UpdateType::Address, 1000));
        updates.push(update("Maharashtra", "Aurangabad", UpdateType::Address, 900));
        updates.push(update("Maharashtra", "Pune", UpdateType::Address, 100));

        let report = geographic_clusters(&updates);
        let flagged: Vec<_> = report
            .states
            .iter()
            .filter(|s| s.high_activity)
            .map(|s| s.state.as_str())
            .collect();
        assert_eq!(flagged, ["Bihar", "Maharashtra"]);

        assert_eq!(report.hotspots.len(), 3);
        let bihar = &report.hotspots[0];
        assert_eq!((bihar.state.as_str(), bihar.district.as_str()), ("Bihar", "Aurangabad"));
        assert_eq!(bihar.total_updates, 1000);
        assert_eq!(bihar.state_share, Ratio::Value(1.0));
        let mh = &report.hotspots[1];
        assert_eq!((mh.state.as_str(), mh.district.as_str()), ("Maharashtra", "Aurangabad"));
        assert_eq!(mh.total_updates, 900);
        assert!((mh.state_share.value().unwrap() - 0.9).abs() < 1e-12);
        for h in &report.hotspots {
            assert!(h.state_share.value().unwrap() <= 1.0);
        }
    }

    #[test]
    fn clusters_on_empty_input() {
        let report = geographic_clusters(&[]);
        assert!(report.states.is_empty());
        assert!(report.hotspots.is_empty());
        assert_eq!(report.threshold, 0.0);
    }
}
