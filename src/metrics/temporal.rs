use super::Record;
use crate::types::{Ratio, SeasonRow, SpikeRow, UpdateRecord, VelocityRow};
use crate::util::{days_diff, month_key};
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Season {
    /// November through February.
    WinterDrive,
    /// April and May.
    SchoolAdmissions,
    /// June.
    AcademicStart,
    Regular,
}

impl Season {
    pub fn from_month(month: u32) -> Season {
        match month {
            11 | 12 | 1 | 2 => Season::WinterDrive,
            4 | 5 => Season::SchoolAdmissions,
            6 => Season::AcademicStart,
            _ => Season::Regular,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Season::WinterDrive => "Winter Drive (Nov-Feb)",
            Season::SchoolAdmissions => "School Admissions (Apr-May)",
            Season::AcademicStart => "Academic Start (Jun)",
            Season::Regular => "Regular",
        };
        f.write_str(s)
    }
}

/// Volume per season, compared against the overall monthly mean.
///
/// `Monthly_Average` is the season's total over the distinct calendar months
/// it was observed in; `Deviation_Pct` is how far that sits from the grand
/// total over all observed months. Weighted by `Months`, the deviations sum
/// to zero.
pub fn seasonal_patterns<T: Record>(records: &[T]) -> Vec<SeasonRow> {
    let mut buckets: BTreeMap<Season, (u64, BTreeSet<(i32, u32)>)> = BTreeMap::new();
    for r in records {
        let d = r.date();
        let e = buckets.entry(Season::from_month(d.month())).or_default();
        e.0 = e.0.saturating_add(r.volume());
        e.1.insert((d.year(), d.month()));
    }

    let grand_total: f64 = buckets.values().map(|(t, _)| *t as f64).sum();
    let all_months: usize = buckets.values().map(|(_, m)| m.len()).sum();
    let overall = Ratio::of(grand_total, all_months as f64);

    buckets
        .into_iter()
        .map(|(season, (total, months))| {
            let monthly_average = total as f64 / months.len() as f64;
            let deviation_pct = match overall {
                Ratio::Value(mean) => Ratio::of(monthly_average - mean, mean).map(|v| v * 100.0),
                Ratio::InsufficientData => Ratio::InsufficientData,
            };
            SeasonRow {
                season: season.to_string(),
                total,
                months: months.len(),
                monthly_average,
                deviation_pct,
            }
        })
        .collect()
}

/// Month-over-month change per district.
///
/// A month is a spike when its count is more than double the previous
/// observed month for the same district. The first month of each district
/// has no baseline and is never a spike. `Pct_Change` is undefined when the
/// previous month was zero, even though any positive count then still
/// counts as a spike.
pub fn migration_spikes(updates: &[UpdateRecord]) -> Vec<SpikeRow> {
    let mut by_district: BTreeMap<(&str, &str), BTreeMap<String, u64>> = BTreeMap::new();
    for r in updates {
        let months = by_district
            .entry((r.state.as_str(), r.district.as_str()))
            .or_default();
        let e = months.entry(month_key(r.date)).or_default();
        *e = e.saturating_add(r.count);
    }

    let mut rows = Vec::new();
    for ((state, district), months) in by_district {
        let mut previous: Option<u64> = None;
        for (month, count) in months {
            let change = previous.map(|p| {
                let (c, p) = (count as i128, p as i128);
                (c - p).clamp(i64::MIN as i128, i64::MAX as i128) as i64
            });
            let pct_change = match previous {
                Some(p) => Ratio::of(count as f64 - p as f64, p as f64).map(|v| v * 100.0),
                None => Ratio::InsufficientData,
            };
            rows.push(SpikeRow {
                district: district.to_string(),
                state: state.to_string(),
                month,
                count,
                previous,
                change,
                pct_change,
                is_spike: previous.map_or(false, |p| count > p.saturating_mul(2)),
            });
            previous = Some(count);
        }
    }
    rows
}

/// Updates per active day, fastest district first, dense-ranked.
///
/// The active window runs from the first to the last observed date,
/// inclusive, so a district seen on a single day divides by one.
pub fn district_velocity(updates: &[UpdateRecord]) -> Vec<VelocityRow> {
    struct Acc {
        total: u64,
        first: NaiveDate,
        last: NaiveDate,
    }
    let mut map: BTreeMap<(&str, &str), Acc> = BTreeMap::new();
    for r in updates {
        let e = map
            .entry((r.state.as_str(), r.district.as_str()))
            .or_insert(Acc {
                total: 0,
                first: r.date,
                last: r.date,
            });
        e.total = e.total.saturating_add(r.count);
        e.first = e.first.min(r.date);
        e.last = e.last.max(r.date);
    }

    let mut rows: Vec<VelocityRow> = map
        .into_iter()
        .map(|((state, district), acc)| {
            let active_days = days_diff(acc.first, acc.last) + 1;
            VelocityRow {
                rank: 0,
                district: district.to_string(),
                state: state.to_string(),
                total_updates: acc.total,
                first_date: acc.first,
                last_date: acc.last,
                active_days,
                daily_velocity: acc.total as f64 / active_days as f64,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.daily_velocity
            .partial_cmp(&a.daily_velocity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.district.cmp(&b.district))
    });
    let mut rank = 0usize;
    let mut last: Option<f64> = None;
    for row in &mut rows {
        if last != Some(row.daily_velocity) {
            rank += 1;
            last = Some(row.daily_velocity);
        }
        row.rank = rank;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::*;

    #[test]
    fn season_buckets() {
        assert_eq!(Season::from_month(11), Season::WinterDrive);
        assert_eq!(Season::from_month(2), Season::WinterDrive);
        assert_eq!(Season::from_month(3), Season::Regular);
        assert_eq!(Season::from_month(5), Season::SchoolAdmissions);
        assert_eq!(Season::from_month(6), Season::AcademicStart);
        assert_eq!(Season::from_month(9), Season::Regular);
    }

    #[test]
    fn seasonal_deviation_balances_over_a_year() {
        let volumes = [120, 90, 60, 200, 210, 150, 40, 55, 70, 65, 130, 140];
        let rows: Vec<_> = volumes
            .iter()
            .enumerate()
            .map(|(i, v)| dated("Thrissur", date(2024, i as u32 + 1, 10), *v))
            .collect();
        let seasons = seasonal_patterns(&rows);
        assert_eq!(seasons.len(), 4);
        assert_eq!(seasons.iter().map(|s| s.months).sum::<usize>(), 12);
        assert_eq!(seasons.iter().map(|s| s.total).sum::<u64>(), 1330);

        let weighted: f64 = seasons
            .iter()
            .map(|s| s.months as f64 * s.deviation_pct.value().unwrap())
            .sum();
        assert!(weighted.abs() < 1e-9, "weighted deviation {weighted}");

        let winter = seasons.iter().find(|s| s.season.starts_with("Winter")).unwrap();
        assert_eq!(winter.months, 4);
        assert_eq!(winter.total, 120 + 90 + 130 + 140);
    }

    #[test]
    fn seasonal_with_zero_volume_is_undefined() {
        let rows = vec![dated("Thrissur", date(2024, 7, 1), 0)];
        let seasons = seasonal_patterns(&rows);
        assert_eq!(seasons[0].deviation_pct, Ratio::InsufficientData);
        assert!(seasonal_patterns::<UpdateRecord>(&[]).is_empty());
    }

    #[test]
    fn spike_needs_more_than_double_previous_month() {
        let rows = vec![
            dated("Pune", date(2024, 1, 3), 10),
            dated("Pune", date(2024, 1, 20), 5),
            dated("Pune", date(2024, 2, 1), 31),
            dated("Pune", date(2024, 3, 1), 62),
            dated("Pune", date(2024, 4, 1), 125),
            dated("Nashik", date(2024, 2, 1), 500),
        ];
        let spikes = migration_spikes(&rows);
        let pune: Vec<_> = spikes.iter().filter(|s| s.district == "Pune").collect();
        assert_eq!(pune.len(), 4);

        assert_eq!(pune[0].month, "2024-01");
        assert_eq!(pune[0].count, 15);
        assert_eq!(pune[0].previous, None);
        assert!(!pune[0].is_spike);
        assert_eq!(pune[0].pct_change, Ratio::InsufficientData);

        assert!(pune[1].is_spike);
        assert_eq!(pune[1].previous, Some(15));
        assert_eq!(pune[1].change, Some(16));
        assert!((pune[1].pct_change.value().unwrap() - 106.666_666).abs() < 1e-3);

        // Exactly double is not a spike.
        assert!(!pune[2].is_spike);
        assert_eq!(pune[2].pct_change, Ratio::Value(100.0));
        assert!(pune[3].is_spike);

        let nashik: Vec<_> = spikes.iter().filter(|s| s.district == "Nashik").collect();
        assert_eq!(nashik.len(), 1);
        assert!(!nashik[0].is_spike);
    }

    #[test]
    fn spike_after_zero_month() {
        let rows = vec![
            dated("Thane", date(2024, 5, 1), 0),
            dated("Thane", date(2024, 6, 1), 4),
        ];
        let spikes = migration_spikes(&rows);
        assert!(spikes[1].is_spike);
        assert_eq!(spikes[1].pct_change, Ratio::InsufficientData);
    }

    #[test]
    fn same_district_name_in_two_states_tracks_separately() {
        let rows = vec![
            UpdateRecord {
                state: "Bihar".into(),
                ..dated("Aurangabad", date(2024, 1, 5), 10)
            },
            UpdateRecord {
                state: "Maharashtra".into(),
                ..dated("Aurangabad", date(2024, 2, 5), 30)
            },
        ];
        let spikes = migration_spikes(&rows);
        assert_eq!(spikes.len(), 2);
        assert!(spikes.iter().all(|s| s.previous.is_none() && !s.is_spike));
        assert_eq!(spikes[0].state, "Bihar");
        assert_eq!(spikes[1].state, "Maharashtra");
        assert_eq!(spikes[1].month, "2024-02");

        let v = district_velocity(&rows);
        assert_eq!(v.len(), 2);
        assert_eq!((v[0].state.as_str(), v[0].total_updates), ("Maharashtra", 30));
        assert_eq!((v[1].state.as_str(), v[1].total_updates), ("Bihar", 10));
        assert!(v.iter().all(|r| r.active_days == 1));
    }

    #[test]
    fn velocity_dense_ranks_descending() {
        let rows = vec![
            dated("Mumbai", date(2024, 1, 1), 100),
            dated("Mumbai", date(2024, 1, 10), 100),
            dated("Thane", date(2024, 3, 5), 15),
            dated("Nagpur", date(2024, 2, 1), 10),
            dated("Nagpur", date(2024, 2, 10), 190),
        ];
        let v = district_velocity(&rows);
        assert_eq!(v.len(), 3);
        assert_eq!(v[0].rank, 1);
        assert_eq!(v[1].rank, 1);
        assert_eq!(v[0].district, "Mumbai");
        assert_eq!(v[1].district, "Nagpur");
        assert_eq!(v[0].active_days, 10);
        assert_eq!(v[0].daily_velocity, 20.0);
        assert_eq!(v[2].district, "Thane");
        assert_eq!(v[2].active_days, 1);
        assert_eq!(v[2].rank, 2);
    }
}
