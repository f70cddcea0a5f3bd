use super::{district_key, district_totals, DistrictKey};
use crate::types::{
    AgeDistribution, AgeTransitionRow, EnrolmentRecord, Gender, GenderGapRow, IntensityRow,
    MbuForecast, MigrationRow, Ratio, SaturationRecord, UpdateRecord, UpdateType,
};
use std::collections::BTreeMap;

/// Share of each enrolment bucket expected to come back for a mandatory
/// biometric update: 0-5, 5-17, 18+.
pub const MBU_RATES: [f64; 3] = [0.20, 0.10, 0.10];

/// Updates per 1,000 enrolments, per district.
///
/// Enrolment joins on the district's own state as well as its name.
/// Districts without enrolment (or with zero) divide by 1, so the intensity
/// is then just 1000 × the update count.
pub fn update_intensity(updates: &[UpdateRecord], enrolment: &[EnrolmentRecord]) -> Vec<IntensityRow> {
    let upd = district_totals(updates);
    let enr = district_totals(enrolment);

    upd.into_iter()
        .map(|(key, total_updates)| {
            let enrolment_count = match enr.get(&key).copied() {
                Some(0) | None => 1,
                Some(n) => n,
            };
            let (state, district) = key;
            IntensityRow {
                update_intensity: total_updates as f64 / enrolment_count as f64 * 1000.0,
                district,
                state,
                total_updates,
                enrolment_count,
            }
        })
        .collect()
}

pub fn age_distribution(enrolment: &[EnrolmentRecord]) -> AgeDistribution {
    enrolment.iter().fold(
        AgeDistribution {
            age_0_5: 0,
            age_5_17: 0,
            age_18_plus: 0,
        },
        |mut acc, r| {
            acc.age_0_5 = acc.age_0_5.saturating_add(r.age_0_5);
            acc.age_5_17 = acc.age_5_17.saturating_add(r.age_5_17);
            acc.age_18_plus = acc.age_18_plus.saturating_add(r.age_18_plus);
            acc
        },
    )
}

/// Population per district: projected population from the saturation table
/// when there is one, enrolment volume otherwise.
pub fn population_by_district(
    saturation: &[SaturationRecord],
    enrolment: &[EnrolmentRecord],
) -> BTreeMap<DistrictKey, f64> {
    if saturation.is_empty() {
        return district_totals(enrolment)
            .into_iter()
            .map(|(key, total)| (key, total as f64))
            .collect();
    }
    let mut map: BTreeMap<DistrictKey, f64> = BTreeMap::new();
    for r in saturation {
        *map.entry((r.state.clone(), r.district.clone())).or_default() += r.projected_population;
    }
    map
}

/// Address updates per 1,000 residents (M_v).
pub fn migration_velocity(
    updates: &[UpdateRecord],
    population: &BTreeMap<DistrictKey, f64>,
) -> Vec<MigrationRow> {
    let address = updates.iter().filter(|r| r.update_type == UpdateType::Address);
    district_totals(address)
        .into_iter()
        .map(|(key, total)| {
            let population = population.get(&key).copied().unwrap_or(0.0);
            let (state, district) = key;
            MigrationRow {
                migration_velocity: Ratio::of(total as f64, population).map(|v| v * 1000.0),
                district,
                state,
                address_updates: total,
                population,
            }
        })
        .collect()
}

/// Digital Gender Gap Index: female and male share of mobile-number updates.
///
/// Rows without a recorded gender, or `Transgender`, count toward neither
/// side. A district whose mobile updates are all zero gets
/// `InsufficientData` for both shares.
pub fn digital_gender_gap(updates: &[UpdateRecord]) -> Vec<GenderGapRow> {
    #[derive(Default)]
    struct Acc {
        female: u64,
        male: u64,
    }
    let mut map: BTreeMap<DistrictKey, Acc> = BTreeMap::new();
    for r in updates.iter().filter(|r| r.update_type == UpdateType::Mobile) {
        let e = map.entry(district_key(r)).or_default();
        match r.gender {
            Some(Gender::Female) => e.female = e.female.saturating_add(r.count),
            Some(Gender::Male) => e.male = e.male.saturating_add(r.count),
            _ => {}
        }
    }
    map.into_iter()
        .map(|((state, district), acc)| {
            let both = acc.female as f64 + acc.male as f64;
            GenderGapRow {
                district,
                state,
                female: acc.female,
                male: acc.male,
                female_share: Ratio::of(acc.female as f64, both),
                male_share: Ratio::of(acc.male as f64, both),
            }
        })
        .collect()
}

fn projected_mbu(age_0_5: u64, age_5_17: u64, age_18_plus: u64) -> [f64; 3] {
    [
        age_0_5 as f64 * MBU_RATES[0],
        age_5_17 as f64 * MBU_RATES[1],
        age_18_plus as f64 * MBU_RATES[2],
    ]
}

/// Expected mandatory biometric update demand from current enrolment.
pub fn mbu_forecast(enrolment: &[EnrolmentRecord]) -> MbuForecast {
    let ages = age_distribution(enrolment);
    let [a, b, c] = projected_mbu(ages.age_0_5, ages.age_5_17, ages.age_18_plus);
    MbuForecast {
        from_age_0_5: a,
        from_age_5_17: b,
        from_age_18_plus: c,
        total: a + b + c,
    }
}

/// Per-district MBU projection and its share of the district's enrolment,
/// largest projection first.
pub fn age_transition(enrolment: &[EnrolmentRecord]) -> Vec<AgeTransitionRow> {
    let mut map: BTreeMap<DistrictKey, AgeTransitionRow> = BTreeMap::new();
    for r in enrolment {
        let e = map
            .entry(district_key(r))
            .or_insert_with(|| AgeTransitionRow {
                district: r.district.clone(),
                state: r.state.clone(),
                age_0_5: 0,
                age_5_17: 0,
                age_18_plus: 0,
                projected_mbu: 0.0,
                mbu_share: Ratio::InsufficientData,
            });
        e.age_0_5 = e.age_0_5.saturating_add(r.age_0_5);
        e.age_5_17 = e.age_5_17.saturating_add(r.age_5_17);
        e.age_18_plus = e.age_18_plus.saturating_add(r.age_18_plus);
    }
    let mut rows: Vec<AgeTransitionRow> = map
        .into_values()
        .map(|mut row| {
            row.projected_mbu = projected_mbu(row.age_0_5, row.age_5_17, row.age_18_plus)
                .iter()
                .sum();
            let enrolled = row.age_0_5 as f64 + row.age_5_17 as f64 + row.age_18_plus as f64;
            row.mbu_share = Ratio::of(row.projected_mbu, enrolled);
            row
        })
        .collect();
    rows.sort_by(|a, b| b.projected_mbu.total_cmp(&a.projected_mbu));
    rows
}
