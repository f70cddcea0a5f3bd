use crate::config::Config;
use crate::error::Result;
use crate::geo::{load_geojson, GeoCollection};
use crate::types::{
    EnrolmentRecord, Gender, RawEnrolmentRow, RawSaturationRow, RawUpdateRow, SaturationRecord,
    UpdateRecord, UpdateType,
};
use crate::util::{parse_count, parse_date_safe, parse_f64_safe};
use csv::ReaderBuilder;
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub files_read: usize,
    pub enrolment_rows: usize,
    pub update_rows: usize,
    pub saturation_rows: usize,
    pub geo_features: usize,
    pub parse_errors: usize,
}

/// Everything one session works on. Shared read-only behind an `Arc`;
/// narrowing goes through [`Dataset::filter`], which copies.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub enrolment: Vec<EnrolmentRecord>,
    pub updates: Vec<UpdateRecord>,
    pub saturation: Vec<SaturationRecord>,
    pub geo: GeoCollection,
    pub report: LoadReport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub state: Option<String>,
    pub district: Option<String>,
}

impl Filter {
    pub fn all() -> Filter {
        Filter::default()
    }

    pub fn state(state: &str) -> Filter {
        Filter {
            state: Some(state.to_string()),
            district: None,
        }
    }

    fn matches(&self, state: &str, district: &str) -> bool {
        self.state.as_deref().map_or(true, |s| s == state)
            && self.district.as_deref().map_or(true, |d| d == district)
    }
}

impl Dataset {
    pub fn filter(&self, filter: &Filter) -> Dataset {
        let geo = match &filter.state {
            Some(state) => self.geo.for_state(state),
            None => self.geo.clone(),
        };
        let geo = match &filter.district {
            Some(d) => GeoCollection {
                features: geo.features.into_iter().filter(|f| &f.district == d).collect(),
            },
            None => geo,
        };
        Dataset {
            enrolment: self
                .enrolment
                .iter()
                .filter(|r| filter.matches(&r.state, &r.district))
                .cloned()
                .collect(),
            updates: self
                .updates
                .iter()
                .filter(|r| filter.matches(&r.state, &r.district))
                .cloned()
                .collect(),
            saturation: self
                .saturation
                .iter()
                .filter(|r| filter.matches(&r.state, &r.district))
                .cloned()
                .collect(),
            geo,
            report: self.report.clone(),
        }
    }

    /// Distinct states across enrolment, updates and saturation, sorted.
    pub fn states(&self) -> Vec<String> {
        let mut set: BTreeSet<&str> = BTreeSet::new();
        set.extend(self.enrolment.iter().map(|r| r.state.as_str()));
        set.extend(self.updates.iter().map(|r| r.state.as_str()));
        set.extend(self.saturation.iter().map(|r| r.state.as_str()));
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct `(state, district)` pairs; a district name shared by two
    /// states counts twice.
    pub fn districts(&self) -> Vec<(String, String)> {
        let mut set: BTreeSet<(&str, &str)> = BTreeSet::new();
        set.extend(self.enrolment.iter().map(|r| (r.state.as_str(), r.district.as_str())));
        set.extend(self.updates.iter().map(|r| (r.state.as_str(), r.district.as_str())));
        set.into_iter()
            .map(|(s, d)| (s.to_string(), d.to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enrolment.is_empty() && self.updates.is_empty()
    }
}

/// Loads the extracts once and hands out the same `Arc` until invalidated.
pub struct DataLoader {
    config: Config,
    cache: OnceCell<Arc<Dataset>>,
}

impl DataLoader {
    pub fn new(config: Config) -> Self {
        DataLoader {
            config,
            cache: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn dataset(&self) -> Result<Arc<Dataset>> {
        self.cache
            .get_or_try_init(|| load_all(&self.config).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            log::info!("Dropped cached dataset");
        }
    }

    pub fn reload(&mut self) -> Result<Arc<Dataset>> {
        self.invalidate();
        self.dataset()
    }
}

/// Read every source named by `config`. Missing folders and files give
/// empty tables; only unreadable files and malformed GeoJSON are errors.
pub fn load_all(config: &Config) -> Result<Dataset> {
    let mut report = LoadReport::default();

    let mut enrolment = Vec::new();
    for path in discover_csv(&config.enrolment_path()) {
        enrolment.extend(read_enrolment(&path, &mut report)?);
    }
    let legacy_enrolment = config.legacy_path("enrolment_data.csv");
    if legacy_enrolment.exists() {
        enrolment.extend(read_enrolment(&legacy_enrolment, &mut report)?);
    }
    if enrolment.is_empty() {
        log::warn!("No enrolment data found under {}", config.data_dir.display());
    }

    let mut updates = Vec::new();
    for path in discover_csv(&config.demographic_path()) {
        updates.extend(read_updates(&path, Some(UpdateType::Demographic), &mut report)?);
    }
    for path in discover_csv(&config.biometric_path()) {
        updates.extend(read_updates(&path, Some(UpdateType::Biometric), &mut report)?);
    }
    let legacy_updates = config.legacy_path("update_data.csv");
    if legacy_updates.exists() {
        updates.extend(read_updates(&legacy_updates, None, &mut report)?);
    }
    if updates.is_empty() {
        log::warn!("No update data found under {}", config.data_dir.display());
    }

    let saturation_path = config.legacy_path("saturation_data.csv");
    let saturation = if saturation_path.exists() {
        read_saturation(&saturation_path, &mut report)?
    } else {
        Vec::new()
    };

    let geo = load_geojson(&config.geojson_path())?;

    report.enrolment_rows = enrolment.len();
    report.update_rows = updates.len();
    report.saturation_rows = saturation.len();
    report.geo_features = geo.len();
    log::info!(
        "Loaded {} enrolment rows, {} update rows, {} saturation rows, {} districts with geometry from {} files ({} rows skipped)",
        report.enrolment_rows,
        report.update_rows,
        report.saturation_rows,
        report.geo_features,
        report.files_read,
        report.parse_errors
    );

    Ok(Dataset {
        enrolment,
        updates,
        saturation,
        geo,
        report,
    })
}

/// Every `*.csv` under `dir`, including nested part folders, sorted by
/// path. A missing directory is just an empty list.
pub fn discover_csv(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        log::debug!("Skipping missing directory {}", dir.display());
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn label(s: Option<String>, fallback: &str) -> String {
    let s = s.map(|s| s.trim().to_string()).unwrap_or_default();
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

pub fn read_enrolment(path: &Path, report: &mut LoadReport) -> Result<Vec<EnrolmentRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    report.files_read += 1;
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize::<RawEnrolmentRow>() {
        let row = match result {
            Ok(r) => r,
            Err(_) => { skipped += 1; continue; }
        };
        let date = match parse_date_safe(row.date.as_deref()) {
            Some(d) => d,
            None => { skipped += 1; continue; }
        };

        let (mut age_0_5, mut age_5_17, mut age_18_plus) = (
            parse_count(row.age_0_5.as_deref()),
            parse_count(row.age_5_17.as_deref()),
            parse_count(row.age_18_greater.as_deref()),
        );
        // Legacy rollup: one bucket per row, labelled by `Age_Group`.
        if let Some(group) = row.age_group.as_deref() {
            let n = parse_count(row.enrolment_count.as_deref());
            match group.trim() {
                "0-5" => age_0_5 = age_0_5.saturating_add(n),
                "5-18" | "5-17" => age_5_17 = age_5_17.saturating_add(n),
                _ => age_18_plus = age_18_plus.saturating_add(n),
            }
        }

        out.push(EnrolmentRecord {
            state: label(row.state, "Unknown"),
            district: label(row.district, "Unknown"),
            date,
            age_0_5,
            age_5_17,
            age_18_plus,
            rejection_count: parse_count(row.rejection_count.as_deref()),
        });
    }

    report.parse_errors += skipped;
    log::debug!("{}: {} enrolment rows, {} skipped", path.display(), out.len(), skipped);
    Ok(out)
}

/// `kind` tags the whole file (demographic/biometric folders); `None` means
/// the file carries its own `Update_Type` column.
pub fn read_updates(
    path: &Path,
    kind: Option<UpdateType>,
    report: &mut LoadReport,
) -> Result<Vec<UpdateRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    report.files_read += 1;
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize::<RawUpdateRow>() {
        let row = match result {
            Ok(r) => r,
            Err(_) => { skipped += 1; continue; }
        };
        let date = match parse_date_safe(row.date.as_deref()) {
            Some(d) => d,
            None => { skipped += 1; continue; }
        };
        let update_type = match kind.or_else(|| row.update_type.as_deref().and_then(UpdateType::parse)) {
            Some(t) => t,
            None => { skipped += 1; continue; }
        };

        let age_5_17 = parse_count(row.age_5_17.as_deref());
        let age_17_plus = parse_count(row.age_17_plus.as_deref());
        let count = match row.count.as_deref() {
            Some(c) if !c.trim().is_empty() => parse_count(Some(c)),
            _ => age_5_17.saturating_add(age_17_plus),
        };

        out.push(UpdateRecord {
            state: label(row.state, "Unknown"),
            district: label(row.district, "Unknown"),
            date,
            update_type,
            gender: row.gender.as_deref().and_then(Gender::parse),
            count,
            age_5_17,
            age_17_plus,
        });
    }

    report.parse_errors += skipped;
    log::debug!("{}: {} update rows, {} skipped", path.display(), out.len(), skipped);
    Ok(out)
}

pub fn read_saturation(path: &Path, report: &mut LoadReport) -> Result<Vec<SaturationRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    report.files_read += 1;
    let mut out = Vec::new();

    for result in rdr.deserialize::<RawSaturationRow>() {
        let row = match result {
            Ok(r) => r,
            Err(_) => { report.parse_errors += 1; continue; }
        };
        out.push(SaturationRecord {
            state: label(row.state, "Unknown"),
            district: label(row.district, "Unknown"),
            projected_population: parse_f64_safe(row.projected_population.as_deref()).unwrap_or(0.0),
            aadhaar_assigned: parse_f64_safe(row.aadhaar_assigned.as_deref()).unwrap_or(0.0),
            saturation_percentage: parse_f64_safe(row.saturation_percentage.as_deref()).unwrap_or(0.0),
        });
    }
    Ok(out)
}
