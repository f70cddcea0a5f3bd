use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

// The API extracts use lower-case headers (`state`, `district`, `date`), the
// older generated files use `State`, `District`, `Month`. Aliases fold both
// onto the same field so the loader never has to rename columns.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEnrolmentRow {
    #[serde(alias = "State")]
    pub state: Option<String>,
    #[serde(alias = "District")]
    pub district: Option<String>,
    #[serde(alias = "Month", alias = "Date")]
    pub date: Option<String>,
    pub age_0_5: Option<String>,
    pub age_5_17: Option<String>,
    #[serde(alias = "age_18_plus")]
    pub age_18_greater: Option<String>,
    /// Legacy rollups carry one bucket label plus a count instead of
    /// three bucket columns.
    #[serde(rename = "Age_Group")]
    pub age_group: Option<String>,
    #[serde(rename = "Enrolment_Count")]
    pub enrolment_count: Option<String>,
    #[serde(rename = "Rejection_Count", alias = "rejection_count")]
    pub rejection_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawUpdateRow {
    #[serde(alias = "State")]
    pub state: Option<String>,
    #[serde(alias = "District")]
    pub district: Option<String>,
    #[serde(alias = "Month", alias = "Date")]
    pub date: Option<String>,
    #[serde(alias = "demo_age_5_17", alias = "bio_age_5_17")]
    pub age_5_17: Option<String>,
    #[serde(alias = "demo_age_17_", alias = "bio_age_17_")]
    pub age_17_plus: Option<String>,
    #[serde(rename = "Update_Type")]
    pub update_type: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Count")]
    pub count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSaturationRow {
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "District")]
    pub district: Option<String>,
    #[serde(rename = "Projected_Pop_2025", alias = "Projected_Population")]
    pub projected_population: Option<String>,
    #[serde(rename = "Aadhaar_Assigned")]
    pub aadhaar_assigned: Option<String>,
    #[serde(rename = "Saturation_Percentage")]
    pub saturation_percentage: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum UpdateType {
    Address,
    Mobile,
    Biometric,
    Demographic,
    #[serde(rename = "DOB")]
    Dob,
    Name,
}

impl UpdateType {
    pub fn parse(s: &str) -> Option<UpdateType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "address" => Some(UpdateType::Address),
            "mobile" => Some(UpdateType::Mobile),
            "biometric" => Some(UpdateType::Biometric),
            "demographic" => Some(UpdateType::Demographic),
            "dob" => Some(UpdateType::Dob),
            "name" => Some(UpdateType::Name),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateType::Address => "Address",
            UpdateType::Mobile => "Mobile",
            UpdateType::Biometric => "Biometric",
            UpdateType::Demographic => "Demographic",
            UpdateType::Dob => "DOB",
            UpdateType::Name => "Name",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    Female,
    Male,
    Transgender,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Gender> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Some(Gender::Female),
            "male" | "m" => Some(Gender::Male),
            "transgender" | "t" => Some(Gender::Transgender),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrolmentRecord {
    pub state: String,
    pub district: String,
    pub date: NaiveDate,
    pub age_0_5: u64,
    pub age_5_17: u64,
    pub age_18_plus: u64,
    pub rejection_count: u64,
}

impl EnrolmentRecord {
    pub fn enrolment_count(&self) -> u64 {
        self.age_0_5
            .saturating_add(self.age_5_17)
            .saturating_add(self.age_18_plus)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub state: String,
    pub district: String,
    pub date: NaiveDate,
    pub update_type: UpdateType,
    pub gender: Option<Gender>,
    pub count: u64,
    pub age_5_17: u64,
    pub age_17_plus: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaturationRecord {
    pub state: String,
    pub district: String,
    pub projected_population: f64,
    pub aadhaar_assigned: f64,
    pub saturation_percentage: f64,
}

/// Result of a division whose denominator may be zero.
///
/// Serializes as the number, or as an empty cell / `null` when undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Value(f64),
    InsufficientData,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Ratio {
        if denominator == 0.0 || !denominator.is_finite() {
            return Ratio::InsufficientData;
        }
        let v = numerator / denominator;
        if v.is_finite() {
            Ratio::Value(v)
        } else {
            Ratio::InsufficientData
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Value(v) => Some(v),
            Ratio::InsufficientData => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Ratio::Value(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Ratio {
        match self {
            Ratio::Value(v) => Ratio::Value(f(v)),
            Ratio::InsufficientData => Ratio::InsufficientData,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Value(v) => write!(f, "{:.2}", v),
            Ratio::InsufficientData => f.write_str("n/a"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Value(v) => serializer.serialize_some(v),
            Ratio::InsufficientData => serializer.serialize_none(),
        }
    }
}

fn display_f2(v: &f64) -> String {
    format!("{:.2}", v)
}

fn display_opt<T: fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct IntensityRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Total_Updates")]
    #[tabled(rename = "Total_Updates")]
    pub total_updates: u64,
    #[serde(rename = "Enrolment_Count")]
    #[tabled(rename = "Enrolment_Count")]
    pub enrolment_count: u64,
    #[serde(rename = "Update_Intensity")]
    #[tabled(rename = "Update_Intensity", display_with = "display_f2")]
    pub update_intensity: f64,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct AgeDistribution {
    pub age_0_5: u64,
    pub age_5_17: u64,
    pub age_18_plus: u64,
}

impl AgeDistribution {
    pub fn entries(&self) -> [(&'static str, u64); 3] {
        [
            ("0-5 Years", self.age_0_5),
            ("5-17 Years", self.age_5_17),
            ("18+ Years", self.age_18_plus),
        ]
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MigrationRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Address_Updates")]
    #[tabled(rename = "Address_Updates")]
    pub address_updates: u64,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population", display_with = "display_f2")]
    pub population: f64,
    #[serde(rename = "Migration_Velocity")]
    #[tabled(rename = "Migration_Velocity")]
    pub migration_velocity: Ratio,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct GenderGapRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Female")]
    #[tabled(rename = "Female")]
    pub female: u64,
    #[serde(rename = "Male")]
    #[tabled(rename = "Male")]
    pub male: u64,
    #[serde(rename = "Female_Share")]
    #[tabled(rename = "Female_Share")]
    pub female_share: Ratio,
    #[serde(rename = "Male_Share")]
    #[tabled(rename = "Male_Share")]
    pub male_share: Ratio,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AnomalyRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Enrolment_Count")]
    #[tabled(rename = "Enrolment_Count")]
    pub enrolment_count: u64,
    #[serde(rename = "Rejection_Rate")]
    #[tabled(rename = "Rejection_Rate")]
    pub rejection_rate: Ratio,
    #[serde(rename = "Times_Median")]
    #[tabled(rename = "Times_Median")]
    pub times_median: Ratio,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SeasonRow {
    #[serde(rename = "Season")]
    #[tabled(rename = "Season")]
    pub season: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: u64,
    #[serde(rename = "Months")]
    #[tabled(rename = "Months")]
    pub months: usize,
    #[serde(rename = "Monthly_Average")]
    #[tabled(rename = "Monthly_Average", display_with = "display_f2")]
    pub monthly_average: f64,
    #[serde(rename = "Deviation_Pct")]
    #[tabled(rename = "Deviation_Pct")]
    pub deviation_pct: Ratio,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SpikeRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: u64,
    #[serde(rename = "Previous")]
    #[tabled(rename = "Previous", display_with = "display_opt")]
    pub previous: Option<u64>,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change", display_with = "display_opt")]
    pub change: Option<i64>,
    #[serde(rename = "Pct_Change")]
    #[tabled(rename = "Pct_Change")]
    pub pct_change: Ratio,
    #[serde(rename = "Is_Spike")]
    #[tabled(rename = "Is_Spike")]
    pub is_spike: bool,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct VelocityRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Total_Updates")]
    #[tabled(rename = "Total_Updates")]
    pub total_updates: u64,
    #[serde(rename = "First_Date")]
    #[tabled(rename = "First_Date")]
    pub first_date: NaiveDate,
    #[serde(rename = "Last_Date")]
    #[tabled(rename = "Last_Date")]
    pub last_date: NaiveDate,
    #[serde(rename = "Active_Days")]
    #[tabled(rename = "Active_Days")]
    pub active_days: i64,
    #[serde(rename = "Daily_Velocity")]
    #[tabled(rename = "Daily_Velocity", display_with = "display_f2")]
    pub daily_velocity: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct StateActivityRow {
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Total_Updates")]
    #[tabled(rename = "Total_Updates")]
    pub total_updates: u64,
    #[serde(rename = "High_Activity")]
    #[tabled(rename = "High_Activity")]
    pub high_activity: bool,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct HotspotDistrictRow {
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "Total_Updates")]
    #[tabled(rename = "Total_Updates")]
    pub total_updates: u64,
    #[serde(rename = "State_Share")]
    #[tabled(rename = "State_Share")]
    pub state_share: Ratio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    pub threshold: f64,
    pub states: Vec<StateActivityRow>,
    pub hotspots: Vec<HotspotDistrictRow>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct MbuForecast {
    pub from_age_0_5: f64,
    pub from_age_5_17: f64,
    pub from_age_18_plus: f64,
    pub total: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AgeTransitionRow {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "State")]
    #[tabled(rename = "State")]
    pub state: String,
    #[serde(rename = "Age_0_5")]
    #[tabled(rename = "Age_0_5")]
    pub age_0_5: u64,
    #[serde(rename = "Age_5_17")]
    #[tabled(rename = "Age_5_17")]
    pub age_5_17: u64,
    #[serde(rename = "Age_18_Plus")]
    #[tabled(rename = "Age_18_Plus")]
    pub age_18_plus: u64,
    #[serde(rename = "Projected_MBU")]
    #[tabled(rename = "Projected_MBU", display_with = "display_f2")]
    pub projected_mbu: f64,
    #[serde(rename = "MBU_Share")]
    #[tabled(rename = "MBU_Share")]
    pub mbu_share: Ratio,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_enrolments: u64,
    pub total_updates: u64,
    pub total_states: usize,
    pub total_districts: usize,
    pub avg_saturation_pct: Ratio,
    pub rejection_rate_pct: Ratio,
    pub enrolment_update_correlation: Ratio,
    pub age_distribution: AgeDistribution,
    pub mbu_forecast: MbuForecast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(Ratio::of(3.0, 4.0), Ratio::Value(0.75));
        assert_eq!(Ratio::of(0.0, 0.0), Ratio::InsufficientData);
        assert_eq!(Ratio::of(5.0, 0.0), Ratio::InsufficientData);
        assert_eq!(Ratio::of(1.0, 4.0).map(|v| v * 100.0), Ratio::Value(25.0));
        assert_eq!(Ratio::InsufficientData.to_string(), "n/a");
        assert_eq!(Ratio::Value(0.5).to_string(), "0.50");
    }

    #[test]
    fn ratio_serializes_as_number_or_null() {
        let json = serde_json::to_string(&[Ratio::Value(1.5), Ratio::InsufficientData]).unwrap();
        assert_eq!(json, "[1.5,null]");
    }

    #[test]
    fn update_type_labels() {
        assert_eq!(UpdateType::parse(" mobile "), Some(UpdateType::Mobile));
        assert_eq!(UpdateType::parse("DOB"), Some(UpdateType::Dob));
        assert_eq!(UpdateType::parse("Passport"), None);
        assert_eq!(UpdateType::Dob.to_string(), "DOB");
        assert_eq!(Gender::parse("F"), Some(Gender::Female));
    }

    #[test]
    fn enrolment_count_sums_buckets() {
        let r = EnrolmentRecord {
            state: "Kerala".into(),
            district: "Thrissur".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            age_0_5: 3,
            age_5_17: 4,
            age_18_plus: 5,
            rejection_count: 0,
        };
        assert_eq!(r.enrolment_count(), 12);

        let huge = EnrolmentRecord {
            age_0_5: u64::MAX,
            age_5_17: u64::MAX,
            ..r
        };
        assert_eq!(huge.enrolment_count(), u64::MAX);
    }
}
