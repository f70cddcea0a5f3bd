// Runtime configuration.
//
// Everything is optional: with no `drishti.toml` the tool looks for the
// extract folders next to the working directory, which is how the data
// packages are normally unpacked.
use crate::error::{DrishtiError, Result};
use crate::metrics::{IsolationForest, OutlierScorer, ZScoreRule};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "drishti.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlierMethod {
    IsolationForest,
    ZScore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub enrolment_dir: String,
    pub demographic_dir: String,
    pub biometric_dir: String,
    /// Folder holding the older single-file extracts (`enrolment_data.csv`,
    /// `update_data.csv`, `saturation_data.csv`) and the district GeoJSON.
    pub legacy_dir: String,
    pub geojson_file: String,
    pub output_dir: PathBuf,
    pub outlier_method: OutlierMethod,
    pub anomaly_contamination: f64,
    pub rejection_contamination: f64,
    pub zscore_threshold: f64,
    pub seed: u64,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            enrolment_dir: "api_data_aadhar_enrolment".to_string(),
            demographic_dir: "api_data_aadhar_demographic".to_string(),
            biometric_dir: "api_data_aadhar_biometric".to_string(),
            legacy_dir: "data".to_string(),
            geojson_file: "india_districts.geojson".to_string(),
            output_dir: PathBuf::from("output"),
            outlier_method: OutlierMethod::IsolationForest,
            anomaly_contamination: 0.05,
            rejection_contamination: 0.10,
            zscore_threshold: 2.5,
            seed: 42,
            preview_rows: 5,
        }
    }
}

impl Config {
    /// Read `path` if it exists, fall back to defaults otherwise, then apply
    /// the `DRISHTI_DATA_DIR` / `DRISHTI_OUTPUT_DIR` overrides.
    pub fn load(path: &Path) -> Result<Config> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            log::info!("Using config {}", path.display());
            Config::from_toml(&text)?
        } else {
            Config::default()
        };
        if let Ok(dir) = std::env::var("DRISHTI_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DRISHTI_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, c) in [
            ("anomaly_contamination", self.anomaly_contamination),
            ("rejection_contamination", self.rejection_contamination),
        ] {
            if !(c > 0.0 && c <= 0.5) {
                return Err(DrishtiError::Config(format!(
                    "{} must be in (0, 0.5], got {}",
                    name, c
                )));
            }
        }
        if !(self.zscore_threshold > 0.0) {
            return Err(DrishtiError::Config(format!(
                "zscore_threshold must be positive, got {}",
                self.zscore_threshold
            )));
        }
        Ok(())
    }

    /// Scorer for the enrolment-volume scan and the rejection-rate scan.
    pub fn outlier_scorers(&self) -> (Box<dyn OutlierScorer>, Box<dyn OutlierScorer>) {
        match self.outlier_method {
            OutlierMethod::IsolationForest => (
                Box::new(IsolationForest::new(self.anomaly_contamination, self.seed)),
                Box::new(IsolationForest::new(self.rejection_contamination, self.seed)),
            ),
            OutlierMethod::ZScore => {
                let rule = ZScoreRule {
                    threshold: self.zscore_threshold,
                };
                (Box::new(rule.clone()), Box::new(rule))
            }
        }
    }

    pub fn enrolment_path(&self) -> PathBuf {
        self.data_dir.join(&self.enrolment_dir)
    }

    pub fn demographic_path(&self) -> PathBuf {
        self.data_dir.join(&self.demographic_dir)
    }

    pub fn biometric_path(&self) -> PathBuf {
        self.data_dir.join(&self.biometric_dir)
    }

    pub fn legacy_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(&self.legacy_dir).join(file)
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.legacy_path(&self.geojson_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.enrolment_dir, "api_data_aadhar_enrolment");
        assert_eq!(config.seed, 42);
        assert!((config.anomaly_contamination - 0.05).abs() < 1e-12);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = Config::from_toml("data_dir = \"/srv/uidai\"\npreview_rows = 10\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/uidai"));
        assert_eq!(config.preview_rows, 10);
        assert_eq!(
            config.geojson_path(),
            PathBuf::from("/srv/uidai/data/india_districts.geojson")
        );
    }

    #[test]
    fn outlier_method_selects_scorer() {
        let config = Config::from_toml("outlier_method = \"z-score\"").unwrap();
        assert_eq!(config.outlier_method, OutlierMethod::ZScore);
        let (volume, rejection) = config.outlier_scorers();
        assert_eq!(volume.name(), "z-score");
        assert_eq!(rejection.min_samples(), 3);

        let (volume, _) = Config::default().outlier_scorers();
        assert_eq!(volume.name(), "isolation-forest");
    }

    #[test]
    fn out_of_range_contamination_is_rejected() {
        let err = Config::from_toml("anomaly_contamination = 0.9").unwrap_err();
        assert!(matches!(err, DrishtiError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.biometric_dir, "api_data_aadhar_biometric");
    }
}
