//! Enrolment and update analytics for Aadhaar administrative extracts.
//!
//! [`loader`] reads the CSV extracts into typed records once per session,
//! [`metrics`] turns them into derived tables, and [`output`] writes those
//! tables out for the charting layer.
pub mod config;
pub mod error;
pub mod geo;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod types;
pub mod util;
