// Entry point and high-level CLI flow.
//
// - Option [1] loads the extracts (once; later calls reuse the cache).
// - Option [2] narrows every report to one state.
// - Option [3] computes all metric tables, previews them and writes the
//   CSV/JSON/GeoJSON exports.
// - Option [4] drops the cache and reads the extracts again.
use aadhaar_drishti::config::{Config, DEFAULT_CONFIG_FILE};
use aadhaar_drishti::error::Result;
use aadhaar_drishti::loader::{self, DataLoader, Filter};
use aadhaar_drishti::{geo, metrics, output, util};
use std::io::{self, Write};
use std::path::PathBuf;

struct AppState {
    loader: DataLoader,
    filter: Filter,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to main menu (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_load_summary(ds: &loader::Dataset) {
    let r = &ds.report;
    println!(
        "Processing dataset... ({} enrolment rows, {} update rows from {} files)",
        util::format_int(r.enrolment_rows),
        util::format_int(r.update_rows),
        util::format_int(r.files_read)
    );
    if r.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            util::format_int(r.parse_errors)
        );
    }
    if r.saturation_rows > 0 {
        println!("Info: {} saturation rows loaded.", util::format_int(r.saturation_rows));
    }
    if r.geo_features == 0 {
        println!("Info: no district boundaries found; map export will be skipped.");
    }
    println!();
}

fn handle_load(app: &AppState) {
    let cached = app.loader.is_loaded();
    match app.loader.dataset() {
        Ok(ds) => {
            if cached {
                println!("Data already loaded (use [4] to reload).");
            }
            print_load_summary(&ds);
        }
        Err(e) => eprintln!("Failed to load data: {}\n", e),
    }
}

fn handle_reload(app: &mut AppState) {
    match app.loader.reload() {
        Ok(ds) => print_load_summary(&ds),
        Err(e) => eprintln!("Failed to reload data: {}\n", e),
    }
}

fn handle_select_state(app: &mut AppState) {
    let ds = match app.loader.dataset() {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Failed to load data: {}\n", e);
            return;
        }
    };
    let states = ds.states();
    println!("[0] All states");
    for (i, s) in states.iter().enumerate() {
        println!("[{}] {}", i + 1, s);
    }
    let choice = read_choice();
    match choice.parse::<usize>() {
        Ok(0) => app.filter = Filter::all(),
        Ok(n) if n <= states.len() => app.filter = Filter::state(&states[n - 1]),
        _ => {
            println!("Invalid choice; filter unchanged.\n");
            return;
        }
    }
    println!(
        "Filter: {}\n",
        app.filter.state.as_deref().unwrap_or("All states")
    );
}

fn handle_generate_reports(app: &AppState) -> Result<()> {
    let ds = app.loader.dataset()?;
    if ds.is_empty() {
        println!("Error: No data found. Check the data directory and load again.\n");
        return Ok(());
    }
    // Private copy; the cached dataset is never narrowed in place.
    let view = ds.filter(&app.filter);
    let cfg = app.loader.config();
    let out: PathBuf = cfg.output_dir.clone();
    std::fs::create_dir_all(&out)?;
    let n = cfg.preview_rows;
    let scope = app.filter.state.as_deref().unwrap_or("All states");

    println!("Generating reports for {}...", scope);
    println!("Outputs saved to {}\n", out.display());

    let intensity = metrics::update_intensity(&view.updates, &view.enrolment);
    output::write_csv(&out.join("update_intensity.csv"), &intensity)?;
    output::preview_table("Update Intensity (updates per 1k enrolments)", None, &intensity, n);

    let population = metrics::population_by_district(&view.saturation, &view.enrolment);
    let mut migration = metrics::migration_velocity(&view.updates, &population);
    migration.sort_by(|a, b| {
        let va = a.migration_velocity.value().unwrap_or(f64::NEG_INFINITY);
        let vb = b.migration_velocity.value().unwrap_or(f64::NEG_INFINITY);
        vb.total_cmp(&va)
    });
    let undefined = migration
        .iter()
        .filter(|r| !r.migration_velocity.is_defined())
        .count();
    if undefined > 0 {
        log::warn!("{} districts have address updates but no population figure", undefined);
    }
    output::write_csv(&out.join("migration_velocity.csv"), &migration)?;
    output::preview_table(
        "Migration Velocity (address updates per 1k population)",
        Some("Top districts by inflow"),
        &migration,
        n,
    );

    let map = geo::merge_for_map(
        &view.geo,
        &migration,
        |r| r.district.as_str(),
        |r| r.migration_velocity.value(),
    );
    if map.is_empty() {
        println!("No geospatial data available for the selected filters.\n");
    } else {
        let unmatched = map.iter().filter(|f| f.value.is_none()).count();
        if unmatched > 0 {
            log::warn!("{} districts on the map have no migration value", unmatched);
        }
        output::write_json(
            &out.join("migration_map.geojson"),
            &geo::to_feature_collection(&map, "Migration_Velocity"),
        )?;
    }

    let mut dggi = metrics::digital_gender_gap(&view.updates);
    dggi.sort_by(|a, b| {
        let va = a.female_share.value().unwrap_or(f64::INFINITY);
        let vb = b.female_share.value().unwrap_or(f64::INFINITY);
        va.total_cmp(&vb)
    });
    output::write_csv(&out.join("gender_gap.csv"), &dggi)?;
    output::preview_table(
        "Digital Gender Gap Index",
        Some("Female share of mobile updates; 0.50 is parity"),
        &dggi,
        n,
    );

    let (volume_scorer, rejection_scorer) = cfg.outlier_scorers();
    let anomalies = metrics::detect_anomalies(&view.enrolment, volume_scorer.as_ref());
    output::write_csv(&out.join("enrolment_anomalies.csv"), &anomalies)?;
    output::preview_table(
        "Anomalous Enrolment Volumes",
        Some(volume_scorer.name()),
        &anomalies,
        n,
    );

    let rejections = metrics::detect_rejection_anomalies(&view.enrolment, rejection_scorer.as_ref());
    output::write_csv(&out.join("rejection_anomalies.csv"), &rejections)?;
    output::preview_table("High Rejection Clusters", None, &rejections, n);

    let upd_seasons = metrics::seasonal_patterns(&view.updates);
    let enr_seasons = metrics::seasonal_patterns(&view.enrolment);
    output::write_csv(&out.join("seasonal_updates.csv"), &upd_seasons)?;
    output::write_csv(&out.join("seasonal_enrolment.csv"), &enr_seasons)?;
    output::preview_table("Seasonal Update Pattern", None, &upd_seasons, n);
    output::preview_table("Seasonal Enrolment Pattern", None, &enr_seasons, n);

    let spikes = metrics::migration_spikes(&view.updates);
    output::write_csv(&out.join("migration_spikes.csv"), &spikes)?;
    let flagged: Vec<_> = spikes.into_iter().filter(|s| s.is_spike).collect();
    output::preview_table(
        "Migration Spikes",
        Some(">100% month-over-month increase"),
        &flagged,
        n,
    );

    let velocity = metrics::district_velocity(&view.updates);
    output::write_csv(&out.join("district_velocity.csv"), &velocity)?;
    output::preview_table("District Update Velocity", None, &velocity, n);

    let clusters = metrics::geographic_clusters(&view.updates);
    output::write_csv(&out.join("state_activity.csv"), &clusters.states)?;
    output::write_csv(&out.join("hotspot_districts.csv"), &clusters.hotspots)?;
    let note = format!(
        "States above the 90th percentile ({})",
        util::format_number(clusters.threshold, 0)
    );
    output::preview_table("High Activity Clusters", Some(&note), &clusters.hotspots, n);

    let transition = metrics::age_transition(&view.enrolment);
    output::write_csv(&out.join("age_transition.csv"), &transition)?;
    output::preview_table("MBU Demand by District", None, &transition, n);

    let summary = metrics::kpi_summary(&view);
    output::write_json(&out.join("summary.json"), &summary)?;
    println!("Summary Stats (summary.json):");
    println!("  Total enrolments: {}", util::format_int(summary.total_enrolments));
    println!("  Total updates:    {}", util::format_int(summary.total_updates));
    println!("  Avg. saturation:  {}%", summary.avg_saturation_pct);
    println!("  Rejection rate:   {}%", summary.rejection_rate_pct);
    println!("  Enrolment/update correlation: {}", summary.enrolment_update_correlation);
    for (label, v) in summary.age_distribution.entries() {
        println!("  {:<11} {}", label, util::format_int(v));
    }
    println!(
        "  Projected MBU demand: {}",
        util::format_number(summary.mbu_forecast.total, 0)
    );
    println!();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let mut app = AppState {
        loader: DataLoader::new(config),
        filter: Filter::all(),
    };

    loop {
        println!("Aadhaar-Drishti");
        println!("[1] Load data");
        println!("[2] Select state filter");
        println!("[3] Generate reports");
        println!("[4] Reload data");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(&app),
            "2" => handle_select_state(&mut app),
            "3" => {
                println!();
                if let Err(e) = handle_generate_reports(&app) {
                    eprintln!("Report error: {}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "4" => handle_reload(&mut app),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-5.\n"),
        }
    }
}
