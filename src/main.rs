// src/main.rs

mod aggregate;
mod annotation;
mod charts;
mod classifier;
mod config;
mod geometry;
mod metrics;
mod pipeline;
mod pose_estimation;
mod timeseries;
mod types;
mod video_io;

use std::path::Path;
use tracing::{error, info};
use types::Config;

fn main() {
    std::process::exit(run_cli());
}

fn run_cli() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let program = args.first().map(String::as_str).unwrap_or("gait-analysis");
        print_result(&serde_json::json!({
            "success": false,
            "error": format!("Usage: {program} <video_path> <output_dir>"),
        }));
        return 1;
    }

    let config = match Config::load_or_default("config.yaml") {
        Ok(config) => config,
        Err(e) => {
            print_result(&serde_json::json!({
                "success": false,
                "error": format!("{e:#}"),
            }));
            return 1;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("gait_analysis={},ort=warn", config.logging.level))
        .init();

    info!("🏃 Running biomechanics analysis");

    match pipeline::run(Path::new(&args[1]), Path::new(&args[2]), &config) {
        Ok(artifacts) => {
            info!("Annotated video: {}", artifacts.video_output.display());
            info!("Metrics CSV:     {}", artifacts.csv_output.display());
            info!("Charts:          {}", artifacts.charts_dir.display());
            info!("Summary:         {}", artifacts.stats_path.display());
            print_result(&serde_json::json!({
                "success": true,
                "stats": artifacts.summary,
                "video_output": artifacts.video_output,
                "csv_output": artifacts.csv_output,
                "charts_dir": artifacts.charts_dir,
            }));
            0
        }
        Err(e) => {
            error!("Analysis failed: {e:#}");
            print_result(&serde_json::json!({
                "success": false,
                "error": format!("{e:#}"),
            }));
            1
        }
    }
}

fn print_result(value: &serde_json::Value) {
    println!("{value}");
}
