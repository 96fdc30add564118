// src/aggregate.rs

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::charts;
use crate::timeseries;
use crate::types::{AnalysisConfig, MetricsRow, RunSummary};

/// Second pass over the persisted time series: filters empty rows, renders
/// the chart set and computes the aggregate statistics.
pub fn run_second_pass(
    csv_path: &Path,
    charts_dir: &Path,
    stats_path: &Path,
    total_frames: i64,
    fps: f64,
    config: &AnalysisConfig,
) -> Result<RunSummary> {
    let rows = timeseries::read_rows(csv_path)?;
    let retained: Vec<MetricsRow> = rows.into_iter().filter(|r| r.has_metrics()).collect();
    info!(
        "Aggregating {} row(s) with metrics (of {} frames)",
        retained.len(),
        total_frames
    );

    charts::render_all(&retained, charts_dir, config)?;

    let summary = summarize(&retained, total_frames, fps);
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(stats_path, json)
        .with_context(|| format!("failed to write {}", stats_path.display()))?;
    info!("Summary statistics written to {}", stats_path.display());

    Ok(summary)
}

/// Aggregates the retained rows into a `RunSummary`. Undefined values are
/// skipped; a column with no defined value at all yields `None`.
pub fn summarize(rows: &[MetricsRow], total_frames: i64, fps: f64) -> RunSummary {
    RunSummary {
        duration: total_frames as f64 / fps,
        frame_count: total_frames,
        fps,
        avg_knee_angle_right: mean(rows.iter().map(|r| r.knee_angle_right)),
        avg_knee_angle_left: mean(rows.iter().map(|r| r.knee_angle_left)),
        avg_hip_angle_right: mean(rows.iter().map(|r| r.hip_angle_right)),
        avg_hip_angle_left: mean(rows.iter().map(|r| r.hip_angle_left)),
        avg_ankle_angle_right: mean(rows.iter().map(|r| r.ankle_angle_right)),
        avg_ankle_angle_left: mean(rows.iter().map(|r| r.ankle_angle_left)),
        avg_knee_asymmetry: mean(rows.iter().map(|r| r.knee_asymmetry())),
        min_knee_angle_right: min(rows.iter().map(|r| r.knee_angle_right)),
        max_knee_angle_right: max(rows.iter().map(|r| r.knee_angle_right)),
        min_knee_angle_left: min(rows.iter().map(|r| r.knee_angle_left)),
        max_knee_angle_left: max(rows.iter().map(|r| r.knee_angle_left)),
    }
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.flatten() {
        sum += v;
        count += 1;
    }
    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}

fn min(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| match acc {
        Some(m) if m <= v => Some(m),
        _ => Some(v),
    })
}

fn max(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JointAngleSet, VelocitySample};

    fn row(frame: u64, knee_right: Option<f64>, knee_left: Option<f64>) -> MetricsRow {
        let angles = JointAngleSet {
            knee_right,
            knee_left,
            ..Default::default()
        };
        MetricsRow::new(frame, frame as f64 / 25.0, &angles, &VelocitySample::default())
    }

    #[test]
    fn test_mean_min_max_skip_undefined() {
        let rows = vec![
            row(1, Some(10.0), None),
            row(2, Some(20.0), None),
            row(3, None, None),
            row(4, Some(30.0), None),
        ];
        let summary = summarize(&rows, 4, 25.0);
        assert_eq!(summary.avg_knee_angle_right, Some(20.0));
        assert_eq!(summary.min_knee_angle_right, Some(10.0));
        assert_eq!(summary.max_knee_angle_right, Some(30.0));
    }

    #[test]
    fn test_all_undefined_column_yields_none() {
        let rows = vec![row(1, Some(150.0), None), row(2, Some(160.0), None)];
        let summary = summarize(&rows, 2, 25.0);
        assert_eq!(summary.avg_knee_angle_left, None);
        assert_eq!(summary.min_knee_angle_left, None);
        assert_eq!(summary.max_knee_angle_left, None);
        assert_eq!(summary.avg_knee_asymmetry, None);
    }

    #[test]
    fn test_asymmetry_mean() {
        let rows = vec![
            row(1, Some(150.0), Some(130.0)),
            row(2, Some(140.0), Some(150.0)),
        ];
        let summary = summarize(&rows, 2, 25.0);
        assert_eq!(summary.avg_knee_asymmetry, Some(15.0));
    }

    #[test]
    fn test_duration_from_reported_frame_count() {
        let summary = summarize(&[], 250, 25.0);
        assert_eq!(summary.duration, 10.0);
        assert_eq!(summary.frame_count, 250);
        assert_eq!(summary.fps, 25.0);
        assert_eq!(summary.avg_knee_angle_right, None);
    }

    #[test]
    fn test_summary_serializes_undefined_as_null() {
        let summary = summarize(&[], 10, 25.0);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"avg_knee_angle_right\":null"));
    }
}
