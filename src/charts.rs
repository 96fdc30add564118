// src/charts.rs

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::types::{AnalysisConfig, MetricsRow};

const CHART_SIZE: (u32, u32) = (1000, 500);

// Matplotlib-like default cycle for paired series, accent colors elsewhere.
const RIGHT_COLOR: RGBColor = RGBColor(31, 119, 180);
const LEFT_COLOR: RGBColor = RGBColor(255, 127, 14);
const ASYMMETRY_COLOR: RGBColor = RGBColor(231, 76, 60);
const SPEED_COLOR: RGBColor = RGBColor(52, 152, 219);

struct Series {
    label: String,
    color: RGBColor,
    points: Vec<(f64, f64)>,
}

fn series(
    label: &str,
    color: RGBColor,
    rows: &[MetricsRow],
    value: impl Fn(&MetricsRow) -> Option<f64>,
) -> Series {
    Series {
        label: label.to_string(),
        color,
        points: rows
            .iter()
            .filter_map(|r| value(r).map(|v| (r.time_s, v)))
            .collect(),
    }
}

/// Renders the five chart artifacts into `charts_dir`.
pub fn render_all(rows: &[MetricsRow], charts_dir: &Path, config: &AnalysisConfig) -> Result<()> {
    fs::create_dir_all(charts_dir)
        .with_context(|| format!("failed to create {}", charts_dir.display()))?;

    draw_chart(
        &charts_dir.join("knee_angles.png"),
        "Knee angle over time",
        "Knee angle (deg)",
        vec![
            series("Right knee", RIGHT_COLOR, rows, |r| r.knee_angle_right),
            series("Left knee", LEFT_COLOR, rows, |r| r.knee_angle_left),
        ],
        Some((
            config.knee_extension_min,
            format!("Extension threshold ({:.0}°)", config.knee_extension_min),
        )),
        Some((0.0, 180.0)),
    )?;

    draw_chart(
        &charts_dir.join("asymmetry.png"),
        "Knee asymmetry |right - left|",
        "Difference (deg)",
        vec![series("Knee difference", ASYMMETRY_COLOR, rows, |r| {
            r.knee_asymmetry()
        })],
        Some((
            config.asymmetry_threshold,
            format!("Asymmetry threshold ({:.0}°)", config.asymmetry_threshold),
        )),
        None,
    )?;

    draw_chart(
        &charts_dir.join("hip_angles.png"),
        "Hip angle over time",
        "Hip angle (deg)",
        vec![
            series("Right hip", RIGHT_COLOR, rows, |r| r.hip_angle_right),
            series("Left hip", LEFT_COLOR, rows, |r| r.hip_angle_left),
        ],
        None,
        Some((0.0, 180.0)),
    )?;

    draw_chart(
        &charts_dir.join("ankle_angles.png"),
        "Ankle angle over time",
        "Ankle angle (deg)",
        vec![
            series("Right ankle", RIGHT_COLOR, rows, |r| r.ankle_angle_right),
            series("Left ankle", LEFT_COLOR, rows, |r| r.ankle_angle_left),
        ],
        None,
        Some((0.0, 180.0)),
    )?;

    draw_chart(
        &charts_dir.join("foot_speed.png"),
        "Right foot speed",
        "Speed (px/s)",
        vec![series("Right foot", SPEED_COLOR, rows, |r| {
            r.foot_speed_right
        })],
        None,
        None,
    )?;

    info!("Charts written to {}", charts_dir.display());
    Ok(())
}

fn draw_chart(
    path: &Path,
    title: &str,
    y_label: &str,
    series: Vec<Series>,
    reference: Option<(f64, String)>,
    fixed_y_range: Option<(f64, f64)>,
) -> Result<()> {
    let x_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .fold(0.0f64, f64::max)
        .max(1.0);

    let (y_min, y_max) = fixed_y_range.unwrap_or_else(|| autoscale(&series, reference.as_ref()));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(44)
        .y_label_area_size(56)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc(y_label)
        .draw()?;

    for s in &series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.points.iter().copied(),
                color.stroke_width(2),
            ))?
            .label(s.label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    if let Some((threshold, label)) = reference {
        chart
            .draw_series(LineSeries::new(
                [(0.0, threshold), (x_max, threshold)],
                RED.stroke_width(1),
            ))?
            .label(label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], RED.stroke_width(1)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("failed to write chart {}", path.display()))?;
    Ok(())
}

/// Y range from the data with 10% headroom; a reference line is always kept
/// in view, and an all-undefined chart falls back to a unit range.
fn autoscale(series: &[Series], reference: Option<&(f64, String)>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in series.iter().flat_map(|s| s.points.iter().map(|p| p.1)) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if let Some((threshold, _)) = reference {
        lo = lo.min(*threshold);
        hi = hi.max(*threshold);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }

    let span = (hi - lo).max(1.0);
    ((lo - span * 0.1).min(0.0), hi + span * 0.1)
}
