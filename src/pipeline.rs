// src/pipeline.rs

use anyhow::{Context, Result};
use opencv::core::Size;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::aggregate;
use crate::annotation;
use crate::classifier;
use crate::metrics::compute_frame_metrics;
use crate::pose_estimation::PoseEstimator;
use crate::timeseries::TimeSeriesWriter;
use crate::types::{Config, MetricsRow, MotionState, PersonDetection, RunSummary};
use crate::video_io::{VideoReader, VideoSink};

pub struct RunArtifacts {
    pub video_output: PathBuf,
    pub csv_output: PathBuf,
    pub charts_dir: PathBuf,
    pub stats_path: PathBuf,
    pub summary: RunSummary,
}

/// Runs the full analysis: open the streams, process every frame, then
/// aggregate the persisted series into charts and statistics.
///
/// Opening failures abort the run. Once the frame loop starts, per-frame
/// problems (no subject, degenerate keypoints, inference errors, decode
/// failures) degrade to undefined metrics and the loop carries on; the
/// streaming resources are released on every exit path before aggregation.
pub fn run(video_path: &Path, output_dir: &Path, config: &Config) -> Result<RunArtifacts> {
    let started = Instant::now();

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
    let charts_dir = output_dir.join("charts");
    fs::create_dir_all(&charts_dir)
        .with_context(|| format!("failed to create charts dir {}", charts_dir.display()))?;

    let mut reader = VideoReader::open(video_path, config.video.default_fps)?;
    let fps = reader.fps;
    let total_frames = reader.total_frames;

    let mut sink = VideoSink::open(output_dir, fps, Size::new(reader.width, reader.height))?;
    let csv_output = output_dir.join("metrics.csv");
    let mut writer = TimeSeriesWriter::create(&csv_output)?;
    let mut estimator = PoseEstimator::new(&config.model)?;

    let mut state = MotionState::default();
    let mut frame_idx: u64 = 0;
    let mut frames_with_subject: u64 = 0;

    while let Some(frame) = reader.read_frame() {
        frame_idx += 1;
        let time_s = frame_idx as f64 / fps;

        let detections = match estimator.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                debug!("Pose inference failed on frame {frame_idx}: {e}");
                Vec::new()
            }
        };

        let subject = select_primary_subject(&detections);
        if subject.is_some() {
            frames_with_subject += 1;
        }

        let (angles, velocity, next_state) = compute_frame_metrics(subject, time_s, state);
        state = next_state;
        let severity = classifier::classify(&angles, &config.analysis);
        if severity != classifier::Severity::Normal {
            debug!("Frame {frame_idx}: severity {}", severity.as_str());
        }

        match annotation::render(
            &frame,
            subject,
            &angles,
            &velocity,
            time_s,
            severity,
            &config.analysis,
        ) {
            Ok(annotated) => sink.write(&annotated)?,
            Err(e) => {
                debug!("Annotation failed on frame {frame_idx}, passing frame through: {e}");
                sink.write(&frame)?;
            }
        }

        writer.append(&MetricsRow::new(frame_idx, time_s, &angles, &velocity))?;

        if frame_idx % 50 == 0 {
            info!(
                "Progress: {:.1}% ({}/{}) | frames with subject: {}",
                reader.progress(),
                frame_idx,
                total_frames,
                frames_with_subject
            );
        }
    }

    // Release the streaming resources before the aggregation pass re-reads
    // the series from disk.
    let rows_written = writer.finish()?;
    let video_output = sink.path.clone();
    drop(sink);
    drop(reader);

    info!(
        "Frame loop complete: {} frame(s) decoded, {} with a subject, {} row(s) written",
        frame_idx, frames_with_subject, rows_written
    );

    let stats_path = output_dir.join("stats.json");
    let summary = aggregate::run_second_pass(
        &csv_output,
        &charts_dir,
        &stats_path,
        total_frames,
        fps,
        &config.analysis,
    )?;

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "✓ Analysis finished in {:.1}s ({:.1} frames/s)",
        elapsed,
        frame_idx as f64 / elapsed.max(1e-9)
    );

    Ok(RunArtifacts {
        video_output,
        csv_output,
        charts_dir,
        stats_path,
        summary,
    })
}

/// The primary subject is the detection with the largest bounding-box area;
/// an earlier detection wins a tie.
fn select_primary_subject(detections: &[PersonDetection]) -> Option<&PersonDetection> {
    let mut best: Option<&PersonDetection> = None;
    for det in detections {
        match best {
            Some(current) if det.bbox_area() <= current.bbox_area() => {}
            _ => best = Some(det),
        }
    }
    best
}
