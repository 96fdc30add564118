// src/annotation.rs

use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

use crate::classifier::Severity;
use crate::types::{
    AnalysisConfig, JointAngleSet, KeypointIndex, PersonDetection, VelocitySample,
};

/// Torso and leg landmarks that get a marker drawn on them.
const MARKED_KEYPOINTS: [KeypointIndex; 8] = [
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
    KeypointIndex::LeftKnee,
    KeypointIndex::RightKnee,
    KeypointIndex::LeftAnkle,
    KeypointIndex::RightAnkle,
];

/// Skeleton edges: torso ring plus both legs.
const SKELETON_EDGES: [(KeypointIndex, KeypointIndex); 8] = [
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

const SKELETON_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const HIP_LABEL_COLOR: (f64, f64, f64) = (255.0, 255.0, 0.0);
const ANKLE_LABEL_COLOR: (f64, f64, f64) = (255.0, 0.0, 255.0);
const KNEE_OK_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const KNEE_BENT_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);

const HUD_X: i32 = 10;
const HUD_Y: i32 = 25;
const HUD_LINE_HEIGHT: i32 = 22;
const HUD_WIDTH: i32 = 345;

fn bgr(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0, color.1, color.2, 0.0)
}

/// HUD text color per severity tier: green, orange, red.
pub fn severity_color(severity: Severity) -> Scalar {
    match severity {
        Severity::Normal => Scalar::new(0.0, 255.0, 0.0, 0.0),
        Severity::Asymmetric => Scalar::new(0.0, 165.0, 255.0, 0.0),
        Severity::DeepFlexion => Scalar::new(0.0, 0.0, 255.0, 0.0),
    }
}

/// Draws the skeleton, joint-angle labels and HUD panel onto a copy of the
/// frame. The input frame is never touched; with no subject in the frame the
/// copy comes back unannotated.
pub fn render(
    frame: &Mat,
    detection: Option<&PersonDetection>,
    angles: &JointAngleSet,
    velocity: &VelocitySample,
    time_s: f64,
    severity: Severity,
    config: &AnalysisConfig,
) -> Result<Mat> {
    let mut annotated = frame.try_clone()?;

    let Some(det) = detection else {
        return Ok(annotated);
    };

    draw_skeleton(&mut annotated, det)?;
    draw_angle_labels(&mut annotated, det, angles, config)?;
    draw_hud(&mut annotated, angles, velocity, time_s, severity)?;

    Ok(annotated)
}

fn keypoint_position(det: &PersonDetection, index: KeypointIndex) -> Point {
    let kp = det.keypoint(index);
    Point::new(kp.x as i32, kp.y as i32)
}

fn draw_skeleton(annotated: &mut Mat, det: &PersonDetection) -> Result<()> {
    for index in MARKED_KEYPOINTS {
        imgproc::circle(
            annotated,
            keypoint_position(det, index),
            5,
            bgr(SKELETON_COLOR),
            -1,
            imgproc::LINE_8,
            0,
        )?;
    }

    for (from, to) in SKELETON_EDGES {
        imgproc::line(
            annotated,
            keypoint_position(det, from),
            keypoint_position(det, to),
            bgr(SKELETON_COLOR),
            3,
            imgproc::LINE_AA,
            0,
        )?;
    }

    Ok(())
}

fn put_label(annotated: &mut Mat, text: &str, position: Point, color: Scalar) -> Result<()> {
    imgproc::put_text(
        annotated,
        text,
        position,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        color,
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_angle_labels(
    annotated: &mut Mat,
    det: &PersonDetection,
    angles: &JointAngleSet,
    config: &AnalysisConfig,
) -> Result<()> {
    let knee_color = |angle: f64| {
        if angle >= config.knee_extension_min {
            bgr(KNEE_OK_COLOR)
        } else {
            bgr(KNEE_BENT_COLOR)
        }
    };

    let labels: [(KeypointIndex, &str, Option<f64>, Option<Scalar>); 6] = [
        (KeypointIndex::RightKnee, "KR", angles.knee_right, None),
        (KeypointIndex::LeftKnee, "KL", angles.knee_left, None),
        (
            KeypointIndex::RightHip,
            "HR",
            angles.hip_right,
            Some(bgr(HIP_LABEL_COLOR)),
        ),
        (
            KeypointIndex::LeftHip,
            "HL",
            angles.hip_left,
            Some(bgr(HIP_LABEL_COLOR)),
        ),
        (
            KeypointIndex::RightAnkle,
            "AR",
            angles.ankle_right,
            Some(bgr(ANKLE_LABEL_COLOR)),
        ),
        (
            KeypointIndex::LeftAnkle,
            "AL",
            angles.ankle_left,
            Some(bgr(ANKLE_LABEL_COLOR)),
        ),
    ];

    for (index, prefix, angle, fixed_color) in labels {
        let Some(value) = angle else { continue };
        let color = fixed_color.unwrap_or_else(|| knee_color(value));
        put_label(
            annotated,
            &format!("{prefix} {value:.0}°"),
            keypoint_position(det, index),
            color,
        )?;
    }

    Ok(())
}

fn draw_hud(
    annotated: &mut Mat,
    angles: &JointAngleSet,
    velocity: &VelocitySample,
    time_s: f64,
    severity: Severity,
) -> Result<()> {
    let fmt_deg = |angle: Option<f64>| match angle {
        Some(v) => format!("{v:.0}°"),
        None => "N/A".to_string(),
    };

    let lines = [
        format!("t = {time_s:.2} s"),
        format!(
            "Knee R/L = {} / {}",
            fmt_deg(angles.knee_right),
            fmt_deg(angles.knee_left)
        ),
        match angles.knee_diff() {
            Some(d) => format!("Knee diff = {d:.1}°"),
            None => "Knee diff = N/A".to_string(),
        },
        match velocity.speed_px_s {
            Some(v) => format!("R foot speed = {v:.0} px/s"),
            None => "R foot speed = N/A".to_string(),
        },
    ];

    // Translucent panel: paint the box on a copy, then blend 40/60.
    let panel = Rect::new(
        HUD_X - 5,
        HUD_Y - 20,
        HUD_WIDTH,
        HUD_LINE_HEIGHT * lines.len() as i32 + 20,
    );
    let mut overlay = annotated.try_clone()?;
    imgproc::rectangle(
        &mut overlay,
        panel,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    let mut blended = Mat::default();
    core::add_weighted(&overlay, 0.4, &*annotated, 0.6, 0.0, &mut blended, -1)?;
    *annotated = blended;

    let color = severity_color(severity);
    for (i, line) in lines.iter().enumerate() {
        put_label(
            annotated,
            line,
            Point::new(HUD_X, HUD_Y + i as i32 * HUD_LINE_HEIGHT),
            color,
        )?;
    }

    Ok(())
}
