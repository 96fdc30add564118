// src/classifier.rs

use crate::types::{AnalysisConfig, JointAngleSet};

/// Gait severity tier for the current frame, used to color the HUD overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Asymmetric,
    DeepFlexion,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Asymmetric => "ASYMMETRIC",
            Severity::DeepFlexion => "DEEP_FLEXION",
        }
    }
}

/// Maps a frame's knee angles to a severity tier. Deep flexion on either side
/// takes precedence over asymmetry; undefined angles never trigger a tier.
pub fn classify(angles: &JointAngleSet, config: &AnalysisConfig) -> Severity {
    let deep = |angle: Option<f64>| angle.is_some_and(|v| v < config.deep_flexion_max);
    if deep(angles.knee_right) || deep(angles.knee_left) {
        return Severity::DeepFlexion;
    }

    if angles
        .knee_diff()
        .is_some_and(|d| d > config.asymmetry_threshold)
    {
        return Severity::Asymmetric;
    }

    Severity::Normal
}
