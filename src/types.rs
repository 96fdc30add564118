use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub video: VideoConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            video: VideoConfig::default(),
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: i32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/yolov8n-pose.onnx".to_string(),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            num_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Used when the container reports a non-positive frame rate.
    pub default_fps: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { default_fps: 25.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Knee counts as well extended at or above this angle (degrees).
    pub knee_extension_min: f64,
    /// Left/right knee difference above this is flagged as asymmetric (degrees).
    pub asymmetry_threshold: f64,
    /// Either knee below this angle is flagged as deep flexion (degrees).
    pub deep_flexion_max: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            knee_extension_min: 140.0,
            asymmetry_threshold: 10.0,
            deep_flexion_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// COCO 17-point body landmark layout used by YOLOv8-pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
#[allow(dead_code)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;
}

/// A single 2D keypoint in pixel coordinates. May coincide with another
/// keypoint; absence of a person is expressed at the frame level, never here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_f64(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

/// One detected person: bounding box in original image coordinates plus the
/// fixed 17-keypoint layout.
#[derive(Debug, Clone)]
pub struct PersonDetection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub confidence: f32,
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl PersonDetection {
    pub fn bbox_area(&self) -> f32 {
        let [x1, y1, x2, y2] = self.bbox;
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    pub fn keypoint(&self, index: KeypointIndex) -> Keypoint {
        self.keypoints[index as usize]
    }

    /// Vertical extent over all keypoints, used to normalize foot speed.
    pub fn body_length(&self) -> f32 {
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for kp in &self.keypoints {
            min_y = min_y.min(kp.y);
            max_y = max_y.max(kp.y);
        }
        max_y - min_y
    }
}

/// Joint angles for one frame, in degrees. `None` marks a value that could
/// not be computed from the frame's keypoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointAngleSet {
    pub knee_right: Option<f64>,
    pub knee_left: Option<f64>,
    pub hip_right: Option<f64>,
    pub hip_left: Option<f64>,
    pub ankle_right: Option<f64>,
    pub ankle_left: Option<f64>,
}

impl JointAngleSet {
    /// |right − left| knee difference; undefined when either side is.
    pub fn knee_diff(&self) -> Option<f64> {
        match (self.knee_right, self.knee_left) {
            (Some(r), Some(l)) => Some((r - l).abs()),
            _ => None,
        }
    }
}

/// Right-foot speed for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocitySample {
    /// Pixels per second; requires a previous ankle position and positive dt.
    pub speed_px_s: Option<f64>,
    /// Speed divided by body length (body lengths per second).
    pub normalized: Option<f64>,
}

/// Cross-frame tracking state: the previous right-ankle position and the
/// timestamp it was observed at. Owned by the pipeline loop, threaded through
/// the per-frame metric computation, discarded when the run ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionState {
    pub prev_right_ankle: Option<Keypoint>,
    pub prev_time_s: Option<f64>,
}

/// One persisted time-series row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub frame: u64,
    pub time_s: f64,
    pub knee_angle_right: Option<f64>,
    pub knee_angle_left: Option<f64>,
    pub hip_angle_right: Option<f64>,
    pub hip_angle_left: Option<f64>,
    pub ankle_angle_right: Option<f64>,
    pub ankle_angle_left: Option<f64>,
    pub foot_speed_right: Option<f64>,
    pub foot_speed_norm: Option<f64>,
}

impl MetricsRow {
    pub fn new(frame: u64, time_s: f64, angles: &JointAngleSet, velocity: &VelocitySample) -> Self {
        Self {
            frame,
            time_s: round_to(time_s, 3),
            knee_angle_right: angles.knee_right.map(|v| round_to(v, 2)),
            knee_angle_left: angles.knee_left.map(|v| round_to(v, 2)),
            hip_angle_right: angles.hip_right.map(|v| round_to(v, 2)),
            hip_angle_left: angles.hip_left.map(|v| round_to(v, 2)),
            ankle_angle_right: angles.ankle_right.map(|v| round_to(v, 2)),
            ankle_angle_left: angles.ankle_left.map(|v| round_to(v, 2)),
            foot_speed_right: velocity.speed_px_s.map(|v| round_to(v, 2)),
            foot_speed_norm: velocity.normalized.map(|v| round_to(v, 2)),
        }
    }

    /// True when at least one metric field carries a value.
    pub fn has_metrics(&self) -> bool {
        self.knee_angle_right.is_some()
            || self.knee_angle_left.is_some()
            || self.hip_angle_right.is_some()
            || self.hip_angle_left.is_some()
            || self.ankle_angle_right.is_some()
            || self.ankle_angle_left.is_some()
            || self.foot_speed_right.is_some()
            || self.foot_speed_norm.is_some()
    }

    pub fn knee_asymmetry(&self) -> Option<f64> {
        match (self.knee_angle_right, self.knee_angle_left) {
            (Some(r), Some(l)) => Some((r - l).abs()),
            _ => None,
        }
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Aggregate statistics over one run. `None` marks a statistic whose source
/// column was entirely undefined; serialized as JSON null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub duration: f64,
    pub frame_count: i64,
    pub fps: f64,
    pub avg_knee_angle_right: Option<f64>,
    pub avg_knee_angle_left: Option<f64>,
    pub avg_hip_angle_right: Option<f64>,
    pub avg_hip_angle_left: Option<f64>,
    pub avg_ankle_angle_right: Option<f64>,
    pub avg_ankle_angle_left: Option<f64>,
    pub avg_knee_asymmetry: Option<f64>,
    pub min_knee_angle_right: Option<f64>,
    pub max_knee_angle_right: Option<f64>,
    pub min_knee_angle_left: Option<f64>,
    pub max_knee_angle_left: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_area() {
        let det = PersonDetection {
            bbox: [10.0, 20.0, 110.0, 220.0],
            confidence: 0.9,
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        };
        assert_eq!(det.bbox_area(), 100.0 * 200.0);
    }

    #[test]
    fn test_bbox_area_degenerate_is_zero() {
        let det = PersonDetection {
            bbox: [50.0, 50.0, 40.0, 60.0],
            confidence: 0.9,
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        };
        assert_eq!(det.bbox_area(), 0.0);
    }

    #[test]
    fn test_body_length() {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::Nose as usize] = Keypoint::new(100.0, 40.0);
        keypoints[KeypointIndex::RightAnkle as usize] = Keypoint::new(95.0, 400.0);
        let det = PersonDetection {
            bbox: [0.0, 0.0, 1.0, 1.0],
            confidence: 0.5,
            keypoints,
        };
        assert_eq!(det.body_length(), 400.0);
    }

    #[test]
    fn test_knee_diff_requires_both_sides() {
        let mut angles = JointAngleSet::default();
        angles.knee_right = Some(150.0);
        assert_eq!(angles.knee_diff(), None);
        angles.knee_left = Some(130.0);
        assert_eq!(angles.knee_diff(), Some(20.0));
    }

    #[test]
    fn test_row_rounding() {
        let angles = JointAngleSet {
            knee_right: Some(151.23456),
            ..Default::default()
        };
        let velocity = VelocitySample::default();
        let row = MetricsRow::new(7, 7.0 / 30.0, &angles, &velocity);
        assert_eq!(row.time_s, 0.233);
        assert_eq!(row.knee_angle_right, Some(151.23));
    }

    #[test]
    fn test_has_metrics_on_empty_row() {
        let row = MetricsRow::new(
            1,
            0.04,
            &JointAngleSet::default(),
            &VelocitySample::default(),
        );
        assert!(!row.has_metrics());
    }
}
