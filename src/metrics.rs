// src/metrics.rs

use crate::geometry;
use crate::types::{JointAngleSet, KeypointIndex, MotionState, PersonDetection, VelocitySample};

/// Vertical drop (pixels) below the ankle used as the reference point for the
/// ankle angle. The 17-point layout carries no foot or toe landmark, so the
/// "ankle angle" is the shank-to-vertical inclination, not true joint flexion.
const ANKLE_REFERENCE_DROP: f64 = 50.0;

/// Derives one frame's joint angles and right-foot velocity from the primary
/// subject, threading the cross-frame motion state through explicitly.
///
/// With no subject in the frame every output is undefined and the state is
/// returned untouched. With a subject, the previous ankle/timestamp are
/// overwritten unconditionally, even on the first observation where no
/// velocity can be produced yet.
pub fn compute_frame_metrics(
    detection: Option<&PersonDetection>,
    time_s: f64,
    state: MotionState,
) -> (JointAngleSet, VelocitySample, MotionState) {
    let Some(det) = detection else {
        return (JointAngleSet::default(), VelocitySample::default(), state);
    };

    let l_shoulder = det.keypoint(KeypointIndex::LeftShoulder).as_f64();
    let r_shoulder = det.keypoint(KeypointIndex::RightShoulder).as_f64();
    let l_hip = det.keypoint(KeypointIndex::LeftHip).as_f64();
    let r_hip = det.keypoint(KeypointIndex::RightHip).as_f64();
    let l_knee = det.keypoint(KeypointIndex::LeftKnee).as_f64();
    let r_knee = det.keypoint(KeypointIndex::RightKnee).as_f64();
    let l_ankle = det.keypoint(KeypointIndex::LeftAnkle).as_f64();
    let r_ankle = det.keypoint(KeypointIndex::RightAnkle).as_f64();

    let angles = JointAngleSet {
        knee_right: geometry::angle(r_hip, r_knee, r_ankle),
        knee_left: geometry::angle(l_hip, l_knee, l_ankle),
        hip_right: geometry::angle(r_shoulder, r_hip, r_knee),
        hip_left: geometry::angle(l_shoulder, l_hip, l_knee),
        ankle_right: geometry::angle(
            r_knee,
            r_ankle,
            (r_ankle.0, r_ankle.1 + ANKLE_REFERENCE_DROP),
        ),
        ankle_left: geometry::angle(
            l_knee,
            l_ankle,
            (l_ankle.0, l_ankle.1 + ANKLE_REFERENCE_DROP),
        ),
    };

    let mut speed_px_s = None;
    if let (Some(prev_ankle), Some(prev_time)) = (state.prev_right_ankle, state.prev_time_s) {
        let dt = time_s - prev_time;
        if dt > 0.0 {
            speed_px_s = Some(geometry::distance(r_ankle, prev_ankle.as_f64()) / dt);
        }
    }

    let body_length = det.body_length() as f64;
    let normalized = match speed_px_s {
        Some(v) if body_length > 0.0 => Some(v / body_length),
        _ => None,
    };

    let next_state = MotionState {
        prev_right_ankle: Some(det.keypoint(KeypointIndex::RightAnkle)),
        prev_time_s: Some(time_s),
    };

    (
        angles,
        VelocitySample {
            speed_px_s,
            normalized,
        },
        next_state,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn detection_with(points: &[(KeypointIndex, f32, f32)]) -> PersonDetection {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for &(idx, x, y) in points {
            keypoints[idx as usize] = Keypoint::new(x, y);
        }
        PersonDetection {
            bbox: [0.0, 0.0, 100.0, 400.0],
            confidence: 0.9,
            keypoints,
        }
    }

    #[test]
    fn test_straight_leg_knee_angle() {
        // Hip, knee and ankle on one vertical line: fully extended knee.
        let det = detection_with(&[
            (KeypointIndex::RightHip, 100.0, 100.0),
            (KeypointIndex::RightKnee, 100.0, 200.0),
            (KeypointIndex::RightAnkle, 100.0, 300.0),
        ]);
        let (angles, _, _) = compute_frame_metrics(Some(&det), 0.04, MotionState::default());
        let knee = angles.knee_right.unwrap();
        assert!((knee - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_shank_ankle_angle_is_straight() {
        // Knee directly above the ankle: the shank is parallel to the
        // synthetic vertical reference, so the angle opens to 180.
        let det = detection_with(&[
            (KeypointIndex::RightKnee, 50.0, 100.0),
            (KeypointIndex::RightAnkle, 50.0, 200.0),
        ]);
        let (angles, _, _) = compute_frame_metrics(Some(&det), 0.04, MotionState::default());
        let ankle = angles.ankle_right.unwrap();
        assert!((ankle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_collapsed_keypoints_give_undefined_angle() {
        // Hip and knee collapse onto the same pixel.
        let det = detection_with(&[
            (KeypointIndex::RightHip, 100.0, 200.0),
            (KeypointIndex::RightKnee, 100.0, 200.0),
            (KeypointIndex::RightAnkle, 100.0, 300.0),
        ]);
        let (angles, _, _) = compute_frame_metrics(Some(&det), 0.04, MotionState::default());
        assert_eq!(angles.knee_right, None);
    }

    #[test]
    fn test_velocity_from_previous_ankle() {
        let det = detection_with(&[(KeypointIndex::RightAnkle, 100.0, 0.0)]);
        let state = MotionState {
            prev_right_ankle: Some(Keypoint::new(0.0, 0.0)),
            prev_time_s: Some(0.0),
        };
        let (_, velocity, _) = compute_frame_metrics(Some(&det), 0.1, state);
        let speed = velocity.speed_px_s.unwrap();
        assert!((speed - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_first_frame_has_no_velocity_but_advances_state() {
        let det = detection_with(&[(KeypointIndex::RightAnkle, 42.0, 17.0)]);
        let (_, velocity, next) = compute_frame_metrics(Some(&det), 0.04, MotionState::default());
        assert_eq!(velocity.speed_px_s, None);
        assert_eq!(next.prev_right_ankle, Some(Keypoint::new(42.0, 17.0)));
        assert_eq!(next.prev_time_s, Some(0.04));
    }

    #[test]
    fn test_non_positive_dt_skips_velocity_but_advances_state() {
        let det = detection_with(&[(KeypointIndex::RightAnkle, 10.0, 10.0)]);
        let state = MotionState {
            prev_right_ankle: Some(Keypoint::new(0.0, 0.0)),
            prev_time_s: Some(0.5),
        };
        let (_, velocity, next) = compute_frame_metrics(Some(&det), 0.5, state);
        assert_eq!(velocity.speed_px_s, None);
        assert_eq!(next.prev_time_s, Some(0.5));
        assert_eq!(next.prev_right_ankle, Some(Keypoint::new(10.0, 10.0)));
    }

    #[test]
    fn test_normalized_velocity_uses_body_length() {
        let det = detection_with(&[
            (KeypointIndex::Nose, 50.0, 0.0),
            (KeypointIndex::RightAnkle, 100.0, 200.0),
        ]);
        let state = MotionState {
            prev_right_ankle: Some(Keypoint::new(100.0, 100.0)),
            prev_time_s: Some(0.0),
        };
        let (_, velocity, _) = compute_frame_metrics(Some(&det), 1.0, state);
        // 100 px over 1 s, body length 200 px.
        assert!((velocity.speed_px_s.unwrap() - 100.0).abs() < 1e-9);
        assert!((velocity.normalized.unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_subject_leaves_state_untouched() {
        let state = MotionState {
            prev_right_ankle: Some(Keypoint::new(5.0, 6.0)),
            prev_time_s: Some(1.25),
        };
        let (angles, velocity, next) = compute_frame_metrics(None, 1.29, state);
        assert_eq!(angles, JointAngleSet::default());
        assert_eq!(velocity, VelocitySample::default());
        assert_eq!(next.prev_right_ankle, Some(Keypoint::new(5.0, 6.0)));
        assert_eq!(next.prev_time_s, Some(1.25));
    }
}
