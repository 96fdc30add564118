// src/pose_estimation.rs

use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{self, Scalar, Size},
    imgproc,
    prelude::*,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::types::{Keypoint, KeypointIndex, ModelConfig, PersonDetection};

/// YOLOv8-pose output rows per candidate: 4 bbox values, 1 person score,
/// then (x, y, score) for each of the 17 keypoints.
const OUTPUT_ATTRS: usize = 4 + 1 + KeypointIndex::COUNT * 3;

/// YOLOv8-pose person detector running through ONNX Runtime.
pub struct PoseEstimator {
    session: Session,
    input_size: i32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl PoseEstimator {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("Loading pose model: {}", config.path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads)?
            .commit_from_file(&config.path)
            .context("failed to load pose estimation ONNX model")?;

        info!("✓ Pose estimator initialized");
        Ok(Self {
            session,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Runs pose inference on one BGR frame and returns every person found,
    /// with bounding boxes and keypoints mapped back to frame coordinates.
    pub fn detect(&mut self, frame: &Mat) -> Result<Vec<PersonDetection>> {
        let (input, scale, pad_x, pad_y) = self.preprocess(frame)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["images" => input_tensor])
            .context("pose inference failed")?;

        // Output layout: [1, 56, N] over N candidate boxes.
        let output: ndarray::ArrayViewD<f32> = outputs["output0"]
            .try_extract_array()
            .context("failed to extract pose model output")?;

        let shape = output.shape();
        anyhow::ensure!(
            shape.len() == 3 && shape[1] == OUTPUT_ATTRS,
            "unexpected pose output shape {:?}",
            shape
        );

        let mut detections = Vec::new();
        for i in 0..shape[2] {
            let confidence = output[[0, 4, i]];
            if confidence < self.confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];

            // Reverse the letterbox transform into frame coordinates.
            let x1 = (cx - w / 2.0 - pad_x) / scale;
            let y1 = (cy - h / 2.0 - pad_y) / scale;
            let x2 = (cx + w / 2.0 - pad_x) / scale;
            let y2 = (cy + h / 2.0 - pad_y) / scale;

            let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
            for (k, kp) in keypoints.iter_mut().enumerate() {
                let kx = output[[0, 5 + k * 3, i]];
                let ky = output[[0, 6 + k * 3, i]];
                *kp = Keypoint::new((kx - pad_x) / scale, (ky - pad_y) / scale);
            }

            detections.push(PersonDetection {
                bbox: [x1, y1, x2, y2],
                confidence,
                keypoints,
            });
        }

        let detections = nms(detections, self.iou_threshold);
        debug!("Detected {} person(s)", detections.len());
        Ok(detections)
    }

    /// Letterboxes the BGR frame into an RGB [1, 3, size, size] tensor.
    /// Returns the tensor plus the scale and padding needed to map model
    /// coordinates back onto the frame.
    fn preprocess(&self, frame: &Mat) -> Result<(Array4<f32>, f32, f32, f32)> {
        let src_w = frame.cols();
        let src_h = frame.rows();
        let size = self.input_size;

        let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
        let scaled_w = ((src_w as f32 * scale) as i32).max(1);
        let scaled_h = ((src_h as f32 * scale) as i32).max(1);
        let pad_x = (size - scaled_w) / 2;
        let pad_y = (size - scaled_h) / 2;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(scaled_w, scaled_h),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        // Pad to a square canvas with the conventional gray fill.
        let mut canvas = Mat::default();
        core::copy_make_border(
            &resized,
            &mut canvas,
            pad_y,
            size - scaled_h - pad_y,
            pad_x,
            size - scaled_w - pad_x,
            core::BORDER_CONSTANT,
            Scalar::all(114.0),
        )?;

        let s = size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, s, s));
        for y in 0..s {
            for x in 0..s {
                let px = canvas.at_2d::<core::Vec3b>(y as i32, x as i32)?;
                for c in 0..3 {
                    input[[0, c, y, x]] = px[c] as f32 / 255.0;
                }
            }
        }

        Ok((input, scale, pad_x as f32, pad_y as f32))
    }
}

/// Non-maximum suppression keyed on bounding-box IoU.
fn nms(mut detections: Vec<PersonDetection>, iou_threshold: f32) -> Vec<PersonDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    while !detections.is_empty() {
        let current = detections.remove(0);
        detections.retain(|det| iou(&current.bbox, &det.bbox) < iou_threshold);
        keep.push(current);
    }

    keep
}

fn iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(bbox: [f32; 4], confidence: f32) -> PersonDetection {
        PersonDetection {
            bbox,
            confidence,
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }

    #[test]
    fn test_iou_identical_boxes() {
        let b = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        assert_eq!(
            iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]),
            0.0
        );
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let detections = vec![
            detection([0.0, 0.0, 100.0, 200.0], 0.9),
            detection([5.0, 5.0, 105.0, 205.0], 0.6),
            detection([300.0, 0.0, 400.0, 200.0], 0.8),
        ];
        let kept = nms(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.8);
    }

    #[test]
    fn test_nms_keeps_everything_when_separated() {
        let detections = vec![
            detection([0.0, 0.0, 50.0, 50.0], 0.5),
            detection([100.0, 100.0, 150.0, 150.0], 0.4),
        ];
        assert_eq!(nms(detections, 0.45).len(), 2);
    }
}
