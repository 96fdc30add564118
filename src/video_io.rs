// src/video_io.rs

use anyhow::{bail, Context, Result};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output codec candidates in preference order, each paired with the
/// container extension it writes. H.264 first for web playback, VP8/WebM
/// next, and `mp4v` last as the fallback available on any OpenCV build.
pub const CODEC_CANDIDATES: [(&str, &str); 4] = [
    ("avc1", "mp4"),
    ("vp80", "webm"),
    ("VP80", "webm"),
    ("mp4v", "mp4"),
];

const OUTPUT_BASENAME: &str = "annotated_video";

pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    pub total_frames: i64,
    pub current_frame: u64,
}

impl VideoReader {
    /// Opens the input stream and validates its properties. A non-positive
    /// reported frame rate falls back to `default_fps`.
    pub fn open(path: &Path, default_fps: f64) -> Result<Self> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .with_context(|| format!("input path is not valid UTF-8: {}", path.display()))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            bail!("failed to open input video: {}", path.display());
        }

        let mut fps = cap.get(videoio::CAP_PROP_FPS)?;
        if fps <= 0.0 {
            warn!(
                "Input reports non-positive fps ({fps}), falling back to {default_fps}"
            );
            fps = default_fps;
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        if width <= 0 || height <= 0 {
            bail!("input video has invalid dimensions {width}x{height}");
        }

        let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            fps,
            width,
            height,
            total_frames,
            current_frame: 0,
        })
    }

    /// Reads the next frame. End of stream and mid-stream decode failures
    /// both end the sequence; a decode failure is logged but not an error.
    pub fn read_frame(&mut self) -> Option<Mat> {
        let mut mat = Mat::default();
        match self.cap.read(&mut mat) {
            Ok(true) if !mat.empty() => {
                self.current_frame += 1;
                Some(mat)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "Decode failed at frame {}, treating as end of stream: {}",
                    self.current_frame + 1,
                    e
                );
                None
            }
        }
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

/// Annotated-video writer that negotiates a working codec by trying the
/// candidates in order. The winning candidate's container extension names
/// the output file, so the final path can differ from the first choice.
pub struct VideoSink {
    writer: VideoWriter,
    pub path: PathBuf,
    pub codec: &'static str,
}

impl VideoSink {
    pub fn open(output_dir: &Path, fps: f64, frame_size: Size) -> Result<Self> {
        for (i, &(codec, extension)) in CODEC_CANDIDATES.iter().enumerate() {
            let path = output_dir.join(format!("{OUTPUT_BASENAME}.{extension}"));
            let Some(path_str) = path.to_str() else {
                bail!("output path is not valid UTF-8: {}", path.display());
            };

            let b = codec.as_bytes();
            let fourcc =
                VideoWriter::fourcc(b[0] as char, b[1] as char, b[2] as char, b[3] as char)?;

            match VideoWriter::new(path_str, fourcc, fps, frame_size, true) {
                Ok(writer) if writer.is_opened()? => {
                    if i > 0 {
                        warn!("Preferred codec unavailable, fell back to {codec}");
                    }
                    info!("Output video: {} (codec {codec})", path.display());
                    return Ok(Self {
                        writer,
                        path,
                        codec,
                    });
                }
                Ok(_) => warn!("Codec {codec} failed to open, trying next candidate"),
                Err(e) => warn!("Codec {codec} writer error ({e}), trying next candidate"),
            }
        }

        bail!("no usable video codec among candidates: all failed to open")
    }

    pub fn write(&mut self, frame: &Mat) -> Result<()> {
        self.writer.write(frame)?;
        Ok(())
    }
}
