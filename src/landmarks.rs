//! Pose landmarks as delivered by the external pose estimator.
//!
//! Frames use the MediaPipe pose topology: 33 landmarks addressed by index,
//! each with normalized x/y, relative depth z and a visibility score.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CounterError;
use crate::geometry::{JointTriple, Point2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseLandmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        use PoseLandmark::*;
        match self {
            Nose => "nose",
            LeftEyeInner => "left_eye_inner",
            LeftEye => "left_eye",
            LeftEyeOuter => "left_eye_outer",
            RightEyeInner => "right_eye_inner",
            RightEye => "right_eye",
            RightEyeOuter => "right_eye_outer",
            LeftEar => "left_ear",
            RightEar => "right_ear",
            MouthLeft => "mouth_left",
            MouthRight => "mouth_right",
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftPinky => "left_pinky",
            RightPinky => "right_pinky",
            LeftIndex => "left_index",
            RightIndex => "right_index",
            LeftThumb => "left_thumb",
            RightThumb => "right_thumb",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
            LeftHeel => "left_heel",
            RightHeel => "right_heel",
            LeftFootIndex => "left_foot_index",
            RightFootIndex => "right_foot_index",
        }
    }
}

impl fmt::Display for PoseLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn full_visibility() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn point(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// One pose-estimation result. `landmarks` is `None` when nobody was detected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PoseFrame {
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
}

impl PoseFrame {
    pub fn get(&self, which: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.as_ref()?.get(which.index())
    }

    /// Look up `which`, insisting on a finite position and a visibility at or
    /// above `min_confidence`.
    pub fn require(
        &self,
        which: PoseLandmark,
        min_confidence: f32,
    ) -> Result<Point2D, CounterError> {
        let lm = self
            .get(which)
            .filter(|lm| lm.x.is_finite() && lm.y.is_finite())
            .ok_or(CounterError::MissingLandmark { landmark: which })?;
        // NaN visibility fails the gate
        if !(lm.visibility >= min_confidence) {
            return Err(CounterError::LowConfidence {
                landmark: which,
                visibility: lm.visibility,
            });
        }
        Ok(lm.point())
    }
}

/// Which three landmarks form the tracked joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackedJoint {
    pub proximal: PoseLandmark,
    pub vertex: PoseLandmark,
    pub distal: PoseLandmark,
}

impl Default for TrackedJoint {
    fn default() -> Self {
        Self {
            proximal: PoseLandmark::LeftHip,
            vertex: PoseLandmark::LeftKnee,
            distal: PoseLandmark::LeftAnkle,
        }
    }
}

impl fmt::Display for TrackedJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.proximal, self.vertex, self.distal)
    }
}

impl TrackedJoint {
    pub fn is_distinct(&self) -> bool {
        self.proximal != self.vertex && self.vertex != self.distal && self.proximal != self.distal
    }

    pub fn extract(
        &self,
        frame: &PoseFrame,
        min_confidence: f32,
    ) -> Result<JointTriple, CounterError> {
        Ok(JointTriple::new(
            frame.require(self.proximal, min_confidence)?,
            frame.require(self.vertex, min_confidence)?,
            frame.require(self.distal, min_confidence)?,
        ))
    }
}
