use thiserror::Error;

use crate::landmarks::PoseLandmark;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CounterError {
    #[error("angle {0} is outside [0, 180] degrees")]
    InvalidAngle(f32),
    #[error("landmark '{landmark}' missing from frame")]
    MissingLandmark { landmark: PoseLandmark },
    #[error("landmark '{landmark}' below confidence floor (visibility {visibility})")]
    LowConfidence {
        landmark: PoseLandmark,
        visibility: f32,
    },
    #[error("vertex coincides with an endpoint; angle is undefined")]
    DegenerateGeometry,
}
