//! Joint angle geometry.
//!
//! Coordinates are whatever the pose collaborator hands us (normalized image
//! units or pixels); only their ratios matter for the angle.

use serde::Serialize;

use crate::error::CounterError;

/// Below this distance two points are treated as coincident.
const COINCIDENT_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// (proximal, vertex, distal); the angle is measured at `vertex`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTriple {
    pub proximal: Point2D,
    pub vertex: Point2D,
    pub distal: Point2D,
}

impl JointTriple {
    pub fn new(proximal: Point2D, vertex: Point2D, distal: Point2D) -> Self {
        Self {
            proximal,
            vertex,
            distal,
        }
    }

    pub fn angle_checked(&self) -> Result<AngleSample, CounterError> {
        angle_at_checked(self.proximal, self.vertex, self.distal)
    }
}

/// Unsigned joint angle in degrees, always within [0, 180].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct AngleSample(f32);

impl AngleSample {
    pub fn new(degrees: f32) -> Result<Self, CounterError> {
        if degrees.is_finite() && (0.0..=180.0).contains(&degrees) {
            Ok(Self(degrees))
        } else {
            Err(CounterError::InvalidAngle(degrees))
        }
    }

    pub fn degrees(self) -> f32 {
        self.0
    }
}

/// Angle at `vertex` between the rays towards `proximal` and `distal`.
///
/// Total over finite inputs. Coincident points give an unstable (but finite)
/// result; use [`angle_at_checked`] to reject them instead.
pub fn angle_at(proximal: Point2D, vertex: Point2D, distal: Point2D) -> AngleSample {
    let radians = (distal.y - vertex.y).atan2(distal.x - vertex.x)
        - (proximal.y - vertex.y).atan2(proximal.x - vertex.x);
    let mut angle = radians.abs().to_degrees();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    // f32 rounding near 2π can leave us a hair outside the range
    AngleSample(angle.clamp(0.0, 180.0))
}

pub fn angle_at_checked(
    proximal: Point2D,
    vertex: Point2D,
    distal: Point2D,
) -> Result<AngleSample, CounterError> {
    if vertex.distance_to(proximal) < COINCIDENT_EPS || vertex.distance_to(distal) < COINCIDENT_EPS
    {
        return Err(CounterError::DegenerateGeometry);
    }
    Ok(angle_at(proximal, vertex, distal))
}
