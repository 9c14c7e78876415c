//! Per-frame driver: cadence, landmark extraction, angle, counter.

use log::debug;
use serde::Serialize;

use crate::config::Profile;
use crate::counter::{Phase, RepCounter, RepCounterState, Transition};
use crate::error::CounterError;
use crate::landmarks::{PoseFrame, TrackedJoint};

/// What the rendering/telemetry side gets for every processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Annotation {
    pub frame: u64,
    pub angle_degrees: f32,
    pub phase: Phase,
    pub rep_count: u32,
    pub transitioned: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Processed(Annotation),
    /// Not on the processing cadence.
    Skipped,
    /// On cadence but unusable; counter untouched.
    Dropped(CounterError),
}

#[derive(Debug)]
pub struct FrameProcessor {
    joint: TrackedJoint,
    min_confidence: f32,
    frame_skip: u64,
    frame_count: u64,
    counter: RepCounter,
    state: RepCounterState,
}

impl FrameProcessor {
    pub fn new(
        joint: TrackedJoint,
        counter: RepCounter,
        frame_skip: u32,
        min_confidence: f32,
    ) -> Self {
        Self {
            joint,
            min_confidence,
            frame_skip: u64::from(frame_skip.max(1)),
            frame_count: 0,
            counter,
            state: RepCounterState::new(),
        }
    }

    pub fn from_profile(p: &Profile) -> Self {
        Self::new(
            p.joint,
            RepCounter::new(p.thresholds),
            p.capture.frame_skip,
            p.capture.min_confidence,
        )
    }

    pub fn snapshot(&self) -> RepCounterState {
        self.state.snapshot()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_count
    }

    /// Back to zero reps and an unknown phase. The cadence keeps running.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn process(&mut self, frame: &PoseFrame) -> FrameOutcome {
        self.frame_count += 1;
        if self.frame_count % self.frame_skip != 0 {
            return FrameOutcome::Skipped;
        }

        let angle = match self
            .joint
            .extract(frame, self.min_confidence)
            .and_then(|triple| triple.angle_checked())
        {
            Ok(a) => a,
            Err(e) => {
                debug!("frame {}: dropped ({e})", self.frame_count);
                return FrameOutcome::Dropped(e);
            }
        };

        let transitioned = self.counter.observe_sample(angle, &mut self.state);
        FrameOutcome::Processed(Annotation {
            frame: self.frame_count,
            angle_degrees: angle.degrees(),
            phase: self.state.phase,
            rep_count: self.state.count,
            transitioned,
        })
    }
}
