use serde::{Deserialize, Serialize};

use crate::error::CounterError;
use crate::geometry::AngleSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unknown,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    EnteredDown,
    RepCompleted { new_count: u32 },
    NoTransition,
}

/// Hysteresis band edges in degrees. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub down: f32,
    pub up: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            down: 90.0,
            up: 160.0,
        }
    }
}

/// Latched phase plus completed reps. Owned by exactly one counting loop;
/// everyone else gets a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RepCounterState {
    pub phase: Phase,
    pub count: u32,
}

impl RepCounterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> Self {
        *self
    }
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    th: Thresholds,
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl RepCounter {
    pub fn new(th: Thresholds) -> Self {
        Self { th }
    }

    /// Feed a raw angle. Anything outside [0, 180] is refused before it can
    /// touch `state`.
    pub fn observe(
        &self,
        angle: f32,
        state: &mut RepCounterState,
    ) -> Result<Transition, CounterError> {
        let sample = AngleSample::new(angle)?;
        Ok(self.observe_sample(sample, state))
    }

    pub fn observe_sample(&self, sample: AngleSample, state: &mut RepCounterState) -> Transition {
        let angle = sample.degrees();

        if angle < self.th.down {
            if state.phase != Phase::Down {
                state.phase = Phase::Down;
                return Transition::EnteredDown;
            }
        } else if angle > self.th.up && state.phase == Phase::Down {
            state.count = state.count.saturating_add(1);
            state.phase = Phase::Up;
            return Transition::RepCompleted {
                new_count: state.count,
            };
        }

        Transition::NoTransition
    }

    /// Left-fold a recorded angle sequence from a fresh state.
    pub fn replay<I>(&self, angles: I) -> Result<(RepCounterState, Vec<Transition>), CounterError>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut state = RepCounterState::new();
        let mut events = Vec::new();
        for a in angles {
            events.push(self.observe(a, &mut state)?);
        }
        Ok((state, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(angles: &[f32]) -> (RepCounterState, Vec<Transition>) {
        RepCounter::default()
            .replay(angles.iter().copied())
            .expect("valid angles")
    }

    #[test]
    fn one_full_cycle_counts_once() {
        let (st, ev) = run(&[170.0, 80.0, 170.0]);
        assert_eq!(st.count, 1);
        assert_eq!(st.phase, Phase::Up);
        assert_eq!(
            ev,
            vec![
                Transition::NoTransition,
                Transition::EnteredDown,
                Transition::RepCompleted { new_count: 1 },
            ]
        );
    }

    #[test]
    fn hysteresis_band_never_moves() {
        let (st, ev) = run(&[91.0, 159.0, 100.0, 120.0]);
        assert_eq!(st, RepCounterState::new());
        assert!(ev.iter().all(|t| *t == Transition::NoTransition));
    }

    #[test]
    fn repeated_down_does_not_count() {
        let (st, ev) = run(&[170.0, 80.0, 85.0, 70.0]);
        assert_eq!(st.count, 0);
        assert_eq!(st.phase, Phase::Down);
        assert_eq!(ev.iter().filter(|t| **t == Transition::EnteredDown).count(), 1);
    }

    #[test]
    fn thresholds_are_strict() {
        let (st, _) = run(&[90.0]);
        assert_eq!(st.phase, Phase::Unknown);

        let (st, _) = run(&[80.0, 160.0]);
        assert_eq!(st.phase, Phase::Down);
        assert_eq!(st.count, 0);

        let (st, _) = run(&[89.999, 160.001]);
        assert_eq!(st.count, 1);
    }

    #[test]
    fn up_from_unknown_or_up_never_counts() {
        let (st, _) = run(&[170.0, 175.0, 180.0]);
        assert_eq!(st, RepCounterState::new());

        let (st, _) = run(&[80.0, 170.0, 175.0, 170.0]);
        assert_eq!(st.count, 1);
        assert_eq!(st.phase, Phase::Up);
    }

    #[test]
    fn count_is_monotonic_and_steps_by_one() {
        let angles = [
            170.0, 85.0, 120.0, 165.0, 150.0, 60.0, 95.0, 89.0, 161.0, 170.0, 10.0, 179.0,
        ];
        let counter = RepCounter::default();
        let mut st = RepCounterState::new();
        let mut last = 0;
        for a in angles {
            let t = counter.observe(a, &mut st).unwrap();
            match t {
                Transition::RepCompleted { new_count } => {
                    assert_eq!(new_count, last + 1);
                    assert_eq!(st.count, new_count);
                }
                _ => assert_eq!(st.count, last),
            }
            last = st.count;
        }
        assert_eq!(st.count, 3);
    }

    #[test]
    fn out_of_range_angle_is_rejected_without_mutation() {
        let counter = RepCounter::default();
        let mut st = RepCounterState::new();
        counter.observe(80.0, &mut st).unwrap();
        let before = st.snapshot();

        assert_eq!(
            counter.observe(200.0, &mut st),
            Err(CounterError::InvalidAngle(200.0))
        );
        assert!(counter.observe(-5.0, &mut st).is_err());
        assert!(counter.observe(f32::INFINITY, &mut st).is_err());
        assert_eq!(st, before);
    }

    #[test]
    fn custom_thresholds() {
        let counter = RepCounter::new(Thresholds {
            down: 60.0,
            up: 120.0,
        });
        let (st, _) = counter.replay([70.0, 130.0]).unwrap();
        assert_eq!(st.count, 0);
        let (st, _) = counter.replay([50.0, 130.0]).unwrap();
        assert_eq!(st.count, 1);
    }

    #[test]
    fn count_saturates_instead_of_overflowing() {
        let counter = RepCounter::default();
        let mut st = RepCounterState {
            phase: Phase::Down,
            count: u32::MAX,
        };
        assert_eq!(
            counter.observe(170.0, &mut st),
            Ok(Transition::RepCompleted { new_count: u32::MAX })
        );
        assert_eq!(st.count, u32::MAX);
        assert_eq!(st.phase, Phase::Up);
    }

    #[test]
    fn reset_returns_to_unknown() {
        let (mut st, _) = run(&[80.0, 170.0, 80.0]);
        assert_eq!(st.count, 1);
        st.reset();
        assert_eq!(st, RepCounterState::new());
    }

    #[test]
    fn transition_serializes_tagged() {
        let v = serde_json::to_value(Transition::RepCompleted { new_count: 2 }).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "rep_completed", "new_count": 2}));
        let v = serde_json::to_value(Phase::Down).unwrap();
        assert_eq!(v, serde_json::json!("down"));
    }
}
