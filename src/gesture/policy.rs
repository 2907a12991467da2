use serde::{Deserialize, Serialize};

use crate::gesture::landmarks::GestureSignal;
use crate::gesture::tracker::GestureSink;
use crate::renderer::controls::{CameraControl, SharedControls};

/// Thresholds that turn hand motion into camera motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GesturePolicy {
    /// Palm movement in pixels at or below which no rotation happens.
    pub dead_zone: f32,
    /// Radians of rotation per pixel of palm movement.
    pub rotate_gain: f32,
    /// Pinch distances below this zoom in.
    pub pinch_close: f32,
    /// Pinch distances above this zoom out.
    pub pinch_open: f32,
    pub dolly_factor: f32,
}

impl Default for GesturePolicy {
    fn default() -> Self {
        Self {
            dead_zone: 1.0,
            rotate_gain: 0.002,
            pinch_close: 40.0,
            pinch_open: 100.0,
            dolly_factor: 1.02,
        }
    }
}

impl GesturePolicy {
    /// Returns false and leaves the controls untouched when no hand was seen.
    pub fn apply<C>(&self, signal: &GestureSignal, controls: &mut C) -> bool
    where
        C: CameraControl + ?Sized,
    {
        if !signal.hand_detected {
            return false;
        }

        if signal.delta_x.abs() > self.dead_zone {
            controls.rotate_left(signal.delta_x * self.rotate_gain);
        }
        if signal.delta_y.abs() > self.dead_zone {
            controls.rotate_up(signal.delta_y * self.rotate_gain);
        }

        if signal.pinch_distance < self.pinch_close {
            controls.dolly_in(self.dolly_factor);
        } else if signal.pinch_distance > self.pinch_open {
            controls.dolly_out(self.dolly_factor);
        }

        controls.update();
        true
    }
}

/// Feeds tracker signals into the shared orbit controls.
pub struct ControlsSink {
    controls: SharedControls,
    policy: GesturePolicy,
}

impl ControlsSink {
    pub fn new(controls: SharedControls, policy: GesturePolicy) -> Self {
        Self { controls, policy }
    }
}

impl GestureSink for ControlsSink {
    fn on_signal(&self, signal: &GestureSignal) {
        let mut controls = self.controls.lock();
        self.policy.apply(signal, &mut *controls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        RotateLeft(f32),
        RotateUp(f32),
        DollyIn(f32),
        DollyOut(f32),
        Update,
        Reset,
    }

    #[derive(Default)]
    struct Recorder(Vec<Call>);

    impl CameraControl for Recorder {
        fn rotate_left(&mut self, angle: f32) {
            self.0.push(Call::RotateLeft(angle));
        }
        fn rotate_up(&mut self, angle: f32) {
            self.0.push(Call::RotateUp(angle));
        }
        fn dolly_in(&mut self, factor: f32) {
            self.0.push(Call::DollyIn(factor));
        }
        fn dolly_out(&mut self, factor: f32) {
            self.0.push(Call::DollyOut(factor));
        }
        fn update(&mut self) {
            self.0.push(Call::Update);
        }
        fn reset(&mut self) {
            self.0.push(Call::Reset);
        }
    }

    fn signal(delta_x: f32, delta_y: f32, pinch_distance: f32) -> GestureSignal {
        GestureSignal {
            delta_x,
            delta_y,
            pinch_distance,
            hand_detected: true,
        }
    }

    #[test]
    fn test_palm_move_rotates_left() {
        let mut rec = Recorder::default();
        GesturePolicy::default().apply(&signal(5.0, 0.0, 70.0), &mut rec);

        assert_eq!(rec.0.len(), 2);
        match rec.0[0] {
            Call::RotateLeft(angle) => assert!((angle - 0.01).abs() < 1e-7),
            ref other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rec.0[1], Call::Update);
    }

    #[rstest]
    #[case(1.0, 0.0)]
    #[case(-1.0, 0.5)]
    #[case(0.0, -1.0)]
    fn test_dead_zone_is_exclusive(#[case] dx: f32, #[case] dy: f32) {
        let mut rec = Recorder::default();
        GesturePolicy::default().apply(&signal(dx, dy, 70.0), &mut rec);
        assert_eq!(rec.0, vec![Call::Update]);
    }

    #[rstest]
    #[case(30.0, Some(Call::DollyIn(1.02)))]
    #[case(150.0, Some(Call::DollyOut(1.02)))]
    #[case(70.0, None)]
    #[case(40.0, None)]
    #[case(100.0, None)]
    fn test_pinch_thresholds(#[case] pinch: f32, #[case] expected: Option<Call>) {
        let mut rec = Recorder::default();
        GesturePolicy::default().apply(&signal(0.0, 0.0, pinch), &mut rec);

        let mut calls = Vec::new();
        calls.extend(expected);
        calls.push(Call::Update);
        assert_eq!(rec.0, calls);
    }

    #[test]
    fn test_no_hand_does_nothing() {
        let mut rec = Recorder::default();
        assert!(!GesturePolicy::default().apply(&GestureSignal::no_hand(), &mut rec));
        assert!(rec.0.is_empty());
    }

    #[test]
    fn test_vertical_motion_rotates_up() {
        let mut rec = Recorder::default();
        GesturePolicy::default().apply(&signal(0.0, -20.0, 70.0), &mut rec);
        match rec.0[0] {
            Call::RotateUp(angle) => assert!((angle + 0.04).abs() < 1e-7),
            ref other => panic!("unexpected {other:?}"),
        }
    }
}
