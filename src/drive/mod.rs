//! Drive state for a two-motor differential robot.
//!
//! Each command maps to one fixed pattern on the four H-bridge direction
//! lines. A new command overwrites the old one completely; there is no
//! queueing, blending or interlock between states.

pub mod hal;

use std::time::{Duration, Instant};

use tracing::debug;

pub use hal::{HBridge, PwmChannel, SimHBridge, SimPwm};

/// Auto-stop interval recorded for straight-line motion.
pub const STRAIGHT_INTERVAL: Duration = Duration::from_millis(250);
/// Auto-stop interval recorded for turns.
pub const TURN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Stopped,
    Forward,
    Backward,
    TurningLeft,
    TurningRight,
}

impl MotorState {
    /// Map a `car` command value from `/control`. Unknown codes map to nothing.
    pub fn from_car_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(MotorState::Forward),
            2 => Some(MotorState::TurningLeft),
            3 => Some(MotorState::Stopped),
            4 => Some(MotorState::TurningRight),
            5 => Some(MotorState::Backward),
            _ => None,
        }
    }

    /// Direction line pattern for this state.
    pub fn lines(self) -> MotorLines {
        let (lf, lb, rf, rb) = match self {
            MotorState::Stopped => (false, false, false, false),
            MotorState::Forward => (true, false, true, false),
            MotorState::Backward => (false, true, false, true),
            MotorState::TurningLeft => (true, false, false, false),
            MotorState::TurningRight => (false, false, true, false),
        };
        MotorLines {
            left_forward: lf,
            left_backward: lb,
            right_forward: rf,
            right_backward: rb,
        }
    }

    /// Advisory auto-stop interval, `None` for [`MotorState::Stopped`].
    pub fn interval(self) -> Option<Duration> {
        match self {
            MotorState::Stopped => None,
            MotorState::Forward | MotorState::Backward => Some(STRAIGHT_INTERVAL),
            MotorState::TurningLeft | MotorState::TurningRight => Some(TURN_INTERVAL),
        }
    }
}

/// Levels of the four H-bridge direction inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorLines {
    pub left_forward: bool,
    pub left_backward: bool,
    pub right_forward: bool,
    pub right_backward: bool,
}

/// When the last directional command started and how long it is meant to run.
///
/// Nothing in this crate acts on it; an outer loop may use it to stop the
/// robot once `interval` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorTiming {
    pub last_transition: Instant,
    pub interval: Duration,
}

/// Owns the H-bridge and the current drive state.
pub struct MotorController<B> {
    bridge: B,
    state: MotorState,
    timing: Option<MotorTiming>,
}

impl<B: HBridge> MotorController<B> {
    /// Takes the bridge and drives it to [`MotorState::Stopped`].
    pub fn new(mut bridge: B) -> Self {
        bridge.write(MotorState::Stopped.lines());
        Self {
            bridge,
            state: MotorState::Stopped,
            timing: None,
        }
    }

    /// Unconditionally switch to `state`.
    pub fn set_state(&mut self, state: MotorState) {
        self.bridge.write(state.lines());
        self.state = state;
        if let Some(interval) = state.interval() {
            self.timing = Some(MotorTiming {
                last_transition: Instant::now(),
                interval,
            });
        }
        debug!(?state, "drive state");
    }

    pub fn stop(&mut self) {
        self.set_state(MotorState::Stopped)
    }

    pub fn forward(&mut self) {
        self.set_state(MotorState::Forward)
    }

    pub fn backward(&mut self) {
        self.set_state(MotorState::Backward)
    }

    pub fn turn_left(&mut self) {
        self.set_state(MotorState::TurningLeft)
    }

    pub fn turn_right(&mut self) {
        self.set_state(MotorState::TurningRight)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn lines(&self) -> MotorLines {
        self.state.lines()
    }

    pub fn timing(&self) -> Option<MotorTiming> {
        self.timing
    }
}
