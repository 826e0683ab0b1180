//! Motor driver and PWM output seams.
//!
//! Real boards implement these over GPIO and LEDC/PWM peripherals. The
//! `Sim*` types keep the last written values in memory and log every write,
//! for hosts with no motor hardware attached.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::drive::MotorLines;

/// The four direction inputs of a dual H-bridge, written as one group.
pub trait HBridge: Send {
    fn write(&mut self, lines: MotorLines);
}

impl<T: HBridge + ?Sized> HBridge for Box<T> {
    fn write(&mut self, lines: MotorLines) {
        (**self).write(lines)
    }
}

/// One PWM output channel.
pub trait PwmChannel: Send {
    fn set_duty(&mut self, duty: u32);
}

/// Shared view of what a simulated output has been told.
///
/// Holds the last value and a write count. Only a probe made with
/// [`Probe::recording`] also keeps every value, so long-running servers stay
/// at a fixed size.
#[derive(Debug, Clone)]
pub struct Probe<T>(Arc<Mutex<ProbeState<T>>>);

#[derive(Debug)]
struct ProbeState<T> {
    last: Option<T>,
    writes: u64,
    history: Option<Vec<T>>,
}

impl<T: Clone> Probe<T> {
    fn latest_only() -> Self {
        Self::with_history(None)
    }

    fn recording() -> Self {
        Self::with_history(Some(Vec::new()))
    }

    fn with_history(history: Option<Vec<T>>) -> Self {
        Self(Arc::new(Mutex::new(ProbeState {
            last: None,
            writes: 0,
            history,
        })))
    }

    fn state(&self) -> MutexGuard<'_, ProbeState<T>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, value: T) {
        let mut state = self.state();
        state.writes += 1;
        if let Some(history) = state.history.as_mut() {
            history.push(value.clone());
        }
        state.last = Some(value);
    }

    /// Every value written so far, oldest first. Empty unless recording.
    pub fn history(&self) -> Vec<T> {
        self.state().history.clone().unwrap_or_default()
    }

    pub fn last(&self) -> Option<T> {
        self.state().last.clone()
    }

    pub fn writes(&self) -> u64 {
        self.state().writes
    }
}

/// In-memory H-bridge.
#[derive(Debug)]
pub struct SimHBridge {
    probe: Probe<MotorLines>,
}

impl SimHBridge {
    /// Keeps only the last written pattern.
    pub fn new() -> Self {
        Self {
            probe: Probe::latest_only(),
        }
    }

    /// Keeps every written pattern.
    pub fn recording() -> Self {
        Self {
            probe: Probe::recording(),
        }
    }

    pub fn probe(&self) -> Probe<MotorLines> {
        self.probe.clone()
    }
}

impl HBridge for SimHBridge {
    fn write(&mut self, lines: MotorLines) {
        debug!(?lines, "h-bridge write");
        self.probe.push(lines);
    }
}

/// In-memory PWM channel.
#[derive(Debug)]
pub struct SimPwm {
    name: &'static str,
    probe: Probe<u32>,
}

impl SimPwm {
    /// Keeps only the last written duty.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            probe: Probe::latest_only(),
        }
    }

    /// Keeps every written duty.
    pub fn recording(name: &'static str) -> Self {
        Self {
            name,
            probe: Probe::recording(),
        }
    }

    pub fn probe(&self) -> Probe<u32> {
        self.probe.clone()
    }
}

impl PwmChannel for SimPwm {
    fn set_duty(&mut self, duty: u32) {
        debug!(channel = self.name, duty, "pwm write");
        self.probe.push(duty);
    }
}

impl Default for SimHBridge {
    fn default() -> Self {
        Self::new()
    }
}
