//! Application context shared by every HTTP handler.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::capture::Camera;
use crate::command::Command;
use crate::drive::{HBridge, MotorController, MotorState, MotorTiming, PwmChannel, SimHBridge, SimPwm};
use crate::error::CommandError;
use crate::DriveConfig;

/// Output hardware the robot drives.
pub struct Drivetrain {
    pub bridge: Box<dyn HBridge>,
    /// Enable/duty input shared by both motors.
    pub motor_pwm: Box<dyn PwmChannel>,
    /// Illumination LED.
    pub flash: Box<dyn PwmChannel>,
}

impl Drivetrain {
    /// Drivetrain with no hardware behind it; writes are logged and recorded.
    pub fn simulated() -> Self {
        Self::from_sim(SimHBridge::new(), SimPwm::new("motor"), SimPwm::new("flash"))
    }

    fn from_sim(bridge: SimHBridge, motor_pwm: SimPwm, flash: SimPwm) -> Self {
        Self {
            bridge: Box::new(bridge),
            motor_pwm: Box::new(motor_pwm),
            flash: Box::new(flash),
        }
    }
}

struct Controls {
    motor: MotorController<Box<dyn HBridge>>,
    motor_pwm: Box<dyn PwmChannel>,
    flash: Box<dyn PwmChannel>,
    speed: u8,
    no_stop: bool,
    flash_duty: u32,
}

/// Read-only copy of the drive-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub state: MotorState,
    pub timing: Option<MotorTiming>,
    pub speed: u8,
    pub no_stop: bool,
    pub flash_duty: u32,
}

/// The camera plus everything `/control` can change.
///
/// Drive state sits behind one mutex since handlers run concurrently. The
/// camera is not locked here; see [`Camera`].
pub struct Robot {
    camera: Arc<dyn Camera>,
    controls: Mutex<Controls>,
}

impl Robot {
    /// Stops the motors and writes the configured speed and flash duty.
    pub fn new(camera: Arc<dyn Camera>, hw: Drivetrain, config: &DriveConfig) -> Self {
        let Drivetrain {
            bridge,
            mut motor_pwm,
            mut flash,
        } = hw;

        motor_pwm.set_duty(config.speed.into());
        flash.set_duty(config.flash);
        info!(speed = config.speed, flash = config.flash, "drivetrain ready");

        Self {
            camera,
            controls: Mutex::new(Controls {
                motor: MotorController::new(bridge),
                motor_pwm,
                flash,
                speed: config.speed,
                no_stop: false,
                flash_duty: config.flash,
            }),
        }
    }

    pub fn camera(&self) -> &dyn Camera {
        &*self.camera
    }

    /// Shared handle to the camera, for handlers that move it to another thread.
    pub fn camera_handle(&self) -> Arc<dyn Camera> {
        Arc::clone(&self.camera)
    }

    fn controls(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one command. Only device setters can fail.
    pub fn execute(&self, cmd: Command) -> Result<(), CommandError> {
        debug!(?cmd, "control");
        match cmd {
            Command::FrameSize(val) => {
                // Resolution changes only make sense while the sensor does JPEG
                if self.camera.pixel_format().is_jpeg() {
                    self.camera.set_framesize(val)?;
                }
            }
            Command::Quality(val) => self.camera.set_quality(val)?,
            Command::Flash(val) => {
                let duty = val.max(0) as u32;
                let mut c = self.controls();
                c.flash.set_duty(duty);
                c.flash_duty = duty;
            }
            Command::Speed(val) => {
                let speed = val.clamp(0, 255) as u8;
                let mut c = self.controls();
                c.speed = speed;
                c.motor_pwm.set_duty(speed.into());
            }
            Command::NoStop(val) => self.controls().no_stop = val == 1,
            Command::Car(code) => {
                if let Some(state) = MotorState::from_car_code(code) {
                    info!(?state, "drive");
                    self.controls().motor.set_state(state);
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let c = self.controls();
        ControlSnapshot {
            state: c.motor.state(),
            timing: c.motor.timing(),
            speed: c.speed,
            no_stop: c.no_stop,
            flash_duty: c.flash_duty,
        }
    }
}
