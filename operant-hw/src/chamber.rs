use crate::peripherals::{HwError, Light, Peripherals};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Settling time between lowering the hopper and stopping the servo
pub const SHUTDOWN_SETTLE: Duration = Duration::from_secs(1);

/// Servo pulse widths (µs) for the raised and lowered hopper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopperCalibration {
    pub up: u32,
    pub down: u32,
}

impl Default for HopperCalibration {
    fn default() -> Self {
        Self {
            up: 1500,
            down: 1000,
        }
    }
}

impl HopperCalibration {
    /// Reads the box's `Hopper_vals.csv`: a header row, then `up,down`
    pub fn load(path: &Path) -> Result<Self, HwError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, HwError> {
        let row = text
            .lines()
            .nth(1)
            .ok_or_else(|| HwError::Calibration("missing value row".into()))?;
        let mut fields = row.split(',').map(str::trim);
        let mut next = |name: &str| -> Result<u32, HwError> {
            let raw = fields
                .next()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| HwError::Calibration(format!("missing {name} value")))?;
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| v.round() as u32)
                .ok_or_else(|| HwError::Calibration(format!("bad {name} value '{raw}'")))
        };
        let up = next("up")?;
        let down = next("down")?;
        Ok(Self { up, down })
    }
}

/// The chamber as the session sees it: one owner of every actuator.
///
/// Each method issues the full command set for one session transition.
pub struct OperantBox<P: Peripherals> {
    peripherals: P,
    hopper: HopperCalibration,
    stopped: bool,
}

impl<P: Peripherals> OperantBox<P> {
    pub fn new(peripherals: P, hopper: HopperCalibration) -> Self {
        Self {
            peripherals,
            hopper,
            stopped: false,
        }
    }

    pub fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn hopper(&self) -> HopperCalibration {
        self.hopper
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Trial start
    pub fn house_light_on(&mut self) -> Result<(), HwError> {
        self.peripherals.set_light(Light::House, true)
    }

    pub fn present_reinforcer(&mut self) -> Result<(), HwError> {
        self.peripherals.set_light(Light::House, false)?;
        self.peripherals.set_light(Light::Hopper, true)?;
        self.peripherals.set_servo_position(self.hopper.up)
    }

    /// ITI start: everything dark, hopper down
    pub fn reset_for_iti(&mut self) -> Result<(), HwError> {
        self.peripherals.set_light(Light::Hopper, false)?;
        self.peripherals.set_servo_position(self.hopper.down)?;
        self.peripherals.set_light(Light::House, false)
    }

    /// Safety shutdown. Runs at most once; every step is attempted even if
    /// an earlier one fails, and the first failure is returned.
    pub fn shutdown(&mut self, settle: impl FnOnce(Duration)) -> Result<(), HwError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let mut first_err = None;
        let mut note = |step: &str, r: Result<(), HwError>| {
            if let Err(e) = r {
                warn!("Chamber shutdown: {} failed: {}", step, e);
                first_err.get_or_insert(e);
            }
        };
        note("hopper light", self.peripherals.set_light(Light::Hopper, false));
        note("house light", self.peripherals.set_light(Light::House, false));
        note("hopper down", self.peripherals.set_servo_position(self.hopper.down));
        settle(SHUTDOWN_SETTLE);
        note("stop", self.peripherals.stop());
        info!("Chamber peripherals stopped");

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
