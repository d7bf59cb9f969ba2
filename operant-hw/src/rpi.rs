use crate::peripherals::{HwError, Light, Peripherals};
use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;
use tracing::info;

// BCM numbering, not header pin numbers
pub const SERVO_GPIO: u8 = 2;
pub const HOPPER_LIGHT_GPIO: u8 = 13;
pub const HOUSE_LIGHT_GPIO: u8 = 21;

/// 50 Hz servo frame
const SERVO_PERIOD: Duration = Duration::from_millis(20);

pub struct RpiPeripherals {
    servo: OutputPin,
    hopper_light: OutputPin,
    house_light: OutputPin,
}

impl RpiPeripherals {
    /// Claims the chamber's pins. Any failure here is fatal for the session.
    pub fn open() -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Unavailable(e.to_string()))?;
        let output = |pin: u8| -> Result<OutputPin, HwError> {
            gpio.get(pin)
                .map(|p| p.into_output_low())
                .map_err(|e| HwError::Pin {
                    pin,
                    reason: e.to_string(),
                })
        };
        let rpi = Self {
            servo: output(SERVO_GPIO)?,
            hopper_light: output(HOPPER_LIGHT_GPIO)?,
            house_light: output(HOUSE_LIGHT_GPIO)?,
        };
        info!(
            "GPIO ready: servo {}, hopper light {}, house light {}",
            SERVO_GPIO, HOPPER_LIGHT_GPIO, HOUSE_LIGHT_GPIO
        );
        Ok(rpi)
    }
}

impl Peripherals for RpiPeripherals {
    fn set_light(&mut self, light: Light, on: bool) -> Result<(), HwError> {
        let pin = match light {
            Light::House => &mut self.house_light,
            Light::Hopper => &mut self.hopper_light,
        };
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn set_servo_position(&mut self, value: u32) -> Result<(), HwError> {
        self.servo
            .set_pwm(SERVO_PERIOD, Duration::from_micros(value as u64))
            .map_err(|e| HwError::Servo(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), HwError> {
        self.servo
            .clear_pwm()
            .map_err(|e| HwError::Servo(e.to_string()))?;
        self.servo.set_low();
        self.hopper_light.set_low();
        self.house_light.set_low();
        Ok(())
    }
}
