use std::io;

/// Lights wired to the chamber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Light {
    House,
    Hopper,
}

#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("peripheral driver unavailable: {0}")]
    Unavailable(String),
    #[error("GPIO {pin}: {reason}")]
    Pin { pin: u8, reason: String },
    #[error("servo: {0}")]
    Servo(String),
    #[error("hopper calibration: {0}")]
    Calibration(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Actuation interface of the operant chamber
pub trait Peripherals {
    fn set_light(&mut self, light: Light, on: bool) -> Result<(), HwError>;
    /// Moves the hopper servo; `value` is a pulse width in microseconds
    fn set_servo_position(&mut self, value: u32) -> Result<(), HwError>;
    /// Releases the driver; no further commands are expected
    fn stop(&mut self) -> Result<(), HwError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralCommand {
    Light(Light, bool),
    Servo(u32),
    Stop,
}

/// In-memory chamber used by the test version and by tests
#[derive(Debug, Default)]
pub struct SimulatedPeripherals {
    commands: Vec<PeripheralCommand>,
    house_light: bool,
    hopper_light: bool,
    servo: Option<u32>,
    stopped: bool,
    servo_fault: bool,
}

impl SimulatedPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chamber whose servo refuses every command
    pub fn with_servo_fault() -> Self {
        Self {
            servo_fault: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[PeripheralCommand] {
        &self.commands
    }

    pub fn light(&self, light: Light) -> bool {
        match light {
            Light::House => self.house_light,
            Light::Hopper => self.hopper_light,
        }
    }

    pub fn servo(&self) -> Option<u32> {
        self.servo
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Peripherals for SimulatedPeripherals {
    fn set_light(&mut self, light: Light, on: bool) -> Result<(), HwError> {
        self.commands.push(PeripheralCommand::Light(light, on));
        match light {
            Light::House => self.house_light = on,
            Light::Hopper => self.hopper_light = on,
        }
        Ok(())
    }

    fn set_servo_position(&mut self, value: u32) -> Result<(), HwError> {
        if self.servo_fault {
            return Err(HwError::Servo(format!("simulated fault moving to {value}")));
        }
        self.commands.push(PeripheralCommand::Servo(value));
        self.servo = Some(value);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HwError> {
        self.commands.push(PeripheralCommand::Stop);
        self.stopped = true;
        Ok(())
    }
}
