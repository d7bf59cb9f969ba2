pub mod chamber;
pub mod peripherals;
#[cfg(feature = "rpi")]
pub mod rpi;

pub use chamber::{HopperCalibration, OperantBox};
pub use peripherals::{HwError, Light, PeripheralCommand, Peripherals, SimulatedPeripherals};
#[cfg(feature = "rpi")]
pub use rpi::RpiPeripherals;
