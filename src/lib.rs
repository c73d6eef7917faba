//! Drivers for I2C meter units.
//!
//! Every driver is generic over an `embedded-hal` blocking I2C bus and a
//! millisecond delay. Periodic drivers are stepped by calling `update`
//! with the current time in ms and keep their samples in a bounded
//! buffer, see [`PeriodicMeasurement`].

pub mod ads111x;
pub mod avmeter;
pub mod buffer;
pub mod dual_kmeter;
pub mod eeprom;
pub mod error;
pub mod ina226;
pub mod kmeter_iso;
pub mod periodic;
pub mod register;
pub mod unit;

pub use ads111x::{Ads1113, Ads1114, Ads1115, Capabilities};
pub use avmeter::{Ameter, Vmeter};
pub use dual_kmeter::DualKmeter;
pub use error::Error;
pub use ina226::Ina226;
pub use kmeter_iso::KmeterIso;
pub use periodic::PeriodicMeasurement;
pub use unit::{Unit, UnitKind};
