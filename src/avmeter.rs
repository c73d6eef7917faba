//! Ameter and Vmeter units: an isolated ADS1115 behind a fixed input
//! divider, with per-gain calibration in an EEPROM on the same bus.

use core::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
use std::fmt::Debug;

use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::error;

use crate::ads111x::{self, Ads1115};
use crate::eeprom::CalibrationEeprom;
use crate::error::Error;
use crate::periodic::{Periodic, PeriodicMeasurement};
use crate::register::is_valid_i2c_address;
use crate::unit::{Unit, UnitKind};

/// What the meter measures.
pub trait MeterKind {
    const KIND: UnitKind;
    const ADC_ADDRESS: u8;
    const EEPROM_ADDRESS: u8;
    /// Gain of the input stage in front of the ADC.
    const PRESSURE_COEFFICIENT: f32;
}

pub mod meter {
    use super::MeterKind;
    use crate::unit::UnitKind;

    /// Readings in mA.
    #[derive(Debug)]
    pub struct Amp;
    /// Readings in mV.
    #[derive(Debug)]
    pub struct Volt;

    impl MeterKind for Amp {
        const KIND: UnitKind = UnitKind::Ameter;
        const ADC_ADDRESS: u8 = 0x48;
        const EEPROM_ADDRESS: u8 = 0x51;
        const PRESSURE_COEFFICIENT: f32 = 0.05;
    }

    impl MeterKind for Volt {
        const KIND: UnitKind = UnitKind::Vmeter;
        const ADC_ADDRESS: u8 = 0x49;
        const EEPROM_ADDRESS: u8 = 0x53;
        const PRESSURE_COEFFICIENT: f32 = 0.01591895;
    }
}

pub type Ameter<I2C, D> = AvMeter<I2C, D, meter::Amp>;
pub type Vmeter<I2C, D> = AvMeter<I2C, D, meter::Volt>;

pub struct AvMeter<I2C, D, K> {
    adc: Ads1115<I2C, D>,
    eeprom: CalibrationEeprom,
    kind: PhantomData<K>,
}

impl<I2C, D, K: MeterKind> AvMeter<I2C, D, K> {
    /// Creates a driver at the unit's factory addresses.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_addresses(i2c, delay, K::ADC_ADDRESS, K::EEPROM_ADDRESS)
    }

    pub fn with_addresses(i2c: I2C, delay: D, address: u8, eeprom_address: u8) -> Self {
        Self {
            adc: Ads1115::new(i2c, delay, address),
            eeprom: CalibrationEeprom::new(eeprom_address),
            kind: PhantomData,
        }
    }

    pub fn release(self) -> (I2C, D) {
        self.adc.release()
    }

    pub fn eeprom(&self) -> &CalibrationEeprom {
        &self.eeprom
    }

    /// Physical units per LSB at the current gain, before calibration.
    pub fn resolution(&self) -> f32 {
        self.adc.coefficient() / K::PRESSURE_COEFFICIENT
    }

    /// Calibration factor for the current gain.
    pub fn calibration_factor(&self) -> f32 {
        self.eeprom.calibration_factor(self.adc.gain())
    }

    /// Physical units per LSB at the current gain, calibrated.
    pub fn correction(&self) -> f32 {
        self.resolution() * self.calibration_factor()
    }

    /// Converts a sample using the gain it was taken with.
    pub fn convert(&self, data: &ads111x::Data) -> f32 {
        data.adc() as f32 * data.gain.coefficient() / K::PRESSURE_COEFFICIENT
            * self.eeprom.calibration_factor(data.gain)
    }

    fn oldest_converted(&self) -> f32 {
        self.adc
            .oldest()
            .map_or(f32::NAN, |data| self.convert(data))
    }
}

impl<I2C, D> Ameter<I2C, D> {
    /// Oldest current in mA, NaN if there is none.
    pub fn current(&self) -> f32 {
        self.oldest_converted()
    }
}

impl<I2C, D> Vmeter<I2C, D> {
    /// Oldest voltage in mV, NaN if there is none.
    pub fn voltage(&self) -> f32 {
        self.oldest_converted()
    }
}

impl<I2C, D, K, E> AvMeter<I2C, D, K>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    K: MeterKind,
    E: Debug,
{
    /// Reads the calibration table, then starts the ADC.
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        if !is_valid_i2c_address(self.eeprom.address()) {
            error!("{}: invalid EEPROM address {:#04x}", K::KIND, self.eeprom.address());
            return Err(Error::InvalidArgument);
        }
        self.read_calibration()?;
        self.adc.begin()
    }

    /// Re-reads the calibration table from the EEPROM.
    pub fn read_calibration(&mut self) -> Result<(), Error<E>> {
        self.eeprom.read_calibration(self.adc.device_mut())
    }
}

impl<I2C, D, K> Deref for AvMeter<I2C, D, K> {
    type Target = Ads1115<I2C, D>;

    fn deref(&self) -> &Self::Target {
        &self.adc
    }
}

impl<I2C, D, K> DerefMut for AvMeter<I2C, D, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.adc
    }
}

impl<I2C, D, K> PeriodicMeasurement for AvMeter<I2C, D, K> {
    type Data = ads111x::Data;

    fn periodic(&self) -> &Periodic<ads111x::Data> {
        self.adc.periodic()
    }

    fn periodic_mut(&mut self) -> &mut Periodic<ads111x::Data> {
        self.adc.periodic_mut()
    }
}

impl<I2C, D, K: MeterKind> Unit for AvMeter<I2C, D, K> {
    const KIND: UnitKind = K::KIND;
    const DEFAULT_ADDRESS: u8 = K::ADC_ADDRESS;

    fn address(&self) -> u8 {
        self.adc.address()
    }
}
