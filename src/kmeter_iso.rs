//! KmeterISO isolated K-type thermocouple unit.

use std::fmt::Debug;

use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::{debug, error, warn};
use serde::Serialize;

use crate::error::Error;
use crate::periodic::{wait_ready, Periodic, PeriodicMeasurement};
use crate::register::{is_valid_i2c_address, I2cDevice};
use crate::unit::{Unit, UnitKind};

pub const ADDRESS: u8 = 0x66;

// Thermocouple temperature, 4 bytes little-endian, 0.01 degree per LSB.
const TEMPERATURE_CELSIUS_REG: u8 = 0x00;
const TEMPERATURE_FAHRENHEIT_REG: u8 = 0x04;
// Cold junction temperature, same format.
const INTERNAL_TEMPERATURE_CELSIUS_REG: u8 = 0x10;
const INTERNAL_TEMPERATURE_FAHRENHEIT_REG: u8 = 0x14;
// Zero when a result is available.
const STATUS_REG: u8 = 0x20;
pub(crate) const FIRMWARE_VERSION_REG: u8 = 0xFE;
const I2C_ADDRESS_REG: u8 = 0xFF;

pub(crate) const SINGLESHOT_TIMEOUT_MS: u32 = 100;
const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
pub enum MeasurementUnit {
    Celsius,
    Fahrenheit,
}

impl MeasurementUnit {
    pub(crate) fn register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => TEMPERATURE_CELSIUS_REG,
            MeasurementUnit::Fahrenheit => TEMPERATURE_FAHRENHEIT_REG,
        }
    }

    pub(crate) fn internal_register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => INTERNAL_TEMPERATURE_CELSIUS_REG,
            MeasurementUnit::Fahrenheit => INTERNAL_TEMPERATURE_FAHRENHEIT_REG,
        }
    }
}

/// Decodes a temperature register: signed 32-bit little-endian hundredths.
pub fn decode_temperature(raw: [u8; 4]) -> f32 {
    i32::from_le_bytes(raw) as f32 / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Data {
    pub raw: [u8; 4],
}

impl Data {
    /// Temperature in the unit it was read in.
    pub fn temperature(&self) -> f32 {
        decode_temperature(self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Start periodic measurement on begin?
    pub start_periodic: bool,
    /// Number of samples kept
    pub stored_size: usize,
    /// Periodic interval in ms
    pub interval: u64,
    pub measurement_unit: MeasurementUnit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            stored_size: 1,
            interval: 100,
            measurement_unit: MeasurementUnit::Celsius,
        }
    }
}

pub struct KmeterIso<I2C, D> {
    device: I2cDevice<I2C>,
    delay: D,
    periodic: Periodic<Data>,
    config: Config,
    unit: MeasurementUnit,
}

impl<I2C, D> KmeterIso<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        let config = Config::default();
        let mut periodic = Periodic::new(1);
        periodic.set_interval(config.interval);
        Self {
            device: I2cDevice::new(i2c, address),
            delay,
            periodic,
            config,
            unit: config.measurement_unit,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.device.release(), self.delay)
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Sets what `begin()` applies.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Unit periodic samples are read in.
    pub fn measurement_unit(&self) -> MeasurementUnit {
        self.unit
    }

    /// Oldest temperature, NaN if there is none.
    pub fn temperature(&self) -> f32 {
        self.periodic
            .data()
            .oldest()
            .map_or(f32::NAN, Data::temperature)
    }
}

impl<I2C, D, E> KmeterIso<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        let cfg = self.config;
        if cfg.stored_size == 0 {
            error!("{}: stored_size must be greater than zero", UnitKind::KmeterIso);
            return Err(Error::InvalidArgument);
        }
        self.periodic.resize(cfg.stored_size);

        let version = self.read_firmware_version()?;
        if version == 0 {
            error!("{}: firmware version is zero", UnitKind::KmeterIso);
            return Err(Error::InvalidFirmware);
        }
        debug!("{}: FW {:02X}", UnitKind::KmeterIso, version);

        if cfg.start_periodic {
            self.start_periodic_measurement_with(cfg.interval, cfg.measurement_unit)?;
        }
        Ok(())
    }

    /// Periodic step: stores a sample when the unit reports one ready.
    pub fn update(&mut self, now_ms: u64, force: bool) -> bool {
        let register = self.unit.register();
        let device = &mut self.device;
        self.periodic.poll(now_ms, force, || read_when_ready(device, STATUS_REG, register))
    }

    pub fn start_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if !self.periodic.start(self.periodic.interval()) {
            warn!("{}: periodic measurements are running", UnitKind::KmeterIso);
            return Err(Error::PeriodicRunning);
        }
        Ok(())
    }

    pub fn start_periodic_measurement_with(
        &mut self,
        interval: u64,
        unit: MeasurementUnit,
    ) -> Result<(), Error<E>> {
        if !self.periodic.start(interval) {
            warn!("{}: periodic measurements are running", UnitKind::KmeterIso);
            return Err(Error::PeriodicRunning);
        }
        self.unit = unit;
        Ok(())
    }

    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if !self.periodic.stop() {
            warn!("{}: periodic measurements are not running", UnitKind::KmeterIso);
            return Err(Error::NotPeriodic);
        }
        Ok(())
    }

    /// Status register; zero when a result is available.
    pub fn read_status(&mut self) -> Result<u8, Error<E>> {
        Ok(self.device.read_register8(STATUS_REG)?)
    }

    pub fn read_firmware_version(&mut self) -> Result<u8, Error<E>> {
        Ok(self.device.read_register8(FIRMWARE_VERSION_REG)?)
    }

    /// Waits up to 100 ms for a thermocouple reading.
    pub fn measure_singleshot(&mut self, unit: MeasurementUnit) -> Result<Data, Error<E>> {
        self.measure_singleshot_timeout(unit, SINGLESHOT_TIMEOUT_MS)
    }

    pub fn measure_singleshot_timeout(
        &mut self,
        unit: MeasurementUnit,
        timeout_ms: u32,
    ) -> Result<Data, Error<E>> {
        self.singleshot(unit.register(), timeout_ms)
    }

    /// Waits up to 100 ms for a cold junction reading.
    pub fn measure_internal_singleshot(&mut self, unit: MeasurementUnit) -> Result<Data, Error<E>> {
        self.measure_internal_singleshot_timeout(unit, SINGLESHOT_TIMEOUT_MS)
    }

    pub fn measure_internal_singleshot_timeout(
        &mut self,
        unit: MeasurementUnit,
        timeout_ms: u32,
    ) -> Result<Data, Error<E>> {
        self.singleshot(unit.internal_register(), timeout_ms)
    }

    /// Moves the unit to `address` and waits until it answers there.
    ///
    /// The driver follows the unit to the new address once the write is
    /// accepted, even if the confirmation times out.
    pub fn change_i2c_address(&mut self, address: u8) -> Result<(), Error<E>> {
        if let Err(e) = self.periodic.ensure_idle() {
            warn!("{}: periodic measurements are running", UnitKind::KmeterIso);
            return Err(e);
        }
        if !is_valid_i2c_address(address) {
            error!("{}: invalid address {:02X}", UnitKind::KmeterIso, address);
            return Err(Error::InvalidArgument);
        }
        self.device.write_register8(I2C_ADDRESS_REG, address)?;
        self.device.set_address(address);

        let device = &mut self.device;
        // The unit restarts and does not answer for a while
        let confirmed = wait_ready(
            &mut self.delay,
            ADDRESS_CHANGE_TIMEOUT_MS,
            || -> Result<Option<()>, E> {
                match device.read_register8(I2C_ADDRESS_REG) {
                    Ok(v) if v == address => Ok(Some(())),
                    _ => Ok(None),
                }
            },
        );
        if confirmed.is_err() {
            warn!("{}: address change to {:02X} not confirmed", UnitKind::KmeterIso, address);
        }
        confirmed
    }

    pub fn read_i2c_address(&mut self) -> Result<u8, Error<E>> {
        Ok(self.device.read_register8(I2C_ADDRESS_REG)?)
    }

    fn singleshot(&mut self, register: u8, timeout_ms: u32) -> Result<Data, Error<E>> {
        if let Err(e) = self.periodic.ensure_idle() {
            warn!("{}: periodic measurements are running", UnitKind::KmeterIso);
            return Err(e);
        }
        let device = &mut self.device;
        let result = wait_ready(&mut self.delay, timeout_ms, || {
            read_when_ready(device, STATUS_REG, register)
        });
        if let Err(Error::Timeout) = result {
            warn!("{}: failed due to timeout", UnitKind::KmeterIso);
        }
        result
    }
}

impl<I2C, D> PeriodicMeasurement for KmeterIso<I2C, D> {
    type Data = Data;

    fn periodic(&self) -> &Periodic<Data> {
        &self.periodic
    }

    fn periodic_mut(&mut self) -> &mut Periodic<Data> {
        &mut self.periodic
    }
}

impl<I2C, D> Unit for KmeterIso<I2C, D> {
    const KIND: UnitKind = UnitKind::KmeterIso;
    const DEFAULT_ADDRESS: u8 = ADDRESS;

    fn address(&self) -> u8 {
        self.device.address()
    }
}

/// Reads a 4-byte temperature register once `status` reads zero.
pub(crate) fn read_temperature_when_ready<I2C, E>(
    device: &mut I2cDevice<I2C>,
    status: u8,
    register: u8,
) -> Result<Option<[u8; 4]>, E>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    if device.read_register8(status)? != 0 {
        return Ok(None);
    }
    let mut raw = [0u8; 4];
    device.read_register(register, &mut raw)?;
    Ok(Some(raw))
}

fn read_when_ready<I2C, E>(device: &mut I2cDevice<I2C>, status: u8, register: u8) -> Result<Option<Data>, E>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    Ok(read_temperature_when_ready(device, status, register)?.map(|raw| Data { raw }))
}
