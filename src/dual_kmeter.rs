//! DualKmeter module: two K-type thermocouple inputs behind one converter.
//!
//! Only the selected channel is converted. The address is set with a
//! four-position DIP switch, see [`dip_switch_address`].

use std::fmt::Debug;

use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::{debug, error, warn};
use serde::Serialize;

use crate::error::Error;
use crate::kmeter_iso::{
    decode_temperature, read_temperature_when_ready, MeasurementUnit, FIRMWARE_VERSION_REG,
    SINGLESHOT_TIMEOUT_MS,
};
use crate::periodic::{wait_ready, Periodic, PeriodicMeasurement};
use crate::register::I2cDevice;
use crate::unit::{Unit, UnitKind};

/// Address with every DIP switch off.
pub const ADDRESS: u8 = 0x11;

// Selected input, 0 or 1.
const CHANNEL_REG: u8 = 0x20;
// Zero when a result is available.
const STATUS_REG: u8 = 0x30;

/// Address selected by the DIP switches, switch 0 in bit 0.
pub const fn dip_switch_address(switches: u8) -> u8 {
    ADDRESS + (switches & 0x0F)
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Channel {
    One = 0,
    Two = 1,
}

impl Channel {
    fn from_register(v: u8) -> Option<Self> {
        match v {
            0 => Some(Channel::One),
            1 => Some(Channel::Two),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Data {
    pub raw: [u8; 4],
    /// Input selected when the sample was read
    pub channel: Channel,
}

impl Data {
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
    pub channel: Channel,
    pub measurement_unit: MeasurementUnit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            stored_size: 1,
            interval: 100,
            channel: Channel::One,
            measurement_unit: MeasurementUnit::Celsius,
        }
    }
}

pub struct DualKmeter<I2C, D> {
    device: I2cDevice<I2C>,
    delay: D,
    periodic: Periodic<Data>,
    config: Config,
    unit: MeasurementUnit,
    channel: Channel,
}

impl<I2C, D> DualKmeter<I2C, D> {
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
            channel: config.channel,
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

    /// Channel last written to the module.
    pub fn channel(&self) -> Channel {
        self.channel
    }

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

impl<I2C, D, E> DualKmeter<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        let cfg = self.config;
        if cfg.stored_size == 0 {
            error!("{}: stored_size must be greater than zero", UnitKind::DualKmeter);
            return Err(Error::InvalidArgument);
        }
        self.periodic.resize(cfg.stored_size);

        let version = self.read_firmware_version()?;
        if version == 0 {
            error!("{}: firmware version is zero", UnitKind::DualKmeter);
            return Err(Error::InvalidFirmware);
        }
        debug!("{}: FW {:02X}", UnitKind::DualKmeter, version);

        if cfg.start_periodic {
            self.start_periodic_measurement_with(cfg.interval, cfg.channel, cfg.measurement_unit)?;
        }
        Ok(())
    }

    /// Periodic step: stores a sample tagged with the selected channel.
    pub fn update(&mut self, now_ms: u64, force: bool) -> bool {
        let (register, channel) = (self.unit.register(), self.channel);
        let device = &mut self.device;
        self.periodic.poll(now_ms, force, || {
            Ok::<_, E>(
                read_temperature_when_ready(device, STATUS_REG, register)?
                    .map(|raw| Data { raw, channel }),
            )
        })
    }

    pub fn start_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.periodic.start(self.periodic.interval());
        Ok(())
    }

    /// Selects `channel`, then starts periodic measurement.
    pub fn start_periodic_measurement_with(
        &mut self,
        interval: u64,
        channel: Channel,
        unit: MeasurementUnit,
    ) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.write_current_channel(channel)?;
        self.periodic.start(interval);
        self.unit = unit;
        Ok(())
    }

    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if !self.periodic.stop() {
            warn!("{}: periodic measurements are not running", UnitKind::DualKmeter);
            return Err(Error::NotPeriodic);
        }
        Ok(())
    }

    pub fn read_status(&mut self) -> Result<u8, Error<E>> {
        Ok(self.device.read_register8(STATUS_REG)?)
    }

    pub fn read_firmware_version(&mut self) -> Result<u8, Error<E>> {
        Ok(self.device.read_register8(FIRMWARE_VERSION_REG)?)
    }

    pub fn read_current_channel(&mut self) -> Result<Channel, Error<E>> {
        let v = self.device.read_register8(CHANNEL_REG)?;
        Channel::from_register(v).ok_or_else(|| {
            error!("{}: illegal channel {}", UnitKind::DualKmeter, v);
            Error::InvalidData
        })
    }

    /// Selects the input and reads the selection back.
    pub fn write_current_channel(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.device.write_register8(CHANNEL_REG, channel as u8)?;
        let v = self.device.read_register8(CHANNEL_REG)?;
        if v != channel as u8 {
            error!("{}: channel {} not accepted, reads {}", UnitKind::DualKmeter, channel as u8, v);
            return Err(Error::VerifyFailed);
        }
        self.channel = channel;
        Ok(())
    }

    /// Measures `channel` once, then selects the previous channel again.
    pub fn measure_singleshot(&mut self, channel: Channel, unit: MeasurementUnit) -> Result<Data, Error<E>> {
        self.measure_singleshot_timeout(channel, unit, SINGLESHOT_TIMEOUT_MS)
    }

    pub fn measure_singleshot_timeout(
        &mut self,
        channel: Channel,
        unit: MeasurementUnit,
        timeout_ms: u32,
    ) -> Result<Data, Error<E>> {
        self.singleshot(channel, unit.register(), timeout_ms)
    }

    /// Cold junction temperature seen from `channel`.
    pub fn measure_internal_singleshot(
        &mut self,
        channel: Channel,
        unit: MeasurementUnit,
    ) -> Result<Data, Error<E>> {
        self.measure_internal_singleshot_timeout(channel, unit, SINGLESHOT_TIMEOUT_MS)
    }

    pub fn measure_internal_singleshot_timeout(
        &mut self,
        channel: Channel,
        unit: MeasurementUnit,
        timeout_ms: u32,
    ) -> Result<Data, Error<E>> {
        self.singleshot(channel, unit.internal_register(), timeout_ms)
    }

    fn singleshot(&mut self, channel: Channel, register: u8, timeout_ms: u32) -> Result<Data, Error<E>> {
        self.ensure_not_periodic()?;
        let previous = self.channel;
        self.write_current_channel(channel)?;

        let device = &mut self.device;
        let result = wait_ready(&mut self.delay, timeout_ms, || {
            read_temperature_when_ready(device, STATUS_REG, register)
        });
        if let Err(Error::Timeout) = result {
            warn!("{}: failed due to timeout", UnitKind::DualKmeter);
        }

        // Restore the selection even if the measurement failed
        let restored = self.write_current_channel(previous);
        let raw = result?;
        restored?;
        Ok(Data { raw, channel })
    }

    fn ensure_not_periodic(&self) -> Result<(), Error<E>> {
        if self.periodic.in_periodic() {
            warn!("{}: periodic measurements are running", UnitKind::DualKmeter);
            return Err(Error::PeriodicRunning);
        }
        Ok(())
    }
}

impl<I2C, D> PeriodicMeasurement for DualKmeter<I2C, D> {
    type Data = Data;

    fn periodic(&self) -> &Periodic<Data> {
        &self.periodic
    }

    fn periodic_mut(&mut self) -> &mut Periodic<Data> {
        &mut self.periodic
    }
}

impl<I2C, D> Unit for DualKmeter<I2C, D> {
    const KIND: UnitKind = UnitKind::DualKmeter;
    const DEFAULT_ADDRESS: u8 = ADDRESS;

    fn address(&self) -> u8 {
        self.device.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use pretty_assertions::assert_eq;

    fn read8(reg: u8, v: u8) -> Transaction {
        Transaction::write_read(ADDRESS, vec![reg], vec![v])
    }

    fn select(channel: u8) -> [Transaction; 2] {
        [
            Transaction::write(ADDRESS, vec![CHANNEL_REG, channel]),
            read8(CHANNEL_REG, channel),
        ]
    }

    fn read_temp(reg: u8, centi: i32) -> Transaction {
        Transaction::write_read(ADDRESS, vec![reg], centi.to_le_bytes().to_vec())
    }

    #[test]
    fn dip_switch_addresses() {
        assert_eq!(dip_switch_address(0b0000), 0x11);
        assert_eq!(dip_switch_address(0b0001), 0x12);
        assert_eq!(dip_switch_address(0b1111), 0x20);
        assert_eq!(dip_switch_address(0xF3), 0x14);
    }

    #[test]
    fn samples_carry_their_channel() {
        let mut expectations = vec![read8(FIRMWARE_VERSION_REG, 0x02)];
        expectations.extend(select(1));
        expectations.extend([read8(STATUS_REG, 0), read_temp(0x00, 0x1388)]);
        expectations.extend(select(0));
        expectations.extend([read8(STATUS_REG, 0), read_temp(0x00, -550)]);

        let mut k = DualKmeter::new(I2cMock::new(&expectations), MockNoop::new(), ADDRESS);
        k.set_config(Config {
            stored_size: 4,
            channel: Channel::Two,
            ..Default::default()
        });
        k.begin().unwrap();
        assert_eq!(k.channel(), Channel::Two);
        assert!(k.update(0, false));
        k.write_current_channel(Channel::One).unwrap();
        assert!(k.update(100, false));

        let samples: Vec<_> = k
            .periodic()
            .data()
            .iter()
            .map(|d| (d.channel, d.temperature()))
            .collect();
        assert_eq!(samples, vec![(Channel::Two, 50.0), (Channel::One, -5.5)]);
        k.release().0.done();
    }

    #[test]
    fn channel_write_is_verified() {
        let expectations = [
            Transaction::write(ADDRESS, vec![CHANNEL_REG, 1]),
            read8(CHANNEL_REG, 0),
            read8(CHANNEL_REG, 2),
        ];
        let mut k = DualKmeter::new(I2cMock::new(&expectations), MockNoop::new(), ADDRESS);
        assert_eq!(k.write_current_channel(Channel::Two), Err(Error::VerifyFailed));
        assert_eq!(k.channel(), Channel::One);
        assert_eq!(k.read_current_channel(), Err(Error::InvalidData));
        k.release().0.done();
    }

    #[test]
    fn singleshot_restores_previous_channel() {
        let mut expectations = Vec::new();
        expectations.extend(select(1));
        expectations.extend([
            read8(STATUS_REG, 1),
            read8(STATUS_REG, 0),
            read_temp(0x14, 9860),
        ]);
        expectations.extend(select(0));
        let mut k = DualKmeter::new(I2cMock::new(&expectations), MockNoop::new(), ADDRESS);
        let data = k
            .measure_internal_singleshot(Channel::Two, MeasurementUnit::Fahrenheit)
            .unwrap();
        assert_eq!(data.channel, Channel::Two);
        assert_eq!(data.temperature(), 98.6);
        assert_eq!(k.channel(), Channel::One);
        assert!(k.empty());
        k.release().0.done();
    }

    #[test]
    fn singleshot_timeout_still_restores_channel() {
        let mut expectations = Vec::new();
        expectations.extend(select(1));
        expectations.extend([read8(STATUS_REG, 1), read8(STATUS_REG, 1)]);
        expectations.extend(select(0));
        let mut k = DualKmeter::new(I2cMock::new(&expectations), MockNoop::new(), ADDRESS);
        assert_eq!(
            k.measure_singleshot_timeout(Channel::Two, MeasurementUnit::Celsius, 1),
            Err(Error::Timeout)
        );
        assert_eq!(k.channel(), Channel::One);
        k.release().0.done();
    }

    #[test]
    fn periodic_excludes_singleshot() {
        let mut k = DualKmeter::new(I2cMock::new(&[]), MockNoop::new(), dip_switch_address(0));
        k.start_periodic_measurement().unwrap();
        assert_eq!(k.interval(), 100);
        assert_eq!(k.start_periodic_measurement(), Err(Error::PeriodicRunning));
        assert_eq!(
            k.start_periodic_measurement_with(10, Channel::Two, MeasurementUnit::Celsius),
            Err(Error::PeriodicRunning)
        );
        assert_eq!(
            k.measure_singleshot(Channel::One, MeasurementUnit::Celsius),
            Err(Error::PeriodicRunning)
        );
        k.stop_periodic_measurement().unwrap();
        assert_eq!(k.stop_periodic_measurement(), Err(Error::NotPeriodic));
        assert!(!k.update(1000, true));
        k.release().0.done();
    }
}
