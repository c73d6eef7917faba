//! INA226 current, voltage and power monitor.

use std::fmt::Debug;

use bitfield::bitfield;
use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::{error, info, warn};
use serde::Serialize;

use crate::error::Error;
use crate::periodic::{wait_ready, Periodic, PeriodicMeasurement};
use crate::register::I2cDevice;
use crate::unit::{Unit, UnitKind};

pub const ADDRESS: u8 = 0x41;

// Operating mode, averaging and conversion times.
const CONFIGURATION_REG: u8 = 0x00;
// Shunt voltage, 2.5 µV/LSB.
const SHUNT_VOLTAGE_REG: u8 = 0x01;
// Bus voltage, 1.25 mV/LSB.
#[allow(dead_code)]
const BUS_VOLTAGE_REG: u8 = 0x02;
// Power, 25 current LSBs per LSB.
#[allow(dead_code)]
const POWER_REG: u8 = 0x03;
// Current, signed, one current LSB per LSB.
#[allow(dead_code)]
const CURRENT_REG: u8 = 0x04;
// Full-scale range and LSB of current and power.
const CALIBRATION_REG: u8 = 0x05;
// Alert configuration and conversion ready flag.
const MASK_REG: u8 = 0x06;
// Value compared against the selected alert function.
const ALERT_LIMIT_REG: u8 = 0x07;
const MANUFACTURER_ID_REG: u8 = 0xFE;
const DIE_ID_REG: u8 = 0xFF;

const MANUFACTURER_ID: u16 = 0x5449;
const DIE_ID: u16 = 0x2260;
/// Configuration register content after reset.
pub const DEFAULT_CONFIG_VALUE: u16 = 0x4127;

const SINGLESHOT_TIMEOUT_MS: u32 = 1000;
const RESET_SETTLE_MS: u32 = 2;
const OVERHEAD_PER_SAMPLE_US: u64 = 400;

/// Number of samples averaged per result.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Averaging {
    /// Default
    Avg1 = 0,
    Avg4 = 1,
    Avg16 = 2,
    Avg64 = 3,
    Avg128 = 4,
    Avg256 = 5,
    Avg512 = 6,
    Avg1024 = 7,
}

impl Averaging {
    pub fn samples(self) -> u16 {
        match self {
            Averaging::Avg1 => 1,
            Averaging::Avg4 => 4,
            Averaging::Avg16 => 16,
            Averaging::Avg64 => 64,
            Averaging::Avg128 => 128,
            Averaging::Avg256 => 256,
            Averaging::Avg512 => 512,
            Averaging::Avg1024 => 1024,
        }
    }
}

impl From<u8> for Averaging {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => Self::Avg1,
            1 => Self::Avg4,
            2 => Self::Avg16,
            3 => Self::Avg64,
            4 => Self::Avg128,
            5 => Self::Avg256,
            6 => Self::Avg512,
            _ => Self::Avg1024,
        }
    }
}

/// ADC conversion time of one phase.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ConversionTime {
    Us140 = 0,
    Us204 = 1,
    Us332 = 2,
    Us588 = 3,
    /// Default
    Us1100 = 4,
    Us2116 = 5,
    Us4156 = 6,
    Us8244 = 7,
}

impl ConversionTime {
    pub fn micros(self) -> u16 {
        match self {
            ConversionTime::Us140 => 140,
            ConversionTime::Us204 => 204,
            ConversionTime::Us332 => 332,
            ConversionTime::Us588 => 588,
            ConversionTime::Us1100 => 1100,
            ConversionTime::Us2116 => 2116,
            ConversionTime::Us4156 => 4156,
            ConversionTime::Us8244 => 8244,
        }
    }
}

impl From<u8> for ConversionTime {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => Self::Us140,
            1 => Self::Us204,
            2 => Self::Us332,
            3 => Self::Us588,
            4 => Self::Us1100,
            5 => Self::Us2116,
            6 => Self::Us4156,
            _ => Self::Us8244,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Mode {
    PowerDown = 0,
    ShuntVoltageSingle = 1,
    BusVoltageSingle = 2,
    ShuntAndBusSingle = 3,
    ShuntVoltage = 5,
    BusVoltage = 6,
    /// Default
    ShuntAndBus = 7,
}

impl From<u8> for Mode {
    // Code 4 is a second power-down code.
    fn from(v: u8) -> Self {
        match v & 0x07 {
            1 => Self::ShuntVoltageSingle,
            2 => Self::BusVoltageSingle,
            3 => Self::ShuntAndBusSingle,
            5 => Self::ShuntVoltage,
            6 => Self::BusVoltage,
            7 => Self::ShuntAndBus,
            _ => Self::PowerDown,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
pub enum Alert {
    /// More than one alert function is enabled
    Unknown,
    None,
    ShuntOver,
    ShuntUnder,
    BusOver,
    BusUnder,
    PowerOver,
    ConversionReady,
}

// Indexed by target bits: current 8, power 4, bus 2, shunt 1.
const SINGLE_OPERATION_TABLE: [Mode; 16] = [
    Mode::PowerDown,
    Mode::ShuntVoltageSingle,
    Mode::BusVoltageSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntVoltageSingle,
    Mode::ShuntVoltageSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
    Mode::ShuntAndBusSingle,
];

const PERIODIC_OPERATION_TABLE: [Mode; 16] = [
    Mode::PowerDown,
    Mode::ShuntVoltage,
    Mode::BusVoltage,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntVoltage,
    Mode::ShuntVoltage,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
    Mode::ShuntAndBus,
];

bitfield! {
    /// Image of the configuration register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ConfigRegister(u16);
    impl Debug;
    pub bool, reset, set_reset: 15;
    pub u8, avg_bits, set_avg_bits: 11, 9;
    pub u8, vbusct_bits, set_vbusct_bits: 8, 6;
    pub u8, vshct_bits, set_vshct_bits: 5, 3;
    pub u8, mode_bits, set_mode_bits: 2, 0;
}

impl ConfigRegister {
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn averaging(&self) -> Averaging {
        Averaging::from(self.avg_bits())
    }

    pub fn set_averaging(&mut self, avg: Averaging) {
        self.set_avg_bits(avg as u8)
    }

    pub fn bus_conversion_time(&self) -> ConversionTime {
        ConversionTime::from(self.vbusct_bits())
    }

    pub fn set_bus_conversion_time(&mut self, ct: ConversionTime) {
        self.set_vbusct_bits(ct as u8)
    }

    pub fn shunt_conversion_time(&self) -> ConversionTime {
        ConversionTime::from(self.vshct_bits())
    }

    pub fn set_shunt_conversion_time(&mut self, ct: ConversionTime) {
        self.set_vshct_bits(ct as u8)
    }

    pub fn mode(&self) -> Mode {
        Mode::from(self.mode_bits())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.set_mode_bits(mode as u8)
    }

    /// Time one result takes with these settings, in ms, rounded up.
    pub fn conversion_interval(&self) -> u64 {
        let n = self.averaging().samples() as u64;
        let bus = self.bus_conversion_time().micros() as u64;
        let shunt = self.shunt_conversion_time().micros() as u64;
        let us = match self.mode() {
            Mode::ShuntVoltageSingle | Mode::ShuntVoltage => n * shunt,
            Mode::BusVoltageSingle | Mode::BusVoltage => n * bus,
            Mode::ShuntAndBusSingle | Mode::ShuntAndBus => n * (bus + shunt),
            Mode::PowerDown => 0,
        };
        (us + n * OVERHEAD_PER_SAMPLE_US + 999) / 1000
    }
}

impl From<u16> for ConfigRegister {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

bitfield! {
    /// Image of the mask/enable register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MaskRegister(u16);
    impl Debug;
    /// Shunt voltage over-voltage
    pub bool, sol, set_sol: 15;
    /// Shunt voltage under-voltage
    pub bool, sul, set_sul: 14;
    /// Bus voltage over-voltage
    pub bool, bol, set_bol: 13;
    /// Bus voltage under-voltage
    pub bool, bul, set_bul: 12;
    /// Power over-limit
    pub bool, pol, set_pol: 11;
    /// Conversion ready
    pub bool, cnvr, set_cnvr: 10;
    /// Alert function flag
    pub bool, aff, _: 4;
    /// Conversion ready flag
    pub bool, cvrf, _: 3;
    /// Math overflow flag
    pub bool, ovf, _: 2;
    /// Alert pin active high
    pub bool, apol, set_apol: 1;
    /// Alert latch enable
    pub bool, len, set_len: 0;
}

impl MaskRegister {
    const ALERT_BITS: u16 = 0xFC00;

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn alert_bits(&self) -> u16 {
        self.0 & Self::ALERT_BITS
    }

    pub fn clear_alert_bits(&mut self) {
        self.0 &= !Self::ALERT_BITS;
    }

    /// Enabled alert function, `Unknown` if several are.
    pub fn alert(&self) -> Alert {
        let bits = self.alert_bits();
        if bits == 0 {
            return Alert::None;
        }
        if bits & (bits - 1) != 0 {
            return Alert::Unknown;
        }
        match bits {
            0x8000 => Alert::ShuntOver,
            0x4000 => Alert::ShuntUnder,
            0x2000 => Alert::BusOver,
            0x1000 => Alert::BusUnder,
            0x0800 => Alert::PowerOver,
            _ => Alert::ConversionReady,
        }
    }

    /// Enables exactly the function of `alert`. Returns false for
    /// `None` and `Unknown`.
    pub fn set_alert(&mut self, alert: Alert) -> bool {
        self.clear_alert_bits();
        match alert {
            Alert::ShuntOver => self.set_sol(true),
            Alert::ShuntUnder => self.set_sul(true),
            Alert::BusOver => self.set_bol(true),
            Alert::BusUnder => self.set_bul(true),
            Alert::PowerOver => self.set_pol(true),
            Alert::ConversionReady => self.set_cnvr(true),
            Alert::None | Alert::Unknown => return false,
        }
        true
    }
}

impl From<u16> for MaskRegister {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Which values a measurement reads.
///
/// Current and power are derived from the shunt voltage, so requesting
/// either one converts the shunt as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Targets {
    pub current: bool,
    pub voltage: bool,
    pub power: bool,
}

impl Targets {
    pub const ALL: Targets = Targets {
        current: true,
        voltage: true,
        power: true,
    };

    /// Registers to read, bit n for register 0x01 + n.
    pub fn bits(&self) -> u8 {
        (if self.current { 8 } else { 0 })
            | (if self.voltage { 2 } else { 0 })
            | (if self.power { 4 } else { 0 })
            | (if self.current || self.power { 1 } else { 0 })
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self::ALL
    }
}

/// One measurement. Registers that were not requested read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Data {
    /// Shunt, bus, power and current registers
    pub raw: [u16; 4],
    /// Current LSB in A in effect when the sample was taken
    pub current_lsb: f32,
}

impl Data {
    /// Shunt voltage in mV.
    pub fn shunt_voltage(&self) -> f32 {
        self.raw[0] as f32 * 0.0025
    }

    /// Bus voltage in mV.
    pub fn voltage(&self) -> f32 {
        self.raw[1] as f32 * 1.25
    }

    /// Power in mW.
    pub fn power(&self) -> f32 {
        self.raw[2] as f32 * self.current_lsb * 25.0 * 1000.0
    }

    /// Current in mA.
    pub fn current(&self) -> f32 {
        self.raw[3] as i16 as f32 * self.current_lsb * 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Config {
    /// Start periodic measurement on begin?
    pub start_periodic: bool,
    /// Number of samples kept
    pub stored_size: usize,
    pub targets: Targets,
    pub averaging: Averaging,
    pub shunt_conversion_time: ConversionTime,
    pub bus_conversion_time: ConversionTime,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            stored_size: 1,
            targets: Targets::ALL,
            averaging: Averaging::Avg16,
            shunt_conversion_time: ConversionTime::Us1100,
            bus_conversion_time: ConversionTime::Us1100,
        }
    }
}

pub struct Ina226<I2C, D> {
    device: I2cDevice<I2C>,
    delay: D,
    periodic: Periodic<Data>,
    config: Config,
    kind: UnitKind,
    shunt_resistance: f32,
    max_current: f32,
    current_lsb: f32,
    targets: u8,
}

impl<I2C, D> Ina226<I2C, D> {
    /// Creates a driver for an INA226 with the given shunt (Ω) and maximum
    /// expected current (A).
    ///
    /// Without `current_lsb` the finest LSB covering `max_current` is used.
    pub fn new(
        i2c: I2C,
        delay: D,
        address: u8,
        shunt_resistance: f32,
        max_current: f32,
        current_lsb: Option<f32>,
    ) -> Self {
        Self::with_kind(
            UnitKind::Ina226,
            i2c,
            delay,
            address,
            shunt_resistance,
            max_current,
            current_lsb,
        )
    }

    /// INA226-10A unit: 5 mΩ shunt, 10 A.
    pub fn new_10a(i2c: I2C, delay: D, current_lsb: Option<f32>) -> Self {
        Self::with_kind(UnitKind::Ina226_10A, i2c, delay, ADDRESS, 0.005, 10.0, current_lsb)
    }

    /// INA226-1A unit: 80 mΩ shunt, 1 A.
    pub fn new_1a(i2c: I2C, delay: D, current_lsb: Option<f32>) -> Self {
        Self::with_kind(UnitKind::Ina226_1A, i2c, delay, ADDRESS, 0.080, 1.0, current_lsb)
    }

    fn with_kind(
        kind: UnitKind,
        i2c: I2C,
        delay: D,
        address: u8,
        shunt_resistance: f32,
        max_current: f32,
        current_lsb: Option<f32>,
    ) -> Self {
        Self {
            device: I2cDevice::new(i2c, address),
            delay,
            periodic: Periodic::new(1),
            config: Config::default(),
            kind,
            shunt_resistance,
            max_current,
            current_lsb: current_lsb
                .filter(|lsb| *lsb != 0.0)
                .unwrap_or(max_current / 32767.0),
            targets: 0,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.device.release(), self.delay)
    }

    /// Preset this driver was built as; `Unit::KIND` is always `Ina226`.
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Sets what `begin()` applies.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn shunt_resistance(&self) -> f32 {
        self.shunt_resistance
    }

    pub fn max_current(&self) -> f32 {
        self.max_current
    }

    pub fn current_lsb(&self) -> f32 {
        self.current_lsb
    }

    /// Calibration register value for the shunt and current LSB, or
    /// `None` if it does not fit 16 bits.
    pub fn calibration_value(&self) -> Option<u16> {
        let cal = (0.00512 / (self.current_lsb * self.shunt_resistance)).round();
        if cal.is_finite() && (0.0..=65535.0).contains(&cal) {
            Some(cal as u16)
        } else {
            None
        }
    }

    pub fn shunt_voltage(&self) -> f32 {
        self.periodic
            .data()
            .oldest()
            .map_or(f32::NAN, Data::shunt_voltage)
    }

    pub fn voltage(&self) -> f32 {
        self.periodic.data().oldest().map_or(f32::NAN, Data::voltage)
    }

    pub fn power(&self) -> f32 {
        self.periodic.data().oldest().map_or(f32::NAN, Data::power)
    }

    pub fn current(&self) -> f32 {
        self.periodic.data().oldest().map_or(f32::NAN, Data::current)
    }
}

impl<I2C, D, E> Ina226<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        let cfg = self.config;
        if cfg.stored_size == 0 {
            error!("{}: stored_size must be greater than zero", self.kind);
            return Err(Error::InvalidArgument);
        }
        self.periodic.resize(cfg.stored_size);

        let cal = self.calibration_value().ok_or_else(|| {
            error!("{}: current LSB {} too small", self.kind, self.current_lsb);
            Error::CalibrationOverflow
        })?;

        let manufacturer = self.device.read_register16_be(MANUFACTURER_ID_REG)?;
        let die = self.device.read_register16_be(DIE_ID_REG)?;
        if manufacturer != MANUFACTURER_ID || die != DIE_ID {
            error!("{}: illegal ID M:{:#x} D:{:#x}", self.kind, manufacturer, die);
            return Err(Error::InvalidIdentity { manufacturer, die });
        }

        self.soft_reset(true)?;
        self.write_calibration(cal)?;
        info!("{}: current LSB {} CAL {}", self.kind, self.current_lsb, cal);

        self.power_down()?;
        if cfg.start_periodic {
            self.start_periodic_measurement_with(
                cfg.averaging,
                cfg.shunt_conversion_time,
                cfg.bus_conversion_time,
                cfg.targets,
            )?;
        }
        Ok(())
    }

    /// Periodic step: stores a sample when a conversion is ready and the
    /// interval has passed.
    pub fn update(&mut self, now_ms: u64, force: bool) -> bool {
        let (targets, current_lsb) = (self.targets, self.current_lsb);
        let device = &mut self.device;
        self.periodic
            .poll(now_ms, force, || -> Result<Option<Data>, E> {
                if is_data_ready(device)? {
                    read_measurement(device, targets, current_lsb).map(Some)
                } else {
                    Ok(None)
                }
            })
    }

    /// Starts continuous conversion of `targets` with the current
    /// averaging and conversion times.
    pub fn start_periodic_measurement(&mut self, targets: Targets) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        let bits = targets.bits();
        if bits == 0 {
            warn!("{}: no measurement target", self.kind);
            return Err(Error::InvalidArgument);
        }
        let mut c = self.read_configuration()?;
        c.set_mode(PERIODIC_OPERATION_TABLE[bits as usize]);
        self.write_configuration(c)?;
        self.targets = bits;
        self.periodic.start(c.conversion_interval());
        Ok(())
    }

    pub fn start_periodic_measurement_with(
        &mut self,
        averaging: Averaging,
        shunt_conversion_time: ConversionTime,
        bus_conversion_time: ConversionTime,
        targets: Targets,
    ) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.modify_configuration(|c| {
            c.set_averaging(averaging);
            c.set_shunt_conversion_time(shunt_conversion_time);
            c.set_bus_conversion_time(bus_conversion_time);
        })?;
        self.start_periodic_measurement(targets)
    }

    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if !self.periodic.in_periodic() {
            warn!("{}: periodic measurements are not running", self.kind);
            return Err(Error::NotPeriodic);
        }
        self.power_down()
    }

    /// Triggers one conversion of `targets` and waits for the result.
    pub fn measure_singleshot(&mut self, targets: Targets) -> Result<Data, Error<E>> {
        self.ensure_not_periodic()?;
        let bits = targets.bits();
        if bits == 0 {
            error!("{}: no measurement target", self.kind);
            return Err(Error::InvalidArgument);
        }
        let mut c = self.read_configuration()?;
        c.set_mode(SINGLE_OPERATION_TABLE[bits as usize]);
        let wait_ms = c.conversion_interval() as u32;
        self.write_configuration(c)?;
        self.targets = bits;
        self.delay.delay_ms(wait_ms);

        let current_lsb = self.current_lsb;
        let device = &mut self.device;
        let result = wait_ready(&mut self.delay, SINGLESHOT_TIMEOUT_MS, || -> Result<Option<Data>, E> {
            if is_data_ready(device)? {
                read_measurement(device, bits, current_lsb).map(Some)
            } else {
                Ok(None)
            }
        });
        if let Err(Error::Timeout) = result {
            warn!("{}: single shot timed out", self.kind);
        }
        result
    }

    pub fn measure_singleshot_with(
        &mut self,
        averaging: Averaging,
        shunt_conversion_time: ConversionTime,
        bus_conversion_time: ConversionTime,
        targets: Targets,
    ) -> Result<Data, Error<E>> {
        self.ensure_not_periodic()?;
        self.modify_configuration(|c| {
            c.set_averaging(averaging);
            c.set_shunt_conversion_time(shunt_conversion_time);
            c.set_bus_conversion_time(bus_conversion_time);
        })?;
        self.measure_singleshot(targets)
    }

    pub fn read_mode(&mut self) -> Result<Mode, Error<E>> {
        Ok(self.read_configuration()?.mode())
    }

    pub fn read_averaging(&mut self) -> Result<Averaging, Error<E>> {
        Ok(self.read_configuration()?.averaging())
    }

    pub fn write_averaging(&mut self, averaging: Averaging) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.modify_configuration(|c| c.set_averaging(averaging))
    }

    pub fn read_bus_conversion_time(&mut self) -> Result<ConversionTime, Error<E>> {
        Ok(self.read_configuration()?.bus_conversion_time())
    }

    pub fn write_bus_conversion_time(&mut self, ct: ConversionTime) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.modify_configuration(|c| c.set_bus_conversion_time(ct))
    }

    pub fn read_shunt_conversion_time(&mut self) -> Result<ConversionTime, Error<E>> {
        Ok(self.read_configuration()?.shunt_conversion_time())
    }

    pub fn write_shunt_conversion_time(&mut self, ct: ConversionTime) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        self.modify_configuration(|c| c.set_shunt_conversion_time(ct))
    }

    pub fn read_calibration(&mut self) -> Result<u16, Error<E>> {
        Ok(self.device.read_register16_be(CALIBRATION_REG)?)
    }

    pub fn write_calibration(&mut self, cal: u16) -> Result<(), Error<E>> {
        Ok(self.device.write_register16_be(CALIBRATION_REG, cal)?)
    }

    pub fn read_alert(&mut self) -> Result<Alert, Error<E>> {
        let alert = self.read_mask()?.alert();
        if alert == Alert::Unknown {
            warn!("{}: multiple alert bits are set", self.kind);
        }
        Ok(alert)
    }

    /// Enables one alert function with its limit.
    ///
    /// The limit is in register units: shunt voltage / 2.5 µV, bus voltage
    /// / 1.25 mV, power / (25 × current LSB). It is ignored for
    /// `ConversionReady`.
    pub fn write_alert(&mut self, alert: Alert, limit: u16, latch: bool) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        let mut mask = self.read_mask()?;
        if !mask.set_alert(alert) {
            error!("{}: illegal alert type {:?}", self.kind, alert);
            return Err(Error::InvalidArgument);
        }
        mask.set_len(latch);
        self.write_alert_limit(limit)?;
        Ok(self.device.write_register16_be(MASK_REG, mask.bits())?)
    }

    pub fn read_alert_limit(&mut self) -> Result<u16, Error<E>> {
        Ok(self.device.read_register16_be(ALERT_LIMIT_REG)?)
    }

    pub fn write_alert_limit(&mut self, limit: u16) -> Result<(), Error<E>> {
        self.ensure_not_periodic()?;
        Ok(self.device.write_register16_be(ALERT_LIMIT_REG, limit)?)
    }

    /// Whether the alert function flag is set.
    pub fn read_alert_occurred(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_mask()?.aff())
    }

    /// Stops conversions and leaves periodic measurement.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.modify_configuration(|c| c.set_mode(Mode::PowerDown))?;
        self.periodic.stop();
        Ok(())
    }

    /// Resets every register to its power-on value.
    ///
    /// The chip then converts shunt and bus continuously, so the driver
    /// enters periodic measurement of all targets. Unless `all` is set the
    /// calibration register is rewritten afterwards.
    pub fn soft_reset(&mut self, all: bool) -> Result<(), Error<E>> {
        self.periodic.stop();
        let mut c = self.read_configuration()?;
        c.set_reset(true);
        self.write_configuration(c)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        let c = self.read_configuration()?;
        let cal = self.read_calibration()?;
        if c.bits() != DEFAULT_CONFIG_VALUE || cal != 0 {
            error!("{}: reset not confirmed {:#06x} {}", self.kind, c.bits(), cal);
            return Err(Error::VerifyFailed);
        }
        self.targets = Targets::ALL.bits();
        self.periodic.start(c.conversion_interval());

        if !all {
            let cal = self
                .calibration_value()
                .ok_or(Error::CalibrationOverflow)?;
            self.write_calibration(cal)?;
        }
        Ok(())
    }

    fn read_configuration(&mut self) -> Result<ConfigRegister, Error<E>> {
        Ok(ConfigRegister(self.device.read_register16_be(CONFIGURATION_REG)?))
    }

    fn write_configuration(&mut self, c: ConfigRegister) -> Result<(), Error<E>> {
        Ok(self.device.write_register16_be(CONFIGURATION_REG, c.bits())?)
    }

    fn modify_configuration<F>(&mut self, f: F) -> Result<(), Error<E>>
    where
        F: FnOnce(&mut ConfigRegister),
    {
        let mut c = self.read_configuration()?;
        f(&mut c);
        self.write_configuration(c)
    }

    fn read_mask(&mut self) -> Result<MaskRegister, Error<E>> {
        Ok(MaskRegister(self.device.read_register16_be(MASK_REG)?))
    }

    fn ensure_not_periodic(&self) -> Result<(), Error<E>> {
        if self.periodic.in_periodic() {
            warn!("{}: periodic measurements are running", self.kind);
            return Err(Error::PeriodicRunning);
        }
        Ok(())
    }
}

impl<I2C, D> PeriodicMeasurement for Ina226<I2C, D> {
    type Data = Data;

    fn periodic(&self) -> &Periodic<Data> {
        &self.periodic
    }

    fn periodic_mut(&mut self) -> &mut Periodic<Data> {
        &mut self.periodic
    }
}

impl<I2C, D> Unit for Ina226<I2C, D> {
    const KIND: UnitKind = UnitKind::Ina226;
    const DEFAULT_ADDRESS: u8 = ADDRESS;

    fn address(&self) -> u8 {
        self.device.address()
    }
}

// Conversion ready and no arithmetic overflow.
fn is_data_ready<I2C, E>(device: &mut I2cDevice<I2C>) -> Result<bool, E>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    let mask = MaskRegister(device.read_register16_be(MASK_REG)?);
    Ok(mask.cvrf() && !mask.ovf())
}

fn read_measurement<I2C, E>(
    device: &mut I2cDevice<I2C>,
    targets: u8,
    current_lsb: f32,
) -> Result<Data, E>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    let mut raw = [0u16; 4];
    for (i, value) in raw.iter_mut().enumerate() {
        if targets & (1 << i) != 0 {
            *value = device.read_register16_be(SHUNT_VOLTAGE_REG + i as u8)?;
        }
    }
    Ok(Data { raw, current_lsb })
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;
    use std::io::ErrorKind;

    const ADDR: u8 = ADDRESS;

    fn read16(reg: u8, v: u16) -> Transaction {
        Transaction::write_read(ADDR, vec![reg], v.to_be_bytes().to_vec())
    }

    fn write16(reg: u8, v: u16) -> Transaction {
        let [hi, lo] = v.to_be_bytes();
        Transaction::write(ADDR, vec![reg, hi, lo])
    }

    fn reset_sequence() -> Vec<Transaction> {
        vec![
            read16(CONFIGURATION_REG, 0x4127),
            write16(CONFIGURATION_REG, 0xC127),
            read16(CONFIGURATION_REG, 0x4127),
            read16(CALIBRATION_REG, 0x0000),
        ]
    }

    fn begin_sequence() -> Vec<Transaction> {
        let mut v = vec![read16(MANUFACTURER_ID_REG, 0x5449), read16(DIE_ID_REG, 0x2260)];
        v.extend(reset_sequence());
        v.extend([
            write16(CALIBRATION_REG, 3355),
            read16(CONFIGURATION_REG, 0x4127),
            write16(CONFIGURATION_REG, 0x4120),
            read16(CONFIGURATION_REG, 0x4120),
            write16(CONFIGURATION_REG, 0x4520),
            read16(CONFIGURATION_REG, 0x4520),
            write16(CONFIGURATION_REG, 0x4527),
        ]);
        v
    }

    #[test]
    fn calibration_for_ten_amp_unit() {
        let ina = Ina226::new_10a(I2cMock::new(&[]), MockNoop::new(), None);
        assert!(approx_eq!(f32, ina.current_lsb(), 10.0 / 32767.0, ulps = 2));
        assert!(approx_eq!(f32, ina.current_lsb(), 0.000305185, epsilon = 1e-9));
        assert_eq!(ina.calibration_value(), Some(3355));
        assert_eq!(ina.kind(), UnitKind::Ina226_10A);
        ina.release().0.done();

        let ina = Ina226::new_1a(I2cMock::new(&[]), MockNoop::new(), Some(0.0));
        assert!(approx_eq!(f32, ina.current_lsb(), 1.0 / 32767.0, ulps = 2));
        assert_eq!(ina.calibration_value(), Some(2097));
        assert_eq!(ina.kind(), UnitKind::Ina226_1A);
        assert_eq!(<Ina226<I2cMock, MockNoop> as Unit>::KIND, UnitKind::Ina226);
        ina.release().0.done();
    }

    #[test]
    fn begin_then_periodic_update() {
        let mut expectations = begin_sequence();
        expectations.extend([
            read16(MASK_REG, 0x0000),
            read16(MASK_REG, 0x0008),
            read16(0x01, 0x0100),
            read16(0x02, 0x2580),
            read16(0x03, 1000),
            read16(0x04, (-200i16) as u16),
        ]);
        let mut ina = Ina226::new_10a(I2cMock::new(&expectations), MockNoop::new(), None);
        ina.begin().unwrap();
        assert!(ina.in_periodic());
        assert_eq!(ina.interval(), 42);

        // Not ready yet, so the next poll is not gated by the interval
        assert!(!ina.update(0, false));
        assert!(ina.update(1, false));
        let lsb = 10.0f32 / 32767.0;
        assert!(approx_eq!(f32, ina.shunt_voltage(), 0.64, epsilon = 1e-6));
        assert!(approx_eq!(f32, ina.voltage(), 12000.0, ulps = 2));
        assert!(approx_eq!(f32, ina.power(), 1000.0 * lsb * 25.0 * 1000.0, ulps = 2));
        assert!(approx_eq!(f32, ina.current(), -200.0 * lsb * 1000.0, ulps = 2));
        ina.release().0.done();
    }

    #[test]
    fn calibration_overflow_fails_begin() {
        let mut ina = Ina226::new(
            I2cMock::new(&[]),
            MockNoop::new(),
            ADDR,
            0.005,
            10.0,
            Some(1e-9),
        );
        assert_eq!(ina.calibration_value(), None);
        assert_eq!(ina.begin(), Err(Error::CalibrationOverflow));
        ina.release().0.done();
    }

    #[test]
    fn identity_mismatch_fails_begin() {
        let expectations = [read16(MANUFACTURER_ID_REG, 0x1234), read16(DIE_ID_REG, 0x2260)];
        let mut ina = Ina226::new_1a(I2cMock::new(&expectations), MockNoop::new(), None);
        assert_eq!(
            ina.begin(),
            Err(Error::InvalidIdentity {
                manufacturer: 0x1234,
                die: 0x2260
            })
        );
        ina.release().0.done();
    }

    #[test]
    fn soft_reset_rewrites_calibration_unless_all() {
        let mut expectations = reset_sequence();
        expectations.push(write16(CALIBRATION_REG, 3355));
        expectations.extend(reset_sequence());
        expectations.push(read16(CONFIGURATION_REG, 0x4120));
        let mut ina = Ina226::new_10a(I2cMock::new(&expectations), MockNoop::new(), None);
        ina.soft_reset(false).unwrap();
        assert!(ina.in_periodic());
        assert_eq!(ina.interval(), 3);
        ina.soft_reset(true).unwrap();
        assert!(ina.in_periodic());
        assert_eq!(ina.read_mode(), Ok(Mode::PowerDown));
        ina.release().0.done();
    }

    #[test]
    fn soft_reset_verifies_defaults() {
        let expectations = [
            read16(CONFIGURATION_REG, 0x4127),
            write16(CONFIGURATION_REG, 0xC127),
            read16(CONFIGURATION_REG, 0x4127),
            read16(CALIBRATION_REG, 0x0D1B),
        ];
        let mut ina = Ina226::new_10a(I2cMock::new(&expectations), MockNoop::new(), None);
        assert_eq!(ina.soft_reset(true), Err(Error::VerifyFailed));
        assert!(!ina.in_periodic());
        ina.release().0.done();
    }

    #[test]
    fn singleshot_bus_voltage() {
        let expectations = [
            read16(CONFIGURATION_REG, 0x4127),
            write16(CONFIGURATION_REG, 0x4122),
            read16(MASK_REG, 0x0000),
            read16(MASK_REG, 0x000C),
            read16(MASK_REG, 0x0008),
            read16(0x02, 0x0FA0),
        ];
        let mut ina = Ina226::new_1a(I2cMock::new(&expectations), MockNoop::new(), None);
        let targets = Targets {
            current: false,
            voltage: true,
            power: false,
        };
        let data = ina.measure_singleshot(targets).unwrap();
        assert_eq!(data.raw, [0, 0x0FA0, 0, 0]);
        assert!(approx_eq!(f32, data.voltage(), 5000.0, ulps = 2));
        assert!(ina.empty());
        ina.release().0.done();
    }

    #[test]
    fn singleshot_requires_target_and_idle() {
        let expectations = reset_sequence();
        let mut ina = Ina226::new_1a(I2cMock::new(&expectations), MockNoop::new(), None);
        assert_eq!(ina.stop_periodic_measurement(), Err(Error::NotPeriodic));
        let none = Targets {
            current: false,
            voltage: false,
            power: false,
        };
        assert_eq!(ina.measure_singleshot(none), Err(Error::InvalidArgument));
        ina.soft_reset(true).unwrap();
        assert_eq!(
            ina.measure_singleshot(Targets::ALL),
            Err(Error::PeriodicRunning)
        );
        assert_eq!(
            ina.write_averaging(Averaging::Avg4),
            Err(Error::PeriodicRunning)
        );
        assert_eq!(ina.write_alert_limit(1), Err(Error::PeriodicRunning));
        ina.release().0.done();
    }

    #[test]
    fn sample_decoding() {
        let data = Data {
            raw: [0xFF38, 0x2580, 0x0064, 0xFF38],
            current_lsb: 0.001,
        };
        // Only the current register is two's complement
        assert!(approx_eq!(f32, data.shunt_voltage(), 0xFF38 as f32 * 0.0025, ulps = 2));
        assert!(approx_eq!(f32, data.shunt_voltage(), 163.72, epsilon = 1e-3));
        assert!(approx_eq!(f32, data.voltage(), 12000.0, ulps = 2));
        assert!(approx_eq!(f32, data.power(), 2500.0, epsilon = 1e-2));
        assert!(approx_eq!(f32, data.current(), -200.0, epsilon = 1e-3));
    }

    #[test]
    fn operation_tables() {
        let periodic = |current, voltage, power| {
            PERIODIC_OPERATION_TABLE[Targets {
                current,
                voltage,
                power,
            }
            .bits() as usize]
        };
        assert_eq!(periodic(false, true, false), Mode::BusVoltage);
        assert_eq!(periodic(true, false, false), Mode::ShuntVoltage);
        assert_eq!(periodic(false, false, true), Mode::ShuntAndBus);
        assert_eq!(periodic(true, true, true), Mode::ShuntAndBus);
        assert_eq!(SINGLE_OPERATION_TABLE[8], Mode::ShuntVoltageSingle);
        assert_eq!(SINGLE_OPERATION_TABLE[9], Mode::ShuntVoltageSingle);
        assert_eq!(SINGLE_OPERATION_TABLE[4], Mode::ShuntAndBusSingle);
        assert_eq!(Targets::ALL.bits(), 0x0F);
    }

    #[test]
    fn config_register_fields() {
        let c = ConfigRegister(DEFAULT_CONFIG_VALUE);
        assert!(!c.reset());
        assert_eq!(c.averaging(), Averaging::Avg1);
        assert_eq!(c.bus_conversion_time(), ConversionTime::Us1100);
        assert_eq!(c.shunt_conversion_time(), ConversionTime::Us1100);
        assert_eq!(c.mode(), Mode::ShuntAndBus);
        assert_eq!(c.conversion_interval(), 3);

        let mut c = ConfigRegister(0);
        c.set_mode_bits(4);
        assert_eq!(c.mode(), Mode::PowerDown);
        c.set_averaging(Averaging::Avg1024);
        c.set_bus_conversion_time(ConversionTime::Us8244);
        assert_eq!(c.bits(), 0x0FC4);
        assert_eq!(c.shunt_conversion_time(), ConversionTime::Us140);
        c.set_mode(Mode::BusVoltageSingle);
        assert_eq!(c.conversion_interval(), (1024 * 8244 + 1024 * 400 + 999) / 1000);
    }

    #[test]
    fn alerts() {
        let expectations = [
            read16(MASK_REG, 0x8000),
            read16(MASK_REG, 0x0408),
            read16(MASK_REG, 0xC000),
            read16(MASK_REG, 0x0000),
            read16(MASK_REG, 0x0410),
            write16(ALERT_LIMIT_REG, 0x1234),
            write16(MASK_REG, 0x2011),
            read16(MASK_REG, 0x0010),
            read16(MASK_REG, 0x0000),
        ];
        let mut ina = Ina226::new_10a(I2cMock::new(&expectations), MockNoop::new(), None);
        assert_eq!(ina.read_alert(), Ok(Alert::ShuntOver));
        assert_eq!(ina.read_alert(), Ok(Alert::ConversionReady));
        assert_eq!(ina.read_alert(), Ok(Alert::Unknown));
        assert_eq!(ina.read_alert(), Ok(Alert::None));
        ina.write_alert(Alert::BusOver, 0x1234, true).unwrap();
        assert_eq!(ina.read_alert_occurred(), Ok(true));
        assert_eq!(
            ina.write_alert(Alert::None, 0, false),
            Err(Error::InvalidArgument)
        );
        ina.release().0.done();
    }

    #[test]
    fn failed_update_is_retried() {
        let expectations = [
            read16(MASK_REG, 0x0008).with_error(MockError::Io(ErrorKind::Other)),
            read16(MASK_REG, 0x0008),
            read16(0x01, 0x0010),
            read16(0x02, 0x0020),
            read16(0x03, 0x0030),
            read16(0x04, 0x0040),
        ];
        let mut ina = Ina226::new_10a(I2cMock::new(&expectations), MockNoop::new(), None);
        ina.targets = Targets::ALL.bits();
        ina.periodic.start(100);
        assert!(!ina.update(0, false));
        assert!(ina.empty());
        assert!(ina.update(0, false));
        assert_eq!(ina.oldest().map(|d| d.raw), Some([0x10, 0x20, 0x30, 0x40]));
        ina.release().0.done();
    }
}
