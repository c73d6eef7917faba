//! ADS1113, ADS1114 and ADS1115 16-bit ADCs.
//!
//! The three chips share one register map and differ in which
//! configuration fields they honour: the ADS1113 has neither multiplexer,
//! PGA nor comparator, the ADS1114 lacks the multiplexer. Each chip is a
//! distinct type implementing [`Capabilities`]; writes a chip cannot honour
//! fail with [`Error::Unsupported`].

use core::marker::PhantomData;
use std::fmt::Debug;

use bitfield::bitfield;
use embedded_hal::blocking::{delay::DelayMs, i2c::*};
use log::{debug, warn};
use serde::Serialize;

use crate::error::Error;
use crate::periodic::{wait_ready, Periodic, PeriodicMeasurement};
use crate::register::I2cDevice;
use crate::unit::{Unit, UnitKind};

pub const ADDRESS: u8 = 0x48;

// Holds the last conversion result, 16-bit two's complement.
const CONVERSION_REG: u8 = 0x00;
// Operating mode, input selection, data rate, PGA and comparator settings.
const CONFIG_REG: u8 = 0x01;
// Comparator lower threshold, two's complement.
const LOW_THRESHOLD_REG: u8 = 0x02;
// Comparator upper threshold, two's complement.
const HIGH_THRESHOLD_REG: u8 = 0x03;

/// Config register content after power-on or general reset.
pub const DEFAULT_CONFIG_VALUE: u16 = 0x8583;

const SINGLESHOT_TIMEOUT_MS: u32 = 1000;

/// Input multiplexer.
///
/// Only the ADS1115 has one.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Mux {
    /// AIN0 against AIN1 (default)
    Ain01 = 0,
    /// AIN0 against AIN3
    Ain03 = 1,
    /// AIN1 against AIN3
    Ain13 = 2,
    /// AIN2 against AIN3
    Ain23 = 3,
    /// AIN0 against GND
    Gnd0 = 4,
    /// AIN1 against GND
    Gnd1 = 5,
    /// AIN2 against GND
    Gnd2 = 6,
    /// AIN3 against GND
    Gnd3 = 7,
}

impl From<u8> for Mux {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => Self::Ain01,
            1 => Self::Ain03,
            2 => Self::Ain13,
            3 => Self::Ain23,
            4 => Self::Gnd0,
            5 => Self::Gnd1,
            6 => Self::Gnd2,
            _ => Self::Gnd3,
        }
    }
}

/// Programmable gain amplifier full-scale range.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Gain {
    /// ±6.144 V
    Pga6144 = 0,
    /// ±4.096 V
    Pga4096 = 1,
    /// ±2.048 V (default)
    Pga2048 = 2,
    /// ±1.024 V
    Pga1024 = 3,
    /// ±0.512 V
    Pga512 = 4,
    /// ±0.256 V
    Pga256 = 5,
}

impl Gain {
    pub const ALL: [Gain; 6] = [
        Gain::Pga6144,
        Gain::Pga4096,
        Gain::Pga2048,
        Gain::Pga1024,
        Gain::Pga512,
        Gain::Pga256,
    ];

    /// Full-scale range in mV.
    pub fn full_scale_mv(self) -> f32 {
        match self {
            Gain::Pga6144 => 6144.0,
            Gain::Pga4096 => 4096.0,
            Gain::Pga2048 => 2048.0,
            Gain::Pga1024 => 1024.0,
            Gain::Pga512 => 512.0,
            Gain::Pga256 => 256.0,
        }
    }

    /// Weight of one LSB in mV.
    pub fn coefficient(self) -> f32 {
        self.full_scale_mv() / 32768.0
    }
}

impl From<u8> for Gain {
    // Codes 6 and 7 select ±0.256 V as well.
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => Self::Pga6144,
            1 => Self::Pga4096,
            2 => Self::Pga2048,
            3 => Self::Pga1024,
            4 => Self::Pga512,
            _ => Self::Pga256,
        }
    }
}

/// Data rate in samples per second.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Sampling {
    Rate8 = 0,
    Rate16 = 1,
    Rate32 = 2,
    Rate64 = 3,
    /// Default
    Rate128 = 4,
    Rate250 = 5,
    Rate475 = 6,
    Rate860 = 7,
}

impl Sampling {
    pub fn samples_per_second(self) -> u16 {
        match self {
            Sampling::Rate8 => 8,
            Sampling::Rate16 => 16,
            Sampling::Rate32 => 32,
            Sampling::Rate64 => 64,
            Sampling::Rate128 => 128,
            Sampling::Rate250 => 250,
            Sampling::Rate475 => 475,
            Sampling::Rate860 => 860,
        }
    }

    /// Time between conversions in ms, rounded up.
    pub fn interval_ms(self) -> u64 {
        let sps = self.samples_per_second() as u64;
        (1000 + sps - 1) / sps
    }
}

impl From<u8> for Sampling {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => Self::Rate8,
            1 => Self::Rate16,
            2 => Self::Rate32,
            3 => Self::Rate64,
            4 => Self::Rate128,
            5 => Self::Rate250,
            6 => Self::Rate475,
            _ => Self::Rate860,
        }
    }
}

/// Number of successive conversions beyond a threshold before ALERT/RDY asserts.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ComparatorQueue {
    One = 0,
    Two = 1,
    Four = 2,
    /// Comparator off, ALERT/RDY high impedance (default)
    Disable = 3,
}

impl From<u8> for ComparatorQueue {
    fn from(v: u8) -> Self {
        match v & 0x03 {
            0 => Self::One,
            1 => Self::Two,
            2 => Self::Four,
            _ => Self::Disable,
        }
    }
}

bitfield! {
    /// Image of the config register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ConfigRegister(u16);
    impl Debug;
    /// Reads 1 when no conversion is in progress; writing 1 starts one.
    pub bool, os, set_os: 15;
    pub u8, mux_bits, set_mux_bits: 14, 12;
    pub u8, pga_bits, set_pga_bits: 11, 9;
    /// Single-shot (power-down) mode when set, continuous otherwise.
    pub bool, single_shot, set_single_shot: 8;
    pub u8, dr_bits, set_dr_bits: 7, 5;
    /// Window comparator when set, traditional otherwise.
    pub bool, comp_mode, set_comp_mode: 4;
    /// ALERT/RDY active high when set.
    pub bool, comp_pol, set_comp_pol: 3;
    pub bool, comp_lat, set_comp_lat: 2;
    pub u8, comp_que_bits, set_comp_que_bits: 1, 0;
}

impl ConfigRegister {
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn mux(&self) -> Mux {
        Mux::from(self.mux_bits())
    }

    pub fn set_mux(&mut self, mux: Mux) {
        self.set_mux_bits(mux as u8)
    }

    pub fn gain(&self) -> Gain {
        Gain::from(self.pga_bits())
    }

    pub fn set_gain(&mut self, gain: Gain) {
        self.set_pga_bits(gain as u8)
    }

    pub fn rate(&self) -> Sampling {
        Sampling::from(self.dr_bits())
    }

    pub fn set_rate(&mut self, rate: Sampling) {
        self.set_dr_bits(rate as u8)
    }

    pub fn comp_que(&self) -> ComparatorQueue {
        ComparatorQueue::from(self.comp_que_bits())
    }

    pub fn set_comp_que(&mut self, queue: ComparatorQueue) {
        self.set_comp_que_bits(queue as u8)
    }
}

impl From<u16> for ConfigRegister {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl Default for ConfigRegister {
    fn default() -> Self {
        Self(DEFAULT_CONFIG_VALUE)
    }
}

/// One conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Data {
    /// Conversion register content
    pub raw: u16,
    /// Gain in effect when the conversion was read
    pub gain: Gain,
}

impl Data {
    /// Signed ADC code.
    pub fn adc(&self) -> i16 {
        self.raw as i16
    }

    /// Input voltage in mV, before any external scaling.
    pub fn millivolts(&self) -> f32 {
        self.adc() as f32 * self.gain.coefficient()
    }
}

/// Settings applied by `begin()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Start periodic measurement on begin?
    pub start_periodic: bool,
    /// Number of samples kept
    pub stored_size: usize,
    pub rate: Sampling,
    /// Ignored by chips without a multiplexer
    pub mux: Mux,
    /// Ignored by chips without a PGA
    pub gain: Gain,
    /// Ignored by chips without a comparator
    pub comp_que: ComparatorQueue,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_periodic: true,
            stored_size: 1,
            rate: Sampling::Rate128,
            mux: Mux::Ain01,
            gain: Gain::Pga2048,
            comp_que: ComparatorQueue::Disable,
        }
    }
}

/// Chip variant marker.
pub trait Model {
    const KIND: UnitKind;
}

pub mod model {
    use super::Model;
    use crate::unit::UnitKind;

    #[derive(Debug)]
    pub struct Ads1113;
    #[derive(Debug)]
    pub struct Ads1114;
    #[derive(Debug)]
    pub struct Ads1115;

    impl Model for Ads1113 {
        const KIND: UnitKind = UnitKind::Ads1113;
    }

    impl Model for Ads1114 {
        const KIND: UnitKind = UnitKind::Ads1114;
    }

    impl Model for Ads1115 {
        const KIND: UnitKind = UnitKind::Ads1115;
    }
}

pub type Ads1113<I2C, D> = Ads111x<I2C, D, model::Ads1113>;
pub type Ads1114<I2C, D> = Ads111x<I2C, D, model::Ads1114>;
pub type Ads1115<I2C, D> = Ads111x<I2C, D, model::Ads1115>;

/// Configuration writes whose support depends on the chip.
pub trait Capabilities {
    type Error;

    fn write_multiplexer(&mut self, mux: Mux) -> Result<(), Self::Error>;

    /// Writes the PGA setting.
    ///
    /// Thresholds are not rescaled; rewrite them after changing the gain.
    fn write_gain(&mut self, gain: Gain) -> Result<(), Self::Error>;

    fn write_comparator_mode(&mut self, window: bool) -> Result<(), Self::Error>;

    fn write_comparator_polarity(&mut self, active_high: bool) -> Result<(), Self::Error>;

    fn write_latching_comparator(&mut self, latching: bool) -> Result<(), Self::Error>;

    fn write_comparator_queue(&mut self, queue: ComparatorQueue) -> Result<(), Self::Error>;

    /// Applies the settings the chip supports, then starts periodic measurement.
    fn start_periodic_measurement_with(
        &mut self,
        rate: Sampling,
        mux: Mux,
        gain: Gain,
        queue: ComparatorQueue,
    ) -> Result<(), Self::Error>;
}

pub struct Ads111x<I2C, D, M> {
    device: I2cDevice<I2C>,
    delay: D,
    periodic: Periodic<Data>,
    register: ConfigRegister,
    config: Config,
    coefficient: f32,
    model: PhantomData<M>,
}

impl<I2C, D, M: Model> Ads111x<I2C, D, M> {
    /// Creates a new driver. Nothing is sent until `begin()`.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        let register = ConfigRegister::default();
        Self {
            device: I2cDevice::new(i2c, address),
            delay,
            periodic: Periodic::new(1),
            register,
            config: Config::default(),
            coefficient: register.gain().coefficient(),
            model: PhantomData,
        }
    }

    /// Releases the I2C bus and the delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.device.release(), self.delay)
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Sets what `begin()` applies. Has no effect afterwards.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Weight of one LSB in mV at the current gain.
    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }

    /// Oldest ADC code, or `i16::MIN` if there is none.
    pub fn adc(&self) -> i16 {
        self.periodic
            .data()
            .oldest()
            .map_or(i16::MIN, Data::adc)
    }

    pub fn multiplexer(&self) -> Mux {
        self.register.mux()
    }

    pub fn gain(&self) -> Gain {
        self.register.gain()
    }

    pub fn sampling_rate(&self) -> Sampling {
        self.register.rate()
    }

    /// True for a window comparator, false for a traditional one.
    pub fn comparator_mode(&self) -> bool {
        self.register.comp_mode()
    }

    /// True if ALERT/RDY is active high.
    pub fn comparator_polarity(&self) -> bool {
        self.register.comp_pol()
    }

    pub fn latching_comparator(&self) -> bool {
        self.register.comp_lat()
    }

    pub fn comparator_queue(&self) -> ComparatorQueue {
        self.register.comp_que()
    }

    pub(crate) fn device_mut(&mut self) -> &mut I2cDevice<I2C> {
        &mut self.device
    }

    fn apply_register(&mut self, register: ConfigRegister) {
        self.register = register;
        self.coefficient = register.gain().coefficient();
        self.periodic.set_interval(register.rate().interval_ms());
    }
}

impl<I2C, D, M, E> Ads111x<I2C, D, M>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    M: Model,
    E: Debug,
{
    /// Periodic step: stores a conversion once per data rate interval.
    pub fn update(&mut self, now_ms: u64, force: bool) -> bool {
        let gain = self.register.gain();
        let device = &mut self.device;
        self.periodic
            .poll(now_ms, force, || read_adc(device, gain).map(Some))
    }

    /// Starts continuous conversion with the current settings.
    pub fn start_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if self.periodic.in_periodic() {
            warn!("{}: periodic measurements are running", M::KIND);
            return Err(Error::PeriodicRunning);
        }
        self.modify_config(|c| c.set_single_shot(false))?;
        self.periodic.start(self.register.rate().interval_ms());
        Ok(())
    }

    /// Puts the chip back into single-shot mode.
    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<E>> {
        if !self.periodic.in_periodic() {
            warn!("{}: periodic measurements are not running", M::KIND);
            return Err(Error::NotPeriodic);
        }
        self.modify_config(|c| c.set_single_shot(true))?;
        self.periodic.stop();
        Ok(())
    }

    /// Triggers one conversion with the current settings and waits for it.
    pub fn measure_singleshot(&mut self) -> Result<Data, Error<E>> {
        self.measure_singleshot_timeout(SINGLESHOT_TIMEOUT_MS)
    }

    pub fn measure_singleshot_timeout(&mut self, timeout_ms: u32) -> Result<Data, Error<E>> {
        if let Err(e) = self.periodic.ensure_idle() {
            warn!("{}: periodic measurements are running", M::KIND);
            return Err(e);
        }
        self.modify_config(|c| {
            c.set_single_shot(true);
            c.set_os(true);
        })?;

        let gain = self.register.gain();
        let device = &mut self.device;
        let result = wait_ready(&mut self.delay, timeout_ms, || -> Result<Option<Data>, E> {
            let c = ConfigRegister(device.read_register16_be(CONFIG_REG)?);
            if c.os() {
                read_adc(device, gain).map(Some)
            } else {
                Ok(None)
            }
        });
        if let Err(Error::Timeout) = result {
            warn!("{}: single shot timed out", M::KIND);
        }
        result
    }

    /// Writes the data rate; the periodic interval follows it.
    pub fn write_sampling_rate(&mut self, rate: Sampling) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_rate(rate))
    }

    /// Reads the (high, low) comparator thresholds.
    pub fn read_threshold(&mut self) -> Result<(i16, i16), Error<E>> {
        let high = self.device.read_register16_be(HIGH_THRESHOLD_REG)? as i16;
        let low = self.device.read_register16_be(LOW_THRESHOLD_REG)? as i16;
        Ok((high, low))
    }

    /// Writes the comparator thresholds. `high` must exceed `low`.
    pub fn write_threshold(&mut self, high: i16, low: i16) -> Result<(), Error<E>> {
        if high <= low {
            warn!("{}: high {} must be greater than low {}", M::KIND, high, low);
            return Err(Error::InvalidArgument);
        }
        self.device
            .write_register16_be(HIGH_THRESHOLD_REG, high as u16)?;
        self.device.write_register16_be(LOW_THRESHOLD_REG, low as u16)?;
        Ok(())
    }

    /// Resets the chip through the I2C general call.
    ///
    /// Every device on the bus that honours the general call resets too.
    pub fn general_reset(&mut self) -> Result<(), Error<E>> {
        self.device.general_reset()?;
        self.periodic.stop();
        let register = self.read_config()?;
        self.apply_register(register);
        Ok(())
    }

    /// Reads the config register, bypassing the cached copy.
    pub fn read_config(&mut self) -> Result<ConfigRegister, Error<E>> {
        Ok(ConfigRegister(self.device.read_register16_be(CONFIG_REG)?))
    }

    // Read-modify-write of the config register. OS is cleared so that a
    // write in single-shot mode does not trigger a conversion.
    fn modify_config<F>(&mut self, f: F) -> Result<(), Error<E>>
    where
        F: FnOnce(&mut ConfigRegister),
    {
        let mut register = self.read_config()?;
        register.set_os(false);
        f(&mut register);
        self.device.write_register16_be(CONFIG_REG, register.bits())?;
        self.apply_register(register);
        Ok(())
    }

    fn write_multiplexer_unchecked(&mut self, mux: Mux) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_mux(mux))
    }

    fn write_gain_unchecked(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_gain(gain))
    }

    fn write_comparator_mode_unchecked(&mut self, window: bool) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_comp_mode(window))
    }

    fn write_comparator_polarity_unchecked(&mut self, active_high: bool) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_comp_pol(active_high))
    }

    fn write_latching_comparator_unchecked(&mut self, latching: bool) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_comp_lat(latching))
    }

    fn write_comparator_queue_unchecked(&mut self, queue: ComparatorQueue) -> Result<(), Error<E>> {
        self.modify_config(|c| c.set_comp_que(queue))
    }

    fn ensure_not_periodic(&self) -> Result<(), Error<E>> {
        if self.periodic.in_periodic() {
            warn!("{}: periodic measurements are running", M::KIND);
            return Err(Error::PeriodicRunning);
        }
        Ok(())
    }
}

impl<I2C, D, M, E> Ads111x<I2C, D, M>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    M: Model,
    E: Debug,
    Self: Capabilities<Error = Error<E>>,
{
    /// Allocates the sample store, syncs the cached config and applies
    /// [`Config`].
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        let cfg = self.config;
        if cfg.stored_size == 0 {
            warn!("{}: stored_size must be greater than zero", M::KIND);
            return Err(Error::InvalidArgument);
        }
        self.periodic.resize(cfg.stored_size);

        let register = self.read_config()?;
        self.apply_register(register);
        debug!("{}: config {:#06x}", M::KIND, register.bits());

        if cfg.start_periodic {
            self.start_periodic_measurement_with(cfg.rate, cfg.mux, cfg.gain, cfg.comp_que)?;
        }
        Ok(())
    }
}

impl<I2C, D, E> Capabilities for Ads1113<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    type Error = Error<E>;

    fn write_multiplexer(&mut self, _: Mux) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_gain(&mut self, _: Gain) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_comparator_mode(&mut self, _: bool) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_comparator_polarity(&mut self, _: bool) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_latching_comparator(&mut self, _: bool) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_comparator_queue(&mut self, _: ComparatorQueue) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn start_periodic_measurement_with(
        &mut self,
        rate: Sampling,
        _: Mux,
        _: Gain,
        _: ComparatorQueue,
    ) -> Result<(), Self::Error> {
        self.ensure_not_periodic()?;
        debug!("{}: mux, gain and comparator queue are fixed", model::Ads1113::KIND);
        self.write_sampling_rate(rate)?;
        self.start_periodic_measurement()
    }
}

impl<I2C, D, E> Capabilities for Ads1114<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    type Error = Error<E>;

    fn write_multiplexer(&mut self, _: Mux) -> Result<(), Self::Error> {
        Err(Error::Unsupported)
    }

    fn write_gain(&mut self, gain: Gain) -> Result<(), Self::Error> {
        self.write_gain_unchecked(gain)
    }

    fn write_comparator_mode(&mut self, window: bool) -> Result<(), Self::Error> {
        self.write_comparator_mode_unchecked(window)
    }

    fn write_comparator_polarity(&mut self, active_high: bool) -> Result<(), Self::Error> {
        self.write_comparator_polarity_unchecked(active_high)
    }

    fn write_latching_comparator(&mut self, latching: bool) -> Result<(), Self::Error> {
        self.write_latching_comparator_unchecked(latching)
    }

    fn write_comparator_queue(&mut self, queue: ComparatorQueue) -> Result<(), Self::Error> {
        self.write_comparator_queue_unchecked(queue)
    }

    fn start_periodic_measurement_with(
        &mut self,
        rate: Sampling,
        _: Mux,
        gain: Gain,
        queue: ComparatorQueue,
    ) -> Result<(), Self::Error> {
        self.ensure_not_periodic()?;
        warn!("{}: mux not supported", model::Ads1114::KIND);
        self.write_sampling_rate(rate)?;
        self.write_gain(gain)?;
        self.write_comparator_queue(queue)?;
        self.start_periodic_measurement()
    }
}

impl<I2C, D, E> Capabilities for Ads1115<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    D: DelayMs<u32>,
    E: Debug,
{
    type Error = Error<E>;

    fn write_multiplexer(&mut self, mux: Mux) -> Result<(), Self::Error> {
        self.write_multiplexer_unchecked(mux)
    }

    fn write_gain(&mut self, gain: Gain) -> Result<(), Self::Error> {
        self.write_gain_unchecked(gain)
    }

    fn write_comparator_mode(&mut self, window: bool) -> Result<(), Self::Error> {
        self.write_comparator_mode_unchecked(window)
    }

    fn write_comparator_polarity(&mut self, active_high: bool) -> Result<(), Self::Error> {
        self.write_comparator_polarity_unchecked(active_high)
    }

    fn write_latching_comparator(&mut self, latching: bool) -> Result<(), Self::Error> {
        self.write_latching_comparator_unchecked(latching)
    }

    fn write_comparator_queue(&mut self, queue: ComparatorQueue) -> Result<(), Self::Error> {
        self.write_comparator_queue_unchecked(queue)
    }

    fn start_periodic_measurement_with(
        &mut self,
        rate: Sampling,
        mux: Mux,
        gain: Gain,
        queue: ComparatorQueue,
    ) -> Result<(), Self::Error> {
        self.ensure_not_periodic()?;
        self.write_sampling_rate(rate)?;
        self.write_multiplexer(mux)?;
        self.write_gain(gain)?;
        self.write_comparator_queue(queue)?;
        self.start_periodic_measurement()
    }
}

impl<I2C, D, M: Model> PeriodicMeasurement for Ads111x<I2C, D, M> {
    type Data = Data;

    fn periodic(&self) -> &Periodic<Data> {
        &self.periodic
    }

    fn periodic_mut(&mut self) -> &mut Periodic<Data> {
        &mut self.periodic
    }
}

impl<I2C, D, M: Model> Unit for Ads111x<I2C, D, M> {
    const KIND: UnitKind = M::KIND;
    const DEFAULT_ADDRESS: u8 = ADDRESS;

    fn address(&self) -> u8 {
        self.device.address()
    }
}

fn read_adc<I2C, E>(device: &mut I2cDevice<I2C>, gain: Gain) -> Result<Data, E>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    let raw = device.read_register16_be(CONVERSION_REG)?;
    Ok(Data { raw, gain })
}
