use serde::Serialize;

/// Identifies a concrete unit type, for diagnostics.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
pub enum UnitKind {
    Ads1113,
    Ads1114,
    Ads1115,
    Ameter,
    Vmeter,
    CalibrationEeprom,
    Ina226,
    Ina226_10A,
    Ina226_1A,
    KmeterIso,
    DualKmeter,
}

impl UnitKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ads1113 => "UnitADS1113",
            Self::Ads1114 => "UnitADS1114",
            Self::Ads1115 => "UnitADS1115",
            Self::Ameter => "UnitAmeter",
            Self::Vmeter => "UnitVmeter",
            Self::CalibrationEeprom => "UnitEEPROMforMeter",
            Self::Ina226 => "UnitINA226",
            Self::Ina226_10A => "UnitINA226_10A",
            Self::Ina226_1A => "UnitINA226_1A",
            Self::KmeterIso => "UnitKmeterISO",
            Self::DualKmeter => "UnitDualKmeter",
        }
    }
}

impl core::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A driver for one kind of unit on an I2C bus.
pub trait Unit {
    /// Chip family this driver type talks to.
    ///
    /// Presets built on the same driver type (the INA226 10 A and 1 A
    /// units) share the family kind; the driver's `kind()` names the preset.
    const KIND: UnitKind;

    /// Factory default 7-bit address of the unit.
    const DEFAULT_ADDRESS: u8;

    /// Address the driver currently talks to.
    fn address(&self) -> u8;
}
