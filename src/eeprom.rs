//! Calibration EEPROM fitted next to the ADS1115 on the Ameter and Vmeter units.
//!
//! For each PGA gain the EEPROM stores the code the ADC was expected to
//! read (`hope`) and the code it actually read (`actual`) during factory
//! calibration.

use log::{debug, error};
use serde::Serialize;

use embedded_hal::blocking::i2c::*;

use crate::ads111x::Gain;
use crate::error::Error;
use crate::register::I2cDevice;
use crate::unit::UnitKind;

// First calibration record; record n lives at DATA_ADDRESS + n * 8.
const DATA_ADDRESS: u8 = 0xD0;
const RECORD_SIZE: usize = 8;
const TABLE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Calibration {
    pub hope: i16,
    pub actual: i16,
}

impl Calibration {
    /// Ratio of expected to measured code, 1.0 if nothing was measured.
    pub fn factor(&self) -> f32 {
        if self.actual == 0 {
            1.0
        } else {
            self.hope as f32 / self.actual as f32
        }
    }

    /// Decodes one EEPROM record.
    ///
    /// Byte 5 holds the XOR of bytes 0 to 4; `hope` and `actual` are
    /// big-endian in bytes 1..3 and 3..5.
    pub fn from_record(record: &[u8; RECORD_SIZE]) -> Option<Self> {
        let checksum = record[..5].iter().fold(0u8, |acc, b| acc ^ b);
        if checksum != record[5] {
            return None;
        }
        Some(Self {
            hope: i16::from_be_bytes([record[1], record[2]]),
            actual: i16::from_be_bytes([record[3], record[4]]),
        })
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self { hope: 1, actual: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationEeprom {
    address: u8,
    table: [Calibration; TABLE_SIZE],
}

impl CalibrationEeprom {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            table: [Calibration::default(); TABLE_SIZE],
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Reads every gain's record through `device`, which shares the bus.
    ///
    /// The table is only replaced when all records are valid. PGA codes 6
    /// and 7 get a copy of the ±0.256 V record.
    pub fn read_calibration<I2C, E>(&mut self, device: &mut I2cDevice<I2C>) -> Result<(), Error<E>>
    where
        I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
    {
        let mut table = [Calibration::default(); TABLE_SIZE];
        for gain in Gain::ALL {
            let idx = gain as usize;
            let mut record = [0u8; RECORD_SIZE];
            let register = DATA_ADDRESS + (idx * RECORD_SIZE) as u8;
            if let Err(e) = device.read_register_at(self.address, register, &mut record) {
                error!("{}: failed to read calibration {}", UnitKind::CalibrationEeprom, idx);
                return Err(Error::Bus(e));
            }
            table[idx] = Calibration::from_record(&record).ok_or_else(|| {
                error!("{}: calibration {} is corrupt", UnitKind::CalibrationEeprom, idx);
                Error::ChecksumMismatch
            })?;
            debug!(
                "{}: calibration[{}]: {},{}",
                UnitKind::CalibrationEeprom,
                idx,
                table[idx].hope,
                table[idx].actual
            );
        }
        let top = table[Gain::Pga256 as usize];
        table[6] = top;
        table[7] = top;
        self.table = table;
        Ok(())
    }

    /// Calibration record for a raw PGA code (0-7).
    pub fn entry(&self, code: u8) -> Calibration {
        self.table[(code & 0x07) as usize]
    }

    pub fn calibration_factor(&self, gain: Gain) -> f32 {
        self.entry(gain as u8).factor()
    }

    pub fn hope(&self, gain: Gain) -> i16 {
        self.entry(gain as u8).hope
    }

    pub fn actual(&self, gain: Gain) -> i16 {
        self.entry(gain as u8).actual
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;
    use std::io::ErrorKind;

    pub(crate) fn record(hope: i16, actual: i16) -> Vec<u8> {
        let [h0, h1] = hope.to_be_bytes();
        let [a0, a1] = actual.to_be_bytes();
        let head = [0x01, h0, h1, a0, a1];
        let checksum = head.iter().fold(0u8, |acc, b| acc ^ b);
        let mut v = head.to_vec();
        v.extend([checksum, 0, 0]);
        v
    }

    // Transactions reading all six records, `records[n]` for PGA code n.
    pub(crate) fn read_records(addr: u8, records: &[Vec<u8>]) -> Vec<Transaction> {
        records
            .iter()
            .enumerate()
            .flat_map(|(i, r)| {
                [
                    Transaction::write(addr, vec![DATA_ADDRESS + i as u8 * 8]),
                    Transaction::read(addr, r.clone()),
                ]
            })
            .collect()
    }

    #[test]
    fn record_decoding() {
        let r: [u8; 8] = record(6400, -6423).try_into().unwrap();
        assert_eq!(
            Calibration::from_record(&r),
            Some(Calibration {
                hope: 6400,
                actual: -6423
            })
        );
    }

    #[test]
    fn any_corrupt_header_byte_fails_checksum() {
        let good: [u8; 8] = record(7641, 7613).try_into().unwrap();
        for i in 0..5 {
            let mut bad = good;
            bad[i] ^= 0x10;
            assert_eq!(Calibration::from_record(&bad), None, "byte {}", i);
        }
        // Trailing bytes are not covered
        let mut padded = good;
        padded[7] = 0xAA;
        assert!(Calibration::from_record(&padded).is_some());
    }

    #[test]
    fn factor_defaults_to_one() {
        assert!(approx_eq!(f32, Calibration { hope: 5, actual: 0 }.factor(), 1.0));
        assert!(approx_eq!(f32, Calibration::default().factor(), 1.0));
        assert!(approx_eq!(
            f32,
            Calibration { hope: 5094, actual: 5073 }.factor(),
            5094.0 / 5073.0
        ));
    }

    #[test]
    fn reads_table_and_mirrors_top_entries() {
        let records: Vec<_> = (0..6).map(|i| record(1000 + i, 990 + i)).collect();
        let mut dev = I2cDevice::new(I2cMock::new(&read_records(0x53, &records)), 0x49);
        let mut eeprom = CalibrationEeprom::new(0x53);
        eeprom.read_calibration(&mut dev).unwrap();

        assert_eq!(eeprom.hope(Gain::Pga6144), 1000);
        assert_eq!(eeprom.actual(Gain::Pga1024), 993);
        assert_eq!(eeprom.entry(6), eeprom.entry(5));
        assert_eq!(eeprom.entry(7), eeprom.entry(5));
        assert!(approx_eq!(
            f32,
            eeprom.calibration_factor(Gain::Pga256),
            1005.0 / 995.0
        ));
        dev.release().done();
    }

    #[test]
    fn checksum_failure_keeps_previous_table() {
        let mut records: Vec<_> = (0..6).map(|i| record(2000 + i, 1000)).collect();
        records[3][2] ^= 0xFF;
        let expectations = read_records(0x51, &records[..4]);
        let mut dev = I2cDevice::new(I2cMock::new(&expectations), 0x48);
        let mut eeprom = CalibrationEeprom::new(0x51);

        assert_eq!(eeprom.read_calibration(&mut dev), Err(Error::ChecksumMismatch));
        for code in 0..8 {
            assert_eq!(eeprom.entry(code), Calibration::default());
        }
        dev.release().done();
    }

    #[test]
    fn bus_error_aborts_read() {
        let expectations = [Transaction::write(0x51, vec![DATA_ADDRESS])
            .with_error(MockError::Io(ErrorKind::Other))];
        let mut dev = I2cDevice::new(I2cMock::new(&expectations), 0x48);
        let mut eeprom = CalibrationEeprom::new(0x51);
        assert_eq!(
            eeprom.read_calibration(&mut dev),
            Err(Error::Bus(MockError::Io(ErrorKind::Other)))
        );
        dev.release().done();
    }
}
