use embedded_hal::blocking::i2c::*;

/// Address all devices answer to for the general call.
pub const GENERAL_CALL_ADDRESS: u8 = 0x00;
/// General call command byte that resets compliant devices.
const GENERAL_CALL_RESET: u8 = 0x06;

/// Whether `address` is a usable 7-bit I2C device address.
///
/// 0x00-0x07 and 0x78-0x7F are reserved by the I2C specification.
pub fn is_valid_i2c_address(address: u8) -> bool {
    (0x08..=0x77).contains(&address)
}

/// A register-mapped device at one address of an I2C bus.
#[derive(Debug)]
pub struct I2cDevice<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cDevice<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Releases the underlying I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }
}

impl<I2C, E> I2cDevice<I2C>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    /// Reads `buf.len()` bytes starting at `register`.
    pub fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.address, &[register], buf)
    }

    pub fn read_register8(&mut self, register: u8) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.read_register(register, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_register16_be(&mut self, register: u8) -> Result<u16, E> {
        let mut buf = [0u8; 2];
        self.read_register(register, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn write_register8(&mut self, register: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[register, value])
    }

    pub fn write_register16_be(&mut self, register: u8, value: u16) -> Result<(), E> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c.write(self.address, &[register, hi, lo])
    }

    /// Reads from a companion device sharing this bus.
    ///
    /// The register pointer is written first, then the data is read in a
    /// separate transaction, as small serial EEPROMs expect.
    pub fn read_register_at(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), E> {
        self.i2c.write(address, &[register])?;
        self.i2c.read(address, buf)
    }

    /// Resets every device on the bus that honours the general call.
    pub fn general_reset(&mut self) -> Result<(), E> {
        self.i2c.write(GENERAL_CALL_ADDRESS, &[GENERAL_CALL_RESET])
    }
}
