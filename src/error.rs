use std::fmt::{Debug, Display, Formatter};

/// Describes errors returned by the meter unit drivers.
///
/// `E` is the error type of the underlying I2C bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// Read or write error from the I2C bus
    ///
    /// The transaction did not complete. Retrying is up to the caller.
    Bus(E),
    /// Periodic measurement is running and the request would interfere with it
    PeriodicRunning,
    /// Periodic measurement is not running
    NotPeriodic,
    /// The chip has no such feature
    Unsupported,
    /// An argument is out of range or inconsistent
    InvalidArgument,
    /// A calibration record did not match its checksum
    ChecksumMismatch,
    /// Manufacturer or die identification registers hold unexpected values
    InvalidIdentity { manufacturer: u16, die: u16 },
    /// The firmware version register could not be read or is zero
    InvalidFirmware,
    /// The computed calibration value does not fit the 16-bit register
    ///
    /// The current LSB is too small for the shunt resistor.
    CalibrationOverflow,
    /// A register held a value outside of its documented range
    InvalidData,
    /// A value read back after a write differs from the written one
    VerifyFailed,
    /// The device did not become ready in time
    Timeout,
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use Error::*;
        match self {
            Bus(error) => write!(f, "Bus error: {:?}", error),
            PeriodicRunning => f.write_str("Periodic measurement is running"),
            NotPeriodic => f.write_str("Periodic measurement is not running"),
            Unsupported => f.write_str("Not supported by this chip"),
            InvalidArgument => f.write_str("Invalid argument"),
            ChecksumMismatch => f.write_str("Calibration data was corrupt"),
            InvalidIdentity { manufacturer, die } => write!(
                f,
                "Unexpected identity, manufacturer: {:#06x} die: {:#06x}",
                manufacturer, die
            ),
            InvalidFirmware => f.write_str("Firmware version unavailable"),
            CalibrationOverflow => f.write_str("Calibration value exceeds 65535"),
            InvalidData => f.write_str("Register value out of range"),
            VerifyFailed => f.write_str("Read back value differs from written value"),
            Timeout => f.write_str("Timed out waiting for the device"),
        }
    }
}

impl<E: Debug> std::error::Error for Error<E> {}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_errors_convert_with_question_mark() {
        fn fails() -> Result<(), Error<&'static str>> {
            Err::<(), _>("nack")?;
            Ok(())
        }
        assert_eq!(fails(), Err(Error::Bus("nack")));
    }

    #[test]
    fn display_names_identity_registers() {
        let e: Error<()> = Error::InvalidIdentity {
            manufacturer: 0x1234,
            die: 0x2260,
        };
        assert_eq!(
            e.to_string(),
            "Unexpected identity, manufacturer: 0x1234 die: 0x2260"
        );
    }
}
