use core::fmt;

use crate::am2315::DeviceAddress;

/// Failure reported by the underlying I2C bus.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError<E> {
    /// The bus could not be opened.
    Open(E),
    /// A write to the device failed.
    Write(E),
    /// A read from the device failed.
    Read(E),
    /// Probing the bus failed with something other than a missing acknowledge.
    Scan(E),
}

impl<E> TransportError<E> {
    /// The bus error that caused this failure.
    pub fn bus_error(&self) -> &E {
        match self {
            Self::Open(e) | Self::Write(e) | Self::Read(e) | Self::Scan(e) => e,
        }
    }
}

/// Failure to turn a raw measurement block into a reading.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The block was not exactly 8 bytes long.
    MalformedBlock { len: usize },
    /// The trailing CRC16 did not match the payload.
    ChecksumMismatch { expected: u16, computed: u16 },
    /// The sensor did not echo the read command (`0x03 0x04`).
    UnexpectedHeader { function: u8, count: u8 },
    /// Humidity decoded outside of 0 ..= 100 %.
    OutOfRange { humidity_raw: u16 },
}

/// Failure while bringing the sensor up.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError<E> {
    /// The requested address did not answer either scan.
    DeviceNotFound { address: DeviceAddress },
    /// The bus itself failed during the scan.
    Transport(TransportError<E>),
}

/// Error returned by a measurement.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The bus failed, after the wake retry.
    Transport(TransportError<E>),
    /// The block arrived but could not be decoded.
    Decode(DecodeError),
}

impl<E> From<TransportError<E>> for Error<E> {
    fn from(value: TransportError<E>) -> Self {
        Self::Transport(value)
    }
}

impl<E> From<DecodeError> for Error<E> {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl<E> From<TransportError<E>> for InitError<E> {
    fn from(value: TransportError<E>) -> Self {
        Self::Transport(value)
    }
}

impl<E: fmt::Debug> fmt::Display for TransportError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e) => write!(f, "could not open i2c bus: {e:?}"),
            Self::Write(e) => write!(f, "i2c write failed: {e:?}"),
            Self::Read(e) => write!(f, "i2c read failed: {e:?}"),
            Self::Scan(e) => write!(f, "i2c bus scan failed: {e:?}"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedBlock { len } => {
                write!(f, "measurement block is {len} bytes, expected 8")
            }
            Self::ChecksumMismatch { expected, computed } => write!(
                f,
                "checksum mismatch: block carries {expected:#06x}, computed {computed:#06x}"
            ),
            Self::UnexpectedHeader { function, count } => write!(
                f,
                "unexpected response header {function:#04x} {count:#04x}"
            ),
            Self::OutOfRange { humidity_raw } => {
                write!(f, "humidity raw value {humidity_raw} is out of range")
            }
        }
    }
}

impl<E: fmt::Debug> fmt::Display for InitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound { address } => {
                write!(f, "no device answered at {:#04x}", address.get())
            }
            Self::Transport(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => fmt::Display::fmt(e, f),
            Self::Decode(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for TransportError<E> {}
impl core::error::Error for DecodeError {}
impl<E: fmt::Debug> core::error::Error for InitError<E> {}
impl<E: fmt::Debug> core::error::Error for Error<E> {}
