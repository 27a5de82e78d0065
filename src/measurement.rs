//! Decoding of the AM2315 measurement block.
//!
//! The sensor answers a "read 4 registers from 0x00" command with 8 bytes:
//!
//! | byte | meaning                  |
//! |------|--------------------------|
//! | 0    | function code echo, 0x03 |
//! | 1    | register count echo, 4   |
//! | 2..4 | humidity, big-endian     |
//! | 4..6 | temperature, big-endian  |
//! | 6..8 | CRC16, low byte first    |

use crate::error::DecodeError;

/// Length of the response to a measurement read.
pub const BLOCK_LEN: usize = 8;

/// Modbus function code for "read registers".
pub(crate) const READ_FUNCTION: u8 = 0x03;
/// Humidity and temperature occupy four consecutive registers from 0x00.
pub(crate) const MEASUREMENT_REGISTERS: u8 = 0x04;

const SIGN_BIT: u16 = 0x8000;
const HUMIDITY_RAW_MAX: u16 = 1000;

/// Humidity and temperature decoded from one block.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub relative_humidity: f32,
}

impl Reading {
    /// Attaches the time the block was fetched.
    pub fn at(self, timestamp: Timestamp) -> MeasurementSample {
        MeasurementSample {
            humidity_percent: self.relative_humidity,
            temperature_celsius: self.temperature,
            timestamp,
        }
    }
}

/// Milliseconds on a monotonic clock chosen by the caller.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wraps a millisecond count.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// The millisecond count.
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

/// A complete, checksum-verified measurement.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementSample {
    /// Relative humidity in percent.
    pub humidity_percent: f32,
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f32,
    /// When the block was fetched.
    pub timestamp: Timestamp,
}

/// Source of sample timestamps.
///
/// Any `FnMut() -> u64` returning milliseconds is a clock, so a tick counter
/// or `|| 0` works where no real time base exists.
pub trait Clock {
    /// Current time.
    fn now(&mut self) -> Timestamp;
}

impl<F> Clock for F
where
    F: FnMut() -> u64,
{
    fn now(&mut self) -> Timestamp {
        Timestamp::from_millis(self())
    }
}

/// Milliseconds elapsed since the clock was created.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Starts counting from now.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&mut self) -> Timestamp {
        let elapsed = self.origin.elapsed().as_millis();
        Timestamp::from_millis(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

/// Modbus CRC16: initial value 0xFFFF, reflected polynomial 0xA001.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Decodes a measurement block.
///
/// Checks are applied in order: length, checksum, command echo, humidity
/// range. No field is looked at before the length and checksum pass.
///
/// # Errors
///
/// * [`DecodeError::MalformedBlock`] if `block` is not 8 bytes long.
/// * [`DecodeError::ChecksumMismatch`] if the trailing CRC is wrong.
/// * [`DecodeError::UnexpectedHeader`] if the sensor did not echo `0x03 0x04`.
/// * [`DecodeError::OutOfRange`] if humidity decodes above 100 %.
pub fn decode(block: &[u8]) -> Result<Reading, DecodeError> {
    let block: &[u8; BLOCK_LEN] = block
        .try_into()
        .map_err(|_| DecodeError::MalformedBlock { len: block.len() })?;
    let [function, count, hum_hi, hum_lo, temp_hi, temp_lo, crc_lo, crc_hi] = *block;

    let expected = u16::from_le_bytes([crc_lo, crc_hi]);
    let computed = crc16(&block[..6]);
    if expected != computed {
        return Err(DecodeError::ChecksumMismatch { expected, computed });
    }

    if function != READ_FUNCTION || count != MEASUREMENT_REGISTERS {
        return Err(DecodeError::UnexpectedHeader { function, count });
    }

    let humidity_raw = u16::from_be_bytes([hum_hi, hum_lo]);
    if humidity_raw > HUMIDITY_RAW_MAX {
        return Err(DecodeError::OutOfRange { humidity_raw });
    }

    Ok(Reading {
        temperature: temperature_from_raw(u16::from_be_bytes([temp_hi, temp_lo])),
        relative_humidity: f32::from(humidity_raw) / 10.0,
    })
}

/// Sign-magnitude: bit 15 is the sign, the low 15 bits tenths of a degree.
fn temperature_from_raw(raw: u16) -> f32 {
    let magnitude = f32::from(raw & !SIGN_BIT) / 10.0;
    if raw & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a well-formed response block with a valid checksum.
    pub(crate) fn block(humidity_raw: u16, temperature_raw: u16) -> [u8; BLOCK_LEN] {
        let [hum_hi, hum_lo] = humidity_raw.to_be_bytes();
        let [temp_hi, temp_lo] = temperature_raw.to_be_bytes();
        let mut data = [
            READ_FUNCTION,
            MEASUREMENT_REGISTERS,
            hum_hi,
            hum_lo,
            temp_hi,
            temp_lo,
            0,
            0,
        ];
        let [crc_lo, crc_hi] = crc16(&data[..6]).to_le_bytes();
        data[6] = crc_lo;
        data[7] = crc_hi;
        data
    }

    #[test]
    fn test_crc16() {
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc16(&[0x03, 0x04, 0x02, 0x36, 0x00, 0xDB]), 0x0550);
    }

    #[test]
    fn test_decode_captured_block() {
        // Humidity 56.6 %, temperature 21.9 C, CRC 0x0550 sent low byte first
        let data = [0x03, 0x04, 0x02, 0x36, 0x00, 0xDB, 0x50, 0x05];

        assert_eq!(
            decode(&data),
            Ok(Reading {
                relative_humidity: 56.6,
                temperature: 21.9,
            })
        );
    }

    #[test]
    fn test_decode_positive_temp() {
        // Humidity: 50.0% -> [0x01, 0xF4] => 500
        // Temperature: 20.0C -> [0x00, 0xC8] => 200
        let reading = decode(&block(0x01F4, 0x00C8)).unwrap();

        assert_eq!(
            reading,
            Reading {
                relative_humidity: 50.0,
                temperature: 20.0,
            }
        );
    }

    #[test]
    fn test_decode_negative_temp() {
        // Bit 7 of temp_hi is the sign: [0x80, 0xC8] => -20.0C
        let reading = decode(&block(0x01F4, 0x80C8)).unwrap();

        assert_eq!(reading.temperature, -20.0);
        assert_eq!(reading.relative_humidity, 50.0);
    }

    #[test]
    fn test_temperature_sign_magnitude_for_every_raw_value() {
        for raw in 0..=u16::MAX {
            let reading = decode(&block(0, raw)).unwrap();
            let magnitude = f32::from(raw & 0x7FFF) / 10.0;
            let expected = if raw & 0x8000 != 0 {
                -magnitude
            } else {
                f32::from(raw) / 10.0
            };
            assert_eq!(reading.temperature, expected, "raw {raw:#06x}");
        }
    }

    #[test]
    fn test_decode_wrong_length() {
        for len in [0, 1, 6, 7, 9, 16] {
            let data = [0u8; 16];
            assert_eq!(
                decode(&data[..len]),
                Err(DecodeError::MalformedBlock { len })
            );
        }
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut data = block(0x01F4, 0x00C8);
        data[7] ^= 0x01;
        assert!(matches!(
            decode(&data),
            Err(DecodeError::ChecksumMismatch { .. })
        ));

        // Garbage fields with a bad CRC still report the checksum first
        let garbage = [0xFF, 0x00, 0xFF, 0xFF, 0x12, 0x34, 0x00, 0x00];
        assert_eq!(
            decode(&garbage),
            Err(DecodeError::ChecksumMismatch {
                expected: 0x0000,
                computed: crc16(&garbage[..6]),
            })
        );
    }

    #[test]
    fn test_decode_unexpected_header() {
        let mut data = [0x83, 0x04, 0x01, 0xF4, 0x00, 0xC8, 0, 0];
        let [lo, hi] = crc16(&data[..6]).to_le_bytes();
        data[6] = lo;
        data[7] = hi;

        assert_eq!(
            decode(&data),
            Err(DecodeError::UnexpectedHeader {
                function: 0x83,
                count: 0x04,
            })
        );
    }

    #[test]
    fn test_decode_humidity_bounds() {
        assert_eq!(decode(&block(1000, 0)).unwrap().relative_humidity, 100.0);
        assert_eq!(
            decode(&block(1001, 0)),
            Err(DecodeError::OutOfRange { humidity_raw: 1001 })
        );
    }

    #[test]
    fn test_reading_at_timestamp() {
        let sample = Reading {
            temperature: -1.5,
            relative_humidity: 40.0,
        }
        .at(Timestamp::from_millis(1234));

        assert_eq!(sample.temperature_celsius, -1.5);
        assert_eq!(sample.humidity_percent, 40.0);
        assert_eq!(sample.timestamp.as_millis(), 1234);
    }

    #[test]
    fn test_closure_clock() {
        let mut ticks = 0u64;
        let mut clock = || {
            ticks += 10;
            ticks
        };
        assert_eq!(Clock::now(&mut clock), Timestamp::from_millis(10));
        assert_eq!(Clock::now(&mut clock), Timestamp::from_millis(20));
    }
}
