use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, I2c},
};

use crate::error::{Error, InitError, TransportError};
use crate::measurement::{
    BLOCK_LEN, Clock, MEASUREMENT_REGISTERS, MeasurementSample, READ_FUNCTION, decode,
};

/// Bus number used when none is configured (the header I2C bus on a Raspberry Pi).
pub const DEFAULT_BUS: u8 = 1;

/// Time the sensor needs between the wake write and the first command.
const WAKE_DELAY_US: u32 = 1_000;

/// Time the sensor needs to answer a read command.
const MEASURE_DELAY_US: u32 = 1_600;

/// First and last addresses probed by a scan; the rest are reserved.
const SCAN_FIRST: u8 = 0x08;
const SCAN_LAST: u8 = 0x77;

/// A 7-bit I2C address.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Factory address of the AM2315.
    pub const AM2315: Self = Self(0x5C);

    /// Returns `None` if `raw` does not fit in 7 bits.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= 0x7F { Some(Self(raw)) } else { None }
    }

    /// The raw 7-bit address.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for DeviceAddress {
    fn default() -> Self {
        Self::AM2315
    }
}

/// Where to find the sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address of the sensor on the bus.
    pub address: DeviceAddress,
    /// Host bus number, e.g. `1` for `/dev/i2c-1`.
    pub bus: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DeviceAddress::AM2315,
            bus: DEFAULT_BUS,
        }
    }
}

/// Set of addresses that acknowledged a probe.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressSet(u128);

impl AddressSet {
    /// Whether `address` acknowledged.
    pub fn contains(&self, address: DeviceAddress) -> bool {
        self.0 & (1 << address.get()) != 0
    }

    /// Number of addresses that acknowledged.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when nothing on the bus answered.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DeviceAddress> + '_ {
        (0..=0x7F)
            .filter_map(DeviceAddress::new)
            .filter(|address| self.contains(*address))
    }

    fn insert(&mut self, address: DeviceAddress) {
        self.0 |= 1 << address.get();
    }
}

/// Returned once the sensor has been found on the bus.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyInfo {
    /// Address the driver talks to.
    pub address: DeviceAddress,
    /// Every address that answered the scan, including the sensor.
    pub responding: AddressSet,
}

/// Driver for the AM2315 temperature and humidity sensor.
///
/// The driver owns the bus, so every transaction goes through `&mut self`
/// and can never interleave with another one.
pub struct Am2315<I2C, D, C> {
    i2c: I2C,
    delay: D,
    clock: C,
    address: DeviceAddress,
    last_measurement: Option<MeasurementSample>,
}

impl<I2C, D, C, E> Am2315<I2C, D, C>
where
    I2C: I2c<Error = E>,
    E: embedded_hal::i2c::Error,
    D: DelayNs,
    C: Clock,
{
    /// Creates a new instance of the AM2315 driver.
    ///
    /// No bus traffic happens until [`initialize`](Self::initialize) or the
    /// first transaction.
    ///
    /// # Arguments
    ///
    /// * `i2c` - The bus the sensor is attached to.
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    /// * `clock` - Source of sample timestamps.
    /// * `address` - The sensor's address.
    pub fn new(i2c: I2C, delay: D, clock: C, address: DeviceAddress) -> Self {
        Am2315 {
            i2c,
            delay,
            clock,
            address,
            last_measurement: None,
        }
    }

    /// Scans the bus and checks that the sensor answers at its address.
    ///
    /// A sleeping sensor ignores the first scan after a quiet period, so an
    /// absent address is looked for once more before giving up.
    ///
    /// # Errors
    ///
    /// * [`InitError::DeviceNotFound`] if neither scan saw the address.
    /// * [`InitError::Transport`] if the bus failed while probing.
    pub fn initialize(&mut self) -> Result<ReadyInfo, InitError<E>> {
        let mut responding = self.scan()?;
        if !responding.contains(self.address) {
            debug!("am2315: {} missing from first scan, rescanning", self.address.get());
            responding = self.scan()?;
        }

        if !responding.contains(self.address) {
            return Err(InitError::DeviceNotFound {
                address: self.address,
            });
        }

        debug!("am2315: ready at {}, {} devices on bus", self.address.get(), responding.len());
        Ok(ReadyInfo {
            address: self.address,
            responding,
        })
    }

    /// Probes every non-reserved address with an empty write.
    ///
    /// A missing acknowledge means nothing lives at that address; any other
    /// error aborts the scan.
    pub fn scan(&mut self) -> Result<AddressSet, TransportError<E>> {
        let mut found = AddressSet::default();
        for raw in SCAN_FIRST..=SCAN_LAST {
            match self.i2c.write(raw, &[]) {
                Ok(()) => found.insert(DeviceAddress(raw)),
                Err(e) if matches!(e.kind(), ErrorKind::NoAcknowledge(_)) => {}
                Err(e) => return Err(TransportError::Scan(e)),
            }
        }
        trace!("am2315: scan found {}", found.len());
        Ok(found)
    }

    /// Address this driver talks to.
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Writes a 16-bit register as `[register, high, low]`.
    ///
    /// # Returns
    ///
    /// * `Ok(2)`, the number of value bytes written.
    /// * `Err(TransportError::Write)` if the write failed twice.
    pub fn write_register(&mut self, register: u8, value: u16) -> Result<usize, TransportError<E>> {
        let [high, low] = value.to_be_bytes();
        let address = self.address.get();
        self.awake(|dev| {
            dev.i2c
                .write(address, &[register, high, low])
                .map_err(TransportError::Write)
        })?;
        Ok(2)
    }

    /// Reads a 16-bit big-endian register.
    pub fn read_register(&mut self, register: u8) -> Result<u16, TransportError<E>> {
        let address = self.address.get();
        self.awake(|dev| {
            let mut buf = [0; 2];
            dev.i2c
                .write_read(address, &[register], &mut buf)
                .map_err(TransportError::Read)?;
            Ok(u16::from_be_bytes(buf))
        })
    }

    /// Wakes the sensor, fetches one measurement block and decodes it.
    ///
    /// Only a fully successful read replaces
    /// [`last_measurement`](Self::last_measurement).
    pub fn read_once(&mut self) -> Result<MeasurementSample, Error<E>> {
        let block = self.awake(Self::fetch_block)?;
        let reading = decode(&block)?;
        let sample = reading.at(self.clock.now());
        self.last_measurement = Some(sample);
        Ok(sample)
    }

    /// Latest sample that passed every check.
    pub fn last_measurement(&self) -> Option<MeasurementSample> {
        self.last_measurement
    }

    /// Gives the bus, delay and clock back.
    pub fn release(self) -> (I2C, D, C) {
        (self.i2c, self.delay, self.clock)
    }

    pub(crate) fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Runs `op` on an awake sensor.
    ///
    /// The sensor drops off the bus while idle and does not acknowledge the
    /// wake write, so that failure is ignored. If `op` still fails it is
    /// repeated exactly once.
    fn awake<T>(
        &mut self,
        mut op: impl FnMut(&mut Self) -> Result<T, TransportError<E>>,
    ) -> Result<T, TransportError<E>> {
        self.wake();
        match op(self) {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("am2315: transaction failed, retrying once");
                op(self)
            }
        }
    }

    fn wake(&mut self) {
        if self.i2c.write(self.address.get(), &[]).is_err() {
            trace!("am2315: wake not acknowledged");
        }
        self.delay.delay_us(WAKE_DELAY_US);
    }

    fn fetch_block(&mut self) -> Result<[u8; BLOCK_LEN], TransportError<E>> {
        let address = self.address.get();
        self.i2c
            .write(address, &[READ_FUNCTION, 0x00, MEASUREMENT_REGISTERS])
            .map_err(TransportError::Write)?;
        self.delay.delay_us(MEASURE_DELAY_US);

        let mut block = [0; BLOCK_LEN];
        self.i2c
            .read(address, &mut block)
            .map_err(TransportError::Read)?;
        Ok(block)
    }
}
