//! Opening the sensor on a Linux host through `/dev/i2c-N`.

use linux_embedded_hal::{Delay, I2CError, I2cdev};

use crate::am2315::{Am2315, Config, ReadyInfo};
use crate::error::{InitError, TransportError};
use crate::measurement::StdClock;

/// Driver bound to a Linux i2c-dev bus.
pub type LinuxAm2315 = Am2315<I2cdev, Delay, StdClock>;

/// Opens `/dev/i2c-<bus>` and initializes the sensor on it.
///
/// The bus is closed again if the sensor cannot be found.
pub fn open(config: Config) -> Result<(LinuxAm2315, ReadyInfo), InitError<I2CError>> {
    let path = format!("/dev/i2c-{}", config.bus);
    debug!("am2315: opening i2c bus {}", config.bus);
    let i2c = I2cdev::new(&path)
        .map_err(|e| InitError::Transport(TransportError::Open(I2CError::from(e))))?;

    let mut driver = Am2315::new(i2c, Delay, StdClock::new(), config.address);
    let info = driver.initialize()?;
    Ok((driver, info))
}
