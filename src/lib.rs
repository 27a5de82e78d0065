//! AM2315 Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic driver for the AM2315 I2C temperature
//! and humidity sensor, built on top of the [`embedded-hal`] traits.
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits
//! - Designed for `no_std` environments
//! - Bus scan, 16-bit register access and checksum-verified measurements
//! - A fixed-period [`Poller`] that halts on the first failed measurement
//!
//! # Dependencies
//! This driver depends on the following `embedded-hal` traits:
//! - [`I2c`] for bus access
//! - [`DelayNs`] for the sensor's wake and conversion times
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` and emits driver logs through `defmt`
//! - `std`: Adds [`StdClock`](measurement::StdClock) for sample timestamps
//! - `linux`: Adds [`linux::open`] for `/dev/i2c-N` buses (implies `std`)
//!
//! # Example
//!
//! ```ignore
//! use am2315::{Am2315, DeviceAddress, Poller};
//!
//! let mut sensor = Am2315::new(i2c, delay, || millis(), DeviceAddress::AM2315);
//! let info = sensor.initialize()?;
//!
//! let poller = Poller::new();
//! poller.start(
//!     &mut sensor,
//!     2_000,
//!     |sample| println!("{} %RH {} C", sample.humidity_percent, sample.temperature_celsius),
//!     |err| println!("stopped: {err}"),
//! );
//! ```
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`I2c`]: embedded_hal::i2c::I2c
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod am2315;
pub mod error;
#[cfg(feature = "linux")]
pub mod linux;
pub mod measurement;
pub mod poller;

pub use am2315::{AddressSet, Am2315, Config, DEFAULT_BUS, DeviceAddress, ReadyInfo};
pub use error::{DecodeError, Error, InitError, TransportError};
pub use measurement::{Clock, MeasurementSample, Reading, Timestamp, decode};
pub use poller::{Poller, PollingState};
