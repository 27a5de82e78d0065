use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::am2315::Am2315;
use crate::error::Error;
use crate::measurement::{Clock, MeasurementSample};

/// Lifecycle of a [`Poller`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollingState {
    /// No loop is running.
    Idle,
    /// A loop is measuring on its period.
    Running,
    /// A stop was requested; the loop exits before its next tick.
    Stopping,
}

impl PollingState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopping => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

/// Repeats measurements on a fixed period until stopped or until one fails.
///
/// [`start`](Self::start) runs the loop on the calling context and only
/// needs `&self`, so [`stop`](Self::stop) can be called from the sample
/// callback, the delay provider, or another thread holding a reference.
/// Ticks never overlap: the next one is only scheduled after the previous
/// one has delivered its result.
#[derive(Debug)]
pub struct Poller {
    state: AtomicU8,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    /// Creates an idle poller.
    pub const fn new() -> Self {
        Poller {
            state: AtomicU8::new(PollingState::Idle.to_u8()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollingState {
        PollingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Runs the polling loop until it is stopped or a measurement fails.
    ///
    /// Each tick performs one [`Am2315::read_once`]. A good sample goes to
    /// `on_sample` and becomes the driver's last measurement. An error goes
    /// to `on_error` and ends the loop; polling does not resume on its own.
    ///
    /// # Returns
    ///
    /// * The current state, unchanged, if a loop is already running.
    /// * [`PollingState::Idle`] once this loop has finished.
    pub fn start<I2C, D, C, E>(
        &self,
        driver: &mut Am2315<I2C, D, C>,
        period_ms: u32,
        mut on_sample: impl FnMut(MeasurementSample),
        mut on_error: impl FnMut(Error<E>),
    ) -> PollingState
    where
        I2C: I2c<Error = E>,
        E: embedded_hal::i2c::Error,
        D: DelayNs,
        C: Clock,
    {
        if let Err(current) = self.transition(PollingState::Idle, PollingState::Running) {
            return current;
        }
        debug!("poller: started, period {} ms", period_ms);

        let mut ticks: u32 = 0;
        while self.state() == PollingState::Running {
            ticks = ticks.wrapping_add(1);
            match driver.read_once() {
                Ok(sample) => on_sample(sample),
                Err(err) => {
                    warn!("poller: tick {} failed, halting", ticks);
                    on_error(err);
                    break;
                }
            }

            if self.state() != PollingState::Running {
                break;
            }
            driver.pause_ms(period_ms);
        }

        self.state
            .store(PollingState::Idle.to_u8(), Ordering::Release);
        debug!("poller: stopped after {} ticks", ticks);
        PollingState::Idle
    }

    /// Asks a running loop to exit before its next tick.
    ///
    /// A tick already in flight completes and its result is still
    /// delivered. Calling this on an idle or stopping poller changes nothing.
    pub fn stop(&self) -> PollingState {
        match self.transition(PollingState::Running, PollingState::Stopping) {
            Ok(()) => PollingState::Stopping,
            Err(current) => current,
        }
    }

    fn transition(&self, from: PollingState, to: PollingState) -> Result<(), PollingState> {
        self.state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PollingState::from_u8)
    }
}
