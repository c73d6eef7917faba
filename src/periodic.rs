//! Periodic measurement lifecycle shared by every unit.
//!
//! A unit is either idle or sampling periodically. Periodic sampling is
//! advanced by the caller through [`Periodic::poll`]; single-shot
//! measurements are only allowed while idle and block on [`wait_ready`].

use std::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use log::debug;

use crate::buffer::CircularBuffer;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Periodic,
}

/// Periodic measurement state machine and its sample store.
#[derive(Debug)]
pub struct Periodic<T> {
    state: State,
    interval: u64,
    latest: Option<u64>,
    updated: bool,
    data: CircularBuffer<T>,
}

impl<T> Periodic<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: State::Idle,
            interval: 0,
            latest: None,
            updated: false,
            data: CircularBuffer::new(capacity),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn in_periodic(&self) -> bool {
        self.state == State::Periodic
    }

    /// Whether the last [`poll`](Self::poll) stored a new sample.
    pub fn updated(&self) -> bool {
        self.updated
    }

    /// Sampling interval in milliseconds.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: u64) {
        self.interval = interval;
    }

    /// Enters periodic mode; the next poll samples immediately.
    ///
    /// Returns false without touching anything if already periodic.
    pub fn start(&mut self, interval: u64) -> bool {
        if self.in_periodic() {
            return false;
        }
        self.state = State::Periodic;
        self.interval = interval;
        self.latest = None;
        true
    }

    /// Returns to idle. Returns false if not periodic.
    pub fn stop(&mut self) -> bool {
        if !self.in_periodic() {
            return false;
        }
        self.state = State::Idle;
        self.updated = false;
        true
    }

    /// Runs one polling cycle at time `now` (ms).
    ///
    /// When periodic and the interval has elapsed (or `force` is set), the
    /// producer is asked for a sample. `Ok(None)` means the device was not
    /// ready; errors are logged and retried on the next cycle.
    pub fn poll<E, F>(&mut self, now: u64, force: bool, produce: F) -> bool
    where
        E: Debug,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        self.updated = false;
        if !self.in_periodic() {
            return false;
        }
        if let Some(latest) = self.latest {
            if !force && now < latest.saturating_add(self.interval) {
                return false;
            }
        }
        match produce() {
            Ok(Some(sample)) => {
                self.data.push_back(sample);
                self.latest = Some(now);
                self.updated = true;
            }
            Ok(None) => {}
            Err(e) => debug!("periodic read failed: {:?}", e),
        }
        self.updated
    }

    /// Rejects single-shot requests while periodic measurement runs.
    pub fn ensure_idle<E>(&self) -> Result<(), Error<E>> {
        if self.in_periodic() {
            Err(Error::PeriodicRunning)
        } else {
            Ok(())
        }
    }

    /// Replaces the sample store if `capacity` differs from the current one.
    pub fn resize(&mut self, capacity: usize) {
        if capacity != self.data.capacity() {
            self.data = CircularBuffer::new(capacity);
        }
    }

    pub fn data(&self) -> &CircularBuffer<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut CircularBuffer<T> {
        &mut self.data
    }
}

/// Polls `attempt` every millisecond until it yields a value.
///
/// `attempt` returns `Ok(None)` while the device is busy. Gives up with
/// [`Error::Timeout`] once `timeout_ms` delay steps have passed.
pub fn wait_ready<T, E, D, F>(delay: &mut D, timeout_ms: u32, mut attempt: F) -> Result<T, Error<E>>
where
    D: DelayMs<u32>,
    F: FnMut() -> Result<Option<T>, E>,
{
    let mut waited = 0;
    loop {
        if let Some(value) = attempt()? {
            return Ok(value);
        }
        if waited >= timeout_ms {
            return Err(Error::Timeout);
        }
        delay.delay_ms(1);
        waited += 1;
    }
}

/// Common periodic measurement surface of a unit.
pub trait PeriodicMeasurement {
    type Data;

    fn periodic(&self) -> &Periodic<Self::Data>;

    fn periodic_mut(&mut self) -> &mut Periodic<Self::Data>;

    fn in_periodic(&self) -> bool {
        self.periodic().in_periodic()
    }

    fn updated(&self) -> bool {
        self.periodic().updated()
    }

    fn interval(&self) -> u64 {
        self.periodic().interval()
    }

    fn available(&self) -> usize {
        self.periodic().data().available()
    }

    fn empty(&self) -> bool {
        self.periodic().data().empty()
    }

    fn full(&self) -> bool {
        self.periodic().data().full()
    }

    fn capacity(&self) -> usize {
        self.periodic().data().capacity()
    }

    fn oldest(&self) -> Option<&Self::Data> {
        self.periodic().data().oldest()
    }

    fn latest(&self) -> Option<&Self::Data> {
        self.periodic().data().latest()
    }

    fn discard(&mut self) -> Option<Self::Data> {
        self.periodic_mut().data_mut().discard()
    }

    fn flush(&mut self) {
        self.periodic_mut().data_mut().flush()
    }
}
