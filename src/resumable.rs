//! Step a driver future from a superloop, without an executor.
//!
//! Every driver operation in this crate is an `async fn`. On a target with an executor you just
//! `.await` it. In a plain `loop {}` the future can instead be parked in a pinned slot and
//! advanced one step at a time with [`Resumable::resume`]; between steps the loop is free to do
//! other work. [`Resumable::stop`] drops the future where it stands, which detaches any
//! in-flight bus transaction and releases the bus.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn read_sensor() -> u8 { 0 }
//! # fn blink() {}
//! use core::pin::pin;
//! use bus_envoy::resumable::{Resume, Resumable};
//!
//! let slot = pin!(Some(read_sensor()));
//! let mut reading = Resumable::new(slot);
//! let value = loop {
//!     if let Resume::Finished(value) = reading.resume() {
//!         break value;
//!     }
//!     blink();
//! };
//! # let _ = value;
//! ```

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

pub use embassy_futures::block_on;

/// Outcome of one [`Resumable::resume`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resume<T> {
    /// Nothing to run: never started, already finished, or stopped.
    Idle,
    /// Suspended; call [`Resumable::resume`] again.
    Running,
    /// Completed with this value. The slot is now empty.
    Finished(T),
}

impl<T> Resume<T> {
    /// `true` for [`Resume::Running`].
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// The finished value, if any.
    pub fn finished(self) -> Option<T> {
        match self {
            Self::Finished(value) => Some(value),
            Self::Idle | Self::Running => None,
        }
    }
}

/// A future in a pinned slot, advanced one poll at a time.
pub struct Resumable<'a, F> {
    slot: Pin<&'a mut Option<F>>,
}

impl<'a, F: Future> Resumable<'a, F> {
    /// Wrap a pinned slot. The slot may be empty or already hold a future.
    #[must_use]
    pub const fn new(slot: Pin<&'a mut Option<F>>) -> Self {
        Self { slot }
    }

    /// Put `future` in the slot unless one is still running.
    ///
    /// Returns `false`, and drops `future` unpolled, if the slot is occupied.
    pub fn start(&mut self, future: F) -> bool {
        if self.is_running() {
            warn!("resumable: already running");
            return false;
        }
        self.slot.set(Some(future));
        true
    }

    /// `true` while a future is in the slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slot.is_some()
    }

    /// Poll the future once.
    pub fn resume(&mut self) -> Resume<F::Output> {
        let Some(future) = self.slot.as_mut().as_pin_mut() else {
            return Resume::Idle;
        };
        let mut context = Context::from_waker(Waker::noop());
        match future.poll(&mut context) {
            Poll::Pending => Resume::Running,
            Poll::Ready(value) => {
                self.slot.set(None);
                Resume::Finished(value)
            }
        }
    }

    /// Drop the future where it stands.
    ///
    /// Returns `true` if something was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        if was_running {
            debug!("resumable: stopped");
        }
        self.slot.set(None);
        was_running
    }

    /// Run the future to completion, blocking the caller.
    ///
    /// Returns `None` if the slot was empty.
    pub fn finish_blocking(&mut self) -> Option<F::Output> {
        let future = self.slot.as_mut().as_pin_mut()?;
        let value = block_on(future);
        self.slot.set(None);
        Some(value)
    }
}
