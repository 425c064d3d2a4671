//! Cooperative I2C transactions on a bus shared by several devices.
//!
//! A transaction is an object that describes one complete exchange with one device
//! (see [`Sequence`]) and tracks its own [`TransactionState`]. The [`I2cMaster`] attaches it,
//! runs it on the hardware, and detaches it again with a [`DetachCause`]. Device handles
//! ([`I2cDevice`]) lock a [`SharedI2cBus`] for the length of one transaction, so transactions
//! from different devices never interleave.
//!
//! Ready-made transactions ([`WriteReadTransaction`], [`WriteTransaction`],
//! [`ReadTransaction`]) borrow their buffers; once configured they can be run again and again
//! without reconfiguration.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example<B: embedded_hal_async::i2c::I2c>(bus: B) -> bus_envoy::Result<()> {
//! use bus_envoy::i2c::{Address, I2cDevice, I2cMaster, SharedI2cBus, WriteReadTransaction};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//!
//! let bus: SharedI2cBus<NoopRawMutex, B> = SharedI2cBus::new(I2cMaster::new(bus));
//! let mut sensor = I2cDevice::new(&bus, Address::from_const(0x1D));
//!
//! // Register helpers build a transaction per call.
//! let who_am_i = sensor.read_register(0x0F).await?;
//!
//! // Or keep a transaction around and rerun it.
//! let register = [0x27];
//! let mut status = [0_u8; 7];
//! let mut transaction = WriteReadTransaction::new(sensor.address());
//! transaction.configure_write_read(&register, &mut status)?;
//! sensor.run(&mut transaction).await?;
//! sensor.run(&mut transaction).await?;
//! # let _ = who_am_i;
//! # Ok(())
//! # }
//! ```

mod device;
mod master;
mod transaction;

pub use device::{I2cDevice, SharedI2cBus};
pub use master::I2cMaster;
pub use transaction::{ReadTransaction, WriteReadTransaction, WriteTransaction};

use heapless::Vec;

use crate::{Error, Result};

// ============================================================================
// Address
// ============================================================================

/// A 7-bit I2C device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// Highest valid 7-bit address.
    pub const MAX: u8 = 0x7F;

    /// Create an address, rejecting values that do not fit in 7 bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for values above `0x7F`.
    pub const fn new(raw: u8) -> Result<Self> {
        if raw > Self::MAX {
            Err(Error::InvalidAddress(raw))
        } else {
            Ok(Self(raw))
        }
    }

    /// Create an address from a constant. Out-of-range values fail at compile time when used
    /// in a `const` context.
    #[must_use]
    pub const fn from_const(raw: u8) -> Self {
        assert!(raw <= Self::MAX, "I2C address must fit in 7 bits");
        Self(raw)
    }

    /// The raw 7-bit address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}

// ============================================================================
// Transaction states and conditions
// ============================================================================

/// State of a transaction object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionState {
    /// Not attached; the last run (if any) finished normally.
    #[default]
    Idle,
    /// Attached to a master and in progress.
    Busy,
    /// The last run ended in an error, was stopped, or failed to attach.
    Error,
}

/// Why a transaction was detached from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetachCause {
    /// All operations completed and a stop condition was generated.
    NormalStop,
    /// A bus error occurred, or the transaction was cancelled mid-flight.
    ErrorCondition,
    /// The transaction refused to attach (it was already busy).
    FailedToAttach,
}

/// A bus-level condition emitted while running a [`Sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    /// Start condition followed by the address.
    Start,
    /// Repeated start followed by the address, switching direction.
    Restart,
    /// Write this many bytes.
    Write(usize),
    /// Read this many bytes.
    Read(usize),
    /// Stop condition.
    Stop,
}

/// The longest condition list any [`Sequence`] produces.
pub const MAX_CONDITIONS: usize = 5;

// ============================================================================
// Sequence
// ============================================================================

/// The shape of one transaction, borrowed from the transaction's buffers.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sequence<'a> {
    /// Start, address, stop. Used to probe for a device.
    Ping,
    /// Start, address, write, stop.
    Write(&'a [u8]),
    /// Start, address, read, stop.
    Read(&'a mut [u8]),
    /// Start, address, write, restart, address, read, stop.
    WriteRead(&'a [u8], &'a mut [u8]),
    /// Start, address, write `prefix` then `payload` with no restart between, stop.
    ///
    /// Used to put a register address or control byte in front of a payload without copying.
    PrefixedWrite(&'a [u8], &'a [u8]),
}

impl Sequence<'_> {
    /// Collapse zero-length parts into the simpler sequence with the same bus behavior.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Write(write) if write.is_empty() => Self::Ping,
            Self::Read(read) if read.is_empty() => Self::Ping,
            Self::WriteRead(write, read) => match (write.is_empty(), read.is_empty()) {
                (true, true) => Self::Ping,
                (false, true) => Self::Write(write),
                (true, false) => Self::Read(read),
                (false, false) => Self::WriteRead(write, read),
            },
            Self::PrefixedWrite(prefix, payload) => match (prefix.is_empty(), payload.is_empty()) {
                (true, true) => Self::Ping,
                (true, false) => Self::Write(payload),
                (false, true) => Self::Write(prefix),
                (false, false) => Self::PrefixedWrite(prefix, payload),
            },
            other => other,
        }
    }

    /// The bus conditions this sequence produces, in order.
    #[must_use]
    pub fn conditions(&self) -> Vec<Condition, MAX_CONDITIONS> {
        match self {
            Self::Ping => [Condition::Start, Condition::Stop].into_iter().collect(),
            Self::Write(write) => [Condition::Start, Condition::Write(write.len()), Condition::Stop]
                .into_iter()
                .collect(),
            Self::Read(read) => [Condition::Start, Condition::Read(read.len()), Condition::Stop]
                .into_iter()
                .collect(),
            Self::WriteRead(write, read) => [
                Condition::Start,
                Condition::Write(write.len()),
                Condition::Restart,
                Condition::Read(read.len()),
                Condition::Stop,
            ]
            .into_iter()
            .collect(),
            Self::PrefixedWrite(prefix, payload) => [
                Condition::Start,
                Condition::Write(prefix.len()),
                Condition::Write(payload.len()),
                Condition::Stop,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Total bytes written.
    #[must_use]
    pub const fn write_len(&self) -> usize {
        match self {
            Self::Ping | Self::Read(_) => 0,
            Self::Write(write) | Self::WriteRead(write, _) => write.len(),
            Self::PrefixedWrite(prefix, payload) => prefix.len().saturating_add(payload.len()),
        }
    }

    /// Total bytes read.
    #[must_use]
    pub const fn read_len(&self) -> usize {
        match self {
            Self::Read(read) | Self::WriteRead(_, read) => read.len(),
            Self::Ping | Self::Write(_) | Self::PrefixedWrite(..) => 0,
        }
    }
}

// ============================================================================
// Transaction trait
// ============================================================================

/// One I2C transaction as seen by the [`I2cMaster`].
///
/// The master calls [`attaching`](Self::attaching) before touching the bus, asks for the
/// [`sequence`](Self::sequence) to run, and calls [`detaching`](Self::detaching) exactly once
/// afterwards, also when the run is cancelled.
pub trait I2cTransaction {
    /// The device this transaction talks to.
    fn address(&self) -> Address;

    /// Current state.
    fn state(&self) -> TransactionState;

    /// Called before the master starts the transaction.
    ///
    /// Return `false` to refuse; the master then detaches with [`DetachCause::FailedToAttach`].
    fn attaching(&mut self) -> bool;

    /// The operations to run.
    fn sequence(&mut self) -> Sequence<'_>;

    /// Called once the master is done with the transaction.
    fn detaching(&mut self, cause: DetachCause);

    /// `true` while attached to a master.
    fn is_busy(&self) -> bool {
        self.state() == TransactionState::Busy
    }
}
