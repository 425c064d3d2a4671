//! Ready-made transactions over borrowed buffers.

use super::{Address, DetachCause, I2cTransaction, Sequence, TransactionState};
use crate::{Error, Result};

/// Address and state shared by every ready-made transaction.
#[derive(Debug, Clone, Copy)]
struct Core {
    address: Address,
    state: TransactionState,
}

impl Core {
    const fn new(address: Address) -> Self {
        Self {
            address,
            state: TransactionState::Idle,
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state == TransactionState::Busy {
            Err(Error::TransactionBusy)
        } else {
            Ok(())
        }
    }

    fn attach(&mut self) -> bool {
        if self.state == TransactionState::Busy {
            return false;
        }
        self.state = TransactionState::Busy;
        true
    }

    fn detach(&mut self, cause: DetachCause) {
        self.state = if cause == DetachCause::NormalStop {
            TransactionState::Idle
        } else {
            TransactionState::Error
        };
    }
}

macro_rules! impl_transaction_common {
    ($name:ident) => {
        impl<'b> $name<'b> {
            /// Change the target device.
            ///
            /// # Errors
            ///
            /// Returns [`Error::TransactionBusy`] while the transaction is running.
            pub fn set_address(&mut self, address: Address) -> Result<()> {
                self.core.ensure_idle()?;
                self.core.address = address;
                Ok(())
            }

            /// Current state.
            #[must_use]
            pub const fn state(&self) -> TransactionState {
                self.core.state
            }
        }
    };
}

// ============================================================================
// WriteReadTransaction
// ============================================================================

/// Start, address, write, restart, address, read, stop.
///
/// Either half may be empty: an empty read makes it a plain write, an empty write a plain read,
/// and both empty a ping.
#[derive(Debug)]
pub struct WriteReadTransaction<'b> {
    core: Core,
    write: &'b [u8],
    read: &'b mut [u8],
}

impl<'b> WriteReadTransaction<'b> {
    /// A transaction configured as a ping.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            core: Core::new(address),
            write: &[],
            read: &mut [],
        }
    }

    /// Probe for the device: address only, no payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_ping(&mut self) -> Result<()> {
        self.configure_write_read(&[], &mut [])
    }

    /// Write `write`, then read into `read`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_write_read(&mut self, write: &'b [u8], read: &'b mut [u8]) -> Result<()> {
        self.core.ensure_idle()?;
        self.write = write;
        self.read = read;
        Ok(())
    }

    /// Write only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_write(&mut self, write: &'b [u8]) -> Result<()> {
        self.configure_write_read(write, &mut [])
    }

    /// Read only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_read(&mut self, read: &'b mut [u8]) -> Result<()> {
        self.configure_write_read(&[], read)
    }

    /// Bytes received by the last run.
    #[must_use]
    pub fn read_buffer(&self) -> &[u8] {
        self.read
    }
}

impl_transaction_common!(WriteReadTransaction);

impl I2cTransaction for WriteReadTransaction<'_> {
    fn address(&self) -> Address {
        self.core.address
    }

    fn state(&self) -> TransactionState {
        self.core.state
    }

    fn attaching(&mut self) -> bool {
        self.core.attach()
    }

    fn sequence(&mut self) -> Sequence<'_> {
        Sequence::WriteRead(self.write, &mut *self.read).normalized()
    }

    fn detaching(&mut self, cause: DetachCause) {
        self.core.detach(cause);
    }
}

// ============================================================================
// WriteTransaction
// ============================================================================

/// Start, address, write, stop. The write may be split into a prefix and a payload.
#[derive(Debug)]
pub struct WriteTransaction<'b> {
    core: Core,
    prefix: &'b [u8],
    payload: &'b [u8],
}

impl<'b> WriteTransaction<'b> {
    /// A transaction configured as a ping.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self {
            core: Core::new(address),
            prefix: &[],
            payload: &[],
        }
    }

    /// Probe for the device: address only, no payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_ping(&mut self) -> Result<()> {
        self.configure_prefixed_write(&[], &[])
    }

    /// Write `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_write(&mut self, payload: &'b [u8]) -> Result<()> {
        self.configure_prefixed_write(&[], payload)
    }

    /// Write `prefix` immediately followed by `payload`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_prefixed_write(&mut self, prefix: &'b [u8], payload: &'b [u8]) -> Result<()> {
        self.core.ensure_idle()?;
        self.prefix = prefix;
        self.payload = payload;
        Ok(())
    }
}

impl_transaction_common!(WriteTransaction);

impl I2cTransaction for WriteTransaction<'_> {
    fn address(&self) -> Address {
        self.core.address
    }

    fn state(&self) -> TransactionState {
        self.core.state
    }

    fn attaching(&mut self) -> bool {
        self.core.attach()
    }

    fn sequence(&mut self) -> Sequence<'_> {
        Sequence::PrefixedWrite(self.prefix, self.payload).normalized()
    }

    fn detaching(&mut self, cause: DetachCause) {
        self.core.detach(cause);
    }
}

// ============================================================================
// ReadTransaction
// ============================================================================

/// Start, address, read, stop.
#[derive(Debug)]
pub struct ReadTransaction<'b> {
    core: Core,
    buffer: &'b mut [u8],
}

impl<'b> ReadTransaction<'b> {
    /// A transaction configured as a ping.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            core: Core::new(address),
            buffer: &mut [],
        }
    }

    /// Probe for the device: address only, no payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_ping(&mut self) -> Result<()> {
        self.configure_read(&mut [])
    }

    /// Read into `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] while the transaction is running.
    pub fn configure_read(&mut self, buffer: &'b mut [u8]) -> Result<()> {
        self.core.ensure_idle()?;
        self.buffer = buffer;
        Ok(())
    }

    /// Bytes received by the last run.
    #[must_use]
    pub fn read_buffer(&self) -> &[u8] {
        self.buffer
    }
}

impl_transaction_common!(ReadTransaction);

impl I2cTransaction for ReadTransaction<'_> {
    fn address(&self) -> Address {
        self.core.address
    }

    fn state(&self) -> TransactionState {
        self.core.state
    }

    fn attaching(&mut self) -> bool {
        self.core.attach()
    }

    fn sequence(&mut self) -> Sequence<'_> {
        Sequence::Read(&mut *self.buffer).normalized()
    }

    fn detaching(&mut self, cause: DetachCause) {
        self.core.detach(cause);
    }
}
