use embedded_hal::i2c::{Error as _, ErrorKind};
use embedded_hal_async::i2c::{I2c, Operation};

use super::{Address, DetachCause, I2cTransaction, Sequence};
use crate::{Error, Result};

/// Owner of one I2C peripheral. Runs one [`I2cTransaction`] at a time.
///
/// Usually shared between devices as a [`SharedI2cBus`](super::SharedI2cBus) and driven
/// through [`I2cDevice`](super::I2cDevice) handles.
#[derive(Debug)]
pub struct I2cMaster<B> {
    bus: B,
    configuration: Option<fn(&mut B)>,
    last_error: Option<ErrorKind>,
}

impl<B> I2cMaster<B> {
    /// Take ownership of a HAL I2C bus.
    #[must_use]
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            configuration: None,
            last_error: None,
        }
    }

    /// The error that ended the most recent failed transaction.
    #[must_use]
    pub const fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Forget the last error and the applied bus configuration.
    ///
    /// The next transaction that carries a configuration reapplies it.
    pub fn reset(&mut self) {
        self.configuration = None;
        self.last_error = None;
    }

    /// Give the HAL bus back.
    pub fn release(self) -> B {
        self.bus
    }

    fn apply_configuration(&mut self, configuration: Option<fn(&mut B)>) {
        let Some(configure) = configuration else {
            return;
        };
        let changed = self
            .configuration
            .is_none_or(|current| !core::ptr::fn_addr_eq(current, configure));
        if changed {
            configure(&mut self.bus);
            self.configuration = Some(configure);
            debug!("i2c: bus configuration changed");
        }
    }
}

impl<B: I2c> I2cMaster<B> {
    /// Attach `transaction`, run its [`Sequence`], and detach it.
    ///
    /// `configuration` is applied to the bus first when it differs from the last one applied.
    /// Dropping the returned future mid-transaction detaches the transaction with
    /// [`DetachCause::ErrorCondition`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionBusy`] if the transaction refuses to attach, or
    /// [`Error::I2c`] if the bus reports an error.
    pub async fn run<T>(
        &mut self,
        transaction: &mut T,
        configuration: Option<fn(&mut B)>,
    ) -> Result<()>
    where
        T: I2cTransaction + ?Sized,
    {
        let address = transaction.address();
        if !transaction.attaching() {
            transaction.detaching(DetachCause::FailedToAttach);
            warn!("i2c {:#x}: transaction failed to attach", address.get());
            return Err(Error::TransactionBusy);
        }
        self.apply_configuration(configuration);

        let mut attached = Attached {
            transaction,
            cause: DetachCause::ErrorCondition,
        };
        let sequence = attached.transaction.sequence();
        trace!("i2c {:#x}: {}", address.get(), sequence.conditions().as_slice());
        match execute(&mut self.bus, address, sequence).await {
            Ok(()) => {
                attached.cause = DetachCause::NormalStop;
                Ok(())
            }
            Err(kind) => {
                warn!("i2c {:#x}: {}", address.get(), kind);
                self.last_error = Some(kind);
                Err(Error::I2c(kind))
            }
        }
    }
}

/// Detaches the transaction when dropped, including when the running future is dropped.
struct Attached<'t, T: I2cTransaction + ?Sized> {
    transaction: &'t mut T,
    cause: DetachCause,
}

impl<T: I2cTransaction + ?Sized> Drop for Attached<'_, T> {
    fn drop(&mut self) {
        self.transaction.detaching(self.cause);
    }
}

async fn execute<B: I2c>(
    bus: &mut B,
    address: Address,
    sequence: Sequence<'_>,
) -> core::result::Result<(), ErrorKind> {
    let address = address.get();
    let result = match sequence {
        Sequence::Ping => bus.write(address, &[]).await,
        Sequence::Write(write) => bus.write(address, write).await,
        Sequence::Read(read) => bus.read(address, read).await,
        Sequence::WriteRead(write, read) => bus.write_read(address, write, read).await,
        Sequence::PrefixedWrite(prefix, payload) => {
            bus.transaction(address, &mut [Operation::Write(prefix), Operation::Write(payload)])
                .await
        }
    };
    result.map_err(|error| error.kind())
}
