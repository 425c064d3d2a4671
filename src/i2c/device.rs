use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::I2c;

use super::{Address, I2cMaster, I2cTransaction, ReadTransaction, WriteReadTransaction, WriteTransaction};
use crate::Result;

/// An [`I2cMaster`] behind an async mutex, shared by several [`I2cDevice`] handles.
pub type SharedI2cBus<M, B> = Mutex<M, I2cMaster<B>>;

/// One device on a [`SharedI2cBus`].
///
/// Every operation locks the bus for exactly one transaction. Operations take `&mut self`,
/// so a device never has two transactions in flight.
pub struct I2cDevice<'a, M: RawMutex, B> {
    bus: &'a SharedI2cBus<M, B>,
    address: Address,
    configuration: Option<fn(&mut B)>,
}

impl<'a, M: RawMutex, B> I2cDevice<'a, M, B> {
    /// A handle for the device at `address`.
    #[must_use]
    pub const fn new(bus: &'a SharedI2cBus<M, B>, address: Address) -> Self {
        Self {
            bus,
            address,
            configuration: None,
        }
    }

    /// Apply `configure` to the bus (baud rate, timing) before this device's transactions
    /// whenever another configuration was applied last.
    #[must_use]
    pub const fn with_configuration(mut self, configure: fn(&mut B)) -> Self {
        self.configuration = Some(configure);
        self
    }

    /// The device address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Point the handle at another address.
    pub const fn set_address(&mut self, address: Address) {
        self.address = address;
    }
}

impl<M: RawMutex, B: I2c> I2cDevice<'_, M, B> {
    /// Lock the bus and run `transaction` to completion.
    ///
    /// # Errors
    ///
    /// Returns the transaction's bus error, or [`crate::Error::TransactionBusy`].
    pub async fn run<T: I2cTransaction + ?Sized>(&mut self, transaction: &mut T) -> Result<()> {
        let mut master = self.bus.lock().await;
        master.run(transaction, self.configuration).await
    }

    /// Probe for the device.
    ///
    /// Returns `Ok(false)` when nothing acknowledges the address.
    ///
    /// # Errors
    ///
    /// Returns any bus error other than an address NACK.
    pub async fn ping(&mut self) -> Result<bool> {
        let mut transaction = WriteTransaction::new(self.address);
        match self.run(&mut transaction).await {
            Ok(()) => Ok(true),
            Err(error) if error.is_address_nack() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Write `bytes`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut transaction = WriteTransaction::new(self.address);
        transaction.configure_write(bytes)?;
        self.run(&mut transaction).await
    }

    /// Write `prefix` then `payload` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_prefixed(&mut self, prefix: &[u8], payload: &[u8]) -> Result<()> {
        let mut transaction = WriteTransaction::new(self.address);
        transaction.configure_prefixed_write(prefix, payload)?;
        self.run(&mut transaction).await
    }

    /// Read into `buffer`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let mut transaction = ReadTransaction::new(self.address);
        transaction.configure_read(buffer)?;
        self.run(&mut transaction).await
    }

    /// Write `write`, then read into `read` after a repeated start.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        let mut transaction = WriteReadTransaction::new(self.address);
        transaction.configure_write_read(write, read)?;
        self.run(&mut transaction).await
    }

    /// Write one register.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.write(&[register, value]).await
    }

    /// Write consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<()> {
        self.write_prefixed(&[register], values).await
    }

    /// Read one register.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0];
        self.write_read(&[register], &mut value).await?;
        Ok(value[0])
    }

    /// Read consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read_registers(&mut self, register: u8, values: &mut [u8]) -> Result<()> {
        self.write_read(&[register], values).await
    }

    /// Read-modify-write: clear the bits in `clear`, then set the bits in `set`.
    ///
    /// With `clear == 0xFF` the register is overwritten with `set` and nothing is read.
    /// Returns the value written.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn update_register(&mut self, register: u8, set: u8, clear: u8) -> Result<u8> {
        let old = if clear == 0xFF {
            0
        } else {
            self.read_register(register).await?
        };
        let value = (old & !clear) | set;
        self.write_register(register, value).await?;
        Ok(value)
    }
}
