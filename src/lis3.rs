//! Register transport for the ST LIS3 family of accelerometers and gyroscopes.
//!
//! The chips expose the same register file over I2C and SPI but encode multi-byte access
//! differently. Drivers such as [`crate::lis302dl::Lis302dl`] are written against
//! [`Lis3Transport`] and work over either bus.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::spi::Operation;
use embedded_hal_async::i2c::I2c;
use embedded_hal_async::spi::SpiDevice;

use crate::i2c::I2cDevice;
use crate::{Error, Result};

/// `WHO_AM_I` is at the same address on every LIS3 part.
pub const WHO_AM_I: u8 = 0x0F;

/// I2C: set in the register address to auto-increment over a burst.
const I2C_AUTO_INCREMENT: u8 = 0x80;
/// SPI: read instead of write.
const SPI_READ: u8 = 0x80;
/// SPI: auto-increment the register address over a burst.
const SPI_AUTO_INCREMENT: u8 = 0x40;

/// Register access to a LIS3 device.
pub trait Lis3Transport {
    /// Write consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    async fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<()>;

    /// Read consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    async fn read_registers(&mut self, register: u8, values: &mut [u8]) -> Result<()>;

    /// `true` if a device answers.
    ///
    /// # Errors
    ///
    /// Returns bus errors other than "no device".
    async fn ping(&mut self) -> Result<bool>;

    /// Write one register.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    async fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.write_registers(register, &[value]).await
    }

    /// Read one register.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    async fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0];
        self.read_registers(register, &mut value).await?;
        Ok(value[0])
    }
}

// ============================================================================
// I2C
// ============================================================================

/// LIS3 register access over a shared I2C bus.
pub struct Lis3TransportI2c<'a, M: RawMutex, B> {
    device: I2cDevice<'a, M, B>,
}

impl<'a, M: RawMutex, B> Lis3TransportI2c<'a, M, B> {
    /// Wrap an I2C device handle.
    #[must_use]
    pub const fn new(device: I2cDevice<'a, M, B>) -> Self {
        Self { device }
    }

    /// The underlying device handle.
    pub fn device(&mut self) -> &mut I2cDevice<'a, M, B> {
        &mut self.device
    }
}

const fn i2c_register(register: u8, len: usize) -> u8 {
    if len > 1 {
        register | I2C_AUTO_INCREMENT
    } else {
        register
    }
}

impl<M: RawMutex, B: I2c> Lis3Transport for Lis3TransportI2c<'_, M, B> {
    async fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<()> {
        self.device
            .write_registers(i2c_register(register, values.len()), values)
            .await
    }

    async fn read_registers(&mut self, register: u8, values: &mut [u8]) -> Result<()> {
        self.device
            .read_registers(i2c_register(register, values.len()), values)
            .await
    }

    async fn ping(&mut self) -> Result<bool> {
        self.device.ping().await
    }
}

// ============================================================================
// SPI
// ============================================================================

/// LIS3 register access over any async [`SpiDevice`], such as
/// [`crate::spi::SharedSpiDevice`].
pub struct Lis3TransportSpi<S> {
    device: S,
}

impl<S> Lis3TransportSpi<S> {
    /// Wrap an SPI device.
    #[must_use]
    pub const fn new(device: S) -> Self {
        Self { device }
    }

    /// Give the SPI device back.
    pub fn release(self) -> S {
        self.device
    }
}

const fn spi_command(register: u8, len: usize) -> u8 {
    if len > 1 {
        register | SPI_AUTO_INCREMENT
    } else {
        register
    }
}

impl<S: SpiDevice> Lis3Transport for Lis3TransportSpi<S> {
    async fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<()> {
        let command = [spi_command(register, values.len())];
        self.device
            .transaction(&mut [Operation::Write(&command), Operation::Write(values)])
            .await
            .map_err(|error| Error::from_spi(&error))
    }

    async fn read_registers(&mut self, register: u8, values: &mut [u8]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let command = [spi_command(register, values.len()) | SPI_READ];
        self.device
            .transaction(&mut [Operation::Write(&command), Operation::Read(values)])
            .await
            .map_err(|error| Error::from_spi(&error))
    }

    /// SPI has no acknowledge: the device is present if `WHO_AM_I` reads as neither all zeros
    /// nor all ones.
    async fn ping(&mut self) -> Result<bool> {
        let identity = self.read_register(WHO_AM_I).await?;
        Ok(!matches!(identity, 0x00 | 0xFF))
    }
}
