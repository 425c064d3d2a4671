use derive_more::{Display, Error};
use embedded_hal::{i2c, spi};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors from bus transactions and the drivers built on them.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The I2C peripheral reported an error (NACK, arbitration loss, bus fault).
    #[display("I2C bus error: {_0:?}")]
    I2c(#[error(not(source))] i2c::ErrorKind),

    /// The SPI peripheral or its chip-select pin reported an error.
    #[display("SPI bus error: {_0:?}")]
    Spi(#[error(not(source))] spi::ErrorKind),

    /// The value does not fit in a 7-bit I2C address.
    #[display("invalid 7-bit I2C address {_0:#04x}")]
    InvalidAddress(#[error(not(source))] u8),

    /// The transaction is already attached to a bus and cannot be reconfigured or restarted.
    #[display("transaction is busy")]
    TransactionBusy,

    /// A caller-provided buffer is shorter than the operation needs.
    #[display("buffer too small: needed {needed} bytes, have {capacity}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        capacity: usize,
    },

    /// The device answered with an unexpected identification register value.
    #[display("unexpected device identity {_0:#04x}")]
    UnexpectedIdentity(#[error(not(source))] u8),

    /// The device did not become ready in time.
    #[display("device timed out")]
    Timeout,
}

impl Error {
    /// Map any HAL I2C error to its portable kind.
    pub fn from_i2c<E: i2c::Error>(error: &E) -> Self {
        Self::I2c(error.kind())
    }

    /// Map any HAL SPI error to its portable kind.
    pub fn from_spi<E: spi::Error>(error: &E) -> Self {
        Self::Spi(error.kind())
    }

    /// `true` when the device did not acknowledge its address.
    #[must_use]
    pub const fn is_address_nack(&self) -> bool {
        matches!(
            self,
            Self::I2c(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address | i2c::NoAcknowledgeSource::Unknown
            ))
        )
    }
}
