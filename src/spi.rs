//! SPI bus shared by several chip-selected devices.
//!
//! [`SharedSpiDevice`] implements [`embedded_hal_async::spi::SpiDevice`], so any async SPI
//! driver (including [`crate::lis3::Lis3TransportSpi`]) can sit on a bus that other devices
//! use too. Each device transaction locks the bus, applies the device's bus configuration if
//! another one was applied last, and frames the operations with its own chip select.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example<B, CS>(bus: B, cs: CS) -> bus_envoy::Result<()>
//! # where B: embedded_hal_async::spi::SpiBus, CS: embedded_hal::digital::OutputPin {
//! use bus_envoy::lis3::Lis3TransportSpi;
//! use bus_envoy::lis302dl::Lis302dl;
//! use bus_envoy::spi::{SharedSpiBus, SharedSpiDevice, SpiMaster};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//!
//! let bus: SharedSpiBus<NoopRawMutex, B> = SharedSpiBus::new(SpiMaster::new(bus));
//! let device = SharedSpiDevice::new(&bus, cs);
//! let mut accelerometer = Lis302dl::new(Lis3TransportSpi::new(device));
//! accelerometer.who_am_i().await?;
//! # Ok(())
//! # }
//! ```

use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as SpiError, ErrorKind, ErrorType, Operation};
use embedded_hal_async::spi::{SpiBus, SpiDevice};

/// An [`SpiMaster`] behind an async mutex, shared by several [`SharedSpiDevice`] handles.
pub type SharedSpiBus<M, B> = Mutex<M, SpiMaster<B>>;

/// Owner of one SPI peripheral. Tracks which device configuration is applied.
#[derive(Debug)]
pub struct SpiMaster<B> {
    bus: B,
    configuration: Option<fn(&mut B)>,
}

impl<B> SpiMaster<B> {
    /// Take ownership of a HAL SPI bus.
    #[must_use]
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            configuration: None,
        }
    }

    /// Forget the applied configuration; the next device transaction reapplies its own.
    pub fn reset(&mut self) {
        self.configuration = None;
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
            debug!("spi: bus configuration changed");
        }
    }
}

/// Errors from a [`SharedSpiDevice`] transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiDeviceError<BUS, CS> {
    /// The bus reported an error.
    Spi(BUS),
    /// The chip-select pin reported an error.
    Cs(CS),
    /// `Operation::DelayNs` is not supported on a shared device.
    DelayNotSupported,
}

impl<BUS: SpiError, CS: Debug> SpiError for SpiDeviceError<BUS, CS> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Spi(error) => error.kind(),
            Self::Cs(_) | Self::DelayNotSupported => ErrorKind::Other,
        }
    }
}

impl<BUS: SpiError, CS: Debug> From<SpiDeviceError<BUS, CS>> for crate::Error {
    fn from(error: SpiDeviceError<BUS, CS>) -> Self {
        Self::Spi(error.kind())
    }
}

/// One chip-selected device on a [`SharedSpiBus`].
pub struct SharedSpiDevice<'a, M: RawMutex, B, CS> {
    bus: &'a SharedSpiBus<M, B>,
    cs: CS,
    configuration: Option<fn(&mut B)>,
}

impl<'a, M: RawMutex, B, CS> SharedSpiDevice<'a, M, B, CS> {
    /// A device selected by driving `cs` low.
    #[must_use]
    pub const fn new(bus: &'a SharedSpiBus<M, B>, cs: CS) -> Self {
        Self {
            bus,
            cs,
            configuration: None,
        }
    }

    /// Apply `configure` to the bus (mode, frequency) before this device's transactions
    /// whenever another configuration was applied last.
    #[must_use]
    pub fn with_configuration(mut self, configure: fn(&mut B)) -> Self {
        self.configuration = Some(configure);
        self
    }
}

impl<M: RawMutex, B: ErrorType, CS: OutputPin> ErrorType for SharedSpiDevice<'_, M, B, CS> {
    type Error = SpiDeviceError<B::Error, CS::Error>;
}

impl<M: RawMutex, B: SpiBus, CS: OutputPin> SpiDevice for SharedSpiDevice<'_, M, B, CS> {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        if operations
            .iter()
            .any(|operation| matches!(operation, Operation::DelayNs(_)))
        {
            return Err(SpiDeviceError::DelayNotSupported);
        }

        let mut master = self.bus.lock().await;
        master.apply_configuration(self.configuration);
        trace!("spi: {} operations", operations.len());

        let mut selected = Selected::select(&mut self.cs).map_err(SpiDeviceError::Cs)?;
        let result = run_operations(&mut master.bus, operations).await;
        let flushed = master.bus.flush().await;
        let deselected = selected.deselect();

        result.map_err(SpiDeviceError::Spi)?;
        flushed.map_err(SpiDeviceError::Spi)?;
        deselected.map_err(SpiDeviceError::Cs)
    }
}

/// Holds chip select low; drives it high again when dropped unless already deselected.
struct Selected<'c, CS: OutputPin> {
    cs: &'c mut CS,
    selected: bool,
}

impl<'c, CS: OutputPin> Selected<'c, CS> {
    fn select(cs: &'c mut CS) -> Result<Self, CS::Error> {
        cs.set_low()?;
        Ok(Self { cs, selected: true })
    }

    fn deselect(&mut self) -> Result<(), CS::Error> {
        self.selected = false;
        self.cs.set_high()
    }
}

impl<CS: OutputPin> Drop for Selected<'_, CS> {
    fn drop(&mut self) {
        if self.selected {
            warn!("spi: transaction dropped, releasing chip select");
            let _ = self.cs.set_high();
        }
    }
}

async fn run_operations<B: SpiBus>(
    bus: &mut B,
    operations: &mut [Operation<'_, u8>],
) -> Result<(), B::Error> {
    for operation in operations {
        match operation {
            Operation::Read(read) => bus.read(read).await?,
            Operation::Write(write) => bus.write(write).await?,
            Operation::Transfer(read, write) => bus.transfer(read, write).await?,
            Operation::TransferInPlace(words) => bus.transfer_in_place(words).await?,
            Operation::DelayNs(_) => {}
        }
    }
    Ok(())
}
