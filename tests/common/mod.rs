//! In-memory I2C and SPI peripherals for the integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use embassy_futures::yield_now;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{ErrorKind as I2cErrorKind, ErrorType as I2cErrorType, NoAcknowledgeSource};
use embedded_hal::spi::{ErrorKind as SpiErrorKind, ErrorType as SpiErrorType};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, Operation};
use embedded_hal_async::spi::SpiBus;

// ============================================================================
// I2C
// ============================================================================

/// What the fake I2C bus saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cEvent {
    Start(u8),
    Write(u8, Vec<u8>),
    Read(u8, usize),
    Stop(u8),
    Configured(u32),
}

pub type I2cLog = Rc<RefCell<Vec<I2cEvent>>>;

/// A device with a 256-byte register file and an auto-incrementing pointer.
///
/// The first byte written in a transaction selects the register; `pointer_mask` strips
/// auto-increment flags from it.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub registers: [u8; 256],
    pub pointer_mask: u8,
    pointer: u8,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer_mask: 0xFF,
            pointer: 0,
        }
    }

    pub fn with_pointer_mask(mut self, mask: u8) -> Self {
        self.pointer_mask = mask;
        self
    }

    pub fn with_register(mut self, register: u8, value: u8) -> Self {
        self.registers[usize::from(register)] = value;
        self
    }

    pub fn with_registers(mut self, start: u8, values: &[u8]) -> Self {
        for (offset, value) in values.iter().enumerate() {
            self.registers[usize::from(start) + offset] = *value;
        }
        self
    }

    fn write(&mut self, bytes: &[u8], pointer_set: &mut bool) {
        for byte in bytes {
            if *pointer_set {
                self.registers[usize::from(self.pointer)] = *byte;
                self.pointer = self.pointer.wrapping_add(1);
            } else {
                self.pointer = byte & self.pointer_mask;
                *pointer_set = true;
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for byte in buffer {
            *byte = self.registers[usize::from(self.pointer)];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// An I2C bus with register-file devices at fixed addresses. Unknown addresses NACK.
pub struct FakeI2c {
    pub devices: HashMap<u8, FakeDevice>,
    pub log: I2cLog,
    /// Yield to the executor once between start and the payload of every transaction.
    pub yield_mid_transaction: bool,
    /// Fail the next transaction with this error.
    pub fail_next: Option<I2cErrorKind>,
    pub frequency: u32,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            log: Rc::default(),
            yield_mid_transaction: false,
            fail_next: None,
            frequency: 0,
        }
    }

    pub fn with_device(mut self, address: u8, device: FakeDevice) -> Self {
        self.devices.insert(address, device);
        self
    }

    pub fn yielding(mut self) -> Self {
        self.yield_mid_transaction = true;
        self
    }

    pub fn log(&self) -> I2cLog {
        Rc::clone(&self.log)
    }
}

pub fn configure_100k(bus: &mut FakeI2c) {
    bus.frequency = 100_000;
    bus.log.borrow_mut().push(I2cEvent::Configured(100_000));
}

pub fn configure_400k(bus: &mut FakeI2c) {
    bus.frequency = 400_000;
    bus.log.borrow_mut().push(I2cEvent::Configured(400_000));
}

impl I2cErrorType for FakeI2c {
    type Error = I2cErrorKind;
}

impl I2c for FakeI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(I2cEvent::Start(address));
        if self.yield_mid_transaction {
            yield_now().await;
        }
        let result = self.run_operations(address, operations);
        self.log.borrow_mut().push(I2cEvent::Stop(address));
        result
    }
}

impl FakeI2c {
    fn run_operations(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), I2cErrorKind> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        let Some(device) = self.devices.get_mut(&address) else {
            return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        };
        let mut pointer_set = false;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    self.log
                        .borrow_mut()
                        .push(I2cEvent::Write(address, bytes.to_vec()));
                    device.write(bytes, &mut pointer_set);
                }
                Operation::Read(buffer) => {
                    self.log
                        .borrow_mut()
                        .push(I2cEvent::Read(address, buffer.len()));
                    device.read(buffer);
                }
            }
        }
        Ok(())
    }
}

/// Payload bytes written to `address`, one entry per write operation.
pub fn writes_to(log: &I2cLog, address: u8) -> Vec<Vec<u8>> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            I2cEvent::Write(to, bytes) if *to == address => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// SPI
// ============================================================================

/// What the fake SPI bus and chip-select pins saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiEvent {
    Select(u8),
    Deselect(u8),
    Write(Vec<u8>),
    Read(usize),
    Flush,
    Configured(u8),
}

/// State shared by the bus and its chip-select pins: a LIS3-style register file addressed
/// by a command byte (`0x80` read, `0x40` auto-increment, low six bits the register).
#[derive(Debug)]
pub struct SpiState {
    pub log: Vec<SpiEvent>,
    pub registers: [u8; 64],
    pub mode: u8,
    command: Option<u8>,
    pointer: u8,
}

pub type SharedSpiState = Rc<RefCell<SpiState>>;

pub fn spi_state() -> SharedSpiState {
    Rc::new(RefCell::new(SpiState {
        log: Vec::new(),
        registers: [0; 64],
        mode: 0,
        command: None,
        pointer: 0,
    }))
}

pub struct FakeSpi {
    pub state: SharedSpiState,
    pub fail_next: Option<SpiErrorKind>,
    /// Yield to the executor once before every read.
    pub yield_before_read: bool,
}

impl FakeSpi {
    pub fn new(state: &SharedSpiState) -> Self {
        Self {
            state: Rc::clone(state),
            fail_next: None,
            yield_before_read: false,
        }
    }
}

pub fn configure_mode0(bus: &mut FakeSpi) {
    let mut state = bus.state.borrow_mut();
    state.mode = 0;
    state.log.push(SpiEvent::Configured(0));
}

pub fn configure_mode3(bus: &mut FakeSpi) {
    let mut state = bus.state.borrow_mut();
    state.mode = 3;
    state.log.push(SpiEvent::Configured(3));
}

impl SpiErrorType for FakeSpi {
    type Error = SpiErrorKind;
}

impl SpiBus for FakeSpi {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        if self.yield_before_read {
            yield_now().await;
        }
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        let mut state = self.state.borrow_mut();
        state.log.push(SpiEvent::Read(words.len()));
        for word in words {
            let pointer = usize::from(state.pointer & 0x3F);
            *word = state.registers[pointer];
            state.pointer = state.pointer.wrapping_add(1);
        }
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        let mut state = self.state.borrow_mut();
        state.log.push(SpiEvent::Write(words.to_vec()));
        for word in words {
            if state.command.is_some() {
                let pointer = usize::from(state.pointer & 0x3F);
                state.registers[pointer] = *word;
                state.pointer = state.pointer.wrapping_add(1);
            } else {
                state.command = Some(*word);
                state.pointer = word & 0x3F;
            }
        }
        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write).await?;
        self.read(read).await
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let written = words.to_vec();
        self.write(&written).await?;
        self.read(words).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().log.push(SpiEvent::Flush);
        Ok(())
    }
}

/// Chip select that records its edges and frames the register-file command.
pub struct FakeCs {
    pub id: u8,
    pub state: SharedSpiState,
}

impl FakeCs {
    pub fn new(id: u8, state: &SharedSpiState) -> Self {
        Self {
            id,
            state: Rc::clone(state),
        }
    }
}

impl PinErrorType for FakeCs {
    type Error = core::convert::Infallible;
}

impl OutputPin for FakeCs {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.command = None;
        state.log.push(SpiEvent::Select(self.id));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().log.push(SpiEvent::Deselect(self.id));
        Ok(())
    }
}

// ============================================================================
// Delay
// ============================================================================

/// Returns immediately; remembers the total requested.
#[derive(Debug, Default)]
pub struct NoopDelay {
    pub total_ns: u64,
}

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
