//! Bosch BME280 humidity, pressure and temperature sensor (and the BMP280, without humidity).
//!
//! [`Bme280::initialize`] checks the chip ID, resets the chip, reads the factory calibration
//! and writes the configuration. Measurements come back as [`Data`], which compensates on
//! demand with the integer formulas; [`DataDouble`] gives the `f64` results.
//!
//! ```rust,no_run
//! # async fn example<B: embedded_hal_async::i2c::I2c>(
//! #     bus: &bus_envoy::i2c::SharedI2cBus<embassy_sync::blocking_mutex::raw::NoopRawMutex, B>,
//! #     delay: &mut impl embedded_hal_async::delay::DelayNs,
//! # ) -> bus_envoy::Result<()> {
//! use bus_envoy::bme280::{self, Bme280, Config, Mode};
//! use bus_envoy::i2c::I2cDevice;
//!
//! let device = I2cDevice::new(bus, bme280::ADDRESS);
//! let mut sensor = Bme280::new(device);
//! sensor.initialize(Config { mode: Mode::Sleep, ..Config::default() }, delay).await?;
//! let data = sensor.measure_forced(delay).await?;
//! let _centi_celsius = data.temperature();
//! let _pascal = data.pressure();
//! # Ok(())
//! # }
//! ```

mod compensation;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

pub use self::compensation::{Calibration, Data, DataDouble, Raw, split_adc_20};
use crate::i2c::{Address, I2cDevice};
use crate::{Error, Result};

/// I2C address with `SDO` low.
pub const ADDRESS: Address = Address::from_const(0x76);
/// I2C address with `SDO` high.
pub const ADDRESS_ALTERNATE: Address = Address::from_const(0x77);

mod register {
    pub const CALIBRATION_TP: u8 = 0x88;
    pub const CHIP_ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const CALIBRATION_H: u8 = 0xE1;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const DATA: u8 = 0xF7;
}

const RESET_COMMAND: u8 = 0xB6;
const STATUS_MEASURING: u8 = 1 << 3;
const STATUS_IM_UPDATE: u8 = 1 << 0;
/// Status polls before giving up with [`Error::Timeout`].
const POLL_ATTEMPTS: u32 = 10;
const POLL_INTERVAL_MS: u32 = 1;
const STARTUP_MS: u32 = 2;

/// Which part answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    /// Humidity, pressure and temperature. Chip ID `0x60`.
    #[default]
    Bme280,
    /// Pressure and temperature only. Chip ID `0x58`.
    Bmp280,
}

impl Chip {
    /// Identify a chip ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedIdentity`] for anything else.
    pub const fn from_id(id: u8) -> Result<Self> {
        match id {
            0x60 => Ok(Self::Bme280),
            0x58 => Ok(Self::Bmp280),
            other => Err(Error::UnexpectedIdentity(other)),
        }
    }

    /// The chip ID register value.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Bme280 => 0x60,
            Self::Bmp280 => 0x58,
        }
    }

    /// `true` for the BME280.
    #[must_use]
    pub const fn has_humidity(self) -> bool {
        matches!(self, Self::Bme280)
    }
}

/// Oversampling of one measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names are the sample count")]
pub enum Oversampling {
    /// Channel not measured; its output reads `0x80000`.
    Skipped = 0,
    #[default]
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    /// Number of samples taken.
    #[must_use]
    pub const fn samples(self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

/// Power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// No measurements; registers are accessible.
    Sleep = 0b00,
    /// One measurement, then back to sleep.
    Forced = 0b01,
    /// Measure continuously with [`Standby`] between cycles.
    #[default]
    Normal = 0b11,
}

/// IIR filter coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names are the coefficient")]
pub enum Filter {
    #[default]
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

/// Inactive time between measurements in [`Mode::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names are the duration")]
pub enum Standby {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    #[default]
    Ms1000 = 5,
    Ms10 = 6,
    Ms20 = 7,
}

/// Measurement configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Temperature oversampling. Skipping it leaves pressure and humidity uncompensated.
    pub temperature: Oversampling,
    /// Pressure oversampling.
    pub pressure: Oversampling,
    /// Humidity oversampling. Ignored on a BMP280.
    pub humidity: Oversampling,
    /// Power mode written with the configuration.
    pub mode: Mode,
    /// IIR filter.
    pub filter: Filter,
    /// Standby between cycles in [`Mode::Normal`].
    pub standby: Standby,
}

impl Config {
    /// `ctrl_meas` register value.
    #[must_use]
    pub const fn ctrl_meas(&self) -> u8 {
        self.ctrl_meas_with_mode(self.mode)
    }

    const fn ctrl_meas_with_mode(&self, mode: Mode) -> u8 {
        ((self.temperature as u8) << 5) | ((self.pressure as u8) << 2) | mode as u8
    }

    /// `ctrl_hum` register value.
    #[must_use]
    pub const fn ctrl_hum(&self) -> u8 {
        self.humidity as u8
    }

    /// `config` register value.
    #[must_use]
    pub const fn config(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }

    /// Worst-case duration of one measurement cycle, in microseconds.
    #[must_use]
    pub const fn max_measurement_time_us(&self, chip: Chip) -> u32 {
        const BASE: u32 = 1250;
        const PER_SAMPLE: u32 = 2300;
        const CHANNEL_SETUP: u32 = 575;

        let mut time = BASE + PER_SAMPLE * self.temperature.samples();
        if !matches!(self.pressure, Oversampling::Skipped) {
            time += PER_SAMPLE * self.pressure.samples() + CHANNEL_SETUP;
        }
        if chip.has_humidity() && !matches!(self.humidity, Oversampling::Skipped) {
            time += PER_SAMPLE * self.humidity.samples() + CHANNEL_SETUP;
        }
        time
    }
}

/// BME280/BMP280 driver over a shared I2C bus.
pub struct Bme280<'a, M: RawMutex, B> {
    device: I2cDevice<'a, M, B>,
    chip: Chip,
    calibration: Calibration,
    config: Config,
    data: Data,
}

impl<'a, M: RawMutex, B> Bme280<'a, M, B> {
    /// Wrap a device handle. Call [`Self::initialize`] before measuring.
    #[must_use]
    pub fn new(device: I2cDevice<'a, M, B>) -> Self {
        Self {
            device,
            chip: Chip::default(),
            calibration: Calibration::default(),
            config: Config::default(),
            data: Data::default(),
        }
    }

    /// The chip found by [`Self::initialize`].
    #[must_use]
    pub const fn chip(&self) -> Chip {
        self.chip
    }

    /// The calibration read by [`Self::initialize`].
    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// The configuration last written.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The last measurement read.
    #[must_use]
    pub const fn data(&self) -> &Data {
        &self.data
    }

    /// Worst-case duration of one measurement with the current configuration.
    #[must_use]
    pub const fn max_measurement_time_us(&self) -> u32 {
        self.config.max_measurement_time_us(self.chip)
    }
}

impl<M: RawMutex, B: I2c> Bme280<'_, M, B> {
    /// Identify, reset and calibrate the sensor, then write `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedIdentity`] for an unknown chip ID, [`Error::Timeout`] if the
    /// calibration copy after reset does not finish, and bus errors.
    pub async fn initialize(&mut self, config: Config, delay: &mut impl DelayNs) -> Result<Chip> {
        let id = self.device.read_register(register::CHIP_ID).await?;
        self.chip = Chip::from_id(id)?;
        debug!("bme280: found chip {:#x}", id);

        self.device
            .write_register(register::RESET, RESET_COMMAND)
            .await?;
        delay.delay_ms(STARTUP_MS).await;
        self.wait_status_clear(STATUS_IM_UPDATE, delay).await?;

        self.read_calibration().await?;
        self.configure(config).await?;
        info!("bme280: initialized {}", self.chip);
        Ok(self.chip)
    }

    async fn read_calibration(&mut self) -> Result<()> {
        let mut block = [0; 26];
        self.device
            .read_registers(register::CALIBRATION_TP, &mut block)
            .await?;
        let mut calibration = Calibration::from_temperature_pressure_block(&block);
        if self.chip.has_humidity() {
            let mut block = [0; 7];
            self.device
                .read_registers(register::CALIBRATION_H, &mut block)
                .await?;
            calibration = calibration.with_humidity_block(&block);
        }
        self.calibration = calibration;
        trace!("bme280: calibration read");
        Ok(())
    }

    /// Write `config`. `ctrl_hum` only takes effect after the `ctrl_meas` write that follows.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn configure(&mut self, config: Config) -> Result<()> {
        if self.chip.has_humidity() {
            self.device
                .write_register(register::CTRL_HUM, config.ctrl_hum())
                .await?;
        }
        self.device
            .write_register(register::CONFIG, config.config())
            .await?;
        self.device
            .write_register(register::CTRL_MEAS, config.ctrl_meas())
            .await?;
        self.config = config;
        Ok(())
    }

    /// Read the latest measurement registers.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read_data(&mut self) -> Result<Data> {
        let mut raw: Raw = [0; 8];
        let len = if self.chip.has_humidity() { 8 } else { 6 };
        let buffer = raw.get_mut(..len).ok_or(Error::BufferTooSmall {
            needed: len,
            capacity: 8,
        })?;
        self.device.read_registers(register::DATA, buffer).await?;
        self.data = Data::new(raw, self.calibration, self.chip);
        Ok(self.data)
    }

    /// Trigger one measurement in [`Mode::Forced`], wait for it and read it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the sensor stays busy, and bus errors.
    pub async fn measure_forced(&mut self, delay: &mut impl DelayNs) -> Result<Data> {
        self.device
            .write_register(
                register::CTRL_MEAS,
                self.config.ctrl_meas_with_mode(Mode::Forced),
            )
            .await?;
        delay.delay_us(self.max_measurement_time_us()).await;
        self.wait_status_clear(STATUS_MEASURING, delay).await?;
        self.read_data().await
    }

    /// `true` while a conversion is running.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn is_measuring(&mut self) -> Result<bool> {
        let status = self.device.read_register(register::STATUS).await?;
        Ok(status & STATUS_MEASURING != 0)
    }

    async fn wait_status_clear(&mut self, mask: u8, delay: &mut impl DelayNs) -> Result<()> {
        for _ in 0..POLL_ATTEMPTS {
            let status = self.device.read_register(register::STATUS).await?;
            if status & mask == 0 {
                return Ok(());
            }
            delay.delay_ms(POLL_INTERVAL_MS).await;
        }
        warn!("bme280: status {:#x} did not clear", mask);
        Err(Error::Timeout)
    }
}
