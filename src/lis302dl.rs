//! ST LIS302DL three-axis accelerometer (±2 g / ±8 g, 100 Hz / 400 Hz).
//!
//! Works over I2C ([`Lis3TransportI2c`](crate::lis3::Lis3TransportI2c), address `0x1D` or
//! `0x1C`) or SPI ([`Lis3TransportSpi`](crate::lis3::Lis3TransportSpi)). The three control
//! registers are cached in the driver, so updating a control register costs one write.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example<B: embedded_hal_async::i2c::I2c>(bus: B) -> bus_envoy::Result<()> {
//! use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
//! use bus_envoy::lis3::Lis3TransportI2c;
//! use bus_envoy::lis302dl::{self, Lis302dl, MeasurementRate, Scale};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//!
//! let bus: SharedI2cBus<NoopRawMutex, B> = SharedI2cBus::new(I2cMaster::new(bus));
//! let device = I2cDevice::new(&bus, lis302dl::ADDRESS);
//! let mut accelerometer = Lis302dl::new(Lis3TransportI2c::new(device));
//!
//! accelerometer.who_am_i().await?;
//! accelerometer.configure(Scale::G2, MeasurementRate::Hz400).await?;
//! let data = accelerometer.read_acceleration().await?;
//! let _z_in_g = data.z_g();
//! # Ok(())
//! # }
//! ```

use core::ops::Index;

use bitflags::bitflags;

use crate::i2c::Address;
use crate::lis3::{Lis3Transport, WHO_AM_I};
use crate::{Error, Result};

/// Default I2C address (SDO high).
pub const ADDRESS: Address = Address::from_const(0x1D);
/// Alternate I2C address (SDO low).
pub const ADDRESS_ALTERNATE: Address = Address::from_const(0x1C);
/// Value of `WHO_AM_I`.
pub const IDENTITY: u8 = 0x3B;

mod register {
    pub const CTRL_REG1: u8 = 0x20;
    pub const CTRL_REG2: u8 = 0x21;
    pub const CTRL_REG3: u8 = 0x22;
    pub const HP_FILTER_RESET: u8 = 0x23;
    pub const STATUS: u8 = 0x27;
    pub const FF_WU_CFG1: u8 = 0x30;
    pub const FF_WU_SRC1: u8 = 0x31;
    pub const FF_WU_THS1: u8 = 0x32;
    pub const FF_WU_DURATION1: u8 = 0x33;
    pub const CLICK_CFG: u8 = 0x38;
    pub const CLICK_SRC: u8 = 0x39;
    pub const CLICK_THS_YX: u8 = 0x3B;
    pub const CLICK_TIME_LIMIT: u8 = 0x3D;
    pub const CLICK_LATENCY: u8 = 0x3E;
    pub const CLICK_WINDOW: u8 = 0x3F;
}

// ============================================================================
// Register flags
// ============================================================================

bitflags! {
    /// `CTRL_REG1`, default `0x07`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control1: u8 {
        /// Data rate: 0 = 100 Hz, 1 = 400 Hz.
        const DR = 1 << 7;
        /// Active mode (0 = power down).
        const PD = 1 << 6;
        /// Full scale: 0 = ±2 g, 1 = ±8 g.
        const FS = 1 << 5;
        /// Self test P.
        const STP = 1 << 4;
        /// Self test M.
        const STM = 1 << 3;
        /// Z axis enable.
        const ZEN = 1 << 2;
        /// Y axis enable.
        const YEN = 1 << 1;
        /// X axis enable.
        const XEN = 1 << 0;
    }

    /// `CTRL_REG2`, default `0x00`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control2: u8 {
        /// 3-wire SPI.
        const SIM = 1 << 7;
        /// Reboot memory content.
        const BOOT = 1 << 6;
        /// Send filtered data to the output registers.
        const FDS = 1 << 4;
        /// High-pass filter for free-fall/wake-up 2.
        const HP_FF_WU2 = 1 << 3;
        /// High-pass filter for free-fall/wake-up 1.
        const HP_FF_WU1 = 1 << 2;
        /// High-pass cut-off bit 2.
        const HP_COEFF2 = 1 << 1;
        /// High-pass cut-off bit 1.
        const HP_COEFF1 = 1 << 0;
    }

    /// `CTRL_REG3`, default `0x00`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control3: u8 {
        /// Interrupts active low.
        const IHL = 1 << 7;
        /// Open-drain interrupt pads.
        const PP_OD = 1 << 6;
        /// Int2 pad source (see [`InterruptSource`]).
        const I2CFG = 0b0011_1000;
        /// Int1 pad source (see [`InterruptSource`]).
        const I1CFG = 0b0000_0111;
    }

    /// `STATUS_REG`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// X, Y and Z overrun.
        const ZYXOR = 1 << 7;
        /// Z overrun.
        const ZOR = 1 << 6;
        /// Y overrun.
        const YOR = 1 << 5;
        /// X overrun.
        const XOR = 1 << 4;
        /// New X, Y and Z data.
        const ZYXDA = 1 << 3;
        /// New Z data.
        const ZDA = 1 << 2;
        /// New Y data.
        const YDA = 1 << 1;
        /// New X data.
        const XDA = 1 << 0;
    }

    /// `FF_WU_CFG_1` / `FF_WU_CFG_2`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FreeFallConfig: u8 {
        /// AND instead of OR combination of events.
        const AOI = 1 << 7;
        /// Latch the interrupt until the source register is read.
        const LIR = 1 << 6;
        /// Z high event.
        const ZHIE = 1 << 5;
        /// Z low event.
        const ZLIE = 1 << 4;
        /// Y high event.
        const YHIE = 1 << 3;
        /// Y low event.
        const YLIE = 1 << 2;
        /// X high event.
        const XHIE = 1 << 1;
        /// X low event.
        const XLIE = 1 << 0;
    }

    /// `FF_WU_SRC_1` / `FF_WU_SRC_2`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FreeFallSource: u8 {
        /// Interrupt active.
        const IA = 1 << 6;
        /// Z high.
        const ZH = 1 << 5;
        /// Z low.
        const ZL = 1 << 4;
        /// Y high.
        const YH = 1 << 3;
        /// Y low.
        const YL = 1 << 2;
        /// X high.
        const XH = 1 << 1;
        /// X low.
        const XL = 1 << 0;
    }

    /// `CLICK_CFG`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClickConfig: u8 {
        /// Latch the interrupt until `CLICK_SRC` is read.
        const LIR = 1 << 6;
        /// Double click on Z.
        const DOUBLE_Z = 1 << 5;
        /// Single click on Z.
        const SINGLE_Z = 1 << 4;
        /// Double click on Y.
        const DOUBLE_Y = 1 << 3;
        /// Single click on Y.
        const SINGLE_Y = 1 << 2;
        /// Double click on X.
        const DOUBLE_X = 1 << 1;
        /// Single click on X.
        const SINGLE_X = 1 << 0;
    }

    /// `CLICK_SRC`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClickSource: u8 {
        /// Interrupt active.
        const IA = 1 << 6;
        /// Double click on Z.
        const DOUBLE_Z = 1 << 5;
        /// Single click on Z.
        const SINGLE_Z = 1 << 4;
        /// Double click on Y.
        const DOUBLE_Y = 1 << 3;
        /// Single click on Y.
        const SINGLE_Y = 1 << 2;
        /// Double click on X.
        const DOUBLE_X = 1 << 1;
        /// Single click on X.
        const SINGLE_X = 1 << 0;
    }
}

#[cfg(feature = "defmt")]
macro_rules! impl_format_bits {
    ($($flags:ty),*) => {
        $(
            impl defmt::Format for $flags {
                fn format(&self, fmt: defmt::Formatter<'_>) {
                    defmt::write!(fmt, "{=u8:#010b}", self.bits());
                }
            }
        )*
    };
}

#[cfg(feature = "defmt")]
impl_format_bits!(
    Control1,
    Control2,
    Control3,
    Status,
    FreeFallConfig,
    FreeFallSource,
    ClickConfig,
    ClickSource
);

// ============================================================================
// Settings
// ============================================================================

/// Full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scale {
    /// ±2 g, 18 mg per LSB.
    #[default]
    G2,
    /// ±8 g, 72 mg per LSB.
    G8,
}

impl Scale {
    const fn control(self) -> Control1 {
        match self {
            Self::G2 => Control1::empty(),
            Self::G8 => Control1::FS,
        }
    }

    /// Acceleration per LSB in g.
    #[must_use]
    pub const fn g_per_lsb(self) -> f32 {
        match self {
            Self::G2 => 2.3 / 128.0,
            Self::G8 => 9.2 / 128.0,
        }
    }
}

/// Output data rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementRate {
    /// 100 Hz.
    #[default]
    Hz100,
    /// 400 Hz.
    Hz400,
}

impl MeasurementRate {
    const fn control(self) -> Control1 {
        match self {
            Self::Hz100 => Control1::empty(),
            Self::Hz400 => Control1::DR,
        }
    }
}

/// One of the two interrupt pads, and its free-fall/wake-up register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// Int1 and the `FF_WU_*_1` registers.
    One,
    /// Int2 and the `FF_WU_*_2` registers.
    Two,
}

impl Interrupt {
    /// Offset of this pad's free-fall/wake-up bank from bank 1.
    const fn register_offset(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 0x04,
        }
    }
}

/// Signal routed to an interrupt pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InterruptSource {
    /// Held low.
    Gnd = 0x00,
    /// Free-fall/wake-up 1.
    FreeFallWakeUp1 = 0x01,
    /// Free-fall/wake-up 2.
    FreeFallWakeUp2 = 0x02,
    /// Free-fall/wake-up 1 or 2.
    FreeFallWakeUp1Or2 = 0x03,
    /// Data ready.
    DataReady = 0x04,
    /// Click.
    Click = 0x07,
}

/// Measurement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X.
    X,
    /// Y.
    Y,
    /// Z.
    Z,
}

impl Axis {
    /// Click threshold register and the bit position of this axis' nibble in it.
    const fn click_threshold(self) -> (u8, u8) {
        match self {
            Self::X => (register::CLICK_THS_YX, 0),
            Self::Y => (register::CLICK_THS_YX, 4),
            Self::Z => (register::CLICK_THS_YX + 1, 0),
        }
    }
}

// ============================================================================
// Data
// ============================================================================

/// One acceleration sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    raw: [i8; 3],
    scale: Scale,
}

impl Data {
    /// A sample from raw register values.
    #[must_use]
    pub const fn new(x: i8, y: i8, z: i8, scale: Scale) -> Self {
        Self {
            raw: [x, y, z],
            scale,
        }
    }

    /// Raw value on `axis`.
    #[must_use]
    pub const fn raw(&self, axis: Axis) -> i8 {
        match axis {
            Axis::X => self.raw[0],
            Axis::Y => self.raw[1],
            Axis::Z => self.raw[2],
        }
    }

    /// Scale the sample was taken with.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Acceleration on `axis` in g.
    #[must_use]
    pub fn g(&self, axis: Axis) -> f32 {
        f32::from(self.raw(axis)) * self.scale.g_per_lsb()
    }

    /// X acceleration in g.
    #[must_use]
    pub fn x_g(&self) -> f32 {
        self.g(Axis::X)
    }

    /// Y acceleration in g.
    #[must_use]
    pub fn y_g(&self) -> f32 {
        self.g(Axis::Y)
    }

    /// Z acceleration in g.
    #[must_use]
    pub fn z_g(&self) -> f32 {
        self.g(Axis::Z)
    }
}

impl Index<Axis> for Data {
    type Output = i8;

    fn index(&self, axis: Axis) -> &i8 {
        match axis {
            Axis::X => &self.raw[0],
            Axis::Y => &self.raw[1],
            Axis::Z => &self.raw[2],
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// LIS302DL driver over a [`Lis3Transport`].
pub struct Lis302dl<T> {
    transport: T,
    control1: Control1,
    control2: Control2,
    control3: Control3,
    status: Status,
    data: Data,
}

impl<T> Lis302dl<T> {
    /// Wrap a transport. The control-register cache starts at the power-on defaults.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            control1: Control1::XEN.union(Control1::YEN).union(Control1::ZEN),
            control2: Control2::empty(),
            control3: Control3::empty(),
            status: Status::empty(),
            data: Data::new(0, 0, 0, Scale::G2),
        }
    }

    /// Most recent sample.
    #[must_use]
    pub const fn data(&self) -> Data {
        self.data
    }

    /// Status read along with the most recent sample.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Cached `CTRL_REG1`.
    #[must_use]
    pub const fn control1(&self) -> Control1 {
        self.control1
    }

    /// Cached `CTRL_REG2`.
    #[must_use]
    pub const fn control2(&self) -> Control2 {
        self.control2
    }

    /// Cached `CTRL_REG3`.
    #[must_use]
    pub const fn control3(&self) -> Control3 {
        self.control3
    }

    /// Give the transport back.
    pub fn release(self) -> T {
        self.transport
    }
}

impl<T: Lis3Transport> Lis302dl<T> {
    /// Check `WHO_AM_I`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedIdentity`] if the device is not a LIS302DL, or the bus error.
    pub async fn who_am_i(&mut self) -> Result<u8> {
        let identity = self.transport.read_register(WHO_AM_I).await?;
        if identity != IDENTITY {
            warn!("lis302dl: unexpected identity {:#x}", identity);
            return Err(Error::UnexpectedIdentity(identity));
        }
        Ok(identity)
    }

    /// Power up with all axes enabled at `scale` and `rate`.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn configure(&mut self, scale: Scale, rate: MeasurementRate) -> Result<()> {
        let set = Control1::PD
            | Control1::XEN
            | Control1::YEN
            | Control1::ZEN
            | scale.control()
            | rate.control();
        self.update_control1(set, Control1::all()).await?;
        self.data.scale = scale;
        info!("lis302dl: configured {} at {}", scale, rate);
        Ok(())
    }

    /// Clear `clear`, then set `set` in `CTRL_REG1`. `Control1::all()` as `clear` replaces it.
    ///
    /// # Errors
    ///
    /// Returns the bus error; the cache is left unchanged.
    pub async fn update_control1(&mut self, set: Control1, clear: Control1) -> Result<()> {
        let value = self.control1.difference(clear).union(set);
        self.transport
            .write_register(register::CTRL_REG1, value.bits())
            .await?;
        self.control1 = value;
        Ok(())
    }

    /// Clear `clear`, then set `set` in `CTRL_REG2`.
    ///
    /// # Errors
    ///
    /// Returns the bus error; the cache is left unchanged.
    pub async fn update_control2(&mut self, set: Control2, clear: Control2) -> Result<()> {
        let value = self.control2.difference(clear).union(set);
        self.transport
            .write_register(register::CTRL_REG2, value.bits())
            .await?;
        self.control2 = value;
        Ok(())
    }

    /// Clear `clear`, then set `set` in `CTRL_REG3`.
    ///
    /// # Errors
    ///
    /// Returns the bus error; the cache is left unchanged.
    pub async fn update_control3(&mut self, set: Control3, clear: Control3) -> Result<()> {
        let value = self.control3.difference(clear).union(set);
        self.transport
            .write_register(register::CTRL_REG3, value.bits())
            .await?;
        self.control3 = value;
        Ok(())
    }

    /// Route `source` to `interrupt`'s pad.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_interrupt_source(
        &mut self,
        interrupt: Interrupt,
        source: InterruptSource,
    ) -> Result<()> {
        let source = source as u8;
        match interrupt {
            Interrupt::One => {
                self.update_control3(Control3::from_bits_retain(source), Control3::I1CFG)
                    .await
            }
            Interrupt::Two => {
                self.update_control3(Control3::from_bits_retain(source << 3), Control3::I2CFG)
                    .await
            }
        }
    }

    /// Read-modify-write `interrupt`'s free-fall/wake-up configuration.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn update_free_fall_configuration(
        &mut self,
        interrupt: Interrupt,
        set: FreeFallConfig,
        clear: FreeFallConfig,
    ) -> Result<FreeFallConfig> {
        let value = self
            .update_register(
                register::FF_WU_CFG1 | interrupt.register_offset(),
                set.bits(),
                clear.bits(),
            )
            .await?;
        Ok(FreeFallConfig::from_bits_retain(value))
    }

    /// Read (and, if latched, clear) `interrupt`'s free-fall/wake-up source.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read_free_fall_source(&mut self, interrupt: Interrupt) -> Result<FreeFallSource> {
        let value = self
            .transport
            .read_register(register::FF_WU_SRC1 | interrupt.register_offset())
            .await?;
        Ok(FreeFallSource::from_bits_retain(value))
    }

    /// Free-fall/wake-up threshold (bits 0..6, 18 mg steps at ±2 g; bit 7 selects the
    /// counter reset mode).
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_free_fall_threshold(&mut self, interrupt: Interrupt, threshold: u8) -> Result<()> {
        self.transport
            .write_register(register::FF_WU_THS1 | interrupt.register_offset(), threshold)
            .await
    }

    /// Minimum free-fall/wake-up event duration, in output data periods.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_free_fall_duration(&mut self, interrupt: Interrupt, duration: u8) -> Result<()> {
        self.transport
            .write_register(
                register::FF_WU_DURATION1 | interrupt.register_offset(),
                duration,
            )
            .await
    }

    /// Read-modify-write the click configuration.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn update_click_configuration(
        &mut self,
        set: ClickConfig,
        clear: ClickConfig,
    ) -> Result<ClickConfig> {
        let value = self
            .update_register(register::CLICK_CFG, set.bits(), clear.bits())
            .await?;
        Ok(ClickConfig::from_bits_retain(value))
    }

    /// Read (and, if latched, clear) the click source.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn read_click_source(&mut self) -> Result<ClickSource> {
        let value = self.transport.read_register(register::CLICK_SRC).await?;
        Ok(ClickSource::from_bits_retain(value))
    }

    /// Click threshold on `axis`, 0..=15 in 0.5 g steps. Higher bits are ignored.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_click_threshold(&mut self, axis: Axis, threshold: u8) -> Result<()> {
        let (register, shift) = axis.click_threshold();
        let mask = 0x0F << shift;
        self.update_register(register, (threshold & 0x0F) << shift, mask)
            .await?;
        Ok(())
    }

    /// Maximum click duration.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_click_time_limit(&mut self, limit: u8) -> Result<()> {
        self.transport
            .write_register(register::CLICK_TIME_LIMIT, limit)
            .await
    }

    /// Dead time after the first click of a double click.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_click_latency(&mut self, latency: u8) -> Result<()> {
        self.transport
            .write_register(register::CLICK_LATENCY, latency)
            .await
    }

    /// Window for the second click of a double click.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_click_window(&mut self, window: u8) -> Result<()> {
        self.transport
            .write_register(register::CLICK_WINDOW, window)
            .await
    }

    /// Zero the high-pass filters; reading the register is the trigger.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn reset_high_pass_filter(&mut self) -> Result<()> {
        self.transport
            .read_register(register::HP_FILTER_RESET)
            .await?;
        Ok(())
    }

    /// Read status and all three axes in one burst.
    ///
    /// # Errors
    ///
    /// Returns the bus error; the previous sample is kept.
    pub async fn read_acceleration(&mut self) -> Result<Data> {
        let mut raw = [0_u8; 7];
        self.transport
            .read_registers(register::STATUS, &mut raw)
            .await?;
        let [status, _, x, _, y, _, z] = raw;
        self.status = Status::from_bits_retain(status);
        self.data = Data::new(
            i8::from_ne_bytes([x]),
            i8::from_ne_bytes([y]),
            i8::from_ne_bytes([z]),
            self.data.scale,
        );
        trace!("lis302dl: {}", self.data);
        Ok(self.data)
    }

    async fn update_register(&mut self, register: u8, set: u8, clear: u8) -> Result<u8> {
        let old = if clear == 0xFF {
            0
        } else {
            self.transport.read_register(register).await?
        };
        let value = (old & !clear) | set;
        self.transport.write_register(register, value).await?;
        Ok(value)
    }
}
