//! SSD1306 128x64 monochrome OLED over I2C, with an `embedded-graphics` frame buffer.
//!
//! Draw into the driver's [`Frame`] with `embedded-graphics`, then push it to the panel with
//! [`Ssd1306::write_display`]. Commands and frame writes are ordinary transactions on a
//! [`SharedI2cBus`](crate::i2c::SharedI2cBus), so the display can share its bus with sensors.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example<B: embedded_hal_async::i2c::I2c>(bus: B) -> bus_envoy::Result<()> {
//! use bus_envoy::i2c::{I2cDevice, I2cMaster, SharedI2cBus};
//! use bus_envoy::ssd1306::{self, Ssd1306};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use embedded_graphics::pixelcolor::BinaryColor;
//! use embedded_graphics::prelude::{Point, Primitive, Size};
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use embedded_graphics::Drawable;
//!
//! let bus: SharedI2cBus<NoopRawMutex, B> = SharedI2cBus::new(I2cMaster::new(bus));
//! let mut display = Ssd1306::new(I2cDevice::new(&bus, ssd1306::ADDRESS));
//! display.initialize().await?;
//!
//! Rectangle::new(Point::new(0, 0), Size::new(128, 64))
//!     .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
//!     .draw(display.frame_mut())
//!     .ok();
//! display.write_display().await?;
//! # Ok(())
//! # }
//! ```

use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Size};
use embedded_hal_async::i2c::I2c;
use heapless::Vec;

use crate::i2c::{Address, I2cDevice};
use crate::{Error, Result};

/// Default I2C address (SA0 low).
pub const ADDRESS: Address = Address::from_const(0x3C);
/// Alternate I2C address (SA0 high).
pub const ADDRESS_ALTERNATE: Address = Address::from_const(0x3D);

/// Panel width in pixels.
pub const WIDTH: usize = 128;
/// Panel height in pixels.
pub const HEIGHT: usize = 64;
/// Frame buffer size: one bit per pixel, eight rows per page.
pub const BUFFER_SIZE: usize = WIDTH * HEIGHT / 8;
/// Most argument bytes any command takes.
pub const MAX_COMMAND_ARGUMENTS: usize = 6;

/// Control byte: one command or argument byte follows.
const CONTROL_COMMAND: u8 = 0x80;
/// Control byte: display RAM data follows until stop.
const CONTROL_DATA: u8 = 0x40;

// ============================================================================
// Commands
// ============================================================================

/// SSD1306 command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Contrast (1 argument).
    SetContrastControl = 0x81,
    /// Show RAM content.
    SetEntireDisplayResumeToRam = 0xA4,
    /// Light every pixel regardless of RAM.
    SetEntireDisplayOn = 0xA5,
    /// Lit pixel = 1.
    SetNormalDisplay = 0xA6,
    /// Lit pixel = 0.
    SetInvertDisplay = 0xA7,
    /// Sleep.
    SetDisplayOff = 0xAE,
    /// Wake.
    SetDisplayOn = 0xAF,
    /// Addressing mode (1 argument).
    SetMemoryMode = 0x20,
    /// Column window (2 arguments).
    SetColumnAddress = 0x21,
    /// Page window (2 arguments).
    SetPageAddress = 0x22,
    /// RAM start line, OR'ed with 0..=63.
    SetDisplayStartLine = 0x40,
    /// Column 0 is SEG0.
    SetSegmentRemap0 = 0xA0,
    /// Column 127 is SEG0.
    SetSegmentRemap127 = 0xA1,
    /// Multiplex ratio (1 argument).
    SetMultiplexRatio = 0xA8,
    /// Scan COM0 to COM\[N-1\].
    SetComOutputScanDirectionIncrement = 0xC0,
    /// Scan COM\[N-1\] to COM0.
    SetComOutputScanDirectionDecrement = 0xC8,
    /// Vertical shift (1 argument).
    SetDisplayOffset = 0xD3,
    /// COM pin hardware configuration (1 argument).
    SetComPins = 0xDA,
    /// Clock divide ratio and oscillator frequency (1 argument).
    SetDisplayClockDivideRatio = 0xD5,
    /// Pre-charge period (1 argument).
    SetPreChargePeriod = 0xD9,
    /// VCOMH deselect level (1 argument).
    SetVDeselectLevel = 0xDB,
    /// Charge pump (1 argument).
    SetChargePump = 0x8D,
    /// Continuous right scroll setup (6 arguments).
    SetRightHorizontalScroll = 0x26,
    /// Continuous left scroll setup (6 arguments).
    SetLeftHorizontalScroll = 0x27,
    /// Stop scrolling.
    DeactivateScroll = 0x2E,
    /// Start the configured scroll.
    ActivateScroll = 0x2F,
}

/// Panel orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rotation {
    /// Segment remap 127, COM scan decrement.
    #[default]
    Normal,
    /// Segment remap 0, COM scan increment.
    Rotated180,
}

/// Horizontal scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScrollDirection {
    /// Content moves right.
    Right,
    /// Content moves left.
    Left,
}

/// Frames between scroll steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScrollInterval {
    /// 2 frames.
    Frames2 = 0b111,
    /// 3 frames.
    Frames3 = 0b100,
    /// 4 frames.
    Frames4 = 0b101,
    /// 5 frames.
    Frames5 = 0b000,
    /// 25 frames.
    Frames25 = 0b110,
    /// 64 frames.
    Frames64 = 0b001,
    /// 128 frames.
    Frames128 = 0b010,
    /// 256 frames.
    Frames256 = 0b011,
}

// ============================================================================
// Frame
// ============================================================================

/// A 128x64 one-bit frame buffer in the panel's page layout.
///
/// Byte `page * 128 + x` holds rows `page * 8 ..= page * 8 + 7` of column `x`, row `y` in
/// bit `y % 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame([u8; BUFFER_SIZE]);

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// All pixels off.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; BUFFER_SIZE])
    }

    /// Turn one pixel on or off. Coordinates outside the panel are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        let Some((index, mask)) = locate(x, y) else {
            return;
        };
        if let Some(byte) = self.0.get_mut(index) {
            if on {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    /// Whether a pixel is on. Coordinates outside the panel read as off.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        locate(x, y)
            .and_then(|(index, mask)| self.0.get(index).map(|byte| byte & mask != 0))
            .unwrap_or(false)
    }

    /// The buffer as sent to the panel.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BUFFER_SIZE] {
        &self.0
    }
}

fn locate(x: usize, y: usize) -> Option<(usize, u8)> {
    if x >= WIDTH || y >= HEIGHT {
        return None;
    }
    Some(((y / 8) * WIDTH + x, 1 << (y % 8)))
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) {
                self.set_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Driver
// ============================================================================

/// SSD1306 driver owning its [`Frame`].
pub struct Ssd1306<'a, M: RawMutex, B> {
    device: I2cDevice<'a, M, B>,
    frame: Frame,
}

impl<'a, M: RawMutex, B> Ssd1306<'a, M, B> {
    /// Wrap a device handle; the frame starts blank.
    #[must_use]
    pub const fn new(device: I2cDevice<'a, M, B>) -> Self {
        Self {
            device,
            frame: Frame::new(),
        }
    }

    /// The frame that [`write_display`](Self::write_display) sends.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Draw target for `embedded-graphics`.
    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl<M: RawMutex, B: I2c> Ssd1306<'_, M, B> {
    /// `true` if the panel acknowledges its address.
    ///
    /// # Errors
    ///
    /// Returns bus errors other than an address NACK.
    pub async fn ping(&mut self) -> Result<bool> {
        self.device.ping().await
    }

    /// Send the power-up command sequence and switch the panel on.
    ///
    /// Stops at the first failing command.
    ///
    /// # Errors
    ///
    /// Returns the bus error of the failing command.
    pub async fn initialize(&mut self) -> Result<()> {
        self.write_command(Command::SetDisplayOff, &[]).await?;
        self.write_command(Command::SetDisplayClockDivideRatio, &[0x80])
            .await?;
        self.write_command(Command::SetMultiplexRatio, &[0x3F]).await?;
        self.write_command(Command::SetDisplayOffset, &[0x00]).await?;
        self.write_raw_command(Command::SetDisplayStartLine as u8, &[])
            .await?;
        self.write_command(Command::SetChargePump, &[0x14]).await?;
        self.write_command(Command::SetMemoryMode, &[0x00]).await?;
        self.set_rotation(Rotation::Normal).await?;
        self.write_command(Command::SetComPins, &[0x12]).await?;
        self.write_command(Command::SetContrastControl, &[0xCE]).await?;
        self.write_command(Command::SetPreChargePeriod, &[0xF1]).await?;
        self.write_command(Command::SetVDeselectLevel, &[0x40]).await?;
        self.write_command(Command::SetEntireDisplayResumeToRam, &[])
            .await?;
        self.write_command(Command::SetNormalDisplay, &[]).await?;
        self.write_command(Command::SetColumnAddress, &[0, 127]).await?;
        self.write_command(Command::SetPageAddress, &[0, 7]).await?;
        self.write_command(Command::SetDisplayOn, &[]).await?;
        info!("ssd1306: initialized at {:#x}", self.device.address().get());
        Ok(())
    }

    /// Send `command` with up to [`MAX_COMMAND_ARGUMENTS`] argument bytes in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] for too many arguments, or the bus error.
    pub async fn write_command(&mut self, command: Command, arguments: &[u8]) -> Result<()> {
        self.write_raw_command(command as u8, arguments).await
    }

    /// Like [`write_command`](Self::write_command) for opcodes with embedded operands, such as
    /// `SetDisplayStartLine | line`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] for too many arguments, or the bus error.
    pub async fn write_raw_command(&mut self, opcode: u8, arguments: &[u8]) -> Result<()> {
        const CAPACITY: usize = 2 * (1 + MAX_COMMAND_ARGUMENTS);
        let mut buffer: Vec<u8, CAPACITY> = Vec::new();
        for byte in core::iter::once(opcode).chain(arguments.iter().copied()) {
            buffer
                .extend_from_slice(&[CONTROL_COMMAND, byte])
                .map_err(|()| Error::BufferTooSmall {
                    needed: 2 * (1 + arguments.len()),
                    capacity: CAPACITY,
                })?;
        }
        trace!("ssd1306: command {:#x}", opcode);
        self.device.write(&buffer).await
    }

    /// Wake or sleep the panel. RAM is kept while off.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_display_on(&mut self, on: bool) -> Result<()> {
        let command = if on {
            Command::SetDisplayOn
        } else {
            Command::SetDisplayOff
        };
        self.write_command(command, &[]).await
    }

    /// Contrast, 0..=255.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_contrast(&mut self, contrast: u8) -> Result<()> {
        self.write_command(Command::SetContrastControl, &[contrast])
            .await
    }

    /// Invert lit and dark pixels.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_inverted(&mut self, inverted: bool) -> Result<()> {
        let command = if inverted {
            Command::SetInvertDisplay
        } else {
            Command::SetNormalDisplay
        };
        self.write_command(command, &[]).await
    }

    /// Orient the panel.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn set_rotation(&mut self, rotation: Rotation) -> Result<()> {
        let (segment, scan) = match rotation {
            Rotation::Normal => (
                Command::SetSegmentRemap127,
                Command::SetComOutputScanDirectionDecrement,
            ),
            Rotation::Rotated180 => (
                Command::SetSegmentRemap0,
                Command::SetComOutputScanDirectionIncrement,
            ),
        };
        self.write_command(segment, &[]).await?;
        self.write_command(scan, &[]).await
    }

    /// Scroll pages `start_page..=end_page` continuously. Pages are clamped to 0..=7.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn start_horizontal_scroll(
        &mut self,
        direction: ScrollDirection,
        start_page: u8,
        end_page: u8,
        interval: ScrollInterval,
    ) -> Result<()> {
        let command = match direction {
            ScrollDirection::Right => Command::SetRightHorizontalScroll,
            ScrollDirection::Left => Command::SetLeftHorizontalScroll,
        };
        self.write_command(Command::DeactivateScroll, &[]).await?;
        self.write_command(
            command,
            &[
                0x00,
                start_page.min(7),
                interval as u8,
                end_page.min(7),
                0x00,
                0xFF,
            ],
        )
        .await?;
        self.write_command(Command::ActivateScroll, &[]).await
    }

    /// Stop scrolling. Rewrite the frame afterwards; scrolled RAM is not restored.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn stop_scroll(&mut self) -> Result<()> {
        self.write_command(Command::DeactivateScroll, &[]).await
    }

    /// Send the whole frame in one transaction.
    ///
    /// # Errors
    ///
    /// Returns the bus error.
    pub async fn write_display(&mut self) -> Result<()> {
        self.device
            .write_prefixed(&[CONTROL_DATA], self.frame.as_bytes())
            .await
    }
}
