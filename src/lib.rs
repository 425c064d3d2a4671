//! Cooperative, cancel-safe I2C and SPI bus transactions for async embedded Rust, plus the
//! sensor and display drivers built on them.
//!
//! Several devices share one hardware bus. Each device issues whole transactions
//! (start, address, write/read, stop) from an `async fn`, and the bus is locked for exactly
//! one transaction at a time. A driver method can be suspended at any `.await`, resumed later
//! without losing its place, or stopped outright; a stopped transaction detaches with an error
//! and releases the bus.
//!
//! # Glossary
//!
//! - **Transaction:** One complete bus exchange with one device, described by an
//!   [`i2c::I2cTransaction`] and its [`i2c::Sequence`].
//! - **Master:** The owner of a bus peripheral ([`i2c::I2cMaster`], [`spi::SpiMaster`]). It
//!   runs one transaction at a time and reapplies a device's bus configuration when it changes.
//! - **Shared bus:** A master behind an `embassy_sync` async mutex. Device handles
//!   ([`i2c::I2cDevice`], [`spi::SharedSpiDevice`]) lock it per transaction.
//! - **Resumable:** A driver future stepped one poll at a time from a superloop with
//!   [`resumable::Resumable`], no executor required.
//!
//! # Drivers
//!
//! - [`lis302dl::Lis302dl`] over [`lis3::Lis3TransportI2c`] or [`lis3::Lis3TransportSpi`]
//! - [`ssd1306::Ssd1306`] 128x64 OLED with an `embedded-graphics` [`ssd1306::Frame`]
//! - [`bme280::Bme280`] with integer and `f64` compensation
#![cfg_attr(not(feature = "host"), no_std)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Must come first so the logging macros are visible in every other module.
mod fmt;

pub mod bme280;
mod error;
pub mod i2c;
pub mod lis3;
pub mod lis302dl;
pub mod resumable;
pub mod spi;
pub mod ssd1306;
#[cfg(feature = "host")]
pub mod to_png;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
