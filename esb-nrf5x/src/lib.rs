//! An ESB driver for the nRF51/nRF52-series radios.
//!
//! Binds [`esb::Radio`] and [`esb::Timer`] to a chip's `RADIO` and `TIMER` peripherals. Select the
//! target chip with one of this crate's Cargo features (`51`, `52810`, `52832`, ...).

#![no_std]
#![warn(rust_2018_idioms)]

#[cfg(feature = "51")]
pub use nrf51_hal::pac;

#[cfg(feature = "52805")]
pub use nrf52805_hal::pac;

#[cfg(feature = "52810")]
pub use nrf52810_hal::pac;

#[cfg(feature = "52811")]
pub use nrf52811_hal::pac;

#[cfg(feature = "52832")]
pub use nrf52832_hal::pac;

#[cfg(feature = "52833")]
pub use nrf52833_hal::pac;

#[cfg(feature = "52840")]
pub use nrf52840_hal::pac;

pub mod radio;
pub mod timer;
