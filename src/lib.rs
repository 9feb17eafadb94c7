//! Async `no_std` drivers built on `embedded-hal` 1.0.
//!
//! - [`as560x`]: AS5600 / AS5601 magnetic rotary encoders over I2C, on top of a cached,
//!   bitfield-addressable [`register`] model.
//! - [`enc28j60`]: the ENC28J60 Ethernet controller over SPI, with banked register access,
//!   a streaming packet reader and a frame writer.
//! - [`rgb75`]: a HUB75 RGB LED matrix row-scan engine driven from a timer interrupt.
#![no_std]
extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bus;
pub mod error;
pub mod register;
pub mod device;
pub mod as560x;
pub mod enc28j60;
pub mod rgb75;

#[cfg(test)]
mod testing;

pub use error::{Error, EthError, MatrixError};
