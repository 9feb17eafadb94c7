//! Errors that can occur when using the drivers in this crate.
//!
//! Every error type that can carry a transport failure is generic over the underlying bus (spi/i2c)
//! error type, so that bus errors reach the caller unchanged.

use crate::register::InvalidRegisterField;

/// This represents all possible errors of the register model and of the sensor drivers built on it.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<BusError> {
    /// An error has occurred in the SPI / I2C driver, including a NACK from the target.
    Bus(BusError),

    /// No register is defined at the requested address for this device.
    RegisterNotFound,

    /// The register (or the host of a bitfield) lacks the readable attribute.
    RegisterNotReadable,

    /// The register (or the host of a bitfield) lacks the writable attribute.
    RegisterNotWritable,

    /// The angle settings have already been burned the maximum number of times (see `ZMCO`).
    MaxBurnAngleReached,

    /// A bitfield held a value that has no meaning for the requested type.
    ///
    /// Could possibly indicate a bug in the driver, or less likely, a faulty chip or interference.
    UnexpectedRegisterData(InvalidRegisterField),
}

impl<BusError> From<InvalidRegisterField> for Error<BusError> {
    fn from(value: InvalidRegisterField) -> Self {
        Error::UnexpectedRegisterData(value)
    }
}

/// Errors surfaced by the ENC28J60 Ethernet controller driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EthError<BusError> {
    /// The MAC address given at init was not exactly 6 bytes long.
    BadMac,

    /// `EREVID` read back as zero after init. The chip is most likely not connected.
    NoDevice,

    /// No packet arrived before the deadline passed to `next_packet`.
    RxDeadlineExceeded,

    /// The receive status vector reports a bad CRC for the current frame.
    ///
    /// The frame bytes are still readable; it is up to the caller to discard them.
    CrcError,

    /// The receive header read from the chip is impossible: a next-packet pointer outside the RX
    /// ring or odd, or a byte count above the maximum frame length. The RX ring has been reset
    /// and every pending frame dropped.
    InvalidHeader,

    /// The frame being assembled would exceed the maximum frame length.
    BufferSize,

    /// An error has occurred in the SPI driver.
    Io(BusError),
}

impl<BusError: core::fmt::Debug> embedded_io_async::Error for EthError<BusError> {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        use embedded_io_async::ErrorKind;

        match self {
            EthError::BadMac => ErrorKind::InvalidInput,
            EthError::NoDevice => ErrorKind::NotConnected,
            EthError::RxDeadlineExceeded => ErrorKind::TimedOut,
            EthError::CrcError | EthError::InvalidHeader => ErrorKind::InvalidData,
            EthError::BufferSize => ErrorKind::OutOfMemory,
            EthError::Io(_) => ErrorKind::Other,
        }
    }
}

/// Errors surfaced by the HUB75 matrix driver. These can only occur while configuring.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatrixError {
    /// The six RGB data pins do not share a GPIO port.
    InvalidDataPins,

    /// The requested height cannot be addressed with the supplied row-select pins.
    InvalidHeight,

    /// More bits per channel than a pixel stores (8).
    InvalidColorDepth,
}
