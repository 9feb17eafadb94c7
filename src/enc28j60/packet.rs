//! Streaming access to one received frame.

use super::register::{MAX_FRAMELEN, RXSTART, RXSTOP, rsv};
use super::{Enc28j60, EthResult};
use crate::error::EthError;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

const RX_RING_LEN: u16 = RXSTOP - RXSTART + 1;

/// Folds a position past the end of the RX ring back to its start.
pub(crate) fn wrap(address: u16) -> u16 {
    if address > RXSTOP { address - RX_RING_LEN } else { address }
}

/// Whether a receive header read at the next-packet pointer can be real. The chip keeps the
/// next-packet pointer even and inside the ring, and never stores a frame longer than MAMXFL.
pub(crate) fn header_is_valid(next: u16, count: u16) -> bool {
    (RXSTART..=RXSTOP).contains(&next) && next % 2 == 0 && count <= MAX_FRAMELEN + 4
}

/// ERXRDPT value that frees everything before `address`.
///
/// The chip wants an odd ERXRDPT (errata #14), so the pointer goes one byte back, wrapping to
/// the end of the ring.
pub(crate) fn free_pointer(address: u16) -> u16 {
    address
        .checked_sub(1)
        .filter(|p| (RXSTART..=RXSTOP).contains(p))
        .unwrap_or(RXSTOP)
}

/// A single received frame, still in the controller's buffer.
///
/// Reading advances through the frame; the memory behind the cursor is handed back to the chip as
/// it goes. Once the last byte has been read, or on [`PacketReader::discard`], the frame is
/// released and the chip's packet counter decremented, exactly once.
pub struct PacketReader<'a, S, D> {
    dev: &'a mut Enc28j60<S, D>,
    /// Position of the next unread byte, not wrapped.
    cursor: u16,
    end: u16,
    len: u16,
    status: u16,
    released: bool,
}

impl<'a, S, D> PacketReader<'a, S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    pub(crate) fn new(dev: &'a mut Enc28j60<S, D>, start: u16, len: u16, status: u16) -> Self {
        PacketReader {
            dev,
            cursor: start,
            end: start.saturating_add(len),
            len,
            status,
            released: false,
        }
    }

    /// Frame length without the CRC.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not read yet.
    pub fn remaining(&self) -> usize {
        (self.end - self.cursor) as usize
    }

    /// Raw receive status word.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn crc_ok(&self) -> bool {
        self.status & rsv::RECEIVED_OK != 0
    }

    /// Fails with [`EthError::CrcError`] if the frame was received damaged. The bytes stay
    /// readable either way.
    pub fn check(&self) -> EthResult<(), S::Error> {
        if self.crc_ok() { Ok(()) } else { Err(EthError::CrcError) }
    }

    /// Reads the next bytes of the frame into `buf`. `Ok(0)` means the frame is exhausted.
    pub async fn read(&mut self, buf: &mut [u8]) -> EthResult<usize, S::Error> {
        if self.cursor == self.end {
            self.release().await?;
            return Ok(0);
        }

        let n = buf.len().min(self.remaining());
        if n == 0 {
            return Ok(0);
        }
        self.dev.read_buffer(&mut buf[..n]).await?;
        self.cursor += n as u16;

        if self.cursor == self.end {
            self.release().await?;
        } else {
            self.dev.free_up_to(wrap(self.cursor)).await?;
        }

        Ok(n)
    }

    /// Skips whatever is left of the frame and releases it. Calling it again does nothing.
    pub async fn discard(&mut self) -> EthResult<(), S::Error> {
        self.cursor = self.end;
        self.release().await
    }

    async fn release(&mut self) -> EthResult<(), S::Error> {
        if self.released {
            return Ok(());
        }

        self.dev.release_packet().await?;
        self.released = true;

        Ok(())
    }
}

impl<S, D> embedded_io_async::ErrorType for PacketReader<'_, S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    type Error = EthError<S::Error>;
}

impl<S, D> embedded_io_async::Read for PacketReader<'_, S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        PacketReader::read(self, buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_pointer_stays_inside_the_ring() {
        assert_eq!(73, free_pointer(74));
        assert_eq!(RXSTOP, free_pointer(RXSTART));
        assert_eq!(RXSTOP - 1, free_pointer(RXSTOP));
    }

    #[test]
    fn impossible_headers_are_spotted() {
        assert!(header_is_valid(RXSTART, 64));
        assert!(header_is_valid(RXSTOP, MAX_FRAMELEN + 4));
        assert!(!header_is_valid(RXSTOP + 2, 64));
        assert!(!header_is_valid(0xFFFF, 0xFFFF));
        assert!(!header_is_valid(0x0101, 64));
        assert!(!header_is_valid(0x0100, MAX_FRAMELEN + 5));
    }

    #[test]
    fn wrap_folds_past_the_ring_end() {
        assert_eq!(RXSTOP, wrap(RXSTOP));
        assert_eq!(RXSTART, wrap(RXSTOP + 1));
        assert_eq!(10, wrap(RXSTOP + 11));
    }
}
