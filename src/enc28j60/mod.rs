//! Driver for the Microchip ENC28J60 stand-alone Ethernet controller.
//!
//! The chip is reached over SPI, one command per chip-select cycle. Its control registers are
//! split over four banks; the driver remembers the selected bank and only switches when an access
//! needs another one.
//!
//! Receiving goes through [`Enc28j60::next_packet`], which hands out a [`PacketReader`] streaming
//! the frame straight out of the chip's buffer. Sending is [`Enc28j60::write`] any number of
//! times to assemble a frame, then [`Enc28j60::flush`] to put it on the wire. Both sides also
//! implement the `embedded-io-async` traits.

pub mod frame;
pub mod packet;
pub mod register;

pub use frame::{EtherType, FrameHeader, MacAddress};
pub use packet::PacketReader;
pub use register::InterruptFlags;

use crate::error::EthError;
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{Operation, SpiDevice};
use register::*;

/// Type alias used to simplify return types throughout the driver
pub type EthResult<T, BusError> = Result<T, EthError<BusError>>;

/// No bank has been selected since reset.
const NO_BANK: u8 = 0xFF;

/// Wait between polls of the MII busy flag.
const MII_POLL_US: u32 = 15;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Pause between two polls of the packet counter in [`Enc28j60::next_packet`].
    pub rx_poll_interval: Duration,
    /// Blind wait after the soft reset. CLKRDY cannot be trusted on rev. B silicon.
    pub reset_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rx_poll_interval: Duration::from_millis(100),
            reset_delay: Duration::from_millis(50),
        }
    }
}

impl Config {
    /// Replaces zero durations with their defaults.
    fn normalized(self) -> Self {
        let defaults = Config::default();
        let or_default = |value: Duration, default: Duration| {
            if value.as_ticks() == 0 { default } else { value }
        };

        Config {
            rx_poll_interval: or_default(self.rx_poll_interval, defaults.rx_poll_interval),
            reset_delay: or_default(self.reset_delay, defaults.reset_delay),
        }
    }

    /// Pause between packet counter polls. Zero selects the default.
    pub fn rx_poll_interval(mut self, interval: Duration) -> Self {
        self.rx_poll_interval = interval;

        self
    }

    /// Zero selects the default.
    pub fn reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;

        self
    }
}

pub struct Enc28j60<S, D> {
    spi: S,
    delay: D,
    config: Config,
    bank: u8,
    next_packet: u16,
    tx_cursor: u16,
}

impl<S, D> Enc28j60<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    /// Wraps the SPI device. Nothing is sent until [`Enc28j60::init`].
    pub fn new(spi: S, delay: D, config: Config) -> Self {
        Enc28j60 {
            spi,
            delay,
            config: config.normalized(),
            bank: NO_BANK,
            next_packet: RXSTART,
            tx_cursor: 0,
        }
    }

    /// Resets the chip and sets it up for receiving, with `mac` as the station address.
    ///
    /// Fails with [`EthError::BadMac`] before touching the bus if `mac` is not 6 bytes long, and
    /// with [`EthError::NoDevice`] if the revision register reads back zero afterwards.
    pub async fn init(&mut self, mac: &[u8]) -> EthResult<(), S::Error> {
        let mac: [u8; 6] = mac.try_into().map_err(|_| EthError::BadMac)?;

        self.spi
            .transaction(&mut [Operation::Write(&[opcode::SOFT_RESET])])
            .await
            .map_err(EthError::Io)?;
        self.bank = NO_BANK;
        self.tx_cursor = 0;
        self.delay.delay_us(self.config.reset_delay.as_micros() as u32).await;

        self.program_rx_ring().await?;
        self.write_pair(ETXSTL, TXSTART).await?;
        self.write_pair(ETXNDL, TXSTOP).await?;

        // Unicast to us, plus broadcast ARP through the pattern match filter: bytes 0-5 and
        // 12-13 (mask 0x303f) must checksum to 0xf7f9, i.e. ff:ff:ff:ff:ff:ff and type 0x0806.
        self.write_control(ERXFCON, erxfcon::UCEN | erxfcon::CRCEN | erxfcon::PMEN).await?;
        self.write_control(EPMM0, 0x3f).await?;
        self.write_control(EPMM1, 0x30).await?;
        self.write_control(EPMCSL, 0xf9).await?;
        self.write_control(EPMCSH, 0xf7).await?;

        self.write_control(MACON1, macon1::MARXEN | macon1::TXPAUS | macon1::RXPAUS).await?;
        self.write_control(MACON2, 0x00).await?;
        // MAC registers do not support the bit-field commands.
        self.write_control(MACON3, macon3::PADCFG0 | macon3::TXCRCEN | macon3::FRMLNEN).await?;
        self.write_control(MAIPGL, 0x12).await?;
        self.write_control(MAIPGH, 0x0C).await?;
        self.write_control(MABBIPG, 0x12).await?;
        self.write_pair(MAMXFLL, MAX_FRAMELEN).await?;

        self.write_control(MAADR5, mac[0]).await?;
        self.write_control(MAADR4, mac[1]).await?;
        self.write_control(MAADR3, mac[2]).await?;
        self.write_control(MAADR2, mac[3]).await?;
        self.write_control(MAADR1, mac[4]).await?;
        self.write_control(MAADR0, mac[5]).await?;

        self.phy_write(phy::PHCON2, phy::PHCON2_HDLDIS).await?;

        self.switch_bank(0).await?;
        self.bit_set(EIE, eie::INTIE | eie::PKTIE).await?;
        self.bit_set(ECON1, econ1::RXEN).await?;

        let revision = self.revision().await?;
        if revision == 0 {
            return Err(EthError::NoDevice);
        }

        info!("enc28j60 up, revision {}", revision);

        Ok(())
    }

    /// Sets up the RX ring from scratch. ERXRDPT starts out equal to ERXST.
    async fn program_rx_ring(&mut self) -> EthResult<(), S::Error> {
        self.write_pair(ERXSTL, RXSTART).await?;
        self.write_pair(ERXRDPTL, RXSTART).await?;
        self.write_pair(ERXNDL, RXSTOP).await?;
        self.next_packet = RXSTART;

        Ok(())
    }

    /// Resets the receive logic and drops every frame in the RX ring.
    async fn reset_rx(&mut self) -> EthResult<(), S::Error> {
        self.bit_clear(ECON1, econ1::RXEN).await?;
        self.bit_set(ECON1, econ1::RXRST).await?;
        self.bit_clear(ECON1, econ1::RXRST).await?;
        self.program_rx_ring().await?;

        let pending = self.read_control(EPKTCNT).await?;
        for _ in 0..pending {
            self.bit_set(ECON2, econ2::PKTDEC).await?;
        }

        self.bit_set(ECON1, econ1::RXEN).await
    }

    async fn switch_bank(&mut self, bank: u8) -> EthResult<(), S::Error> {
        trace!("enc28j60 bank {} -> {}", self.bank, bank);
        self.write_op(opcode::BIT_FIELD_CLR, ECON1, econ1::BSEL1 | econ1::BSEL0).await?;
        self.write_op(opcode::BIT_FIELD_SET, ECON1, bank).await?;
        self.bank = bank;

        Ok(())
    }

    async fn select_bank(&mut self, register: Register) -> EthResult<(), S::Error> {
        if register.is_common() || register.bank() == self.bank {
            return Ok(());
        }

        self.switch_bank(register.bank()).await
    }

    async fn read_op(&mut self, op: u8, register: Register) -> EthResult<u8, S::Error> {
        let mut buf = [0u8; 2];
        // MAC and MII registers shift out a dummy byte first.
        let n = if register.is_mac_mii() { 2 } else { 1 };

        self.spi
            .transaction(&mut [
                Operation::Write(&[op | register.address()]),
                Operation::Read(&mut buf[..n]),
            ])
            .await
            .map_err(EthError::Io)?;

        Ok(buf[n - 1])
    }

    async fn write_op(&mut self, op: u8, register: Register, data: u8) -> EthResult<(), S::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[op | register.address(), data])])
            .await
            .map_err(EthError::Io)
    }

    pub async fn read_control(&mut self, register: Register) -> EthResult<u8, S::Error> {
        self.select_bank(register).await?;
        self.read_op(opcode::READ_CTRL_REG, register).await
    }

    pub async fn write_control(&mut self, register: Register, data: u8) -> EthResult<(), S::Error> {
        self.select_bank(register).await?;
        self.write_op(opcode::WRITE_CTRL_REG, register, data).await
    }

    /// Writes a 16-bit register pair, low byte first.
    async fn write_pair(&mut self, low: Register, value: u16) -> EthResult<(), S::Error> {
        let [l, h] = value.to_le_bytes();
        self.write_control(low, l).await?;
        self.write_control(low.high(), h).await
    }

    /// Sets `bits` in an ETH register. Not valid on MAC/MII registers.
    async fn bit_set(&mut self, register: Register, bits: u8) -> EthResult<(), S::Error> {
        self.select_bank(register).await?;
        self.write_op(opcode::BIT_FIELD_SET, register, bits).await
    }

    async fn bit_clear(&mut self, register: Register, bits: u8) -> EthResult<(), S::Error> {
        self.select_bank(register).await?;
        self.write_op(opcode::BIT_FIELD_CLR, register, bits).await
    }

    /// Reads from buffer memory at ERDPT, which the chip advances (and wraps inside the RX ring).
    pub(crate) async fn read_buffer(&mut self, into: &mut [u8]) -> EthResult<(), S::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[opcode::READ_BUF_MEM]), Operation::Read(into)])
            .await
            .map_err(EthError::Io)
    }

    async fn write_buffer(&mut self, data: &[u8]) -> EthResult<(), S::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[opcode::WRITE_BUF_MEM]), Operation::Write(data)])
            .await
            .map_err(EthError::Io)
    }

    async fn wait_mii(&mut self) -> EthResult<(), S::Error> {
        while self.read_control(MISTAT).await? & mistat::BUSY != 0 {
            self.delay.delay_us(MII_POLL_US).await;
        }

        Ok(())
    }

    pub async fn phy_write(&mut self, register: u8, value: u16) -> EthResult<(), S::Error> {
        let [l, h] = value.to_le_bytes();
        self.write_control(MIREGADR, register).await?;
        self.write_control(MIWRL, l).await?;
        // Writing MIWRH starts the MII transaction.
        self.write_control(MIWRH, h).await?;

        self.wait_mii().await
    }

    pub async fn phy_read(&mut self, register: u8) -> EthResult<u16, S::Error> {
        self.write_control(MIREGADR, register).await?;
        self.write_control(MICMD, micmd::MIIRD).await?;
        self.wait_mii().await?;
        self.write_control(MICMD, 0).await?;

        let l = self.read_control(MIRDL).await?;
        let h = self.read_control(MIRDH).await?;

        Ok(u16::from_le_bytes([l, h]))
    }

    /// Silicon revision (EREVID). Zero means nothing answered on the bus.
    pub async fn revision(&mut self) -> EthResult<u8, S::Error> {
        self.read_control(EREVID).await
    }

    pub async fn link_up(&mut self) -> EthResult<bool, S::Error> {
        Ok(self.phy_read(phy::PHSTAT2).await? & phy::PHSTAT2_LSTAT != 0)
    }

    /// Sets the CLKOUT pin prescaler. 0 disables the output, 2 gives 12.5 MHz.
    pub async fn set_clock_out(&mut self, prescaler: u8) -> EthResult<(), S::Error> {
        self.write_control(ECOCON, prescaler & 0x7).await
    }

    /// Frames received and not yet released (EPKTCNT).
    pub async fn pending_packets(&mut self) -> EthResult<u8, S::Error> {
        self.read_control(EPKTCNT).await
    }

    pub async fn interrupt_flags(&mut self) -> EthResult<InterruptFlags, S::Error> {
        Ok(InterruptFlags::from_bits_truncate(self.read_control(EIR).await?))
    }

    /// Waits for a received frame and returns a reader over it.
    ///
    /// The packet counter is polled every `rx_poll_interval`; once `timeout` worth of waiting has
    /// passed without a frame this fails with [`EthError::RxDeadlineExceeded`]. A zero timeout
    /// polls once.
    ///
    /// The reader must be read to the end or discarded before the next call, or the frame stays
    /// in the buffer.
    pub async fn next_packet(&mut self, timeout: Duration) -> EthResult<PacketReader<'_, S, D>, S::Error> {
        let mut waited = Duration::from_ticks(0);
        while self.read_control(EPKTCNT).await? == 0 {
            if waited >= timeout {
                warn!("enc28j60: no frame within {} ms", timeout.as_millis());
                return Err(EthError::RxDeadlineExceeded);
            }
            let poll = self.config.rx_poll_interval;
            self.delay.delay_us(poll.as_micros() as u32).await;
            waited += poll;
        }

        self.write_pair(ERDPTL, self.next_packet).await?;

        // Next packet pointer, byte count and status, all little-endian.
        let mut header = [0u8; 6];
        self.read_buffer(&mut header).await?;
        let next = u16::from_le_bytes([header[0], header[1]]);
        let count = u16::from_le_bytes([header[2], header[3]]);
        let status = u16::from_le_bytes([header[4], header[5]]);

        if !packet::header_is_valid(next, count) {
            error!("enc28j60: corrupt receive header, next {} count {}, resetting RX", next, count);
            self.reset_rx().await?;
            return Err(EthError::InvalidHeader);
        }

        let start = packet::wrap(self.next_packet + header.len() as u16);
        self.next_packet = next;

        // The count includes the trailing CRC.
        let len = count.saturating_sub(4);
        if status & rsv::RECEIVED_OK == 0 {
            warn!("enc28j60: frame of {} bytes failed CRC", len);
        }

        Ok(PacketReader::new(self, start, len, status))
    }

    /// Releases the frame that ended at `next_packet`: hands its memory back to the chip and
    /// decrements EPKTCNT.
    pub(crate) async fn release_packet(&mut self) -> EthResult<(), S::Error> {
        self.write_pair(ERXRDPTL, packet::free_pointer(self.next_packet)).await?;
        self.bit_set(ECON2, econ2::PKTDEC).await
    }

    /// Lets the chip reuse RX memory up to (not including) `cursor`.
    pub(crate) async fn free_up_to(&mut self, cursor: u16) -> EthResult<(), S::Error> {
        self.write_pair(ERXRDPTL, packet::free_pointer(cursor)).await
    }

    /// Appends `bytes` to the frame being assembled in the TX buffer.
    ///
    /// Fails with [`EthError::BufferSize`] if the frame would grow past [`MAX_FRAMELEN`]; the
    /// frame assembled so far is dropped in that case.
    pub async fn write(&mut self, bytes: &[u8]) -> EthResult<usize, S::Error> {
        if self.tx_cursor as usize + bytes.len() > MAX_FRAMELEN as usize {
            self.tx_cursor = 0;
            return Err(EthError::BufferSize);
        }

        self.write_pair(EWRPTL, TXSTART + self.tx_cursor).await?;
        if self.tx_cursor == 0 {
            // Per-packet control byte; 0 means "use MACON3".
            self.write_op(opcode::WRITE_BUF_MEM, Register::BUFFER, 0x00).await?;
            self.tx_cursor = 1;
        }
        self.write_buffer(bytes).await?;
        self.tx_cursor += bytes.len() as u16;

        Ok(bytes.len())
    }

    /// Transmits the assembled frame. Does nothing when no frame is pending.
    pub async fn flush(&mut self) -> EthResult<(), S::Error> {
        if self.tx_cursor == 0 {
            return Ok(());
        }

        self.write_pair(ETXNDL, TXSTART + self.tx_cursor - 1).await?;
        self.bit_set(ECON1, econ1::TXRTS).await?;
        // Rev. B4 errata #12: a transmit error can leave TXRTS stuck.
        if self.read_control(EIR).await? & InterruptFlags::TXERIF.bits() != 0 {
            self.bit_clear(ECON1, econ1::TXRTS).await?;
        }
        self.tx_cursor = 0;

        Ok(())
    }

    pub fn release(self) -> (S, D) {
        (self.spi, self.delay)
    }
}

impl<S, D> embedded_io_async::ErrorType for Enc28j60<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    type Error = EthError<S::Error>;
}

impl<S, D> embedded_io_async::Write for Enc28j60<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Enc28j60::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Enc28j60::flush(self).await
    }
}
