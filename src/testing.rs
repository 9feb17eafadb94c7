use crate::bus::Bus;
use crate::enc28j60::register::{RXSTART, RXSTOP};
use crate::rgb75::native::{NativePins, Pin, PinId, RgbBits};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::SevenBitAddress;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{ErrorKind, ErrorType, Operation, SpiBus, SpiDevice};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FakeBusError {
    Nack,
    Injected,
}

/// A 256-byte register file behind a single I2C address.
pub struct FakeBus {
    address: SevenBitAddress,
    memory: [u8; 256],
    transactions: usize,
    writes: Vec<(u8, Vec<u8>)>,
    fail_next: bool,
}

impl FakeBus {
    pub fn new(address: SevenBitAddress) -> Self {
        FakeBus {
            address,
            memory: [0u8; 256],
            transactions: 0,
            writes: Vec::new(),
            fail_next: false,
        }
    }

    /// Presets device memory starting at `register`, without counting as bus traffic.
    pub fn set_register(&mut self, register: u8, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.memory[(register as usize + i) & 0xff] = *b;
        }
    }

    pub fn with_register(mut self, register: u8, bytes: &[u8]) -> Self {
        self.set_register(register, bytes);

        self
    }

    pub fn memory(&self, register: u8) -> u8 {
        self.memory[register as usize]
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }

    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    fn begin(&mut self, address: SevenBitAddress) -> Result<(), FakeBusError> {
        self.transactions += 1;
        if core::mem::take(&mut self.fail_next) {
            return Err(FakeBusError::Injected);
        }
        if address != self.address {
            return Err(FakeBusError::Nack);
        }

        Ok(())
    }

    fn store(&mut self, register: u8, bytes: &[u8]) {
        self.set_register(register, bytes);
        self.writes.push((register, bytes.to_vec()));
    }
}

impl Bus for FakeBus {
    type Error = FakeBusError;

    async fn transact(
        &mut self,
        address: SevenBitAddress,
        outbound: &[u8],
        inbound: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.begin(address)?;

        let Some((&register, data)) = outbound.split_first() else {
            return Ok(());
        };
        if !data.is_empty() {
            self.store(register, data);
        }
        for (i, b) in inbound.iter_mut().enumerate() {
            *b = self.memory[(register as usize + i) & 0xff];
        }

        Ok(())
    }

    async fn write_register(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        self.begin(address)?;
        self.store(register, bytes);

        Ok(())
    }
}

/// Delay that returns immediately and only keeps count of the time requested.
pub struct FakeDelay {
    elapsed_ns: u64,
}

impl FakeDelay {
    pub fn new() -> Self {
        FakeDelay { elapsed_ns: 0 }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiEvent {
    ChipSelect(bool),
    Write(Vec<u8>),
    Read(usize),
    Transfer(usize),
    Flush,
}

type SpiLog = Rc<RefCell<Vec<SpiEvent>>>;

/// Raw SPI bus that logs every call, paired with a chip-select pin writing to the same log.
pub struct RecordingSpiBus {
    log: SpiLog,
    responses: Vec<u8>,
    fail_writes: bool,
}

pub struct RecordingPin {
    log: SpiLog,
}

impl RecordingSpiBus {
    pub fn new(responses: &[u8]) -> (Self, RecordingPin, SpiLog) {
        let log: SpiLog = Rc::new(RefCell::new(Vec::new()));
        let bus = RecordingSpiBus {
            log: log.clone(),
            responses: responses.to_vec(),
            fail_writes: false,
        };

        (bus, RecordingPin { log: log.clone() }, log)
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    fn next_response(&mut self) -> u8 {
        if self.responses.is_empty() { 0 } else { self.responses.remove(0) }
    }
}

impl ErrorType for RecordingSpiBus {
    type Error = ErrorKind;
}

impl SpiBus for RecordingSpiBus {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for w in words.iter_mut() {
            *w = self.next_response();
        }
        self.log.borrow_mut().push(SpiEvent::Read(words.len()));

        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(ErrorKind::Other);
        }
        self.log.borrow_mut().push(SpiEvent::Write(words.to_vec()));

        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        for w in read.iter_mut() {
            *w = self.next_response();
        }
        self.log.borrow_mut().push(SpiEvent::Transfer(write.len().max(read.len())));

        Ok(())
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for w in words.iter_mut() {
            *w = self.next_response();
        }
        self.log.borrow_mut().push(SpiEvent::Transfer(words.len()));

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(SpiEvent::Flush);

        Ok(())
    }
}

impl PinErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(SpiEvent::ChipSelect(false));

        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(SpiEvent::ChipSelect(true));

        Ok(())
    }
}

const ECON1: usize = 0x1F;
const ECON2: usize = 0x1E;
const EIR: usize = 0x1C;
const EPKTCNT: usize = 0x19;
const EREVID: usize = 0x12;

/// Behavioural model of an ENC28J60 on the far side of an [`SpiDevice`].
///
/// Covers banked control registers, the 8 KiB buffer with auto-incrementing pointers, the packet
/// counter, MII access to the PHY and transmission, which completes instantly.
pub struct FakeEnc28j60 {
    banks: [[u8; 32]; 4],
    memory: Vec<u8>,
    phy: [u16; 32],
    revision: u8,
    /// Every control write, bit-field set and bit-field clear as `(opcode | address, data)`.
    pub ops: Vec<(u8, u8)>,
    /// Frames handed to the wire, without the per-packet control byte.
    pub transmitted: Vec<Vec<u8>>,
    pub resets: usize,
    /// Set EIR.TXERIF on the next transmission.
    pub fail_next_transmit: bool,
}

impl FakeEnc28j60 {
    pub fn new(revision: u8) -> Self {
        let mut chip = FakeEnc28j60 {
            banks: [[0u8; 32]; 4],
            memory: vec![0u8; 0x2000],
            phy: [0u16; 32],
            revision,
            ops: Vec::new(),
            transmitted: Vec::new(),
            resets: 0,
            fail_next_transmit: false,
        };
        chip.banks[3][EREVID] = revision;

        chip
    }

    fn reset(&mut self) {
        self.banks = [[0u8; 32]; 4];
        self.banks[3][EREVID] = self.revision;
        self.resets += 1;
    }

    fn bank(&self) -> usize {
        (self.banks[0][ECON1] & 0b11) as usize
    }

    fn slot(&mut self, address: u8) -> &mut u8 {
        let a = (address & 0x1F) as usize;
        let bank = if a >= 0x1B { 0 } else { self.bank() };

        &mut self.banks[bank][a]
    }

    fn is_mac_mii(&self, address: u8) -> bool {
        match self.bank() {
            2 => address < 0x1A,
            3 => address <= 0x05 || address == 0x0A,
            _ => false,
        }
    }

    pub fn reg(&self, bank: usize, address: u8) -> u8 {
        let a = address as usize;
        if a >= 0x1B { self.banks[0][a] } else { self.banks[bank][a] }
    }

    pub fn reg16(&self, bank: usize, low: u8) -> u16 {
        u16::from_le_bytes([self.reg(bank, low), self.reg(bank, low + 1)])
    }

    fn set_reg16(&mut self, bank: usize, low: u8, value: u16) {
        let [l, h] = value.to_le_bytes();
        self.banks[bank][low as usize] = l;
        self.banks[bank][low as usize + 1] = h;
    }

    pub fn packet_count(&self) -> u8 {
        self.banks[1][EPKTCNT]
    }

    pub fn phy(&self, register: u8) -> u16 {
        self.phy[register as usize]
    }

    pub fn set_phy(&mut self, register: u8, value: u16) {
        self.phy[register as usize] = value;
    }

    pub fn memory(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    /// Writes `bytes` into the RX ring at `at`, wrapping like the MAC does, and bumps EPKTCNT.
    pub fn queue_raw(&mut self, at: u16, bytes: &[u8]) {
        let mut p = at;
        for &b in bytes {
            self.memory[p as usize] = b;
            p = if p == RXSTOP { RXSTART } else { p + 1 };
        }
        self.banks[1][EPKTCNT] += 1;
    }

    /// Places a received frame in RX memory at `at`, as the MAC would, and bumps EPKTCNT.
    ///
    /// Returns the next-packet pointer written into the header.
    pub fn queue_frame(&mut self, at: u16, payload: &[u8], crc_ok: bool) -> u16 {
        let count = payload.len() as u16 + 4;
        let mut next = at + 6 + count;
        if next > RXSTOP {
            next -= RXSTOP - RXSTART + 1;
        }
        // The MAC keeps the next-packet pointer even.
        next += next & 1;
        let status: u16 = if crc_ok { 0x0080 } else { 0x0000 };

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&status.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        self.queue_raw(at, &bytes);

        next
    }

    /// Control writes to `ECON1` that clear or set the bank select bits.
    pub fn bank_ops(&self) -> Vec<(u8, u8)> {
        self.ops
            .iter()
            .copied()
            .filter(|(c, d)| *c & 0x1F == ECON1 as u8 && (*c & 0xE0 == 0xA0 && *d == 0b11 || *c & 0xE0 == 0x80 && *d <= 0b11))
            .collect()
    }

    fn data_in(&mut self, command: u8, byte: u8) {
        let address = command & 0x1F;
        match command & 0xE0 {
            0x40 => {
                self.ops.push((command, byte));
                *self.slot(address) = byte;
                self.after_write(address, byte);
            }
            0x60 => {
                let p = self.reg16(0, 0x02);
                self.memory[(p & 0x1FFF) as usize] = byte;
                self.set_reg16(0, 0x02, p.wrapping_add(1));
            }
            0x80 => {
                self.ops.push((command, byte));
                *self.slot(address) |= byte;
                self.after_set(address, byte);
            }
            0xA0 => {
                self.ops.push((command, byte));
                *self.slot(address) &= !byte;
            }
            _ => {}
        }
    }

    fn after_write(&mut self, address: u8, byte: u8) {
        if self.bank() != 2 {
            return;
        }
        let mii = self.banks[2][0x14] as usize & 0x1F;
        match address {
            // MIWRH starts the PHY write.
            0x17 => self.phy[mii] = u16::from_le_bytes([self.banks[2][0x16], byte]),
            // MICMD.MIIRD latches the PHY register into MIRD.
            0x12 if byte & 0x01 != 0 => self.set_reg16(2, 0x18, self.phy[mii]),
            _ => {}
        }
    }

    fn after_set(&mut self, address: u8, bits: u8) {
        match address as usize {
            ECON2 if bits & 0x40 != 0 => {
                self.banks[1][EPKTCNT] = self.banks[1][EPKTCNT].saturating_sub(1);
                self.banks[0][ECON2] &= !0x40;
            }
            ECON1 if bits & 0x08 != 0 => {
                if core::mem::take(&mut self.fail_next_transmit) {
                    self.banks[0][EIR] |= 0x02;
                    return;
                }
                let start = self.reg16(0, 0x04) as usize;
                let end = self.reg16(0, 0x06) as usize;
                self.transmitted.push(self.memory[start + 1..=end].to_vec());
                self.banks[0][ECON1] &= !0x08;
                self.banks[0][EIR] |= 0x08;
            }
            _ => {}
        }
    }

    fn data_out(&mut self, command: u8, index: usize) -> u8 {
        let address = command & 0x1F;
        if command == 0x3A {
            let p = self.reg16(0, 0x00);
            let byte = self.memory[(p & 0x1FFF) as usize];
            let next = if p == self.reg16(0, 0x0A) { self.reg16(0, 0x08) } else { p.wrapping_add(1) };
            self.set_reg16(0, 0x00, next);
            return byte;
        }
        if self.is_mac_mii(address) && index == 0 {
            return 0;
        }

        *self.slot(address)
    }
}

impl ErrorType for FakeEnc28j60 {
    type Error = ErrorKind;
}

impl SpiDevice for FakeEnc28j60 {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut command: Option<u8> = None;
        let mut reads = 0usize;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        match command {
                            None => {
                                command = Some(byte);
                                if byte == 0xFF {
                                    self.reset();
                                }
                            }
                            Some(c) => self.data_in(c, byte),
                        }
                    }
                }
                Operation::Read(buf) => {
                    let c = command.ok_or(ErrorKind::Other)?;
                    for b in buf.iter_mut() {
                        *b = self.data_out(c, reads);
                        reads += 1;
                    }
                }
                _ => return Err(ErrorKind::Other),
            }
        }

        Ok(())
    }
}

/// SPI device with nothing attached: MISO floats high, so every byte reads back as 0xFF.
pub struct FloatingSpi;

impl ErrorType for FloatingSpi {
    type Error = ErrorKind;
}

impl SpiDevice for FloatingSpi {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => buf.fill(0xFF),
                Operation::Transfer(read, _) => read.fill(0xFF),
                Operation::TransferInPlace(buf) => buf.fill(0xFF),
                Operation::Write(_) | Operation::DelayNs(_) => {}
            }
        }

        Ok(())
    }
}

/// GPIO pin on a fake port, remembering its level.
pub struct FakePin {
    id: PinId,
    pub high: bool,
    pub rising_edges: usize,
}

impl FakePin {
    pub fn new(port: u8, bit: u8) -> Self {
        FakePin { id: PinId { port, bit }, high: false, rising_edges: 0 }
    }
}

impl PinErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;

        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;

        Ok(())
    }
}

impl Pin for FakePin {
    fn id(&self) -> PinId {
        self.id
    }
}

/// HUB75 platform that records port writes and timer calls.
#[derive(Default)]
pub struct FakeHub75 {
    pub rgb_pins: Option<[PinId; 6]>,
    pub set_rgb: Vec<RgbBits>,
    pub clk_rgb: Vec<RgbBits>,
    pub masks: Vec<u32>,
    pub rows: Vec<usize>,
    pub isr: Option<fn()>,
    pub resumes: Vec<(u32, u32)>,
    pub pauses: usize,
    pub counter: u32,
}

impl NativePins for FakeHub75 {
    fn set_pins(&mut self, rgb: [PinId; 6], _clk: PinId, _rows: &[PinId]) {
        self.rgb_pins = Some(rgb);
    }

    fn set_rgb(&mut self, bits: RgbBits) {
        self.set_rgb.push(bits);
    }

    fn set_rgb_mask(&mut self, mask: u32) {
        self.masks.push(mask);
    }

    fn clk_rgb(&mut self, bits: RgbBits) {
        self.clk_rgb.push(bits);
    }

    fn set_row(&mut self, row: usize) {
        self.rows.push(row);
    }

    fn init_timer(&mut self, isr: fn()) {
        self.isr = Some(isr);
    }

    fn resume_timer(&mut self, value: u32, period: u32) {
        self.resumes.push((value, period));
    }

    fn pause_timer(&mut self) -> u32 {
        self.pauses += 1;
        self.counter
    }
}
