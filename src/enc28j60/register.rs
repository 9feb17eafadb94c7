//! ENC28J60 control registers, SPI opcodes and buffer layout.
//!
//! A [`Register`] packs the 5-bit address, the bank in bits 5-6 and, in bit 7, whether it is a
//! MAC/MII register (those return a dummy byte before the data on reads).

use bitflags::bitflags;

const ADDR_MASK: u8 = 0x1F;
const BANK_MASK: u8 = 0x60;
const SPRD_MASK: u8 = 0x80;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register(u8);

impl Register {
    pub const fn address(self) -> u8 {
        self.0 & ADDR_MASK
    }

    pub const fn bank(self) -> u8 {
        (self.0 & BANK_MASK) >> 5
    }

    pub const fn is_mac_mii(self) -> bool {
        self.0 & SPRD_MASK != 0
    }

    /// EIE, EIR, ESTAT, ECON2 and ECON1 are mapped into every bank.
    pub const fn is_common(self) -> bool {
        self.address() >= 0x1B
    }

    /// Placeholder address for the buffer memory opcodes, which take none.
    pub(crate) const BUFFER: Register = Register(0);

    /// The high half of a 16-bit register pair whose low half is `self`.
    pub(crate) const fn high(self) -> Register {
        Register(self.0 + 1)
    }
}

const fn bank0(a: u8) -> Register {
    Register(a)
}

const fn bank1(a: u8) -> Register {
    Register(a | 0x20)
}

const fn bank2(a: u8) -> Register {
    Register(a | 0x40)
}

const fn bank3(a: u8) -> Register {
    Register(a | 0x60)
}

const fn mac(r: Register) -> Register {
    Register(r.0 | SPRD_MASK)
}

// All banks
pub const EIE: Register = Register(0x1B);
pub const EIR: Register = Register(0x1C);
pub const ESTAT: Register = Register(0x1D);
pub const ECON2: Register = Register(0x1E);
pub const ECON1: Register = Register(0x1F);

// Bank 0
pub const ERDPTL: Register = bank0(0x00);
pub const ERDPTH: Register = bank0(0x01);
pub const EWRPTL: Register = bank0(0x02);
pub const EWRPTH: Register = bank0(0x03);
pub const ETXSTL: Register = bank0(0x04);
pub const ETXSTH: Register = bank0(0x05);
pub const ETXNDL: Register = bank0(0x06);
pub const ETXNDH: Register = bank0(0x07);
pub const ERXSTL: Register = bank0(0x08);
pub const ERXSTH: Register = bank0(0x09);
pub const ERXNDL: Register = bank0(0x0A);
pub const ERXNDH: Register = bank0(0x0B);
pub const ERXRDPTL: Register = bank0(0x0C);
pub const ERXRDPTH: Register = bank0(0x0D);
pub const ERXWRPTL: Register = bank0(0x0E);
pub const ERXWRPTH: Register = bank0(0x0F);
pub const EDMASTL: Register = bank0(0x10);
pub const EDMASTH: Register = bank0(0x11);
pub const EDMANDL: Register = bank0(0x12);
pub const EDMANDH: Register = bank0(0x13);
pub const EDMADSTL: Register = bank0(0x14);
pub const EDMADSTH: Register = bank0(0x15);
pub const EDMACSL: Register = bank0(0x16);
pub const EDMACSH: Register = bank0(0x17);

// Bank 1
pub const EHT0: Register = bank1(0x00);
pub const EHT1: Register = bank1(0x01);
pub const EHT2: Register = bank1(0x02);
pub const EHT3: Register = bank1(0x03);
pub const EHT4: Register = bank1(0x04);
pub const EHT5: Register = bank1(0x05);
pub const EHT6: Register = bank1(0x06);
pub const EHT7: Register = bank1(0x07);
pub const EPMM0: Register = bank1(0x08);
pub const EPMM1: Register = bank1(0x09);
pub const EPMM2: Register = bank1(0x0A);
pub const EPMM3: Register = bank1(0x0B);
pub const EPMM4: Register = bank1(0x0C);
pub const EPMM5: Register = bank1(0x0D);
pub const EPMM6: Register = bank1(0x0E);
pub const EPMM7: Register = bank1(0x0F);
pub const EPMCSL: Register = bank1(0x10);
pub const EPMCSH: Register = bank1(0x11);
pub const EPMOL: Register = bank1(0x14);
pub const EPMOH: Register = bank1(0x15);
pub const EWOLIE: Register = bank1(0x16);
pub const EWOLIR: Register = bank1(0x17);
pub const ERXFCON: Register = bank1(0x18);
pub const EPKTCNT: Register = bank1(0x19);

// Bank 2
pub const MACON1: Register = mac(bank2(0x00));
pub const MACON2: Register = mac(bank2(0x01));
pub const MACON3: Register = mac(bank2(0x02));
pub const MACON4: Register = mac(bank2(0x03));
pub const MABBIPG: Register = mac(bank2(0x04));
pub const MAIPGL: Register = mac(bank2(0x06));
pub const MAIPGH: Register = mac(bank2(0x07));
pub const MACLCON1: Register = mac(bank2(0x08));
pub const MACLCON2: Register = mac(bank2(0x09));
pub const MAMXFLL: Register = mac(bank2(0x0A));
pub const MAMXFLH: Register = mac(bank2(0x0B));
pub const MAPHSUP: Register = mac(bank2(0x0D));
pub const MICON: Register = mac(bank2(0x11));
pub const MICMD: Register = mac(bank2(0x12));
pub const MIREGADR: Register = mac(bank2(0x14));
pub const MIWRL: Register = mac(bank2(0x16));
pub const MIWRH: Register = mac(bank2(0x17));
pub const MIRDL: Register = mac(bank2(0x18));
pub const MIRDH: Register = mac(bank2(0x19));

// Bank 3. The MAC address bytes are not in order.
pub const MAADR1: Register = mac(bank3(0x00));
pub const MAADR0: Register = mac(bank3(0x01));
pub const MAADR3: Register = mac(bank3(0x02));
pub const MAADR2: Register = mac(bank3(0x03));
pub const MAADR5: Register = mac(bank3(0x04));
pub const MAADR4: Register = mac(bank3(0x05));
pub const EBSTSD: Register = bank3(0x06);
pub const EBSTCON: Register = bank3(0x07);
pub const EBSTCSL: Register = bank3(0x08);
pub const EBSTCSH: Register = bank3(0x09);
pub const MISTAT: Register = mac(bank3(0x0A));
pub const EREVID: Register = bank3(0x12);
pub const ECOCON: Register = bank3(0x15);
pub const EFLOCON: Register = bank3(0x17);
pub const EPAUSL: Register = bank3(0x18);
pub const EPAUSH: Register = bank3(0x19);

/// PHY registers, reached through the MII interface.
pub mod phy {
    pub const PHCON1: u8 = 0x00;
    pub const PHSTAT1: u8 = 0x01;
    pub const PHHID1: u8 = 0x02;
    pub const PHHID2: u8 = 0x03;
    pub const PHCON2: u8 = 0x10;
    pub const PHSTAT2: u8 = 0x11;
    pub const PHIE: u8 = 0x12;
    pub const PHIR: u8 = 0x13;
    pub const PHLCON: u8 = 0x14;

    pub const PHCON2_FRCLINK: u16 = 0x4000;
    pub const PHCON2_TXDIS: u16 = 0x2000;
    pub const PHCON2_JABBER: u16 = 0x0400;
    /// Half-duplex loopback disable.
    pub const PHCON2_HDLDIS: u16 = 0x0100;

    pub const PHSTAT2_LSTAT: u16 = 0x0400;
}

/// SPI instruction set. The low 5 bits carry the register address where one is needed.
pub mod opcode {
    pub const READ_CTRL_REG: u8 = 0x00;
    pub const READ_BUF_MEM: u8 = 0x3A;
    pub const WRITE_CTRL_REG: u8 = 0x40;
    pub const WRITE_BUF_MEM: u8 = 0x7A;
    pub const BIT_FIELD_SET: u8 = 0x80;
    pub const BIT_FIELD_CLR: u8 = 0xA0;
    pub const SOFT_RESET: u8 = 0xFF;
}

pub mod erxfcon {
    pub const UCEN: u8 = 0x80;
    pub const ANDOR: u8 = 0x40;
    pub const CRCEN: u8 = 0x20;
    pub const PMEN: u8 = 0x10;
    pub const MPEN: u8 = 0x08;
    pub const HTEN: u8 = 0x04;
    pub const MCEN: u8 = 0x02;
    pub const BCEN: u8 = 0x01;
}

pub mod eie {
    pub const INTIE: u8 = 0x80;
    pub const PKTIE: u8 = 0x40;
    pub const DMAIE: u8 = 0x20;
    pub const LINKIE: u8 = 0x10;
    pub const TXIE: u8 = 0x08;
    pub const WOLIE: u8 = 0x04;
    pub const TXERIE: u8 = 0x02;
    pub const RXERIE: u8 = 0x01;
}

bitflags! {
    /// Contents of EIR.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct InterruptFlags: u8 {
        const PKTIF = 0x40;
        const DMAIF = 0x20;
        const LINKIF = 0x10;
        const TXIF = 0x08;
        const WOLIF = 0x04;
        const TXERIF = 0x02;
        const RXERIF = 0x01;
    }
}

pub mod estat {
    pub const INT: u8 = 0x80;
    pub const LATECOL: u8 = 0x10;
    pub const RXBUSY: u8 = 0x04;
    pub const TXABRT: u8 = 0x02;
    pub const CLKRDY: u8 = 0x01;
}

pub mod econ2 {
    pub const AUTOINC: u8 = 0x80;
    pub const PKTDEC: u8 = 0x40;
    pub const PWRSV: u8 = 0x20;
    pub const VRPS: u8 = 0x08;
}

pub mod econ1 {
    pub const TXRST: u8 = 0x80;
    pub const RXRST: u8 = 0x40;
    pub const DMAST: u8 = 0x20;
    pub const CSUMEN: u8 = 0x10;
    pub const TXRTS: u8 = 0x08;
    pub const RXEN: u8 = 0x04;
    pub const BSEL1: u8 = 0x02;
    pub const BSEL0: u8 = 0x01;
}

pub mod macon1 {
    pub const LOOPBK: u8 = 0x10;
    pub const TXPAUS: u8 = 0x08;
    pub const RXPAUS: u8 = 0x04;
    pub const PASSALL: u8 = 0x02;
    pub const MARXEN: u8 = 0x01;
}

pub mod macon3 {
    pub const PADCFG2: u8 = 0x80;
    pub const PADCFG1: u8 = 0x40;
    pub const PADCFG0: u8 = 0x20;
    pub const TXCRCEN: u8 = 0x10;
    pub const PHDRLEN: u8 = 0x08;
    pub const HFRMLEN: u8 = 0x04;
    pub const FRMLNEN: u8 = 0x02;
    pub const FULDPX: u8 = 0x01;
}

pub mod micmd {
    pub const MIISCAN: u8 = 0x02;
    pub const MIIRD: u8 = 0x01;
}

pub mod mistat {
    pub const NVALID: u8 = 0x04;
    pub const SCAN: u8 = 0x02;
    pub const BUSY: u8 = 0x01;
}

/// Bits of the 16-bit receive status word that ends each RX header.
pub mod rsv {
    pub const RECEIVED_OK: u16 = 0x0080;
}

// Buffer layout: RX ring first, the TX area takes the last 0x600 bytes.
pub const RXSTART: u16 = 0x0000;
pub const RXSTOP: u16 = 0x1FFF - 0x0600 - 1;
pub const TXSTART: u16 = 0x1FFF - 0x0600;
pub const TXSTOP: u16 = 0x1FFF;
/// Longest frame accepted or sent. A full Ethernet frame would be 1518.
pub const MAX_FRAMELEN: u16 = 1500;
