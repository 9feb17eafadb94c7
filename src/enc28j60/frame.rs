//! Ethernet II framing on top of the raw bytes the controller sends and receives.

use crate::error::EthError;
use core::fmt;

pub const HEADER_LEN: usize = 14;
/// Smallest payload of an untagged frame. Shorter payloads are zero-padded on the wire.
pub const MIN_PAYLOAD: usize = 46;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Upper layer protocol of a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    /// 802.1Q tag.
    Vlan,
    /// 802.1ad outer tag.
    ServiceVlan,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            0x86DD => EtherType::Ipv6,
            0x8100 => EtherType::Vlan,
            0x88A8 => EtherType::ServiceVlan,
            other => EtherType::Unknown(other),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(value: EtherType) -> u16 {
        match value {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Ipv6 => 0x86DD,
            EtherType::Vlan => 0x8100,
            EtherType::ServiceVlan => 0x88A8,
            EtherType::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ether_type: EtherType,
}

impl FrameHeader {
    /// Splits `frame` into its header and payload. `None` if it is shorter than a header.
    ///
    /// VLAN tags are not unwrapped, a tagged frame reports [`EtherType::Vlan`].
    pub fn parse(frame: &[u8]) -> Option<(Self, &[u8])> {
        if frame.len() < HEADER_LEN {
            return None;
        }

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&frame[0..6]);
        source.copy_from_slice(&frame[6..12]);
        let ether_type = u16::from_be_bytes([frame[12], frame[13]]).into();

        let header = FrameHeader {
            destination: MacAddress(destination),
            source: MacAddress(source),
            ether_type,
        };

        Some((header, &frame[HEADER_LEN..]))
    }

    /// Serializes the header into the start of `out` and returns the header length.
    pub fn write_to<E>(&self, out: &mut [u8]) -> Result<usize, EthError<E>> {
        if out.len() < HEADER_LEN {
            return Err(EthError::BufferSize);
        }

        out[0..6].copy_from_slice(&self.destination.0);
        out[6..12].copy_from_slice(&self.source.0);
        out[12..14].copy_from_slice(&u16::from(self.ether_type).to_be_bytes());

        Ok(HEADER_LEN)
    }
}

/// On-wire length of a frame carrying `payload` bytes, padding included.
pub fn frame_len(payload: usize) -> usize {
    HEADER_LEN + payload.max(MIN_PAYLOAD)
}
