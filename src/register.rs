//! Typed, cached register access on top of a [`Bus`].
//!
//! A device describes its registers once, as a static table of [`RegisterDef`]s. Each entry is
//! either a *root* register, which has a physical address, a width and access attributes, or a
//! *bitfield*, which names a root as its host and selects `mask << shift` inside the host word.
//!
//! [`RegisterMap`] performs the reads and writes:
//!
//! - Reads decode the host word big-endian, then shift and mask.
//! - Writes are always read-modify-write on the host word, so bits outside the field (including
//!   reserved bits holding factory settings) are preserved.
//! - The cache holds full host words and belongs to the root. Writable roots are cached when read,
//!   readable roots when written. Read-only registers are never cached since the device may change
//!   them at any time.

use crate::bus::{Bus, MAX_REG_BYTES};
use crate::error::Error;
use bitflags::bitflags;
use embedded_hal::i2c::SevenBitAddress;
use heapless::LinearMap;

/// A bitfield held a value that does not map onto the requested type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidRegisterField {
    pub register: u8,
    pub value: u16,
}

impl InvalidRegisterField {
    pub fn new(register: u8, value: u16) -> Self {
        Self { register, value }
    }
}

bitflags! {
    /// Access attributes of a root register. Bitfields inherit those of their host.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        /// Can be made permanent with a separate burn command. Unrelated to [`Attributes::WRITE`].
        const PROGRAM = 1 << 2;
    }
}

impl Attributes {
    pub const READ_ONLY: Attributes = Attributes::READ;
    pub const WRITE_ONLY: Attributes = Attributes::WRITE;
    pub const READ_WRITE: Attributes = Attributes::READ.union(Attributes::WRITE);
    pub const READ_WRITE_PROGRAM: Attributes = Attributes::READ_WRITE.union(Attributes::PROGRAM);
}

/// Size of a root register on the wire. Two-byte registers are big-endian.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    One = 1,
    Two = 2,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Root { width: Width, attributes: Attributes },
    Bitfield { host: u8 },
}

/// Static description of one register or bitfield.
///
/// `address` is the physical address for roots. Bitfields have no address of their own, so it is
/// the handle the driver uses to name them, outside the device's physical address range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterDef {
    pub address: u8,
    pub shift: u8,
    pub mask: u16,
    pub kind: Kind,
}

impl RegisterDef {
    pub const fn root(address: u8, width: Width, mask: u16, attributes: Attributes) -> Self {
        Self { address, shift: 0, mask, kind: Kind::Root { width, attributes } }
    }

    pub const fn bitfield(address: u8, host: u8, shift: u8, mask: u16) -> Self {
        Self { address, shift, mask, kind: Kind::Bitfield { host } }
    }
}

/// Resolved host of a register: where to do I/O and what is allowed.
#[derive(Copy, Clone)]
struct Host {
    address: u8,
    width: Width,
    attributes: Attributes,
}

/// The register table of one device, plus the cache of its root registers.
///
/// `N` bounds how many root words can be cached at once. When the cache is full a word is simply
/// not cached, which costs a bus read later but never changes a result.
pub struct RegisterMap<const N: usize> {
    defs: &'static [RegisterDef],
    cache: LinearMap<u8, u16, N>,
}

impl<const N: usize> RegisterMap<N> {
    pub fn new(defs: &'static [RegisterDef]) -> Self {
        Self { defs, cache: LinearMap::new() }
    }

    pub fn definition(&self, address: u8) -> Option<&'static RegisterDef> {
        self.defs.iter().find(|def| def.address == address)
    }

    fn resolve<E>(&self, address: u8) -> Result<(&'static RegisterDef, Host), Error<E>> {
        let def = self.definition(address).ok_or(Error::RegisterNotFound)?;
        let host = match def.kind {
            Kind::Root { width, attributes } => Host { address: def.address, width, attributes },
            Kind::Bitfield { host } => match self.definition(host).map(|h| h.kind) {
                Some(Kind::Root { width, attributes }) => Host { address: host, width, attributes },
                // A bitfield must sit directly on a root.
                _ => return Err(Error::RegisterNotFound),
            },
        };

        Ok((def, host))
    }

    /// Returns the cached host word of `address`, if any.
    pub fn cached(&self, address: u8) -> Option<u16> {
        let (_, host) = self.resolve::<()>(address).ok()?;
        self.cache.get(&host.address).copied()
    }

    async fn host_word<B: Bus>(
        &mut self,
        bus: &mut B,
        device: SevenBitAddress,
        host: Host,
    ) -> Result<u16, Error<B::Error>> {
        if let Some(word) = self.cache.get(&host.address) {
            return Ok(*word);
        }

        let mut buf = [0u8; MAX_REG_BYTES];
        let buf = &mut buf[..host.width.bytes()];
        bus.read_register(device, host.address, buf)
            .await
            .map_err(Error::Bus)?;

        let word = decode(buf);
        if host.attributes.contains(Attributes::WRITE) {
            self.store(host.address, word);
        }

        Ok(word)
    }

    fn store(&mut self, host: u8, word: u16) {
        if self.cache.insert(host, word).is_err() {
            trace!("register cache full, {} not cached", host);
        }
    }

    /// Reads the register or bitfield at `address` from the device at `device`.
    ///
    /// The result is in `0..=mask`.
    pub async fn read<B: Bus>(
        &mut self,
        bus: &mut B,
        device: SevenBitAddress,
        address: u8,
    ) -> Result<u16, Error<B::Error>> {
        let (def, host) = self.resolve(address)?;
        if !host.attributes.contains(Attributes::READ) {
            return Err(Error::RegisterNotReadable);
        }

        let word = self.host_word(bus, device, host).await?;

        Ok((word >> def.shift) & def.mask)
    }

    /// Writes `value` into the register or bitfield at `address`, preserving every other bit of
    /// the host word.
    pub async fn write<B: Bus>(
        &mut self,
        bus: &mut B,
        device: SevenBitAddress,
        address: u8,
        value: u16,
    ) -> Result<(), Error<B::Error>> {
        let (def, host) = self.resolve(address)?;
        if !host.attributes.contains(Attributes::WRITE) {
            return Err(Error::RegisterNotWritable);
        }

        let readable = host.attributes.contains(Attributes::READ);
        let current = if readable {
            self.host_word(bus, device, host).await?
        } else {
            0
        };

        let field = def.mask << def.shift;
        let word = (current & !field) | ((value & def.mask) << def.shift);

        let mut buf = [0u8; MAX_REG_BYTES];
        let buf = &mut buf[..host.width.bytes()];
        encode(word, buf);
        bus.write_register(device, host.address, buf)
            .await
            .map_err(Error::Bus)?;

        if readable {
            self.store(host.address, word);
        }

        Ok(())
    }

    /// Drops the cached host word of `address`. Never performs I/O.
    pub fn invalidate(&mut self, address: u8) {
        if let Ok((_, host)) = self.resolve::<()>(address) {
            self.cache.remove(&host.address);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

fn decode(b: &[u8]) -> u16 {
    b.iter().fold(0u16, |word, byte| (word << 8) | *byte as u16)
}

fn encode(word: u16, out: &mut [u8]) {
    let be = word.to_be_bytes();
    out.copy_from_slice(&be[MAX_REG_BYTES - out.len()..]);
}
