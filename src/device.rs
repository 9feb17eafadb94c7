//! The shape every register-based sensor driver shares.
//!
//! A [`RegisterDevice`] owns the bus, the device's 7-bit address and its [`RegisterMap`]. Drivers
//! wrap it and add their domain methods on top.

use crate::bus::Bus;
use crate::error::Error;
use crate::register::{RegisterDef, RegisterMap};
use embedded_hal::i2c::SevenBitAddress;

/// Type alias used to simplify return types of register-based drivers
pub type DeviceResult<T, BusError> = Result<T, Error<BusError>>;

pub struct RegisterDevice<B, const N: usize> {
    bus: B,
    address: SevenBitAddress,
    default_address: SevenBitAddress,
    registers: RegisterMap<N>,
}

impl<B, const N: usize> RegisterDevice<B, N>
where
    B: Bus,
{
    pub fn new(bus: B, default_address: SevenBitAddress, defs: &'static [RegisterDef]) -> Self {
        RegisterDevice {
            bus,
            address: default_address,
            default_address,
            registers: RegisterMap::new(defs),
        }
    }

    /// Overrides the device address. `0` restores the default one.
    ///
    /// Changing address drops every cached word, they belonged to the previous device.
    pub fn set_address(&mut self, address: SevenBitAddress) {
        let address = if address == 0 { self.default_address } else { address };
        if address != self.address {
            self.registers.invalidate_all();
        }
        self.address = address;
    }

    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    pub async fn read_register(&mut self, address: u8) -> DeviceResult<u16, B::Error> {
        self.registers.read(&mut self.bus, self.address, address).await
    }

    pub async fn write_register(&mut self, address: u8, value: u16) -> DeviceResult<(), B::Error> {
        self.registers.write(&mut self.bus, self.address, address, value).await
    }

    pub fn invalidate(&mut self, address: u8) {
        self.registers.invalidate(address);
    }

    pub fn registers(&self) -> &RegisterMap<N> {
        &self.registers
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn release(self) -> B {
        self.bus
    }
}
