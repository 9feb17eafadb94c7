//! What the HUB75 engine needs from the platform.
//!
//! Single pins go through `embedded-hal`'s [`OutputPin`]. Everything that has to touch several
//! pins in one cycle (the six data lines, CLK, the row address) and the row-scan timer is left to
//! a [`NativePins`] implementation for the target, which can precompute port masks in
//! [`NativePins::set_pins`].

use bitflags::bitflags;
use core::convert::Infallible;
use embedded_hal::digital::OutputPin;

/// GPIO port and bit number of a pin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: u8,
    /// Bit inside the port's 32-bit output register.
    pub bit: u8,
}

impl PinId {
    pub const fn new(port: u8, bit: u8) -> Self {
        PinId { port, bit }
    }

    /// Bit mask of the pin in its port's output register.
    pub const fn mask(&self) -> u32 {
        1 << (self.bit & 0x1f)
    }
}

/// An output pin the matrix drives one at a time (OE, LAT, CLK, row address).
///
/// GPIO on the targets this is meant for cannot fail, hence `Infallible`.
pub trait Pin: OutputPin<Error = Infallible> {
    fn id(&self) -> PinId;
}

bitflags! {
    /// One bit of each color channel for the upper and the lower row.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct RgbBits: u8 {
        const R1 = 1 << 0;
        const G1 = 1 << 1;
        const B1 = 1 << 2;
        const R2 = 1 << 3;
        const G2 = 1 << 4;
        const B2 = 1 << 5;
    }
}

/// Target-specific multi-pin writes and the row-scan timer.
///
/// There is one HUB75 connector per board, so implementations are usually a zero-sized handle
/// over fixed peripherals.
pub trait NativePins {
    /// Precomputes the port masks. `rgb` is ordered R1, G1, B1, R2, G2, B2; `rows` is the row
    /// address, least significant line first.
    fn set_pins(&mut self, rgb: [PinId; 6], clk: PinId, rows: &[PinId]);

    /// Sets or clears all six data lines in one port write.
    fn set_rgb(&mut self, bits: RgbBits);

    /// Same as [`NativePins::set_rgb`] with a raw port mask.
    fn set_rgb_mask(&mut self, mask: u32);

    /// Sets CLK together with the data lines, then clears CLK. Only called when CLK shares the
    /// data lines' port.
    fn clk_rgb(&mut self, bits: RgbBits);

    /// Writes the row address lines in one port write.
    fn set_row(&mut self, row: usize);

    /// Whether `pins` share a port and the narrowest register width covering all of them.
    fn pin_group_alignment(&self, pins: &[PinId]) -> (bool, u8) {
        pin_group_alignment(pins)
    }

    /// Installs `isr` as the timer overflow handler. The timer stays stopped until
    /// [`NativePins::resume_timer`].
    fn init_timer(&mut self, isr: fn());

    /// Starts the timer counting from `value`, raising an interrupt every `period` ticks.
    fn resume_timer(&mut self, value: u32, period: u32);

    /// Stops the timer and returns its counter.
    fn pause_timer(&mut self) -> u32;
}

/// `(true, 8 | 16 | 32)` when every pin is on one port: 8 if they fit in one byte of the output
/// register, 16 if in two adjacent bytes, 32 otherwise. `(false, 0)` for mixed ports and
/// `(true, 0)` for no pins at all.
pub fn pin_group_alignment(pins: &[PinId]) -> (bool, u8) {
    let Some(first) = pins.first() else {
        return (true, 0);
    };
    if pins.iter().any(|p| p.port != first.port) {
        return (false, 0);
    }

    let bits = pins.iter().fold(0u32, |acc, p| acc | p.mask());
    let bytes = (0..4).filter(|i| bits & (0xff << (i * 8)) != 0).fold(0u8, |acc, i| acc | 1 << i);

    match bytes {
        0b0001 | 0b0010 | 0b0100 | 0b1000 => (true, 8),
        0b0011 | 0b0110 | 0b1100 => (true, 16),
        _ => (true, 32),
    }
}
