//! Driver for chains of HUB75 RGB LED matrix panels, bit-banged over GPIO.
//!
//! Two rows, one in each half of the matrix, are driven at a time. A timer interrupt walks through
//! the row pairs and, for every pair, through the bitplanes of the color depth, holding each
//! bitplane twice as long as the previous one (binary code modulation).
//!
//! Wiring requirements:
//! - The six RGB data lines must be on one GPIO port.
//! - Row address lines on one port, and CLK on the data lines' port, are optional but make the
//!   interrupt handler cheaper.
//!
//! The driver comes in two halves. A [`RowScanner`] owns the pins and the timer and lives in a
//! [`MatrixSlot`] `static` for the interrupt handler. A [`Hub75`] handle draws into the
//! framebuffers the scanner allocated; those are atomics, so drawing never blocks the interrupt.
//!
//! ```ignore
//! static MATRIX: MatrixSlot<RowScanner<Board, Gpio, 4>> = MatrixSlot::new();
//!
//! fn row_isr() {
//!     MATRIX.on_interrupt();
//! }
//!
//! let mut scanner = RowScanner::new(Board, oe, lat, clk, rgb, rows);
//! let frames = scanner.configure(Config::default().double_buffer(true), row_isr)?;
//! MATRIX.install(scanner);
//!
//! let mut matrix = Hub75::new(frames, &MATRIX);
//! matrix.set_pixel(1, 1, Rgba::rgb(0xff, 0, 0));
//! matrix.display();
//! ```

pub mod framebuffer;
pub mod native;
pub mod scan;
pub mod slot;

pub use framebuffer::FrameBuffers;
pub use native::{NativePins, Pin, PinId, RgbBits};
pub use scan::{MAX_COLOR_DEPTH, RowScanner};
pub use slot::{MatrixSlot, RowScan, ScanControl};

use crate::error::MatrixError;
use alloc::sync::Arc;

/// Timer period of bitplane 0. Long enough to clock out one row of a 64 px chain from the ISR.
pub const BASE_PERIOD: u32 = 1800;

pub type MatrixResult<T> = Result<T, MatrixError>;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const CLEAR: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba::new(r, g, b, 0xff)
    }

    pub(crate) const fn to_bits(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    pub(crate) const fn from_bits(bits: u32) -> Self {
        let [r, g, b, a] = bits.to_le_bytes();
        Rgba { r, g, b, a }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total width of the chain in pixels. 0 means 64.
    pub width: usize,
    /// Total height of the chain in pixels. 0 means as tall as the row address lines allow.
    pub height: usize,
    /// Bits per color channel, at most [`MAX_COLOR_DEPTH`]. 0 means 4.
    pub color_depth: u8,
    pub double_buffer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: 64,
            height: 32,
            color_depth: 4,
            double_buffer: false,
        }
    }
}

impl Config {
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;

        self
    }

    pub fn height(mut self, height: usize) -> Self {
        self.height = height;

        self
    }

    pub fn color_depth(mut self, depth: u8) -> Self {
        self.color_depth = depth;

        self
    }

    pub fn double_buffer(mut self, enabled: bool) -> Self {
        self.double_buffer = enabled;

        self
    }
}

/// Position of the row scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RowPlane {
    frame: u32,
    previous_upper_row: usize,
    upper_row: usize,
    lower_row: usize,
    bitplane: u8,
    timer_period: u32,
}

impl RowPlane {
    /// Completed scans of the whole matrix.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn upper_row(&self) -> usize {
        self.upper_row
    }

    pub fn lower_row(&self) -> usize {
        self.lower_row
    }

    pub fn bitplane(&self) -> u8 {
        self.bitplane
    }

    pub fn timer_period(&self) -> u32 {
        self.timer_period
    }
}

/// Drawing side of the driver.
///
/// Holds the framebuffers shared with a [`RowScanner`] and whatever starts and stops its timer,
/// normally the [`MatrixSlot`] the scanner was installed in.
pub struct Hub75<'a, C> {
    frames: Arc<FrameBuffers>,
    scan: &'a C,
}

impl<'a, C: ScanControl> Hub75<'a, C> {
    pub fn new(frames: Arc<FrameBuffers>, scan: &'a C) -> Self {
        Hub75 { frames, scan }
    }

    fn position(&self, x: i16, y: i16) -> Option<(usize, usize)> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);

        self.frames.contains(x, y).then_some((x, y))
    }

    /// Draws into the background buffer, which is the displayed one without double buffering.
    /// Coordinates off the matrix are ignored.
    pub fn set_pixel(&mut self, x: i16, y: i16, color: Rgba) {
        if let Some((x, y)) = self.position(x, y) {
            self.frames.set(self.frames.background(), x, y, color);
        }
    }

    /// Color currently on the display at `(x, y)`, [`Rgba::CLEAR`] off the matrix.
    pub fn pixel(&self, x: i16, y: i16) -> Rgba {
        match self.position(x, y) {
            Some((x, y)) => self.frames.get(self.frames.foreground(), x, y),
            None => Rgba::CLEAR,
        }
    }

    /// Shows what has been drawn.
    ///
    /// With double buffering the background buffer becomes the foreground. Pixels left clear in
    /// it keep what was displayed before, so drawing accumulates across frames until
    /// [`Hub75::clear_display`]. The new background starts out clear. Without double buffering
    /// this only makes sure the scan timer runs.
    pub fn display(&mut self) {
        if self.frames.is_double_buffered() {
            self.frames.present();
        } else {
            self.scan.resume();
        }
    }

    /// Clears every framebuffer, so the display goes dark at once.
    pub fn clear_display(&mut self) {
        self.frames.clear_all();
    }

    /// Stops the row scan. The panel keeps showing whatever row was lit last.
    pub fn pause(&mut self) {
        self.scan.pause();
    }

    pub fn resume(&mut self) {
        self.scan.resume();
    }

    /// `(width, height)` in pixels. A dimension past `i16::MAX` cannot be addressed through
    /// [`Hub75::set_pixel`] and reads as `i16::MAX`.
    pub fn size(&self) -> (i16, i16) {
        let clamp = |n: usize| i16::try_from(n).unwrap_or(i16::MAX);

        (clamp(self.frames.width()), clamp(self.frames.height()))
    }

    pub fn frames(&self) -> &Arc<FrameBuffers> {
        &self.frames
    }
}
