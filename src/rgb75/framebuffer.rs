//! Pixel storage shared by the drawing side and the row-scan interrupt.
//!
//! Pixels are atomics, so both sides touch them without locking. The interrupt only ever reads
//! the foreground buffer and drawing only writes the background one; with a single buffer both
//! are the same and a row may show a half-drawn frame, as on any unbuffered display.

use super::Rgba;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

pub struct FrameBuffers {
    width: usize,
    height: usize,
    double_buffer: bool,
    foreground: AtomicU8,
    /// `[buffer][y][x]`, flattened.
    pixels: Vec<AtomicU32>,
}

impl FrameBuffers {
    pub(crate) fn new(width: usize, height: usize, double_buffer: bool) -> Self {
        let count = if double_buffer { 2 } else { 1 };

        FrameBuffers {
            width,
            height,
            double_buffer,
            foreground: AtomicU8::new(0),
            pixels: (0..count * width * height).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_double_buffered(&self) -> bool {
        self.double_buffer
    }

    fn len(&self) -> usize {
        self.width * self.height
    }

    fn index(&self, frame: usize, x: usize, y: usize) -> usize {
        frame * self.len() + y * self.width + x
    }

    /// Buffer the interrupt latches.
    pub(crate) fn foreground(&self) -> usize {
        self.foreground.load(Ordering::Acquire) as usize
    }

    /// Buffer drawing goes to.
    pub(crate) fn background(&self) -> usize {
        let foreground = self.foreground();
        if self.double_buffer { 1 - foreground } else { foreground }
    }

    pub(crate) fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub(crate) fn get(&self, frame: usize, x: usize, y: usize) -> Rgba {
        Rgba::from_bits(self.pixels[self.index(frame, x, y)].load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, frame: usize, x: usize, y: usize, color: Rgba) {
        self.pixels[self.index(frame, x, y)].store(color.to_bits(), Ordering::Relaxed);
    }

    /// Makes the background the foreground.
    ///
    /// Background pixels still clear (alpha 0) first take the displayed color, so drawing
    /// accumulates across frames. The swap itself is one Release store, after which the old
    /// foreground is cleared as the next background.
    pub(crate) fn present(&self) {
        if !self.double_buffer {
            return;
        }

        let front = self.foreground();
        let back = 1 - front;
        let len = self.len();
        let (front_pixels, back_pixels) = (&self.pixels[front * len..][..len], &self.pixels[back * len..][..len]);
        for (b, f) in back_pixels.iter().zip(front_pixels) {
            if Rgba::from_bits(b.load(Ordering::Relaxed)).a == 0 {
                b.store(f.load(Ordering::Relaxed), Ordering::Relaxed);
            }
        }

        self.foreground.store(back as u8, Ordering::Release);
        self.clear(front);
    }

    pub(crate) fn clear(&self, frame: usize) {
        let len = self.len();
        if let Some(pixels) = self.pixels.get(frame * len..(frame + 1) * len) {
            pixels.iter().for_each(|p| p.store(0, Ordering::Relaxed));
        }
    }

    pub(crate) fn clear_all(&self) {
        self.pixels.iter().for_each(|p| p.store(0, Ordering::Relaxed));
    }
}
