//! The half of the driver that belongs to the row-scan interrupt.

use super::framebuffer::FrameBuffers;
use super::native::{NativePins, Pin, PinId, RgbBits};
use super::{BASE_PERIOD, Config, MatrixResult, RowPlane};
use crate::error::MatrixError;
use alloc::sync::Arc;
use embedded_hal::digital::{OutputPin, PinState};

/// Deepest color a pixel's 8-bit channels can feed.
pub const MAX_COLOR_DEPTH: u8 = 8;

/// Owns the connector pins and the timer, and shifts out one bitplane of one row pair per
/// interrupt.
///
/// Meant to live in a [`MatrixSlot`](super::MatrixSlot) so the interrupt can reach it; drawing
/// goes through a [`Hub75`](super::Hub75) handle on the framebuffers returned by
/// [`RowScanner::configure`].
pub struct RowScanner<N, P, const A: usize> {
    native: N,
    oe: P,
    lat: P,
    clk: P,
    rgb: [P; 6],
    rgb_ids: [PinId; 6],
    rows: [P; A],
    one_addr_port: bool,
    clk_data_port: bool,
    color_depth: u8,
    frames: Option<Arc<FrameBuffers>>,
    scan: RowPlane,
    timer_value: u32,
}

impl<N, P, const A: usize> RowScanner<N, P, A>
where
    N: NativePins,
    P: Pin,
{
    /// Takes the pins of the connector. `rgb` is ordered R1, G1, B1, R2, G2, B2 and `rows` are
    /// the address lines A, B, C... so a 32 px tall chain needs 4 of them.
    ///
    /// Nothing is driven until [`RowScanner::configure`].
    pub fn new(mut native: N, oe: P, lat: P, clk: P, rgb: [P; 6], rows: [P; A]) -> Self {
        let rgb_ids = rgb.each_ref().map(|p| p.id());
        let row_ids = rows.each_ref().map(|p| p.id());
        native.set_pins(rgb_ids, clk.id(), &row_ids);

        RowScanner {
            native,
            oe,
            lat,
            clk,
            rgb,
            rgb_ids,
            rows,
            one_addr_port: false,
            clk_data_port: false,
            color_depth: Config::default().color_depth,
            frames: None,
            scan: RowPlane {
                frame: 0,
                previous_upper_row: 0,
                upper_row: 0,
                lower_row: 0,
                bitplane: 0,
                timer_period: BASE_PERIOD,
            },
            timer_value: 0,
        }
    }

    /// Tallest chain the row address lines can reach.
    pub const fn max_height() -> usize {
        1 << (A + 1)
    }

    /// Checks the wiring, allocates the framebuffers, clears the panels and installs `isr` as the
    /// row-scan timer handler. `isr` must end up calling [`RowScanner::handle_row`] on this
    /// scanner.
    ///
    /// The display stays dark until the timer is resumed, usually by
    /// [`Hub75::display`](super::Hub75::display).
    pub fn configure(&mut self, config: Config, isr: fn()) -> MatrixResult<Arc<FrameBuffers>> {
        let defaults = Config::default();
        let width = if config.width == 0 { defaults.width } else { config.width };
        let height = match config.height {
            0 => Self::max_height(),
            h if h > Self::max_height() || h % 2 != 0 => return Err(MatrixError::InvalidHeight),
            h => h,
        };
        let color_depth = match config.color_depth {
            0 => defaults.color_depth,
            d if d > MAX_COLOR_DEPTH => return Err(MatrixError::InvalidColorDepth),
            d => d,
        };

        let (same, alignment) = self.native.pin_group_alignment(&self.rgb_ids);
        if !same || alignment == 0 {
            return Err(MatrixError::InvalidDataPins);
        }
        let row_ids = self.rows.each_ref().map(|p| p.id());
        self.one_addr_port = self.native.pin_group_alignment(&row_ids).0;
        self.clk_data_port = self.native.pin_group_alignment(&[self.rgb_ids[0], self.clk.id()]).0;
        self.color_depth = color_depth;

        let frames = Arc::new(FrameBuffers::new(width, height, config.double_buffer));
        self.frames = Some(frames.clone());

        info!(
            "hub75 {}x{}, depth {}, double buffer {}, addr port {}, clk on data port {}",
            width,
            height,
            color_depth,
            config.double_buffer,
            self.one_addr_port,
            self.clk_data_port
        );

        self.initialize(width, height, isr);

        Ok(frames)
    }

    fn initialize(&mut self, width: usize, height: usize, isr: fn()) {
        let Ok(()) = self.oe.set_high();
        let Ok(()) = self.lat.set_low();
        let Ok(()) = self.clk.set_low();
        for pin in self.rgb.iter_mut().chain(self.rows.iter_mut()) {
            let Ok(()) = pin.set_low();
        }

        // Shift zeros through the whole chain and latch them.
        for _ in 0..width {
            let Ok(()) = self.clk.set_high();
            let Ok(()) = self.clk.set_low();
        }
        let Ok(()) = self.lat.set_high();
        let Ok(()) = self.lat.set_low();

        // Positioned so the first interrupt rolls over to row 0, bitplane 0.
        let half = height / 2;
        self.scan = RowPlane {
            frame: 0,
            previous_upper_row: half,
            upper_row: half,
            lower_row: height,
            bitplane: self.color_depth,
            timer_period: BASE_PERIOD,
        };

        self.native.init_timer(isr);
    }

    /// Row-scan interrupt handler.
    ///
    /// Latches the row shifted out during the previous interrupt, advances the scan and shifts
    /// out the next bitplane while that row is lit.
    pub fn handle_row(&mut self) {
        let Some(frames) = self.frames.clone() else {
            return;
        };

        self.native.pause_timer();
        self.native.resume_timer(0, self.scan.timer_period);

        let Ok(()) = self.oe.set_high();
        let Ok(()) = self.lat.set_high();

        self.select_row(self.scan.upper_row, frames.height());
        self.increment(frames.height());

        let Ok(()) = self.lat.set_low();
        let Ok(()) = self.oe.set_low();

        let frame = frames.foreground();
        for x in 0..frames.width() {
            let bits = self.rgb_bits(&frames, frame, x);
            if self.clk_data_port {
                self.native.clk_rgb(bits);
            } else {
                self.native.set_rgb(bits);
                let Ok(()) = self.clk.set_high();
                let Ok(()) = self.clk.set_low();
                self.native.set_rgb_mask(0);
            }
        }
    }

    fn increment(&mut self, height: usize) {
        let scan = &mut self.scan;
        scan.bitplane += 1;
        scan.timer_period = scan.timer_period.saturating_mul(2);

        if scan.bitplane >= self.color_depth {
            scan.bitplane = 0;
            scan.timer_period = BASE_PERIOD;
            scan.upper_row += 1;
            scan.lower_row += 1;

            let half = height / 2;
            if scan.upper_row >= half {
                scan.upper_row = 0;
                scan.lower_row = half;
                scan.frame = scan.frame.wrapping_add(1);
            }
        }
    }

    /// Drives the address lines for the pair containing `row`, from either half.
    fn select_row(&mut self, row: usize, height: usize) {
        let half = height / 2;
        if row >= height {
            return;
        }

        let row = if row >= half { row - half } else { row };
        if row == self.scan.previous_upper_row {
            return;
        }
        self.scan.previous_upper_row = row;

        if self.one_addr_port {
            self.native.set_row(row);
        } else {
            for (i, pin) in self.rows.iter_mut().enumerate() {
                let Ok(()) = pin.set_state(PinState::from(row & (1 << i) != 0));
            }
        }
    }

    /// Current bitplane's bit of each channel, for column `x` of both active rows.
    fn rgb_bits(&self, frames: &FrameBuffers, frame: usize, x: usize) -> RgbBits {
        let plane = self.scan.bitplane;
        if plane >= MAX_COLOR_DEPTH {
            return RgbBits::empty();
        }

        let upper = frames.get(frame, x, self.scan.upper_row);
        let lower = frames.get(frame, x, self.scan.lower_row);
        let bit = |c: u8, flag: RgbBits| if c >> plane & 1 != 0 { flag } else { RgbBits::empty() };

        bit(upper.r, RgbBits::R1)
            | bit(upper.g, RgbBits::G1)
            | bit(upper.b, RgbBits::B1)
            | bit(lower.r, RgbBits::R2)
            | bit(lower.g, RgbBits::G2)
            | bit(lower.b, RgbBits::B2)
    }

    /// Stops the row scan, remembering the timer's position. The panel keeps showing whatever
    /// row was lit last.
    pub fn pause(&mut self) {
        self.timer_value = self.native.pause_timer();
    }

    /// Restarts the row scan where [`RowScanner::pause`] left it.
    pub fn resume(&mut self) {
        self.native.resume_timer(self.timer_value, self.scan.timer_period);
    }

    pub fn frame_index(&self) -> u32 {
        self.scan.frame
    }

    pub fn row_plane(&self) -> RowPlane {
        self.scan
    }

    pub fn release(self) -> (N, P, P, P, [P; 6], [P; A]) {
        (self.native, self.oe, self.lat, self.clk, self.rgb, self.rows)
    }
}
