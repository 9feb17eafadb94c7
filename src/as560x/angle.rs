//! Conversions between the sensor's 12-bit angles and caller units.

use core::f32::consts::TAU;
use micromath::F32Ext;

/// Largest valid native angle.
pub const NATIVE_ANGLE_MAX: u16 = (1 << 12) - 1;
/// Number of distinct native angles. Also used as the "full circle" max angle.
pub const NATIVE_ANGLE_RANGE: u16 = 1 << 12;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AngleUnit {
    /// 12-bit device units, `0..=4095`.
    Native,
    /// Whole degrees using integer arithmetic, `0..360`.
    DegreesInt,
    DegreesFloat,
    Radians,
}

/// An angle in the unit it was requested in.
///
/// `whole` is the integer form (truncated for float units), `value` the floating point one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Angle {
    whole: u16,
    value: f32,
}

impl Angle {
    pub fn whole(&self) -> u16 {
        self.whole
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Converts a native `angle` measured over a range of `max_angle` native steps.
///
/// `max_angle == 0` means the full circle. On a narrowed range, [`AngleUnit::DegreesInt`]
/// first converts `max_angle` to whole degrees and scales from there, which loses precision.
pub fn from_native(angle: u16, max_angle: u16, unit: AngleUnit) -> Angle {
    let max_angle = if max_angle == 0 { NATIVE_ANGLE_RANGE } else { max_angle };
    let full = max_angle == NATIVE_ANGLE_RANGE;

    match unit {
        AngleUnit::Native => Angle { whole: angle, value: angle as f32 },
        AngleUnit::DegreesInt => {
            let degrees = if full {
                (angle as u32 * 360) >> 12
            } else {
                let max_degrees = from_native(max_angle, NATIVE_ANGLE_RANGE, unit).whole as u32;
                angle as u32 * max_degrees / NATIVE_ANGLE_RANGE as u32
            };
            Angle { whole: degrees as u16, value: degrees as f32 }
        }
        AngleUnit::DegreesFloat | AngleUnit::Radians => {
            let circle = if unit == AngleUnit::Radians { TAU } else { 360.0 };
            let span = if full {
                circle
            } else {
                max_angle as f32 * circle / NATIVE_ANGLE_RANGE as f32
            };
            let value = angle as f32 * span / NATIVE_ANGLE_RANGE as f32;
            Angle { whole: value as u16, value }
        }
    }
}

/// Converts `angle` in `unit` to a native angle, wrapping into one turn first.
///
/// The result is clamped to [`NATIVE_ANGLE_MAX`].
pub fn to_native(angle: f32, unit: AngleUnit) -> u16 {
    let native = match unit {
        AngleUnit::Native => angle as u16,
        AngleUnit::DegreesInt | AngleUnit::DegreesFloat => scale_turn(angle, 360.0),
        AngleUnit::Radians => scale_turn(angle, TAU),
    };

    native.min(NATIVE_ANGLE_MAX)
}

fn scale_turn(angle: f32, circle: f32) -> u16 {
    let mut angle = angle % circle;
    if angle < 0.0 {
        angle += circle;
    }

    F32Ext::round(angle * NATIVE_ANGLE_RANGE as f32 / circle) as u16
}
