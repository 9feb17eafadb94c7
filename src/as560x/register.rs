//! Register map of the AS5600 / AS5601.
//!
//! Addresses below `0xa0` are physical. From `0xa0` onward they name bitfields of `CONF` and
//! `STATUS`; the chip does not know about those.

use crate::register::{Attributes, InvalidRegisterField, RegisterDef, Width};

pub const DEFAULT_ADDRESS: u8 = 0x36;

/// Number of times ZPOS/MPOS have been burned. Read-only, 2 bits.
pub const ZMCO: u8 = 0x00;
pub const ZPOS: u8 = 0x01;
/// AS5600 only.
pub const MPOS: u8 = 0x03;
/// AS5600 only.
pub const MANG: u8 = 0x05;
pub const CONF: u8 = 0x07;
/// AS5601 only.
pub const ABN: u8 = 0x09;
/// AS5601 only.
pub const PUSHTHR: u8 = 0x0a;
pub const STATUS: u8 = 0x0b;
pub const RAW_ANGLE: u8 = 0x0c;
pub const ANGLE: u8 = 0x0e;
pub const AGC: u8 = 0x1a;
pub const MAGNITUDE: u8 = 0x1b;
pub const BURN: u8 = 0xff;

pub const WD: u8 = 0xa0;
pub const FTH: u8 = 0xa1;
pub const SF: u8 = 0xa2;
/// AS5600 only.
pub const PWMF: u8 = 0xa3;
/// AS5600 only.
pub const OUTS: u8 = 0xa4;
pub const HYST: u8 = 0xa5;
pub const PM: u8 = 0xa6;
pub const MD: u8 = 0xa7;
pub const ML: u8 = 0xa8;
pub const MH: u8 = 0xa9;

pub const STATUS_MH: u16 = 1 << 3;
pub const STATUS_ML: u16 = 1 << 4;
pub const STATUS_MD: u16 = 1 << 5;

/// `BURN_ANGLE` can be executed this many times over the chip's lifetime.
pub const BURN_ANGLE_COUNT_MAX: u16 = 3;

pub const AS5600_REGISTERS: &[RegisterDef] = &[
    RegisterDef::root(ZMCO, Width::One, 0b11, Attributes::READ_ONLY),
    RegisterDef::root(ZPOS, Width::Two, 0xfff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(MPOS, Width::Two, 0xfff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(MANG, Width::Two, 0xfff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(CONF, Width::Two, 0x3fff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(STATUS, Width::One, 0xff, Attributes::READ_ONLY),
    RegisterDef::root(RAW_ANGLE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(ANGLE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(AGC, Width::One, 0xff, Attributes::READ_ONLY),
    RegisterDef::root(MAGNITUDE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(BURN, Width::One, 0xff, Attributes::WRITE_ONLY),
    RegisterDef::bitfield(WD, CONF, 13, 0b1),
    RegisterDef::bitfield(FTH, CONF, 10, 0b111),
    RegisterDef::bitfield(SF, CONF, 8, 0b11),
    RegisterDef::bitfield(PWMF, CONF, 6, 0b11),
    RegisterDef::bitfield(OUTS, CONF, 4, 0b11),
    RegisterDef::bitfield(HYST, CONF, 2, 0b11),
    RegisterDef::bitfield(PM, CONF, 0, 0b11),
    RegisterDef::bitfield(MD, STATUS, 5, 0b1),
    RegisterDef::bitfield(ML, STATUS, 4, 0b1),
    RegisterDef::bitfield(MH, STATUS, 3, 0b1),
];

pub const AS5601_REGISTERS: &[RegisterDef] = &[
    RegisterDef::root(ZMCO, Width::One, 0b11, Attributes::READ_ONLY),
    RegisterDef::root(ZPOS, Width::Two, 0xfff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(CONF, Width::Two, 0x3fff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(ABN, Width::One, 0x0f, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(PUSHTHR, Width::One, 0xff, Attributes::READ_WRITE_PROGRAM),
    RegisterDef::root(STATUS, Width::One, 0xff, Attributes::READ_ONLY),
    RegisterDef::root(RAW_ANGLE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(ANGLE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(AGC, Width::One, 0xff, Attributes::READ_ONLY),
    RegisterDef::root(MAGNITUDE, Width::Two, 0xfff, Attributes::READ_ONLY),
    RegisterDef::root(BURN, Width::One, 0xff, Attributes::WRITE_ONLY),
    RegisterDef::bitfield(WD, CONF, 13, 0b1),
    RegisterDef::bitfield(FTH, CONF, 10, 0b111),
    RegisterDef::bitfield(SF, CONF, 8, 0b11),
    RegisterDef::bitfield(HYST, CONF, 2, 0b11),
    RegisterDef::bitfield(PM, CONF, 0, 0b11),
    RegisterDef::bitfield(MD, STATUS, 5, 0b1),
    RegisterDef::bitfield(ML, STATUS, 4, 0b1),
    RegisterDef::bitfield(MH, STATUS, 3, 0b1),
];

/// Declares a bitfield value enum, decodable from the raw field with `TryFrom<u16>`.
macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        $name:ident in $register:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl TryFrom<u16> for $name {
            type Error = InvalidRegisterField;

            fn try_from(field: u16) -> Result<Self, Self::Error> {
                match field {
                    $($value => Ok($name::$variant),)+
                    other => Err(InvalidRegisterField::new($register, other)),
                }
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> u16 {
                match value {
                    $($name::$variant => $value),+
                }
            }
        }
    };
}

field_enum! {
    /// Polling behaviour of the sensor, trading current draw for latency.
    PowerMode in PM {
        /// Always on, 6.5 mA max.
        Nominal = 0,
        /// 5 ms polling, 3.4 mA max.
        LowPower1 = 1,
        /// 20 ms polling, 1.8 mA max.
        LowPower2 = 2,
        /// 100 ms polling, 1.5 mA max.
        LowPower3 = 3,
    }
}

field_enum! {
    Hysteresis in HYST {
        Off = 0,
        Lsb1 = 1,
        Lsb2 = 2,
        Lsb3 = 3,
    }
}

field_enum! {
    /// Output of the OUT pin (AS5600 only).
    OutputStage in OUTS {
        /// 0% to 100% of VDD.
        AnalogFullRange = 0,
        /// 10% to 90% of VDD.
        AnalogReducedRange = 1,
        /// PWM at [`PwmFrequency`].
        DigitalPwm = 2,
    }
}

field_enum! {
    PwmFrequency in PWMF {
        Hz115 = 0,
        Hz230 = 1,
        Hz460 = 2,
        Hz920 = 3,
    }
}

field_enum! {
    /// Step response of the slow filter.
    SlowFilter in SF {
        X16 = 0,
        X8 = 1,
        X4 = 2,
        X2 = 3,
    }
}

field_enum! {
    FastFilterThreshold in FTH {
        /// Slow filter only.
        SlowOnly = 0,
        Lsb6 = 1,
        Lsb7 = 2,
        Lsb9 = 3,
        Lsb18 = 4,
        Lsb21 = 5,
        Lsb24 = 6,
        Lsb10 = 7,
    }
}

field_enum! {
    /// When on, the chip drops into low power mode 3 after a minute without movement.
    Watchdog in WD {
        Off = 0,
        On = 1,
    }
}

field_enum! {
    /// Positions per revolution on the A/B outputs (AS5601 only).
    AbnResolution in ABN {
        Positions8 = 0,
        Positions16 = 1,
        Positions32 = 2,
        Positions64 = 3,
        Positions128 = 4,
        Positions256 = 5,
        Positions512 = 6,
        Positions1024 = 7,
        Positions2048 = 8,
    }
}

/// Values for the `BURN` register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurnCommand {
    /// Makes ZPOS and MPOS permanent. At most [`BURN_ANGLE_COUNT_MAX`] times.
    Angle,
    /// Makes MANG and CONF permanent. Once only, which is not checked.
    Setting,
}

impl From<BurnCommand> for u16 {
    fn from(value: BurnCommand) -> u16 {
        match value {
            BurnCommand::Angle => 0x80,
            BurnCommand::Setting => 0x40,
        }
    }
}
