//! Driver for the ams AS5600 / AS5601 on-axis magnetic rotary position sensors.
//!
//! Both variants share most of their register map and behaviour. The AS5600 can narrow its 12-bit
//! output onto a sub-range of the circle, delimited by ZPOS and either MPOS or MANG. The driver
//! keeps track of that range (the *effective max angle*) so that [`As560x::angle`] can report
//! real-world units.
//!
//! ```rust
//! # use embedded_hal_async::delay::DelayNs;
//! # use embedded_hal_async::i2c::I2c;
//! use periph_core::as560x::{As5600Device, AngleUnit, Config};
//! # async fn demo<I: I2c, D: DelayNs>(i2c: I, delay: D) -> Result<(), periph_core::Error<I::Error>> {
//! let mut sensor = As5600Device::new_i2c(i2c, delay, Config::default()).await?;
//! let degrees = sensor.angle(AngleUnit::DegreesFloat).await?.value();
//! # Ok(())
//! # }
//! ```

pub mod angle;
pub mod register;

pub use angle::{Angle, AngleUnit, NATIVE_ANGLE_MAX, NATIVE_ANGLE_RANGE};
pub use register::{
    AbnResolution, BurnCommand, FastFilterThreshold, Hysteresis, OutputStage, PowerMode,
    PwmFrequency, SlowFilter, Watchdog,
};

use crate::bus::{Bus, I2c};
use crate::device::RegisterDevice;
use crate::error::Error;
use crate::register::{InvalidRegisterField, RegisterDef};
use core::marker::PhantomData;
use embedded_hal_async::delay::DelayNs;
use register::*;

/// Type alias used to simplify return types throughout the driver
pub type As560xResult<T, BusError> = Result<T, Error<BusError>>;

/// Writable roots are the only ones cached; there are four per variant.
const CACHE_SLOTS: usize = 4;

/// Settling time after writing ZPOS, MPOS or MANG. The datasheet asks for at least 1 ms.
const RANGE_SETTLE_MS: u32 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// 7-bit I2C address. `0` selects [`register::DEFAULT_ADDRESS`].
    pub address: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config { address: DEFAULT_ADDRESS }
    }
}

impl Config {
    pub fn address(mut self, address: u8) -> Self {
        self.address = address;

        self
    }
}

/// Distinguishes the chip variants at the type level.
pub trait Variant {
    const REGISTERS: &'static [RegisterDef];
    /// Whether MPOS and MANG exist, i.e. the output range can be narrowed.
    const HAS_RANGE_REGISTERS: bool;
}

pub struct As5600;
pub struct As5601;

impl Variant for As5600 {
    const REGISTERS: &'static [RegisterDef] = AS5600_REGISTERS;
    const HAS_RANGE_REGISTERS: bool = true;
}

impl Variant for As5601 {
    const REGISTERS: &'static [RegisterDef] = AS5601_REGISTERS;
    const HAS_RANGE_REGISTERS: bool = false;
}

pub type As5600Device<B, D> = As560x<B, D, As5600>;
pub type As5601Device<B, D> = As560x<B, D, As5601>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagnetStrength {
    /// AGC maximum gain overflow. Move the magnet closer.
    TooWeak,
    Ok,
    /// AGC minimum gain overflow. Move the magnet further away.
    TooStrong,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MagnetStatus {
    pub detected: bool,
    pub strength: MagnetStrength,
}

/// Main AS560x driver struct
pub struct As560x<B, D, V> {
    device: RegisterDevice<B, CACHE_SLOTS>,
    delay: D,
    max_angle: u16,
    _variant: PhantomData<V>,
}

impl<T, D, V> As560x<I2c<T>, D, V>
where
    T: embedded_hal_async::i2c::I2c,
    D: DelayNs,
    V: Variant,
{
    /// Creates the driver on an I2C controller and applies `config`.
    pub async fn new_i2c(i2c: T, delay: D, config: Config) -> As560xResult<Self, <I2c<T> as Bus>::Error> {
        let mut sensor = Self::new(I2c::new(i2c), delay);
        sensor.configure(config).await?;

        Ok(sensor)
    }
}

impl<B, D, V> As560x<B, D, V>
where
    B: Bus,
    D: DelayNs,
    V: Variant,
{
    /// Creates the driver without touching the bus. Call [`As560x::configure`] before use.
    pub fn new(bus: B, delay: D) -> Self {
        As560x {
            device: RegisterDevice::new(bus, DEFAULT_ADDRESS, V::REGISTERS),
            delay,
            max_angle: NATIVE_ANGLE_RANGE,
            _variant: PhantomData,
        }
    }

    /// Applies the address override and derives the effective max angle from whatever ZPOS,
    /// MPOS and MANG currently hold, burned or not.
    pub async fn configure(&mut self, config: Config) -> As560xResult<(), B::Error> {
        self.device.set_address(config.address);

        self.max_angle = if V::HAS_RANGE_REGISTERS {
            let mpos = self.read_register(MPOS).await?;
            let mang = self.read_register(MANG).await?;
            // Read for caching, so later range recomputations do not depend on it.
            let zpos = self.read_register(ZPOS).await?;

            if mpos != 0 {
                span(zpos, mpos)
            } else if mang != 0 {
                mang
            } else {
                NATIVE_ANGLE_RANGE
            }
        } else {
            NATIVE_ANGLE_RANGE
        };

        debug!("as560x at {} configured, max angle {}", self.device.address(), self.max_angle);

        Ok(())
    }

    pub async fn read_register(&mut self, address: u8) -> As560xResult<u16, B::Error> {
        self.device.read_register(address).await
    }

    /// Writes a register or bitfield.
    ///
    /// Writing ZPOS, MPOS or MANG on a variant that has MPOS/MANG changes the output range: the
    /// cached copy of the register it may have altered is dropped, and after the settling time
    /// the effective max angle is recomputed.
    pub async fn write_register(&mut self, address: u8, value: u16) -> As560xResult<(), B::Error> {
        self.device.write_register(address, value).await?;

        if !V::HAS_RANGE_REGISTERS {
            return Ok(());
        }
        let stale = match address {
            ZPOS => MPOS,
            MPOS => MANG,
            MANG => MPOS,
            _ => return Ok(()),
        };
        self.device.invalidate(stale);
        self.delay.delay_ms(RANGE_SETTLE_MS).await;

        self.max_angle = self.recompute_max_angle(address, value).await?;

        Ok(())
    }

    async fn recompute_max_angle(&mut self, written: u8, value: u16) -> As560xResult<u16, B::Error> {
        // The chip keeps only the 12-bit field.
        let value = value & NATIVE_ANGLE_MAX;
        let max = match written {
            MANG => value,
            MPOS => {
                let zpos = self.read_register(ZPOS).await?;
                span(zpos, value)
            }
            _ => {
                let mpos = self.read_register(MPOS).await?;
                if mpos != 0 {
                    span(value, mpos)
                } else {
                    self.read_register(MANG).await?
                }
            }
        };

        Ok(if max == 0 { NATIVE_ANGLE_RANGE } else { max })
    }

    /// Native span of the output range, `1..=4096`.
    pub fn effective_max_angle(&self) -> u16 {
        self.max_angle
    }

    pub async fn zero_position(&mut self, unit: AngleUnit) -> As560xResult<Angle, B::Error> {
        let zpos = self.read_register(ZPOS).await?;

        Ok(angle::from_native(zpos, NATIVE_ANGLE_RANGE, unit))
    }

    pub async fn set_zero_position(&mut self, zpos: f32, unit: AngleUnit) -> As560xResult<(), B::Error> {
        self.write_register(ZPOS, angle::to_native(zpos, unit)).await
    }

    /// RAW_ANGLE, unaffected by ZPOS and the output range.
    pub async fn raw_angle(&mut self, unit: AngleUnit) -> As560xResult<Angle, B::Error> {
        let raw = self.read_register(RAW_ANGLE).await?;

        Ok(angle::from_native(raw, NATIVE_ANGLE_RANGE, unit))
    }

    /// ANGLE, relative to ZPOS and scaled over the effective max angle.
    pub async fn angle(&mut self, unit: AngleUnit) -> As560xResult<Angle, B::Error> {
        let angle = self.read_register(ANGLE).await?;

        Ok(angle::from_native(angle, self.max_angle, unit))
    }

    pub async fn magnet_status(&mut self) -> As560xResult<MagnetStatus, B::Error> {
        let status = self.read_register(STATUS).await?;

        let strength = if status & STATUS_ML != 0 {
            MagnetStrength::TooWeak
        } else if status & STATUS_MH != 0 {
            MagnetStrength::TooStrong
        } else {
            MagnetStrength::Ok
        };

        Ok(MagnetStatus { detected: status & STATUS_MD != 0, strength })
    }

    /// Automatic gain control value.
    pub async fn agc(&mut self) -> As560xResult<u8, B::Error> {
        Ok(self.read_register(AGC).await? as u8)
    }

    pub async fn magnitude(&mut self) -> As560xResult<u16, B::Error> {
        self.read_register(MAGNITUDE).await
    }

    /// How many times [`BurnCommand::Angle`] has been executed (ZMCO).
    pub async fn burn_count(&mut self) -> As560xResult<u8, B::Error> {
        Ok(self.read_register(ZMCO).await? as u8)
    }

    /// Permanently programs the chip. There is no undo.
    ///
    /// [`BurnCommand::Angle`] is refused with [`Error::MaxBurnAngleReached`] once ZMCO reports the
    /// quota is used up. [`BurnCommand::Setting`] is not guarded.
    pub async fn burn(&mut self, command: BurnCommand) -> As560xResult<(), B::Error> {
        if command == BurnCommand::Angle {
            let burns = self.read_register(ZMCO).await?;
            if burns >= BURN_ANGLE_COUNT_MAX {
                warn!("BURN_ANGLE refused, already burned {} times", burns);
                return Err(Error::MaxBurnAngleReached);
            }
        }

        self.write_register(BURN, command.into()).await
    }

    async fn field<F>(&mut self, address: u8) -> As560xResult<F, B::Error>
    where
        F: TryFrom<u16, Error = InvalidRegisterField>,
    {
        let raw = self.read_register(address).await?;

        Ok(F::try_from(raw)?)
    }

    pub async fn power_mode(&mut self) -> As560xResult<PowerMode, B::Error> {
        self.field(PM).await
    }

    pub async fn set_power_mode(&mut self, mode: PowerMode) -> As560xResult<(), B::Error> {
        self.write_register(PM, mode.into()).await
    }

    pub async fn hysteresis(&mut self) -> As560xResult<Hysteresis, B::Error> {
        self.field(HYST).await
    }

    pub async fn set_hysteresis(&mut self, hysteresis: Hysteresis) -> As560xResult<(), B::Error> {
        self.write_register(HYST, hysteresis.into()).await
    }

    pub async fn slow_filter(&mut self) -> As560xResult<SlowFilter, B::Error> {
        self.field(SF).await
    }

    pub async fn set_slow_filter(&mut self, filter: SlowFilter) -> As560xResult<(), B::Error> {
        self.write_register(SF, filter.into()).await
    }

    pub async fn fast_filter_threshold(&mut self) -> As560xResult<FastFilterThreshold, B::Error> {
        self.field(FTH).await
    }

    pub async fn set_fast_filter_threshold(&mut self, threshold: FastFilterThreshold) -> As560xResult<(), B::Error> {
        self.write_register(FTH, threshold.into()).await
    }

    pub async fn watchdog(&mut self) -> As560xResult<Watchdog, B::Error> {
        self.field(WD).await
    }

    pub async fn set_watchdog(&mut self, watchdog: Watchdog) -> As560xResult<(), B::Error> {
        self.write_register(WD, watchdog.into()).await
    }

    pub fn release(self) -> (B, D) {
        (self.device.release(), self.delay)
    }
}

impl<B, D> As560x<B, D, As5600>
where
    B: Bus,
    D: DelayNs,
{
    pub async fn max_position(&mut self, unit: AngleUnit) -> As560xResult<Angle, B::Error> {
        let mpos = self.read_register(MPOS).await?;

        Ok(angle::from_native(mpos, NATIVE_ANGLE_RANGE, unit))
    }

    pub async fn set_max_position(&mut self, mpos: f32, unit: AngleUnit) -> As560xResult<(), B::Error> {
        self.write_register(MPOS, angle::to_native(mpos, unit)).await
    }

    pub async fn max_angle(&mut self, unit: AngleUnit) -> As560xResult<Angle, B::Error> {
        let mang = self.read_register(MANG).await?;

        Ok(angle::from_native(mang, NATIVE_ANGLE_RANGE, unit))
    }

    pub async fn set_max_angle(&mut self, mang: f32, unit: AngleUnit) -> As560xResult<(), B::Error> {
        self.write_register(MANG, angle::to_native(mang, unit)).await
    }

    pub async fn output_stage(&mut self) -> As560xResult<OutputStage, B::Error> {
        self.field(OUTS).await
    }

    pub async fn set_output_stage(&mut self, stage: OutputStage) -> As560xResult<(), B::Error> {
        self.write_register(OUTS, stage.into()).await
    }

    pub async fn pwm_frequency(&mut self) -> As560xResult<PwmFrequency, B::Error> {
        self.field(PWMF).await
    }

    pub async fn set_pwm_frequency(&mut self, frequency: PwmFrequency) -> As560xResult<(), B::Error> {
        self.write_register(PWMF, frequency.into()).await
    }
}

impl<B, D> As560x<B, D, As5601>
where
    B: Bus,
    D: DelayNs,
{
    pub async fn abn_resolution(&mut self) -> As560xResult<AbnResolution, B::Error> {
        self.field(ABN).await
    }

    pub async fn set_abn_resolution(&mut self, resolution: AbnResolution) -> As560xResult<(), B::Error> {
        self.write_register(ABN, resolution.into()).await
    }

    /// Push-button threshold on the AGC/MAGNITUDE change.
    pub async fn push_threshold(&mut self) -> As560xResult<u8, B::Error> {
        Ok(self.read_register(PUSHTHR).await? as u8)
    }

    pub async fn set_push_threshold(&mut self, threshold: u8) -> As560xResult<(), B::Error> {
        self.write_register(PUSHTHR, threshold as u16).await
    }
}

/// Native distance from `zpos` forward to `mpos`, across zero if needed.
fn span(zpos: u16, mpos: u16) -> u16 {
    let span = (mpos & NATIVE_ANGLE_MAX) as i32 - (zpos & NATIVE_ANGLE_MAX) as i32;
    if span < 0 {
        (span + NATIVE_ANGLE_RANGE as i32) as u16
    } else {
        span as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, FakeDelay};

    fn be(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }

    fn bus_with_range(zpos: u16, mpos: u16, mang: u16) -> FakeBus {
        FakeBus::new(DEFAULT_ADDRESS)
            .with_register(ZPOS, &be(zpos))
            .with_register(MPOS, &be(mpos))
            .with_register(MANG, &be(mang))
    }

    async fn configured(bus: FakeBus) -> As5600Device<FakeBus, FakeDelay> {
        let mut sensor = As5600Device::new(bus, FakeDelay::new());
        sensor.configure(Config::default()).await.unwrap();
        sensor
    }

    #[tokio::test]
    async fn max_angle_is_derived_at_configure() {
        let cases = [
            ((0, 0, 0), 4096),
            ((100, 200, 0), 100),
            ((100, 200, 1000), 100),
            ((4000, 100, 0), 196),
            ((0, 0, 512), 512),
        ];

        for ((zpos, mpos, mang), expected) in cases {
            let sensor = configured(bus_with_range(zpos, mpos, mang)).await;
            assert_eq!(expected, sensor.effective_max_angle());
        }
    }

    #[tokio::test]
    async fn as5601_always_uses_the_full_range() {
        let mut sensor = As5601Device::new(FakeBus::new(DEFAULT_ADDRESS), FakeDelay::new());
        sensor.configure(Config::default()).await.unwrap();
        sensor.write_register(ZPOS, 1000).await.unwrap();

        assert_eq!(NATIVE_ANGLE_RANGE, sensor.effective_max_angle());
        assert_eq!(Err(Error::RegisterNotFound), sensor.read_register(MPOS).await);
    }

    #[tokio::test]
    async fn writing_zpos_rereads_mpos() {
        let mut sensor = configured(bus_with_range(100, 200, 0)).await;
        // MPOS changed behind the cached copy.
        sensor.device.bus_mut().set_register(MPOS, &be(300));

        sensor.write_register(ZPOS, 50).await.unwrap();

        assert_eq!(250, sensor.effective_max_angle());
        let (_, delay) = sensor.release();
        assert!(delay.elapsed_ms() >= 1);
    }

    #[tokio::test]
    async fn writing_zpos_falls_back_to_mang() {
        let mut sensor = configured(bus_with_range(0, 0, 512)).await;

        sensor.write_register(ZPOS, 50).await.unwrap();

        assert_eq!(512, sensor.effective_max_angle());
    }

    #[tokio::test]
    async fn writing_mpos_uses_cached_zpos() {
        let mut sensor = configured(bus_with_range(4000, 0, 0)).await;
        let transactions = sensor.device.bus_mut().transactions();

        sensor.set_max_position(100.0, AngleUnit::Native).await.unwrap();

        assert_eq!(196, sensor.effective_max_angle());
        // Only the MPOS write itself; ZPOS and MPOS came from the cache.
        assert_eq!(transactions + 1, sensor.device.bus_mut().transactions());
        assert_eq!(None, sensor.device.registers().cached(MANG));
    }

    #[tokio::test]
    async fn writing_mang_sets_max_angle_and_drops_mpos() {
        let mut sensor = configured(bus_with_range(0, 300, 0)).await;

        sensor.set_max_angle(90.0, AngleUnit::DegreesFloat).await.unwrap();

        assert_eq!(1024, sensor.effective_max_angle());
        assert_eq!(None, sensor.device.registers().cached(MPOS));
        assert_eq!(Some(0), sensor.device.registers().cached(ZPOS));
    }

    #[tokio::test]
    async fn oversized_range_writes_use_the_stored_field() {
        let mut sensor = configured(bus_with_range(0, 0, 0)).await;

        sensor.write_register(MANG, 0x1200).await.unwrap();
        assert_eq!(0x200, sensor.read_register(MANG).await.unwrap());
        assert_eq!(0x200, sensor.effective_max_angle());

        sensor.write_register(MPOS, 0x1100).await.unwrap();
        assert_eq!(0x100, sensor.effective_max_angle());

        sensor.write_register(ZPOS, 0x1080).await.unwrap();
        assert_eq!(0x80, sensor.effective_max_angle());
        assert!(sensor.effective_max_angle() <= NATIVE_ANGLE_RANGE);
    }

    #[test]
    fn span_ignores_bits_above_the_field() {
        assert_eq!(100, span(0xF000 | 100, 0x1000 | 200));
        assert_eq!(196, span(4000, 100));
    }

    #[tokio::test]
    async fn angle_is_scaled_over_the_narrow_range() {
        let bus = bus_with_range(0, 0, 1024).with_register(ANGLE, &be(2048));
        let mut sensor = configured(bus).await;

        let angle = sensor.angle(AngleUnit::DegreesFloat).await.unwrap();
        assert!((angle.value() - 45.0).abs() < 1e-3);

        let raw = sensor.raw_angle(AngleUnit::Native).await.unwrap();
        assert_eq!(0, raw.whole());
    }

    #[tokio::test]
    async fn burn_angle_respects_the_quota() {
        let mut sensor = configured(FakeBus::new(DEFAULT_ADDRESS).with_register(ZMCO, &[3])).await;
        let writes = sensor.device.bus_mut().writes().len();

        assert_eq!(Err(Error::MaxBurnAngleReached), sensor.burn(BurnCommand::Angle).await);
        assert_eq!(writes, sensor.device.bus_mut().writes().len());

        sensor.device.bus_mut().set_register(ZMCO, &[2]);
        sensor.burn(BurnCommand::Angle).await.unwrap();
        assert_eq!(
            Some(&(BURN, alloc::vec![0x80])),
            sensor.device.bus_mut().writes().last()
        );
        assert_eq!(writes + 1, sensor.device.bus_mut().writes().len());
    }

    #[tokio::test]
    async fn burn_setting_is_not_guarded() {
        let mut sensor = configured(FakeBus::new(DEFAULT_ADDRESS).with_register(ZMCO, &[3])).await;

        sensor.burn(BurnCommand::Setting).await.unwrap();

        assert_eq!(0x40, sensor.device.bus_mut().memory(BURN));
    }

    #[tokio::test]
    async fn magnet_status_prefers_too_weak() {
        let mut sensor = configured(FakeBus::new(DEFAULT_ADDRESS).with_register(STATUS, &[0b0011_1000])).await;

        assert_eq!(
            MagnetStatus { detected: true, strength: MagnetStrength::TooWeak },
            sensor.magnet_status().await.unwrap()
        );

        sensor.device.bus_mut().set_register(STATUS, &[0b0000_1000]);
        assert_eq!(
            MagnetStatus { detected: false, strength: MagnetStrength::TooStrong },
            sensor.magnet_status().await.unwrap()
        );
    }

    #[tokio::test]
    async fn typed_fields_round_trip_through_conf() {
        let mut sensor = configured(FakeBus::new(DEFAULT_ADDRESS)).await;

        sensor.set_power_mode(PowerMode::LowPower3).await.unwrap();
        sensor.set_output_stage(OutputStage::DigitalPwm).await.unwrap();
        sensor.set_slow_filter(SlowFilter::X2).await.unwrap();

        assert_eq!(PowerMode::LowPower3, sensor.power_mode().await.unwrap());
        assert_eq!(OutputStage::DigitalPwm, sensor.output_stage().await.unwrap());
        let conf = u16::from_be_bytes([
            sensor.device.bus_mut().memory(CONF),
            sensor.device.bus_mut().memory(CONF + 1),
        ]);
        assert_eq!(0b11 << 8 | 0b10 << 4 | 0b11, conf);
    }

    #[tokio::test]
    async fn undefined_field_value_is_reported() {
        let bus = FakeBus::new(DEFAULT_ADDRESS).with_register(CONF, &[0x00, 0b11 << 4]);
        let mut sensor = configured(bus).await;

        assert_eq!(
            Err(Error::UnexpectedRegisterData(InvalidRegisterField::new(OUTS, 3))),
            sensor.output_stage().await
        );
    }

    #[tokio::test]
    async fn address_override_is_used_on_the_bus() {
        let mut sensor = As5600Device::new(FakeBus::new(0x40), FakeDelay::new());

        assert!(matches!(sensor.configure(Config::default()).await, Err(Error::Bus(_))));
        sensor.configure(Config::default().address(0x40)).await.unwrap();
    }
}
