//! Bus capabilities shared by the drivers.
//!
//! [`Bus`] is the byte-granular transport the register model talks to. It is implemented for
//! I2C controllers through [`I2c`], and for register-style SPI targets through [`Spi`].
//! [`SpiController`] turns a raw [`SpiBus`] plus a chip-select pin into an [`SpiDevice`] for
//! drivers that speak their own SPI protocol.
//!
//! No retries happen at this layer, and addresses and bytes are passed through untouched.

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::SevenBitAddress;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{ErrorKind, ErrorType, Operation, SpiBus, SpiDevice};

/// Largest register word handled by the register model, in bytes.
pub const MAX_REG_BYTES: usize = 2;

pub trait Bus {
    type Error;

    /// Clocks `outbound` and then `inbound` as a single exchange with the target at `address`.
    ///
    /// Either side may be empty. When both are non-empty this is a write followed by a read
    /// with a repeated start.
    fn transact(
        &mut self,
        address: SevenBitAddress,
        outbound: &[u8],
        inbound: &mut [u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Writes `register` followed by `bytes` in one transaction.
    fn write_register(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Writes the register address, then reads `into.len()` bytes.
    fn read_register(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        into: &mut [u8],
    ) -> impl Future<Output = Result<(), Self::Error>> {
        async move { self.transact(address, &[register], into).await }
    }
}

pub struct I2c<I2cType> {
    i2c: I2cType,
}

impl<I2cType> I2c<I2cType>
where
    I2cType: embedded_hal_async::i2c::I2c,
{
    pub fn new(i2c: I2cType) -> Self {
        Self { i2c }
    }

    /// Gives back the wrapped controller.
    pub fn release(self) -> I2cType {
        self.i2c
    }
}

impl<I2cType> Bus for I2c<I2cType>
where
    I2cType: embedded_hal_async::i2c::I2c,
{
    type Error = <I2cType as embedded_hal_async::i2c::ErrorType>::Error;

    async fn transact(
        &mut self,
        address: SevenBitAddress,
        outbound: &[u8],
        inbound: &mut [u8],
    ) -> Result<(), Self::Error> {
        match (outbound.is_empty(), inbound.is_empty()) {
            (_, true) => self.i2c.write(address, outbound).await?,
            (true, false) => self.i2c.read(address, inbound).await?,
            (false, false) => self.i2c.write_read(address, outbound, inbound).await?,
        }

        Ok(())
    }

    async fn write_register(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        use embedded_hal_async::i2c::Operation;

        // Adjacent writes are sent back to back, without a repeated start.
        self.i2c
            .transaction(
                address,
                &mut [Operation::Write(&[register]), Operation::Write(bytes)],
            )
            .await?;

        Ok(())
    }
}

/// Register-style access to an SPI target: one address byte, then the data.
///
/// The I2C address passed through [`Bus`] is ignored, chip select picks the target instead.
pub struct Spi<SpiType> {
    spi: SpiType,
}

impl<SpiType> Spi<SpiType>
where
    SpiType: SpiDevice,
{
    pub fn new(spi: SpiType) -> Self {
        Self { spi }
    }

    pub fn release(self) -> SpiType {
        self.spi
    }
}

impl<SpiType> Bus for Spi<SpiType>
where
    SpiType: SpiDevice,
{
    type Error = <SpiType as ErrorType>::Error;

    async fn transact(
        &mut self,
        _address: SevenBitAddress,
        outbound: &[u8],
        inbound: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.spi
            .transaction(&mut [Operation::Write(outbound), Operation::Read(inbound)])
            .await?;

        Ok(())
    }

    async fn write_register(
        &mut self,
        _address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[register]), Operation::Write(bytes)])
            .await?;

        Ok(())
    }
}

/// Error of a [`SpiController`] transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiControllerError<BusError, PinError> {
    /// The SPI bus reported an error.
    Spi(BusError),
    /// Driving the chip-select pin failed.
    ChipSelect(PinError),
}

impl<BusError, PinError> embedded_hal::spi::Error for SpiControllerError<BusError, PinError>
where
    BusError: embedded_hal::spi::Error,
    PinError: core::fmt::Debug,
{
    fn kind(&self) -> ErrorKind {
        match self {
            SpiControllerError::Spi(e) => e.kind(),
            SpiControllerError::ChipSelect(_) => ErrorKind::ChipSelectFault,
        }
    }
}

/// An [`SpiDevice`] made of an exclusively owned [`SpiBus`] and a caller-supplied chip-select pin.
///
/// Chip select is driven low for the whole transaction and released afterwards, also when the
/// transfer fails.
pub struct SpiController<B, CS, D> {
    bus: B,
    cs: CS,
    delay: D,
}

impl<B, CS, D> SpiController<B, CS, D>
where
    B: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Wraps `bus` and deasserts `cs`.
    pub fn new(bus: B, mut cs: CS, delay: D) -> Result<Self, CS::Error> {
        cs.set_high()?;

        Ok(Self { bus, cs, delay })
    }

    pub fn release(self) -> (B, CS, D) {
        (self.bus, self.cs, self.delay)
    }

    async fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), B::Error> {
        for op in operations {
            match op {
                Operation::Read(buf) => self.bus.read(buf).await?,
                Operation::Write(buf) => self.bus.write(buf).await?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write).await?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf).await?,
                Operation::DelayNs(ns) => {
                    self.bus.flush().await?;
                    self.delay.delay_ns(*ns).await;
                }
            }
        }

        self.bus.flush().await
    }
}

impl<B, CS, D> ErrorType for SpiController<B, CS, D>
where
    B: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    type Error = SpiControllerError<B::Error, CS::Error>;
}

impl<B, CS, D> SpiDevice for SpiController<B, CS, D>
where
    B: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(SpiControllerError::ChipSelect)?;

        let result = self.run(operations).await;
        let released = self.cs.set_high();

        result.map_err(SpiControllerError::Spi)?;
        released.map_err(SpiControllerError::ChipSelect)?;

        Ok(())
    }
}
