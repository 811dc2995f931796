use embedded_hal::spi;

use super::bus::{Clock, Transfer};

/// Adapts an `embedded-hal` full-duplex SPI to the byte exchange `Bus`
/// drives. HALs differ in how the clock is changed at runtime, so that is
/// left to an optional `reclock` hook.
pub struct FullDuplex<SPI> {
    spi: SPI,
    reclock: Option<fn(&mut SPI, Clock)>,
}

impl<SPI> FullDuplex<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi, reclock: None }
    }

    pub fn with_reclock(mut self, reclock: fn(&mut SPI, Clock)) -> Self {
        self.reclock = Some(reclock);
        self
    }

    pub fn free(self) -> SPI {
        self.spi
    }
}

impl<SPI: spi::FullDuplex<u8>> Transfer for FullDuplex<SPI> {
    type Error = SPI::Error;

    fn exchange(&mut self, byte: u8) -> Result<u8, SPI::Error> {
        nb::block!(self.spi.send(byte))?;
        nb::block!(self.spi.read())
    }

    fn set_clock(&mut self, clock: Clock) -> Result<(), SPI::Error> {
        match self.reclock {
            Some(reclock) => reclock(&mut self.spi, clock),
            None => trace!("No reclock hook, staying at current rate for {:?}", clock),
        }
        Ok(())
    }
}
