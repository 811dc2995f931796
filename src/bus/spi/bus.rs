use embedded_hal::digital::v2::OutputPin;

use crate::bus;
use crate::delay::{Delay, Retry};
use crate::sd::command::Command;
use crate::sd::response::R1;
use crate::sd::CardType;

use super::config::Config;
use super::socket::Socket;

#[derive(Debug)]
pub enum Error<SPI, CS> {
    SPI(SPI),
    CS(CS),
}

pub type BUSError<SPI, CS> = bus::Error<Error<SPI, CS>>;

/// SPI clock rate, slow (100KHz ~ 400KHz) until the card is initialized
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Clock {
    Slow,
    Fast,
}

/// Full-duplex single byte exchange
pub trait Transfer {
    type Error;
    fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error>;
    fn set_clock(&mut self, clock: Clock) -> Result<(), Self::Error>;
}

pub struct Bus<SPI, CS, D, S = ()> {
    spi: SPI,
    cs: CS,
    delay: D,
    socket: S,
    pub(crate) config: Config,
}

impl<SPI, CS, D> Bus<SPI, CS, D> {
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self { spi, cs, delay, socket: (), config: Config::default() }
    }
}

impl<SPI, CS, D, S> Bus<SPI, CS, D, S> {
    pub fn with_socket<T: Socket>(self, socket: T) -> Bus<SPI, CS, D, T> {
        let Self { spi, cs, delay, config, .. } = self;
        Bus { spi, cs, delay, socket, config }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn spi<R>(&mut self, f: impl FnOnce(&mut SPI) -> R) -> R {
        f(&mut self.spi)
    }

    pub fn free(self) -> (SPI, CS, D, S) {
        (self.spi, self.cs, self.delay, self.socket)
    }
}

impl<E, F, SPI, CS, D, S> Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    pub(crate) fn select(&mut self) -> Result<(), BUSError<E, F>> {
        self.cs.set_low().map_err(|e| BUSError::BUS(Error::CS(e)))
    }

    pub(crate) fn deselect(&mut self) -> Result<(), BUSError<E, F>> {
        self.cs.set_high().map_err(|e| BUSError::BUS(Error::CS(e)))
    }

    /// Deselect, then one extra byte so the card releases MISO
    pub(crate) fn release(&mut self) -> Result<(), BUSError<E, F>> {
        self.deselect()?;
        self.exchange(0xFF).map(|_| ())
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) -> Result<(), BUSError<E, F>> {
        self.spi.set_clock(clock).map_err(|e| BUSError::BUS(Error::SPI(e)))
    }

    pub(crate) fn exchange(&mut self, byte: u8) -> Result<u8, BUSError<E, F>> {
        self.spi.exchange(byte).map_err(|e| BUSError::BUS(Error::SPI(e)))
    }

    pub(crate) fn tx(&mut self, bytes: &[u8]) -> Result<(), BUSError<E, F>> {
        for &byte in bytes {
            self.exchange(byte)?;
        }
        Ok(())
    }

    pub(crate) fn rx(&mut self, buffer: &mut [u8]) -> Result<(), BUSError<E, F>> {
        for byte in buffer.iter_mut() {
            *byte = self.exchange(0xFF)?;
        }
        Ok(())
    }

    /// Clock `count` bytes in and drop them
    pub(crate) fn skip(&mut self, count: usize) -> Result<(), BUSError<E, F>> {
        for _ in 0..count {
            self.exchange(0xFF)?;
        }
        Ok(())
    }

    /// Run `attempt` until it yields a value, sleeping `budget.interval_ms`
    /// after each miss. `None` once the budget is spent.
    pub(crate) fn retry<T>(
        &mut self,
        budget: Retry,
        mut attempt: impl FnMut(&mut Self) -> Result<Option<T>, BUSError<E, F>>,
    ) -> Result<Option<T>, BUSError<E, F>> {
        let mut elapsed_ms: u32 = 0;
        for _ in 0..budget.attempts {
            if let Some(value) = attempt(self)? {
                if elapsed_ms > 0 {
                    trace!("Settled after {} ms", elapsed_ms);
                }
                return Ok(Some(value));
            }
            if budget.interval_ms > 0 {
                self.delay.delay_ms(budget.interval_ms);
            }
            elapsed_ms = elapsed_ms.saturating_add(budget.interval_ms);
        }
        Ok(None)
    }

    /// The card counts as ready once it drives anything but the 0xFF filler
    fn wait_ready(&mut self) -> Result<bool, BUSError<E, F>> {
        let budget = self.config.ready;
        let ready = self.retry(budget, |bus| Ok((bus.exchange(0xFF)? != 0xFF).then_some(())))?;
        Ok(ready.is_some())
    }

    fn reselect(&mut self) -> Result<bool, BUSError<E, F>> {
        self.release()?;
        self.select()?;
        self.exchange(0xFF)?; // Dummy clock, force DO enabled
        if self.wait_ready()? {
            return Ok(true);
        }
        self.release()?;
        Ok(false)
    }

    /// `None` when the card never got ready and the frame was not sent
    fn send_frame(&mut self, cmd: Command) -> Result<Option<R1>, BUSError<E, F>> {
        // STOP_TRANSMISSION interrupts a read in flight, card stays selected
        if cmd != Command::StopTransmission && !self.reselect()? {
            warn!("Card not ready, {} not sent", cmd);
            return Ok(None);
        }

        let bytes: [u8; 6] = cmd.into();
        self.tx(&bytes[..])?;

        if cmd == Command::StopTransmission {
            self.skip(1)?; // Skip stuff byte
        }

        let mut r1 = R1::default();
        for _ in 0..self.config.response_polls {
            r1 = R1::from(self.exchange(0xFF)?);
            if r1.valid() {
                break;
            }
        }
        trace!("{} => {:?}", cmd, r1);
        Ok(Some(r1))
    }

    fn transact(&mut self, cmd: Command) -> Result<Option<R1>, BUSError<E, F>> {
        if cmd.is_app() {
            match self.send_frame(Command::AppCommand(0))? {
                Some(r1) if r1.accepted() => (),
                other => return Ok(other),
            }
        }
        self.send_frame(cmd)
    }

    /// Send `cmd` and return its R1; bit 7 set means no response,
    /// including a card which never got ready for the frame
    pub(crate) fn send_command(&mut self, cmd: Command) -> Result<R1, BUSError<E, F>> {
        Ok(self.transact(cmd)?.unwrap_or_default())
    }

    /// Same as `send_command`, but a card which never got ready is a
    /// `Timeout` instead of a missing R1
    pub(crate) fn request(&mut self, cmd: Command) -> Result<R1, BUSError<E, F>> {
        match self.transact(cmd)? {
            Some(r1) => Ok(r1),
            None => Err(BUSError::Timeout),
        }
    }
}

impl<E, F, SPI, CS, D, S> bus::Bus for Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
    S: Socket,
{
    type Error = Error<E, F>;

    fn card_present(&mut self) -> bool {
        self.socket.card_present()
    }

    fn write_protected(&mut self) -> bool {
        self.socket.write_protected()
    }

    fn init(&mut self) -> Result<CardType, BUSError<E, F>> {
        self.init()
    }
}
