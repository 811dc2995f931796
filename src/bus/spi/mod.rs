pub mod bus;
pub mod config;
pub mod hal;
#[cfg(test)]
pub(crate) mod mock;
pub mod read;
pub mod socket;
pub mod write;

use embedded_hal::digital::v2::OutputPin;

use crate::{
    delay::Delay,
    sd::{
        command::{AppCommand, Command, SendInterfaceCondition},
        response::OCR,
        CardType, BLOCK_SIZE,
    },
};
pub use bus::{BUSError, Bus, Clock, Error, Transfer};
pub use config::Config;
pub use hal::FullDuplex;
pub use socket::{Detect, Level, Pins, Socket, Switch};

impl<E, F, SPI, CS, D, S> Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    /// Power up, reset and classify the card, then switch to the fast clock.
    ///
    /// Every step is bounded by the budgets in `Config`; a card which does
    /// not answer ends up as `Error::Handshake` with the bus deselected.
    pub fn init(&mut self) -> Result<CardType, BUSError<E, F>> {
        self.deselect()?;
        self.set_clock(Clock::Slow)?;
        // Supply minimum of 74 clock cycles without CS asserted.
        self.skip(self.config.dummy_clocks as usize)?;

        let result = self.classify();
        self.release()?;
        match result? {
            Some(card) => {
                debug!("Card: {:?}", card);
                self.set_clock(Clock::Fast)?;
                Ok(card)
            }
            None => {
                self.power_off()?;
                Err(BUSError::Handshake)
            }
        }
    }

    /// No power switch on this bus, the card is just left deselected
    fn power_off(&mut self) -> Result<(), BUSError<E, F>> {
        debug!("Card initialization failed, powering off");
        self.deselect()
    }

    /// Wait for the card to leave idle state, repeating `cmd`
    fn leave_idle(&mut self, cmd: Command) -> Result<bool, BUSError<E, F>> {
        let budget = self.config.handshake;
        let result = self.retry(budget, |bus| Ok(bus.send_command(cmd)?.is_ready().then_some(())))?;
        if result.is_none() {
            warn!("Card still idle after {} ms of {}", budget.budget_ms(), cmd);
        }
        Ok(result.is_some())
    }

    fn classify(&mut self) -> Result<Option<CardType>, BUSError<E, F>> {
        if !self.send_command(Command::GoIdleState)?.is_idle() {
            warn!("Card did not enter idle state");
            return Ok(None);
        }

        let r1 = self.send_command(Command::SendIfCond(SendInterfaceCondition::spi()))?;
        if r1.is_idle() {
            let mut echo = [0u8; 4];
            self.rx(&mut echo)?; // Trailing part of R7
            trace!("SEND_IF_COND echo {:02X?}", echo);

            if !self.leave_idle(Command::App(AppCommand::SDSendOpCond(true)))? {
                return Ok(None);
            }
            if !self.send_command(Command::ReadOCR)?.is_ready() {
                warn!("Unable to read OCR");
                return Ok(None);
            }
            let mut ocr = [0u8; 4];
            self.rx(&mut ocr)?;
            let ocr = OCR::from(ocr);
            return Ok(Some(CardType::sd2(ocr.card_capacity_status())));
        }

        // SD v1 answers ACMD41, MMC v3 does not know about APP_CMD
        let probe = Command::App(AppCommand::SDSendOpCond(false));
        let (card, cmd) = match self.send_command(probe)?.accepted() {
            true => (CardType::sd1(), probe),
            false => (CardType::mmc(), Command::SendOpCond),
        };
        if !self.leave_idle(cmd)? {
            return Ok(None);
        }
        let r1 = self.send_command(Command::SetBlockLen(BLOCK_SIZE as u32))?;
        if !r1.is_ready() {
            warn!("Block length rejected with {:?}", r1);
            return Ok(None);
        }
        Ok(Some(card))
    }
}
