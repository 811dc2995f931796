use embedded_hal::digital::v2::OutputPin;

use crate::{
    bus::{self, Write},
    delay::Delay,
    sd::{
        command::Command,
        transfer::{DataResponse, Token},
    },
};

use super::bus::{BUSError, Bus, Error, Transfer};

impl<E, F, SPI, CS, D, S> Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    fn commit_block(&mut self, padding: usize) -> Result<(), BUSError<E, F>> {
        // Zero fill, then two don't-care CRC bytes
        for _ in 0..padding + 2 {
            self.exchange(0x00)?;
        }
        let byte = self.exchange(0xFF)?;
        match DataResponse::try_from(byte) {
            Some(DataResponse::Accepted) => (),
            Some(response) => {
                warn!("Block rejected: {:?}", response);
                return Err(BUSError::Rejected(response));
            }
            None => {
                warn!("Expect data response, got {:#04x}", byte);
                return Err(BUSError::Generic);
            }
        }
        // Card holds MISO low while programming
        let budget = self.config.write_busy;
        match self.retry(budget, |bus| Ok((bus.exchange(0xFF)? == 0xFF).then_some(())))? {
            Some(()) => Ok(()),
            None => {
                warn!("Card still busy after {} ms", budget.budget_ms());
                Err(BUSError::Timeout)
            }
        }
    }
}

impl<E, F, SPI, CS, D, S> Write for Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    type Error = Error<E, F>;

    fn begin_write(&mut self, address: u32) -> Result<(), BUSError<E, F>> {
        let r1 = self.request(Command::WriteBlock(address))?;
        if !r1.is_ready() {
            warn!("Write of {:#x} rejected with {:?}", address, r1);
            return self.release().and(Err(bus::Error::from_r1(r1)));
        }
        let result = self.tx(&[0xFF, Token::Start as u8]);
        if result.is_err() {
            return self.release().and(result);
        }
        Ok(())
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), BUSError<E, F>> {
        let result = self.tx(data);
        if result.is_err() {
            return self.release().and(result);
        }
        Ok(())
    }

    fn finish_write(&mut self, padding: usize) -> Result<(), BUSError<E, F>> {
        let result = self.commit_block(padding);
        self.release().and(result)
    }
}
