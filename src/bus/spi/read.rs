use embedded_hal::digital::v2::OutputPin;

use crate::{
    bus::{
        self,
        spi::bus::{BUSError, Bus, Error, Transfer},
        Read,
    },
    delay::Delay,
    sd::{
        command::Command,
        transfer::{Token, TokenError},
        BLOCK_SIZE,
    },
};

impl<E, F, SPI, CS, D, S> Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    pub(crate) fn wait_data_token(&mut self) -> Result<(), BUSError<E, F>> {
        let budget = self.config.data_token;
        let byte = self.retry(budget, |bus| {
            let byte = bus.exchange(0xFF)?;
            Ok((byte != 0xFF).then_some(byte))
        })?;
        let byte = match byte {
            Some(byte) => byte,
            None => {
                warn!("No data token within {} ms", budget.budget_ms());
                return Err(BUSError::DataTimeout);
            }
        };
        match Token::try_from(byte) {
            Ok(Token::Start) => Ok(()),
            Ok(token) => {
                warn!("Unexpected {:?} token", token);
                Err(BUSError::Generic)
            }
            Err(TokenError::NotToken) => {
                warn!("Expect data token, got {:#04x}", byte);
                Err(BUSError::Generic)
            }
            Err(e) => Err(BUSError::Transfer(e)),
        }
    }

    /// Reads one block but keeps only `buffer.len()` bytes from `offset`.
    /// The whole block and its CRC are always clocked through, anything left
    /// on the bus would be taken for the answer to the next command.
    fn read_block_partial(
        &mut self,
        address: u32,
        offset: usize,
        buffer: &mut [u8],
    ) -> Result<(), BUSError<E, F>> {
        let r1 = self.request(Command::ReadSingleBlock(address))?;
        if !r1.is_ready() {
            warn!("Read of {:#x} rejected with {:?}", address, r1);
            return Err(bus::Error::from_r1(r1));
        }
        self.wait_data_token()?;
        self.skip(offset)?;
        self.rx(buffer)?;
        self.skip(BLOCK_SIZE - offset - buffer.len() + 2)
    }
}

impl<E, F, SPI, CS, D, S> Read for Bus<SPI, CS, D, S>
where
    SPI: Transfer<Error = E>,
    CS: OutputPin<Error = F>,
    D: Delay,
{
    type Error = Error<E, F>;

    fn read(&mut self, address: u32, offset: usize, buffer: &mut [u8]) -> Result<(), BUSError<E, F>> {
        if buffer.is_empty() || offset > BLOCK_SIZE || buffer.len() > BLOCK_SIZE - offset {
            return Err(BUSError::Parameter);
        }
        let result = self.read_block_partial(address, offset, buffer);
        self.release().and(result)
    }
}
