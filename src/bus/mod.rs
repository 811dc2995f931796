use crate::sd::response::R1;
use crate::sd::transfer::{DataResponse, TokenError};
use crate::sd::CardType;

#[derive(Debug)]
pub enum Error<BUS> {
    BUS(BUS),
    Parameter,              // Sector, offset or length out of range
    NotReady,               // Card not initialized
    WriteProtected,         // Write-protect switch engaged
    Busy,                   // A streaming write is still open
    Timeout,                // Card never released the bus
    Handshake,              // Card could not be classified
    NoResponse,             // Probably no card
    Command(R1),            // Command rejected
    DataTimeout,            // No data token within expected duration
    Transfer(TokenError),   // Card sent an error token instead of data
    Rejected(DataResponse), // Written block not accepted
    Generic,                // Unexpected byte on the bus
}

impl<BUS> Error<BUS> {
    pub(crate) fn from_r1(r1: R1) -> Self {
        match r1.valid() {
            true => Self::Command(r1),
            false => Self::NoResponse,
        }
    }
}

pub trait Bus {
    type Error;
    /// Card-detect switch, sampled once per `init`
    fn card_present(&mut self) -> bool;
    fn write_protected(&mut self) -> bool;
    /// Power up, reset and classify the card
    fn init(&mut self) -> Result<CardType, Error<Self::Error>>;
}

pub trait Read {
    type Error;
    /// Read `buffer.len()` bytes at `offset` of the block at wire `address`
    fn read(&mut self, address: u32, offset: usize, buffer: &mut [u8]) -> Result<(), Error<Self::Error>>;
}

pub trait Write {
    type Error;
    /// Leaves the card selected, waiting for block data
    fn begin_write(&mut self, address: u32) -> Result<(), Error<Self::Error>>;
    fn write_data(&mut self, data: &[u8]) -> Result<(), Error<Self::Error>>;
    /// Pads the block with `padding` zeros and commits it
    fn finish_write(&mut self, padding: usize) -> Result<(), Error<Self::Error>>;
}

#[cfg(feature = "linux-spi")]
pub mod linux;
pub mod spi;
