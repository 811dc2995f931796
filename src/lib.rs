//! # sdmmc
//!
//! > A blocking MMC/SD card driver over SPI, sized for small FAT implementations
//!
//! ## Using this crate
//!
//! Assuming you already have `SPI` struct which implements `sdmmc::bus::spi::Transfer`,
//! or an `embedded-hal` full-duplex SPI wrapped in `sdmmc::bus::spi::FullDuplex`
//!
//! ```ignore
//! let bus = sdmmc::bus::spi::Bus::new(FullDuplex::new(spi), cs, delay);
//! let mut sd = SD::new(bus);
//! let status = sd.initialize().map_err(|e| format!("{:?}", e))?;
//! debug!("Card {:?} {:?}", sd.card(), status);
//!
//! let mut buffer = [0u8; 512];
//! sd.read_partial_sector(0, 0, &mut buffer).map_err(|e| format!("{:?}", e))?;
//!
//! sd.begin_write(1).map_err(|e| format!("{:?}", e))?;
//! let taken = sd.write_chunk(&buffer[..100]).map_err(|e| format!("{:?}", e))?;
//! sd.finalize_write().map_err(|e| format!("{:?}", e))?;
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
extern crate log;

pub mod bus;
pub mod delay;
mod sd;

use bus::Error;
pub use sd::command::{AppCommand, Command};
pub use sd::response::R1;
pub use sd::transfer::{DataResponse, TokenError};
pub use sd::{CardKind, CardStatus, CardType, BLOCK_SIZE};

/// Logical sector number
pub type LBA = u32;

/// Card session: owns the bus, the card type found by `initialize` and
/// the state of an open streaming write.
pub struct SD<BUS> {
    bus: BUS,
    status: CardStatus,
    card: Option<CardType>,
    owed: Option<usize>, // Bytes still owed to the open block
}

impl<BUS> SD<BUS> {
    pub fn new(bus: BUS) -> Self {
        Self { bus, status: CardStatus::default(), card: None, owed: None }
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn card(&self) -> Option<CardType> {
        self.card
    }

    pub fn bus<R>(&mut self, f: impl FnOnce(&mut BUS) -> R) -> R {
        f(&mut self.bus)
    }

    pub fn free(self) -> BUS {
        self.bus
    }
}

impl<E, BUS> SD<BUS>
where
    BUS: bus::Read<Error = E> + bus::Write<Error = E> + bus::Bus<Error = E>,
{
    fn idle(&self) -> Result<(), Error<E>> {
        match self.owed {
            Some(_) => Err(Error::Busy),
            None => Ok(()),
        }
    }

    fn address(&self, sector: LBA) -> Result<u32, Error<E>> {
        let card = match (self.status.readable(), self.card) {
            (true, Some(card)) => card,
            _ => return Err(Error::NotReady),
        };
        card.address(sector).ok_or(Error::Parameter)
    }

    /// Sample the socket, then reset and classify the card.
    ///
    /// An empty socket is not an error: the status becomes `NoDisk` and the
    /// bus is left untouched.
    pub fn initialize(&mut self) -> Result<CardStatus, Error<E>> {
        self.idle()?;
        self.card = None;
        if !self.bus.card_present() {
            debug!("No card in socket");
            self.status = CardStatus::NoDisk;
            return Ok(self.status);
        }
        self.status = CardStatus::Uninitialized;
        let card = self.bus.init()?;
        self.card = Some(card);
        self.status = match self.bus.write_protected() {
            true => CardStatus::WriteProtected,
            false => CardStatus::Ready,
        };
        debug!("{:?} card {:?}", card.kind, self.status);
        Ok(self.status)
    }

    /// Copy `buffer.len()` bytes starting at `offset` of `sector`
    pub fn read_partial_sector(&mut self, sector: LBA, offset: usize, buffer: &mut [u8]) -> Result<(), Error<E>> {
        self.idle()?;
        if buffer.is_empty() || offset > BLOCK_SIZE || buffer.len() > BLOCK_SIZE - offset {
            return Err(Error::Parameter);
        }
        let address = self.address(sector)?;
        self.bus.read(address, offset, buffer)
    }

    /// Write `data` to the head of `sector`, zero filling the rest of it
    pub fn write_partial_sector(&mut self, sector: LBA, data: &[u8]) -> Result<(), Error<E>> {
        if data.is_empty() || data.len() > BLOCK_SIZE {
            return Err(Error::Parameter);
        }
        self.begin_write(sector)?;
        self.write_chunk(data)?;
        self.finalize_write()
    }

    /// Open `sector` for writing, the card stays selected until
    /// `finalize_write` or a failed `write_chunk`.
    pub fn begin_write(&mut self, sector: LBA) -> Result<(), Error<E>> {
        self.idle()?;
        let address = self.address(sector)?;
        if self.status == CardStatus::WriteProtected {
            return Err(Error::WriteProtected);
        }
        self.bus.begin_write(address)?;
        self.owed = Some(BLOCK_SIZE);
        Ok(())
    }

    /// Returns how many bytes of `data` went into the open block
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<usize, Error<E>> {
        let owed = self.owed.ok_or(Error::Parameter)?;
        let size = data.len().min(owed);
        if size > 0 {
            if let Err(e) = self.bus.write_data(&data[..size]) {
                self.owed = None;
                return Err(e);
            }
        }
        self.owed = Some(owed - size);
        Ok(size)
    }

    pub fn finalize_write(&mut self) -> Result<(), Error<E>> {
        let owed = self.owed.take().ok_or(Error::Parameter)?;
        self.bus.finish_write(owed)
    }
}
