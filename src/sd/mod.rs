pub mod command;
pub mod response;
pub mod transfer;

pub const BLOCK_SIZE: usize = 512;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CardKind {
    MMC, // MMC ver 3
    SD1,
    SD2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CardType {
    pub kind: CardKind,
    pub block_addressed: bool,
}

impl CardType {
    pub fn mmc() -> Self {
        Self { kind: CardKind::MMC, block_addressed: false }
    }

    pub fn sd1() -> Self {
        Self { kind: CardKind::SD1, block_addressed: false }
    }

    pub fn sd2(block_addressed: bool) -> Self {
        Self { kind: CardKind::SD2, block_addressed }
    }

    /// Wire argument for `sector`, `None` if a byte address would not fit
    pub fn address(self, sector: u32) -> Option<u32> {
        match self.block_addressed {
            true => Some(sector),
            false => sector.checked_mul(BLOCK_SIZE as u32),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CardStatus {
    Uninitialized,
    NoDisk,
    WriteProtected,
    Ready,
}

impl CardStatus {
    pub fn readable(self) -> bool {
        matches!(self, Self::Ready | Self::WriteProtected)
    }
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::Uninitialized
    }
}
