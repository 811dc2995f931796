use core::convert::TryFrom;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TokenError {
    NotToken,
    Generic,
    CC,
    CardECC,
    OutOfRange,
    CardLocked,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Token {
    Start = 0xFE,
    StartWriteMultipleBlock = 0xFC,
    Stop = 0xFD,
}

impl TryFrom<u8> for Token {
    type Error = TokenError;

    fn try_from(byte: u8) -> Result<Token, TokenError> {
        // Error tokens are 0b000x_xxxx, the lowest set bit names the error
        match (byte, byte ^ (byte & byte.wrapping_sub(1))) {
            (0xFE, _) => Ok(Token::Start),
            (0xFC, _) => Ok(Token::StartWriteMultipleBlock),
            (0xFD, _) => Ok(Token::Stop),
            (b, _) if b & 0xE0 != 0 => Err(TokenError::NotToken),
            (_, 0x10) => Err(TokenError::CardLocked),
            (_, 0x8) => Err(TokenError::OutOfRange),
            (_, 0x4) => Err(TokenError::CardECC),
            (_, 0x2) => Err(TokenError::CC),
            (_, 0x1) => Err(TokenError::Generic),
            (_, _) => Err(TokenError::NotToken),
        }
    }
}

/// Data response token which follows every block written
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DataResponse {
    Accepted,
    CRCError,
    WriteError,
}

impl DataResponse {
    pub fn try_from(byte: u8) -> Option<Self> {
        if byte & 0b10001 != 0x1 {
            return None;
        }
        let value = match (byte >> 1) & 0b111 {
            0b010 => Self::Accepted,
            0b101 => Self::CRCError,
            0b110 => Self::WriteError,
            _ => return None,
        };
        Some(value)
    }
}
