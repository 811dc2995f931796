use bitfield::bitfield;

bitfield! {
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct R1(u8);
    pub in_idle_state, _: 0;
    pub erase_reset, _: 1;
    pub illegal_command, _: 2;
    pub command_crc_error, _: 3;
    pub erase_sequence_error, _: 4;
    pub address_error, _: 5;
    pub parameter_error, _: 6;
    pub no_response, _: 7;
}

impl Default for R1 {
    fn default() -> Self {
        Self(0xFF)
    }
}

impl From<u8> for R1 {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl core::fmt::Debug for R1 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "R1({:#04x})", self.0)
    }
}

/// How the driver reads an R1: only zero, idle and everything else matter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum R1Status {
    Ready,
    Idle,
    Failed,
}

impl R1 {
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn valid(self) -> bool {
        !self.no_response()
    }

    pub fn status(self) -> R1Status {
        match self.0 {
            0 => R1Status::Ready,
            1 => R1Status::Idle,
            _ => R1Status::Failed,
        }
    }

    pub fn is_ready(self) -> bool {
        self.status() == R1Status::Ready
    }

    pub fn is_idle(self) -> bool {
        self.status() == R1Status::Idle
    }

    /// Idle or ready, what APP_CMD must answer before its ACMD may follow
    pub fn accepted(self) -> bool {
        self.0 <= 1
    }
}

bitfield! {
    /// Operation condition register, as read by CMD58
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct OCR(u32);
    pub power_up_done, _: 31;
    pub card_capacity_status, _: 30;
    pub voltage_window, _: 23, 15;
}

impl From<[u8; 4]> for OCR {
    fn from(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}
