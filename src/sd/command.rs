use core::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SendInterfaceCondition {
    pub pcie_1_2v_suppport: bool, // PCIe 1.2V
    pub pcie_availability: bool,
    pub voltage_supplied: bool, // 2.7-3.6V
    pub check_pattern: u8,
}

impl SendInterfaceCondition {
    /// 0x1AA, the only argument the fixed CMD8 checksum is valid for
    pub fn spi() -> Self {
        Self { voltage_supplied: true, check_pattern: 0xAA, ..Default::default() }
    }
}

impl From<SendInterfaceCondition> for u32 {
    fn from(cond: SendInterfaceCondition) -> u32 {
        (cond.pcie_1_2v_suppport as u32) << 15
            | (cond.pcie_availability as u32) << 14
            | (cond.voltage_supplied as u32) << 8
            | cond.check_pattern as u32
    }
}

pub type RCA = u16;
pub type Address = u32;

/// Commands which must be announced with APP_CMD (CMD55) first.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AppCommand {
    SDStatus,
    SetWriteBlockEraseCount(u32),
    SDSendOpCond(bool), // host-capacity-support
}

impl AppCommand {
    pub fn index(self) -> u8 {
        match self {
            Self::SDStatus => 13,
            Self::SetWriteBlockEraseCount(_) => 23,
            Self::SDSendOpCond(_) => 41,
        }
    }

    pub fn argument(self) -> u32 {
        match self {
            Self::SDStatus => 0,
            Self::SetWriteBlockEraseCount(count) => count & 0x7F_FFFF,
            Self::SDSendOpCond(hcs) => (hcs as u32) << 30,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    GoIdleState,
    SendOpCond,
    SendIfCond(SendInterfaceCondition),
    SendCSD(RCA),
    SendCID(RCA),
    StopTransmission,
    SetBlockLen(u32),
    ReadSingleBlock(Address),
    ReadMultipleBlock(Address),
    SetBlockCount(u16),
    WriteBlock(Address),
    WriteMultipleBlock(Address),
    EraseStart(Address),
    EraseEnd(Address),
    Erase,
    AppCommand(RCA),
    ReadOCR,
    App(AppCommand),
}

impl Command {
    pub fn index(self) -> u8 {
        match self {
            Self::GoIdleState => 0,
            Self::SendOpCond => 1,
            Self::SendIfCond(_) => 8,
            Self::SendCSD(_) => 9,
            Self::SendCID(_) => 10,
            Self::StopTransmission => 12,
            Self::SetBlockLen(_) => 16,
            Self::ReadSingleBlock(_) => 17,
            Self::ReadMultipleBlock(_) => 18,
            Self::SetBlockCount(_) => 23,
            Self::WriteBlock(_) => 24,
            Self::WriteMultipleBlock(_) => 25,
            Self::EraseStart(_) => 32,
            Self::EraseEnd(_) => 33,
            Self::Erase => 38,
            Self::AppCommand(_) => 55,
            Self::ReadOCR => 58,
            Self::App(command) => command.index(),
        }
    }

    /// Command index with bit 7 marking the ACMD namespace
    pub fn code(self) -> u8 {
        match self {
            Self::App(command) => 0x80 | command.index(),
            _ => self.index(),
        }
    }

    pub fn is_app(self) -> bool {
        matches!(self, Self::App(_))
    }

    pub fn argument(self) -> u32 {
        match self {
            Self::GoIdleState
            | Self::SendOpCond
            | Self::StopTransmission
            | Self::Erase
            | Self::ReadOCR => 0,
            Self::SendIfCond(cond) => cond.into(),
            Self::SendCSD(rca) | Self::SendCID(rca) | Self::AppCommand(rca) => (rca as u32) << 16,
            Self::SetBlockLen(length) => length,
            Self::SetBlockCount(count) => count as u32,
            Self::ReadSingleBlock(address)
            | Self::ReadMultipleBlock(address)
            | Self::WriteBlock(address)
            | Self::WriteMultipleBlock(address)
            | Self::EraseStart(address)
            | Self::EraseEnd(address) => address,
            Self::App(command) => command.argument(),
        }
    }

    /// CRC is off in SPI mode except for CMD0 and CMD8, whose arguments are
    /// fixed, so their checksums are constants too.
    pub fn checksum(self) -> u8 {
        match self {
            Self::GoIdleState => 0x95,
            Self::SendIfCond(_) => 0x87,
            _ => 0x01,
        }
    }
}

impl From<Command> for [u8; 6] {
    fn from(cmd: Command) -> [u8; 6] {
        let bytes = u32::to_be_bytes(cmd.argument());
        [0x40 | cmd.index(), bytes[0], bytes[1], bytes[2], bytes[3], cmd.checksum()]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(command) => write!(f, "ACMD{}({:#x})", command.index(), command.argument()),
            _ => write!(f, "CMD{}({:#x})", self.index(), self.argument()),
        }
    }
}
