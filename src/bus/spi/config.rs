use crate::delay::Retry;

/// Wait budgets of the SPI driver. Every wait on the card is bounded by one
/// of these, so a missing or broken card can never hang the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Card releasing the bus before each command, ~500 ms
    pub ready: Retry,
    /// Card leaving idle state after reset (ACMD41 or CMD1), ~1 s
    pub handshake: Retry,
    /// Start token of a data block, ~200 ms
    pub data_token: Retry,
    /// Card programming a written block, ~500 ms
    pub write_busy: Retry,
    /// Bytes polled for an R1 after each command frame
    pub response_polls: u8,
    /// 0xFF bytes clocked with the card deselected at power-up
    pub dummy_clocks: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ready: Retry::new(500, 1),
            handshake: Retry::new(250, 4),
            data_token: Retry::new(100, 2),
            write_busy: Retry::new(500, 1),
            response_polls: 10,
            dummy_clocks: 10,
        }
    }
}
