use core::fmt::Debug;

use embedded_hal::digital::v2::InputPin;

/// Card-detect and write-protect switches of the card socket.
///
/// Both are sampled once per card initialization, there is no interrupt
/// tracking insertion or removal in between.
pub trait Socket {
    fn card_present(&mut self) -> bool {
        true
    }

    fn write_protected(&mut self) -> bool {
        false
    }
}

/// No switches wired
impl Socket for () {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// A switch read through an input pin, engaged while the pin is at `active`
pub struct Switch<P> {
    pin: P,
    active: Level,
}

impl<P: InputPin> Switch<P>
where
    P::Error: Debug,
{
    pub fn new(pin: P, active: Level) -> Self {
        Self { pin, active }
    }

    pub fn engaged(&self) -> Option<bool> {
        let high = match self.pin.is_high() {
            Ok(high) => high,
            Err(e) => {
                warn!("Unable to read socket switch: {:?}", e);
                return None;
            }
        };
        Some(high == (self.active == Level::High))
    }

    pub fn free(self) -> P {
        self.pin
    }
}

/// Card-detect switch only
pub struct Detect<P>(pub Switch<P>);

impl<P: InputPin> Socket for Detect<P>
where
    P::Error: Debug,
{
    fn card_present(&mut self) -> bool {
        self.0.engaged().unwrap_or(true)
    }
}

/// Both card-detect and write-protect switches
pub struct Pins<CD, WP> {
    pub detect: Switch<CD>,
    pub protect: Switch<WP>,
}

impl<CD: InputPin, WP: InputPin> Socket for Pins<CD, WP>
where
    CD::Error: Debug,
    WP::Error: Debug,
{
    fn card_present(&mut self) -> bool {
        self.detect.engaged().unwrap_or(true)
    }

    fn write_protected(&mut self) -> bool {
        self.protect.engaged().unwrap_or(false)
    }
}
