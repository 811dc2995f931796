use embedded_hal::blocking::delay::DelayMs;

pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

impl<T: DelayMs<u32>> Delay for T {
    fn delay_ms(&mut self, ms: u32) {
        DelayMs::delay_ms(self, ms)
    }
}

/// A bounded wait: at most `attempts` tries, `interval_ms` apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Retry {
    pub attempts: u16,
    pub interval_ms: u32,
}

impl Retry {
    pub const fn new(attempts: u16, interval_ms: u32) -> Self {
        Self { attempts, interval_ms }
    }

    /// Upper bound of the time spent sleeping
    pub fn budget_ms(&self) -> u32 {
        (self.attempts as u32).saturating_mul(self.interval_ms)
    }
}

#[cfg(feature = "std")]
pub mod std {
    pub struct Delay;

    impl embedded_hal::blocking::delay::DelayMs<u32> for Delay {
        fn delay_ms(&mut self, ms: u32) {
            std::thread::sleep(std::time::Duration::from_millis(ms as u64));
        }
    }
}
