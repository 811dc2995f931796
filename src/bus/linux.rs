use std::cell::RefCell;
use std::io;

use gpio::sysfs::{SysFsGpioInput, SysFsGpioOutput};
use gpio::{GpioIn, GpioOut, GpioValue};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

use crate::bus::spi::{self, Clock, Detect, Level, Switch};
use crate::delay;

const SLOW_HZ: u32 = 400_000;

pub struct SPI {
    pub spidev: Spidev,
    fast_hz: u32,
}

impl SPI {
    pub fn new(spi: &str, fast_hz: u32) -> io::Result<Self> {
        let mut spidev = Spidev::open(spi)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(SLOW_HZ)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spidev.configure(&options)?;
        Ok(Self { spidev, fast_hz })
    }
}

impl spi::Transfer for SPI {
    type Error = io::Error;

    fn exchange(&mut self, byte: u8) -> io::Result<u8> {
        let mut rx = [0u8];
        self.spidev.transfer(&mut SpidevTransfer::read_write(&[byte], &mut rx))?;
        Ok(rx[0])
    }

    fn set_clock(&mut self, clock: Clock) -> io::Result<()> {
        let hz = match clock {
            Clock::Slow => SLOW_HZ,
            Clock::Fast => self.fast_hz,
        };
        trace!("SPI clock {} Hz", hz);
        self.spidev.configure(&SpidevOptions::new().max_speed_hz(hz).build())
    }
}

pub struct GPIO(SysFsGpioOutput);

impl embedded_hal::digital::v2::OutputPin for GPIO {
    type Error = io::Error;

    fn set_high(&mut self) -> io::Result<()> {
        self.0.set_value(true)
    }

    fn set_low(&mut self) -> io::Result<()> {
        self.0.set_value(false)
    }
}

/// Sysfs input, reading the value file needs `&mut`
pub struct GPIOInput(RefCell<SysFsGpioInput>);

impl GPIOInput {
    pub fn open(gpio: u16) -> io::Result<Self> {
        Ok(Self(RefCell::new(SysFsGpioInput::open(gpio)?)))
    }
}

impl embedded_hal::digital::v2::InputPin for GPIOInput {
    type Error = io::Error;

    fn is_high(&self) -> io::Result<bool> {
        Ok(matches!(self.0.borrow_mut().read_value()?, GpioValue::High))
    }

    fn is_low(&self) -> io::Result<bool> {
        self.is_high().map(|high| !high)
    }
}

pub type LinuxBus<S = ()> = spi::Bus<SPI, GPIO, delay::std::Delay, S>;

pub fn spi(spi: &str, cs: u16, fast_hz: u32) -> io::Result<LinuxBus> {
    let spi = SPI::new(spi, fast_hz)?;
    let cs = SysFsGpioOutput::open(cs)?;
    Ok(spi::Bus::new(spi, GPIO(cs), delay::std::Delay))
}

/// Same as `spi`, with an active-low card-detect switch on GPIO `detect`
pub fn spi_with_detect(
    spi: &str,
    cs: u16,
    detect: u16,
    fast_hz: u32,
) -> io::Result<LinuxBus<Detect<GPIOInput>>> {
    let detect = Detect(Switch::new(GPIOInput::open(detect)?, Level::Low));
    Ok(self::spi(spi, cs, fast_hz)?.with_socket(detect))
}
