//! Scripted card model standing in for SPI, chip select, delay and socket.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;

use super::bus::{Bus, Clock, Transfer};
use super::socket::Socket;
use crate::sd::BLOCK_SIZE;

pub const SECTORS: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Model {
    MMC,
    SD1,
    SD2 { block: bool },
    /// Nothing in the socket, MISO floats high
    Absent,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Event {
    Select(bool),
    Exchange { tx: u8, rx: u8 },
    Clock(Clock),
}

#[derive(Debug)]
pub struct Fault;

enum Write {
    Token(u32),
    Data(u32, Vec<u8>),
}

pub struct Card {
    pub model: Model,
    pub events: Vec<Event>,
    pub frames: Vec<[u8; 6]>,
    pub slept_ms: u32,
    /// Idle answers to ACMD41/CMD1 before the card turns ready
    pub op_cond_polls: usize,
    /// 0xFF bytes before the data token
    pub token_delay: usize,
    pub token: u8,
    pub data_response: u8,
    pub busy_polls: usize,
    pub present: bool,
    pub protected: bool,
    /// Exchange number at which the SPI fails
    pub fail_at: Option<usize>,
    pub storage: Vec<u8>,
    overrides: HashMap<u8, Vec<u8>>,
    frame_ends: Vec<usize>,
    exchanged: usize,
    selected: bool,
    ready: bool,
    op_cond_attempts: usize,
    queue: VecDeque<u8>,
    frame: Vec<u8>,
    write: Option<Write>,
}

pub fn pattern(sector: usize, index: usize) -> u8 {
    (index as u8).wrapping_mul(7) ^ (sector as u8).wrapping_mul(0x35)
}

impl Card {
    pub fn new(model: Model) -> Self {
        let mut storage = vec![0u8; SECTORS * BLOCK_SIZE];
        for (i, byte) in storage.iter_mut().enumerate() {
            *byte = pattern(i / BLOCK_SIZE, i % BLOCK_SIZE);
        }
        Self {
            model,
            events: Vec::new(),
            frames: Vec::new(),
            slept_ms: 0,
            op_cond_polls: 2,
            token_delay: 1,
            token: 0xFE,
            data_response: 0xE5,
            busy_polls: 3,
            present: true,
            protected: false,
            fail_at: None,
            storage,
            overrides: HashMap::new(),
            frame_ends: Vec::new(),
            exchanged: 0,
            selected: false,
            ready: false,
            op_cond_attempts: 0,
            queue: VecDeque::new(),
            frame: Vec::new(),
            write: None,
        }
    }

    /// Answer command `index` with `bytes` instead of the model's reply
    pub fn reply(&mut self, index: u8, bytes: Vec<u8>) {
        self.overrides.insert(index, bytes);
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn commands(&self) -> Vec<(u8, u32)> {
        let argument = |f: &[u8; 6]| u32::from_be_bytes([f[1], f[2], f[3], f[4]]);
        self.frames.iter().map(|f| (f[0] & 0x3F, argument(f))).collect()
    }

    pub fn indices(&self) -> Vec<u8> {
        self.commands().into_iter().map(|(index, _)| index).collect()
    }

    pub fn exchanges(&self) -> usize {
        self.exchanged
    }

    pub fn last_frame_end(&self) -> Option<usize> {
        self.frame_ends.last().copied()
    }

    pub fn exchanges_since(&self, position: usize) -> usize {
        let events = &self.events[position + 1..];
        events.iter().filter(|e| matches!(e, Event::Exchange { .. })).count()
    }

    /// Bytes clocked between the start token answering the last command and
    /// the following deselect
    pub fn exchanges_after_token(&self) -> Option<usize> {
        let start = self.last_frame_end()? + 1;
        let token = Event::Exchange { tx: 0xFF, rx: 0xFE };
        let token = start + self.events[start..].iter().position(|e| *e == token)?;
        let events = self.events[token + 1..].iter();
        let events = events.take_while(|e| **e != Event::Select(false));
        Some(events.filter(|e| matches!(e, Event::Exchange { .. })).count())
    }

    pub fn sector(&self, sector: usize) -> &[u8] {
        &self.storage[sector * BLOCK_SIZE..(sector + 1) * BLOCK_SIZE]
    }

    fn idle(&self) -> u8 {
        match self.model {
            Model::Absent => 0xFF,
            _ => 0x00,
        }
    }

    fn sector_of(&self, address: u32) -> Option<usize> {
        let sector = match self.model {
            Model::SD2 { block: true } => address as usize,
            _ => address as usize / BLOCK_SIZE,
        };
        (sector < SECTORS).then_some(sector)
    }

    fn op_cond(&mut self) -> Vec<u8> {
        self.op_cond_attempts += 1;
        self.ready = self.op_cond_attempts > self.op_cond_polls;
        vec![0xFF, !self.ready as u8]
    }

    fn answer(&mut self, index: u8, argument: u32) -> Vec<u8> {
        if let Some(bytes) = self.overrides.get(&index) {
            return bytes.clone();
        }
        let r1 = |byte: u8| vec![0xFF, byte];
        match (self.model, index) {
            (Model::Absent, _) => vec![],
            (_, 0) => {
                self.ready = false;
                self.op_cond_attempts = 0;
                r1(0x01)
            }
            (Model::SD2 { .. }, 8) => vec![0xFF, 0x01, 0x00, 0x00, 0x01, 0xAA],
            (_, 8) => r1(0x05),
            (Model::MMC, 55) => r1(0x05),
            (_, 55) => r1(!self.ready as u8),
            (Model::MMC, 1) | (Model::SD1, 41) | (Model::SD2 { .. }, 41) => self.op_cond(),
            (Model::SD2 { block }, 58) => vec![0xFF, 0x00, 0x80 | (block as u8) << 6, 0xFF, 0x80, 0x00],
            (_, 16) => r1(0x00),
            (_, 17) => {
                let sector = match self.sector_of(argument) {
                    Some(sector) => sector,
                    None => return r1(0x20),
                };
                let mut bytes = r1(0x00);
                bytes.extend(std::iter::repeat(0xFF).take(self.token_delay));
                bytes.push(self.token);
                if self.token == 0xFE {
                    bytes.extend_from_slice(self.sector(sector));
                    bytes.extend_from_slice(&[0xAB, 0xCD]);
                }
                bytes
            }
            (_, 24) => {
                if self.sector_of(argument).is_none() {
                    return r1(0x20);
                }
                self.write = Some(Write::Token(argument));
                r1(0x00)
            }
            (_, 12) => vec![0x00, 0x00],
            _ => r1(0x04),
        }
    }

    fn commit(&mut self, address: u32, data: &[u8]) {
        if let Some(sector) = self.sector_of(address) {
            self.storage[sector * BLOCK_SIZE..(sector + 1) * BLOCK_SIZE].copy_from_slice(&data[..BLOCK_SIZE]);
        }
        self.queue.push_back(self.data_response);
        self.queue.extend(std::iter::repeat(0x00).take(self.busy_polls));
        self.queue.push_back(0xFF);
    }

    fn receive(&mut self, tx: u8) {
        match self.write.take() {
            Some(Write::Token(address)) => {
                self.write = Some(match tx {
                    0xFE => Write::Data(address, Vec::with_capacity(BLOCK_SIZE + 2)),
                    _ => Write::Token(address),
                });
                return;
            }
            Some(Write::Data(address, mut data)) => {
                data.push(tx);
                match data.len() {
                    n if n == BLOCK_SIZE + 2 => self.commit(address, &data),
                    _ => self.write = Some(Write::Data(address, data)),
                }
                return;
            }
            None => (),
        }
        if self.frame.is_empty() && tx & 0xC0 != 0x40 {
            return;
        }
        self.frame.push(tx);
        if self.frame.len() == 6 {
            let mut frame = [0u8; 6];
            frame.copy_from_slice(&self.frame);
            self.frame.clear();
            self.frames.push(frame);
            self.frame_ends.push(self.events.len());
            let argument = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
            let answer = self.answer(frame[0] & 0x3F, argument);
            self.queue.extend(answer);
        }
    }

    fn exchange(&mut self, tx: u8) -> Result<u8, Fault> {
        if self.fail_at == Some(self.exchanged) {
            return Err(Fault);
        }
        self.exchanged += 1;
        let rx = match self.selected {
            true => self.queue.pop_front().unwrap_or(self.idle()),
            false => 0xFF,
        };
        if self.selected {
            self.receive(tx);
        }
        self.events.push(Event::Exchange { tx, rx });
        Ok(rx)
    }

    fn set_selected(&mut self, selected: bool) {
        if !selected {
            self.queue.clear();
            self.frame.clear();
            self.write = None;
        }
        self.selected = selected;
        self.events.push(Event::Select(selected));
    }
}

pub type Shared = Rc<RefCell<Card>>;

pub struct Spi(pub Shared);

impl Transfer for Spi {
    type Error = Fault;

    fn exchange(&mut self, byte: u8) -> Result<u8, Fault> {
        self.0.borrow_mut().exchange(byte)
    }

    fn set_clock(&mut self, clock: Clock) -> Result<(), Fault> {
        self.0.borrow_mut().events.push(Event::Clock(clock));
        Ok(())
    }
}

pub struct Pin(pub Shared);

impl OutputPin for Pin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().set_selected(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().set_selected(false);
        Ok(())
    }
}

pub struct Delay(pub Shared);

impl DelayMs<u32> for Delay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().slept_ms += ms;
    }
}

pub struct Switches(pub Shared);

impl Socket for Switches {
    fn card_present(&mut self) -> bool {
        self.0.borrow().present
    }

    fn write_protected(&mut self) -> bool {
        self.0.borrow().protected
    }
}

pub type MockBus = Bus<Spi, Pin, Delay, Switches>;

pub fn bus(model: Model) -> (MockBus, Shared) {
    let card = Rc::new(RefCell::new(Card::new(model)));
    let bus = Bus::new(Spi(card.clone()), Pin(card.clone()), Delay(card.clone()));
    (bus.with_socket(Switches(card.clone())), card)
}
