// Stand-in for rppal::gpio, compiled only for tests. Pin levels live in a
// thread-local table so parallel tests don't see each other's pins.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug)]
pub struct Error;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock GPIO error")
    }
}

impl std::error::Error for Error {}

thread_local! {
    static MOCK_PINS: RefCell<HashMap<u8, Level>> = RefCell::new(HashMap::new());
}

pub struct Gpio;

impl Gpio {
    pub fn new() -> Result<Self, Error> {
        Ok(Gpio)
    }

    pub fn get(&self, pin: u8) -> Result<Pin, Error> {
        Ok(Pin { pin })
    }
}

pub struct Pin {
    pin: u8,
}

impl Pin {
    pub fn into_input_pullup(self) -> InputPin {
        MOCK_PINS.with(|pins| {
            pins.borrow_mut().insert(self.pin, Level::High);
        });
        InputPin { pin: self.pin }
    }
}

pub struct InputPin {
    pin: u8,
}

impl InputPin {
    /// Unset pins read High, like a floating input held by the pull-up.
    pub fn read(&self) -> Level {
        MOCK_PINS.with(|pins| *pins.borrow().get(&self.pin).unwrap_or(&Level::High))
    }
}

// test helper to drive a pin
pub fn set_mock_pin_level(pin: u8, level: Level) {
    MOCK_PINS.with(|pins| {
        pins.borrow_mut().insert(pin, level);
    });
}

// test helper to reset all pins
pub fn reset_mock_pins() {
    MOCK_PINS.with(|pins| {
        pins.borrow_mut().clear();
    });
}
