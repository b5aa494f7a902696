//! The board's capacitive pads behind the core's [`TouchPlatform`] seam.
//!
//! The ESP32 touch peripheral runs in continuous measurement mode and a
//! periodic scan task stands in for the hardware interrupt, so
//! `arm_interrupt` only records the threshold — the comparison itself
//! happens in the dispatcher.

use capkit_core::touch::TouchPlatform;
use embassy_time::Instant;
use esp_hal::Blocking;
use esp_hal::peripherals::{GPIO4, GPIO15};
use esp_hal::touch::{Continuous, Touch, TouchPad};
use log::debug;

/// Touch pads wired on this board: GPIO4 (T0) and GPIO15 (T3).
pub struct BoardTouch<'d> {
    pad4: TouchPad<GPIO4<'d>>,
    pad15: TouchPad<GPIO15<'d>>,
}

impl<'d> BoardTouch<'d> {
    pub fn new(touch: &Touch<'d, Continuous, Blocking>, gpio4: GPIO4<'d>, gpio15: GPIO15<'d>) -> Self {
        Self {
            pad4: TouchPad::new(gpio4, touch),
            pad15: TouchPad::new(gpio15, touch),
        }
    }
}

impl TouchPlatform for BoardTouch<'_> {
    fn read_raw(&mut self, pin: u8) -> u16 {
        let value = match pin {
            4 => self.pad4.try_read(),
            15 => self.pad15.try_read(),
            _ => None,
        };
        // An unmapped pin or a measurement still in flight reads as
        // "no touch".
        value.unwrap_or(u16::MAX)
    }

    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }

    fn arm_interrupt(&mut self, pin: u8, threshold: u16) {
        debug!("touch pad {pin} armed at threshold {threshold}");
    }
}
