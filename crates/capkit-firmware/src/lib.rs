//! ESP32 platform glue for capkit: flash-backed credential storage,
//! capacitive touch pads behind the core's platform trait, and the
//! WiFi/UDP connection helpers.

#![no_std]

pub mod flash;
pub mod net;
pub mod pads;
