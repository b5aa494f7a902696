//! Hardware-independent core library for capkit
//!
//! This crate contains all platform-agnostic logic for the capkit board
//! helpers: the debounced capacitive-touch event dispatcher, the WiFi
//! credential record and its non-volatile store, and the serial
//! provisioning prompt.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod creds;
pub mod provision;
pub mod touch;
