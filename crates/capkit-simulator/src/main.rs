//! Desktop simulator for the capkit board helpers.
//!
//! Replays a scripted touch timeline through the dispatcher and runs the
//! credential store against an in-memory backing, so both can be
//! exercised without hardware. Events are printed via `env_logger`
//! (`RUST_LOG=info cargo run -p capkit-simulator`).

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;

use capkit_core::creds::{CredentialBacking, CredentialStore, RECORD_SIZE, WifiCredentials};
use capkit_core::touch::{
    REPEAT_INTERVAL_MS, SharedDispatcher, TOUCH_THRESHOLD, TouchDispatcher, TouchPlatform,
};

// ---------------------------------------------------------------------------
// Scripted hardware
// ---------------------------------------------------------------------------

/// Stand-in for the board's touch peripheral: pad readings are set by the
/// script and the clock advances only when told to.
struct ScriptedTouch {
    now_ms: u32,
    readings: HashMap<u8, u16>,
}

impl ScriptedTouch {
    fn new() -> Self {
        Self {
            now_ms: 0,
            readings: HashMap::new(),
        }
    }

    fn advance(&mut self, ms: u32) {
        self.now_ms = self.now_ms.wrapping_add(ms);
    }

    fn press(&mut self, pin: u8) {
        self.readings.insert(pin, TOUCH_THRESHOLD / 2);
    }

    fn release(&mut self, pin: u8) {
        self.readings.insert(pin, u16::MAX);
    }
}

impl TouchPlatform for ScriptedTouch {
    fn read_raw(&mut self, pin: u8) -> u16 {
        self.readings.get(&pin).copied().unwrap_or(u16::MAX)
    }

    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn arm_interrupt(&mut self, pin: u8, threshold: u16) {
        info!("armed touch interrupt: pin {pin}, threshold {threshold}");
    }
}

/// Credential backing that keeps the record in RAM.
struct MemoryBacking {
    record: [u8; RECORD_SIZE],
}

impl MemoryBacking {
    fn new() -> Self {
        Self {
            record: [0u8; RECORD_SIZE],
        }
    }
}

impl CredentialBacking for MemoryBacking {
    type Error = Infallible;

    fn load(&mut self, record: &mut [u8; RECORD_SIZE]) -> Result<(), Infallible> {
        record.copy_from_slice(&self.record);
        Ok(())
    }

    fn store(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), Infallible> {
        self.record.copy_from_slice(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Demo scenarios
// ---------------------------------------------------------------------------

fn credential_demo() {
    info!("--- credential store ---");
    let mut store = CredentialStore::new(MemoryBacking::new());

    // The in-memory backing is infallible; unwrap never fires here.
    let initial = store.read().unwrap();
    info!("fresh backing reads as: {initial:?}");

    let creds = WifiCredentials::new("simnet", "hunter2");
    store.write(&creds).unwrap();
    let reread = store.read().unwrap();
    info!("after write: {reread:?}");
    assert_eq!(reread, Some(creds));

    store.reset().unwrap();
    let after_reset = store.read().unwrap();
    info!("after reset: {after_reset:?}");
    assert_eq!(after_reset, None);
}

fn touch_demo() {
    info!("--- touch dispatcher ---");
    let shared = SharedDispatcher::new(TouchDispatcher::new(ScriptedTouch::new()));

    let events4 = Arc::new(AtomicUsize::new(0));
    let events15 = Arc::new(AtomicUsize::new(0));

    let counter = events4.clone();
    shared
        .register(4, move |index, state| {
            counter.fetch_add(1, Ordering::Relaxed);
            info!("pin 4 event (binding {index}): state={state}");
        })
        .expect("register pin 4");

    let counter = events15.clone();
    shared
        .register(15, move |index, state| {
            counter.fetch_add(1, Ordering::Relaxed);
            info!("pin 15 event (binding {index}): state={state}");
        })
        .expect("register pin 15");

    info!("{} bindings registered", shared.count());

    // Three touch cycles on pin 4 spaced well past the repeat interval;
    // pin 15 joins the first cycle only.
    shared.with(|d| {
        let pads = d.platform_mut();
        pads.advance(300);
        pads.press(4);
        pads.press(15);
    });
    shared.on_interrupt();

    // A bounce 50 ms later: sensed, suppressed, no event.
    shared.with(|d| {
        let pads = d.platform_mut();
        pads.advance(50);
        pads.release(15);
    });
    shared.on_interrupt();

    for _ in 0..2 {
        shared.with(|d| d.platform_mut().advance(300));
        shared.on_interrupt();
    }

    info!(
        "pin 4 fired {} times (state now {:?}), pin 15 fired {} times (state now {:?})",
        events4.load(Ordering::Relaxed),
        shared.pin_state(4),
        events15.load(Ordering::Relaxed),
        shared.pin_state(15),
    );
    assert_eq!(events4.load(Ordering::Relaxed), 3);
    assert_eq!(events15.load(Ordering::Relaxed), 1);

    shared.unregister(15);
    info!(
        "after unregistering pin 15: {} binding(s), repeat interval {} ms",
        shared.count(),
        REPEAT_INTERVAL_MS
    );
}

fn main() {
    env_logger::init();
    info!("Starting capkit simulator");

    credential_demo();
    touch_demo();

    info!("Simulator exiting");
}
