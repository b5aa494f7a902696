//! Debounced capacitive-touch event dispatch.
//!
//! [`TouchDispatcher`] keeps an ordered table of `(pin, action)` bindings.
//! Each scan reads the raw capacitive value of every registered pin,
//! applies a fixed sensitivity threshold and a repeat-interval debounce,
//! toggles the pin's logical state on an accepted touch and invokes the
//! bound action with the binding's index and the new state.
//!
//! The scan ([`TouchDispatcher::on_interrupt`]) is meant to run from the
//! platform's touch-interrupt context. It is allocation-free and bounded
//! by the number of bindings plus whatever the actions themselves do, so
//! actions must return promptly — a blocked action stalls the remaining
//! pins for that scan.
//!
//! Registration and removal grow/compact the table's backing storage and
//! therefore must never race an in-flight scan. [`SharedDispatcher`] wraps
//! the dispatcher in a critical-section mutex so table mutation and the
//! scan serialize against each other; use it whenever the scan runs from
//! interrupt context.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use thiserror_no_std::Error;

/// Raw sensor cutoff: a reading at or below this value counts as a touch
/// (lower reading = stronger touch).
pub const TOUCH_THRESHOLD: u16 = 20;

/// Minimum spacing between accepted touch events on one pin, in
/// milliseconds. Sensed touches inside this window are treated as bounces.
pub const REPEAT_INTERVAL_MS: u32 = 200;

/// Handler invoked on an accepted touch with the binding's table index and
/// the pin's new logical state.
pub type TouchAction = Box<dyn FnMut(usize, bool) + Send>;

/// Platform services the dispatcher consumes.
///
/// Raw reads are treated as infallible: the underlying sensor always
/// produces a value.
pub trait TouchPlatform {
    /// Raw capacitive reading for `pin`; lower values mean a stronger touch.
    fn read_raw(&mut self, pin: u8) -> u16;

    /// Monotonic milliseconds. Wraps at the platform word size; elapsed
    /// time is computed with wrapping subtraction.
    fn now_ms(&self) -> u32;

    /// Arm the hardware touch interrupt for `pin` at the given threshold.
    fn arm_interrupt(&mut self, pin: u8, threshold: u16);
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchError {
    /// The binding table could not grow. The table is left untouched and
    /// the pin is not armed.
    #[error("touch binding table allocation failed")]
    Allocation,
}

/// One registered pin: its callback plus the per-pin debounce state.
pub struct TouchBinding {
    pin: u8,
    state: bool,
    last_event_ms: u32,
    action: TouchAction,
}

impl TouchBinding {
    /// Physical pin this binding watches.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Last-known toggled logical state (`false` until the first accepted
    /// touch).
    pub fn state(&self) -> bool {
        self.state
    }

    /// Timestamp of the last *sensed* touch in milliseconds, `0` meaning
    /// never. Updated even when the touch is then suppressed as a bounce.
    pub fn last_event_ms(&self) -> u32 {
        self.last_event_ms
    }
}

/// Table of touch bindings plus the platform they are scanned against.
///
/// An owned, explicitly constructed instance — there is no process-wide
/// singleton. Indices handed to actions are table positions and shift
/// down when an earlier binding is unregistered.
pub struct TouchDispatcher<P: TouchPlatform> {
    platform: P,
    bindings: Vec<TouchBinding>,
}

impl<P: TouchPlatform> TouchDispatcher<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            bindings: Vec::new(),
        }
    }

    /// Appends a binding for `pin` and arms the hardware interrupt at
    /// [`TOUCH_THRESHOLD`].
    ///
    /// Registering an already-registered pin is allowed and creates a
    /// second, independent binding with its own debounce state; the
    /// hardware is simply armed again. Which arm call wins at that level
    /// is platform-defined.
    ///
    /// Fails with [`TouchError::Allocation`] if the table cannot grow, in
    /// which case nothing is mutated.
    pub fn register<F>(&mut self, pin: u8, action: F) -> Result<(), TouchError>
    where
        F: FnMut(usize, bool) + Send + 'static,
    {
        self.bindings
            .try_reserve(1)
            .map_err(|_| TouchError::Allocation)?;
        self.bindings.push(TouchBinding {
            pin,
            state: false,
            last_event_ms: 0,
            action: Box::new(action),
        });
        self.platform.arm_interrupt(pin, TOUCH_THRESHOLD);
        Ok(())
    }

    /// Removes the first binding matching `pin`, shifting later bindings
    /// down by one slot. No-op when the pin is not registered.
    pub fn unregister(&mut self, pin: u8) {
        if let Some(index) = self.bindings.iter().position(|b| b.pin == pin) {
            self.bindings.remove(index);
        }
    }

    /// First binding matching `pin`, if any.
    pub fn lookup(&self, pin: u8) -> Option<&TouchBinding> {
        self.bindings.iter().find(|b| b.pin == pin)
    }

    /// Number of registered bindings.
    pub fn count(&self) -> usize {
        self.bindings.len()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// One debounce scan over the whole table, in registration order.
    ///
    /// For each binding: a reading above [`TOUCH_THRESHOLD`] is skipped
    /// without touching any state. Otherwise the per-pin timestamp is
    /// refreshed *before* the repeat check, so the debounce window is
    /// measured from the last sensed touch, not the last accepted one: a
    /// continuously held touch keeps pushing the window forward and never
    /// re-fires until the pad is released and re-touched.
    ///
    /// Invoked by the platform's touch-interrupt mechanism (or a scan
    /// task standing in for it); not reentrant-safe against itself.
    pub fn on_interrupt(&mut self) {
        let Self {
            platform, bindings, ..
        } = self;

        for (index, binding) in bindings.iter_mut().enumerate() {
            let value = platform.read_raw(binding.pin);
            if value > TOUCH_THRESHOLD {
                // No touch on this pin.
                continue;
            }

            let now = platform.now_ms();
            let elapsed = now.wrapping_sub(binding.last_event_ms);
            binding.last_event_ms = now;

            if elapsed < REPEAT_INTERVAL_MS {
                // Bounce or repeat; timestamp above still moved forward.
                continue;
            }

            binding.state = !binding.state;
            (binding.action)(index, binding.state);
        }
    }
}

/// Interrupt-safe wrapper around a [`TouchDispatcher`].
///
/// Every operation runs inside a critical section, so registration and
/// removal from the main flow cannot race a scan fired from interrupt
/// context, and binding state is only ever observed under the same lock.
pub struct SharedDispatcher<P: TouchPlatform> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<TouchDispatcher<P>>>,
}

impl<P: TouchPlatform> SharedDispatcher<P> {
    pub fn new(dispatcher: TouchDispatcher<P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(dispatcher)),
        }
    }

    /// See [`TouchDispatcher::register`].
    pub fn register<F>(&self, pin: u8, action: F) -> Result<(), TouchError>
    where
        F: FnMut(usize, bool) + Send + 'static,
    {
        self.inner.lock(|d| d.borrow_mut().register(pin, action))
    }

    /// See [`TouchDispatcher::unregister`].
    pub fn unregister(&self, pin: u8) {
        self.inner.lock(|d| d.borrow_mut().unregister(pin));
    }

    pub fn count(&self) -> usize {
        self.inner.lock(|d| d.borrow().count())
    }

    /// Logical state of the first binding for `pin`, read under the lock.
    pub fn pin_state(&self, pin: u8) -> Option<bool> {
        self.inner
            .lock(|d| d.borrow().lookup(pin).map(TouchBinding::state))
    }

    /// Runs one scan under the lock.
    pub fn on_interrupt(&self) {
        self.inner.lock(|d| d.borrow_mut().on_interrupt());
    }

    /// Arbitrary access to the dispatcher under the lock. Keep the
    /// closure short; interrupts stay disabled for its duration.
    pub fn with<R>(&self, f: impl FnOnce(&mut TouchDispatcher<P>) -> R) -> R {
        self.inner.lock(|d| f(&mut d.borrow_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::sync::Arc;

    /// Scripted stand-in for the board's touch peripheral.
    struct FakePlatform {
        now_ms: u32,
        readings: BTreeMap<u8, u16>,
        armed: Vec<(u8, u16)>,
    }

    impl FakePlatform {
        fn new() -> Self {
            Self {
                now_ms: 0,
                readings: BTreeMap::new(),
                armed: Vec::new(),
            }
        }

        fn set_reading(&mut self, pin: u8, value: u16) {
            self.readings.insert(pin, value);
        }

        fn set_now(&mut self, now_ms: u32) {
            self.now_ms = now_ms;
        }
    }

    impl TouchPlatform for FakePlatform {
        fn read_raw(&mut self, pin: u8) -> u16 {
            self.readings.get(&pin).copied().unwrap_or(u16::MAX)
        }

        fn now_ms(&self) -> u32 {
            self.now_ms
        }

        fn arm_interrupt(&mut self, pin: u8, threshold: u16) {
            self.armed.push((pin, threshold));
        }
    }

    /// Shared event log the recorded actions push into. The mutex keeps
    /// the closures `Send` as the dispatcher requires.
    type EventLog = Arc<critical_section::Mutex<RefCell<Vec<(usize, bool)>>>>;

    fn event_log() -> EventLog {
        Arc::new(critical_section::Mutex::new(RefCell::new(Vec::new())))
    }

    fn recorder(log: &EventLog) -> impl FnMut(usize, bool) + Send + 'static {
        let log = log.clone();
        move |index, state| {
            critical_section::with(|cs| log.borrow(cs).borrow_mut().push((index, state)));
        }
    }

    fn events(log: &EventLog) -> Vec<(usize, bool)> {
        critical_section::with(|cs| log.borrow(cs).borrow().clone())
    }

    #[test]
    fn count_tracks_registrations() {
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        assert_eq!(dispatcher.count(), 0);

        dispatcher.register(4, |_, _| {}).unwrap();
        dispatcher.register(15, |_, _| {}).unwrap();
        dispatcher.register(27, |_, _| {}).unwrap();
        assert_eq!(dispatcher.count(), 3);
    }

    #[test]
    fn register_arms_interrupt_at_threshold() {
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, |_, _| {}).unwrap();

        assert_eq!(dispatcher.platform().armed, [(4, TOUCH_THRESHOLD)]);
    }

    #[test]
    fn unregister_compacts_and_shifts_indices() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, |_, _| {}).unwrap();
        dispatcher.register(15, |_, _| {}).unwrap();
        dispatcher.register(27, recorder(&log)).unwrap();

        dispatcher.unregister(15);
        assert_eq!(dispatcher.count(), 2);
        assert!(dispatcher.lookup(15).is_none());

        // Pin 27's binding moved down into slot 1.
        dispatcher.platform_mut().set_reading(27, 5);
        dispatcher.platform_mut().set_now(1_000);
        dispatcher.on_interrupt();
        assert_eq!(events(&log), [(1, true)]);
    }

    #[test]
    fn unregister_of_unknown_pin_is_a_noop() {
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, |_, _| {}).unwrap();

        dispatcher.unregister(99);
        assert_eq!(dispatcher.count(), 1);
    }

    #[test]
    fn first_touch_flips_state_and_fires_once() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();

        dispatcher.platform_mut().set_reading(4, TOUCH_THRESHOLD);
        dispatcher.platform_mut().set_now(REPEAT_INTERVAL_MS);
        dispatcher.on_interrupt();

        assert_eq!(events(&log), [(0, true)]);
        let binding = dispatcher.lookup(4).unwrap();
        assert!(binding.state());
        assert_eq!(binding.last_event_ms(), REPEAT_INTERVAL_MS);
    }

    #[test]
    fn repeat_within_window_is_suppressed_but_timestamp_moves() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();

        dispatcher.platform_mut().set_reading(4, 10);
        dispatcher.platform_mut().set_now(300);
        dispatcher.on_interrupt();

        // Second sensed touch 50 ms later: no event, timestamp refreshed.
        dispatcher.platform_mut().set_now(350);
        dispatcher.on_interrupt();

        assert_eq!(events(&log), [(0, true)]);
        let binding = dispatcher.lookup(4).unwrap();
        assert!(binding.state());
        assert_eq!(binding.last_event_ms(), 350);
    }

    #[test]
    fn held_touch_never_refires() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();

        dispatcher.platform_mut().set_reading(4, 10);
        let mut now = 300;
        dispatcher.platform_mut().set_now(now);
        dispatcher.on_interrupt();

        // Scans every 50 ms while the pad stays pressed: each one refreshes
        // the window, so no further events fire no matter how long the hold.
        for _ in 0..20 {
            now += 50;
            dispatcher.platform_mut().set_now(now);
            dispatcher.on_interrupt();
        }

        assert_eq!(events(&log), [(0, true)]);
    }

    #[test]
    fn reading_above_threshold_mutates_nothing() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();

        dispatcher.platform_mut().set_reading(4, TOUCH_THRESHOLD + 1);
        dispatcher.platform_mut().set_now(10_000);
        dispatcher.on_interrupt();

        assert!(events(&log).is_empty());
        let binding = dispatcher.lookup(4).unwrap();
        assert!(!binding.state());
        assert_eq!(binding.last_event_ms(), 0);
    }

    #[test]
    fn two_pins_toggle_independently() {
        let log4 = event_log();
        let log15 = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log4)).unwrap();
        dispatcher.register(15, recorder(&log15)).unwrap();

        // Three touch cycles on pin 4 spaced 300 ms apart; pin 15 joins
        // the first one only.
        dispatcher.platform_mut().set_reading(4, 8);
        dispatcher.platform_mut().set_reading(15, 8);
        dispatcher.platform_mut().set_now(300);
        dispatcher.on_interrupt();

        dispatcher.platform_mut().set_reading(15, u16::MAX);
        dispatcher.platform_mut().set_now(600);
        dispatcher.on_interrupt();

        dispatcher.platform_mut().set_now(900);
        dispatcher.on_interrupt();

        assert_eq!(events(&log4), [(0, true), (0, false), (0, true)]);
        assert_eq!(events(&log15), [(1, true)]);
    }

    #[test]
    fn duplicate_registration_keeps_independent_bindings() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();
        dispatcher.register(4, recorder(&log)).unwrap();

        assert_eq!(dispatcher.count(), 2);
        assert_eq!(
            dispatcher.platform().armed,
            [(4, TOUCH_THRESHOLD), (4, TOUCH_THRESHOLD)]
        );

        dispatcher.platform_mut().set_reading(4, 1);
        dispatcher.platform_mut().set_now(500);
        dispatcher.on_interrupt();

        // Both bindings see the same touch and fire with their own index.
        assert_eq!(events(&log), [(0, true), (1, true)]);
    }

    #[test]
    fn elapsed_time_wraps_with_the_clock() {
        let log = event_log();
        let mut dispatcher = TouchDispatcher::new(FakePlatform::new());
        dispatcher.register(4, recorder(&log)).unwrap();

        dispatcher.platform_mut().set_reading(4, 5);
        dispatcher.platform_mut().set_now(u32::MAX - 100);
        dispatcher.on_interrupt();

        // Clock wraps past zero: 300 ms of real time elapsed.
        dispatcher.platform_mut().set_now(199);
        dispatcher.on_interrupt();

        assert_eq!(events(&log), [(0, true), (0, false)]);
    }

    #[test]
    fn shared_dispatcher_serializes_access() {
        let log = event_log();
        let shared = SharedDispatcher::new(TouchDispatcher::new(FakePlatform::new()));
        shared.register(4, recorder(&log)).unwrap();
        assert_eq!(shared.count(), 1);
        assert_eq!(shared.pin_state(4), Some(false));

        shared.with(|d| {
            d.platform_mut().set_reading(4, 3);
            d.platform_mut().set_now(250);
        });
        shared.on_interrupt();

        assert_eq!(shared.pin_state(4), Some(true));
        assert_eq!(events(&log), [(0, true)]);

        shared.unregister(4);
        assert_eq!(shared.count(), 0);
        assert_eq!(shared.pin_state(4), None);
    }
}
