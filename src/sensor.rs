//! Debounced door-position input and the request-to-exit button.
//!
//! A reading only becomes the stable state after it has held unchanged for
//! the full debounce interval. Door latches chatter for a long time, so the
//! default interval is two seconds; the exit button uses a short one.

extern crate alloc;
use alloc::boxed::Box;

use crate::traits::DoorContact;

/// Called with `true` when the door reads open, `false` when closed.
pub type ContactCallback = Box<dyn FnMut(bool)>;

/// Stable-interval debouncer around a raw [`DoorContact`].
pub struct DebouncedContact<C: DoorContact> {
    contact: C,
    interval_ms: u64,
    stable: bool,
    unstable: bool,
    changed_at_ms: u64,
    on_change: Option<ContactCallback>,
}

impl<C: DoorContact> DebouncedContact<C> {
    /// Debounce `contact` over `interval_ms`.
    pub fn new(contact: C, interval_ms: u32) -> Self {
        Self {
            contact,
            interval_ms: u64::from(interval_ms),
            stable: false,
            unstable: false,
            changed_at_ms: 0,
            on_change: None,
        }
    }

    /// Register a change callback.
    pub fn set_on_change(&mut self, callback: ContactCallback) {
        self.on_change = Some(callback);
    }

    /// Take the initial reading as stable and report it.
    pub fn begin(&mut self, now_ms: u64) {
        let reading = self.contact.is_open();
        self.stable = reading;
        self.unstable = reading;
        self.changed_at_ms = now_ms;
        self.notify();
    }

    /// Sample the input. Returns true if the stable state changed.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let reading = self.contact.is_open();
        if reading != self.unstable {
            self.unstable = reading;
            self.changed_at_ms = now_ms;
            return false;
        }
        if self.stable != self.unstable
            && now_ms.saturating_sub(self.changed_at_ms) >= self.interval_ms
        {
            self.stable = self.unstable;
            log::debug!("contact: {}", if self.stable { "active" } else { "idle" });
            self.notify();
            return true;
        }
        false
    }

    /// Debounced state: true if the door is open.
    pub fn is_open(&self) -> bool {
        self.stable
    }

    /// Borrow the raw contact.
    pub fn contact_mut(&mut self) -> &mut C {
        &mut self.contact
    }

    fn notify(&mut self) {
        let open = self.stable;
        if let Some(cb) = self.on_change.as_mut() {
            cb(open);
        }
    }
}

// ============================================================================
// Exit button
// ============================================================================

/// Request-to-exit push button on the inside of the door.
///
/// The wrapped input reads `true` while the button is held. Each debounced
/// press is reported once, on the press edge.
pub struct ExitButton<C: DoorContact> {
    input: DebouncedContact<C>,
}

impl<C: DoorContact> ExitButton<C> {
    /// Debounce `input` over `interval_ms`.
    pub fn new(input: C, interval_ms: u32) -> Self {
        Self {
            input: DebouncedContact::new(input, interval_ms),
        }
    }

    /// Take the current level as the resting state. A button held at boot
    /// does not count as a press.
    pub fn begin(&mut self, now_ms: u64) {
        self.input.begin(now_ms);
    }

    /// Sample the button. Returns true once per press.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let pressed = self.input.update(now_ms) && self.input.is_open();
        if pressed {
            log::info!("exit button pressed");
        }
        pressed
    }

    /// Borrow the raw input.
    pub fn input_mut(&mut self) -> &mut C {
        self.input.contact_mut()
    }
}
