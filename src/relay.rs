//! Timed relay output with a hold/lockout override layer.
//!
//! A [`Relay`] has two independent state dimensions:
//!
//! - [`OperationState`]: where the output is in its own timing cycle
//!   (`inactive -> activating -> active -> deactivating -> inactive`).
//! - [`OverrideState`]: whether higher-level logic has pinned it
//!   (`holding`, `lockedout`) or left it to self-time (`normal`).
//!
//! While pinned, [`activate`](Relay::activate) and
//! [`deactivate`](Relay::deactivate) are ignored and the actuation timeout
//! does not fire.
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::config::RelayConfig;
//! use rs_doorman::hal::MockRelayDriver;
//! use rs_doorman::relay::{OperationState, Relay};
//!
//! let config = RelayConfig::default().with_actuation_ms(3000);
//! let mut lock = Relay::new("lock", MockRelayDriver::new(), &config);
//! lock.begin(0);
//!
//! lock.activate(0);
//! assert_eq!(lock.operation(), OperationState::Active);
//!
//! assert!(!lock.update(3000));
//! assert!(lock.update(3001)); // momentary timeout, auto-deactivated
//! assert_eq!(lock.operation(), OperationState::Inactive);
//! ```

extern crate alloc;
use alloc::boxed::Box;

use crate::config::RelayConfig;
use crate::traits::RelayDriver;

/// Electrical polarity of the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlType {
    /// Energised when driven low.
    #[default]
    ActiveLow,
    /// Energised when driven high.
    ActiveHigh,
}

impl ControlType {
    fn level(self, energised: bool) -> bool {
        match self {
            ControlType::ActiveHigh => energised,
            ControlType::ActiveLow => !energised,
        }
    }
}

/// Self-timed position of the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    /// Energised and settled.
    Active,
    /// Energised, waiting out the mechanical delay.
    Activating,
    /// De-energised and settled.
    Inactive,
    /// De-energised, waiting out the mechanical delay.
    Deactivating,
}

impl OperationState {
    /// Label used in logs and telemetry.
    pub fn label(self) -> &'static str {
        match self {
            OperationState::Active => "active",
            OperationState::Activating => "activating",
            OperationState::Inactive => "inactive",
            OperationState::Deactivating => "deactivating",
        }
    }

    fn is_energised(self) -> bool {
        matches!(self, OperationState::Active | OperationState::Activating)
    }
}

/// Externally imposed pin on the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverrideState {
    /// Self-timing.
    #[default]
    Normal,
    /// Pinned energised.
    Holding,
    /// Pinned de-energised.
    LockedOut,
}

impl OverrideState {
    /// Label used in logs and telemetry.
    pub fn label(self) -> &'static str {
        match self {
            OverrideState::Normal => "normal",
            OverrideState::Holding => "holding",
            OverrideState::LockedOut => "lockedout",
        }
    }
}

/// Change notification: relay name, operation state, override state.
pub type RelayCallback = Box<dyn FnMut(&'static str, OperationState, OverrideState)>;

/// One physical output.
pub struct Relay<D: RelayDriver> {
    name: &'static str,
    driver: D,
    control: ControlType,
    actuation_ms: u64,
    delay_ms: u64,
    operation: OperationState,
    override_state: OverrideState,
    since_ms: u64,
    on_change: Option<RelayCallback>,
}

impl<D: RelayDriver> Relay<D> {
    /// Wrap `driver` with the timing in `config`.
    ///
    /// The output is not touched until [`begin`](Self::begin).
    pub fn new(name: &'static str, driver: D, config: &RelayConfig) -> Self {
        Self {
            name,
            driver,
            control: config.control,
            actuation_ms: u64::from(config.actuation_ms),
            delay_ms: u64::from(config.delay_ms),
            operation: OperationState::Inactive,
            override_state: OverrideState::Normal,
            since_ms: 0,
            on_change: None,
        }
    }

    /// Register a change callback. It never alters relay behaviour.
    pub fn set_on_change(&mut self, callback: RelayCallback) {
        self.on_change = Some(callback);
    }

    /// Relay name, used for logs and `io/<name>` topics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current operation state.
    pub fn operation(&self) -> OperationState {
        self.operation
    }

    /// Current override state.
    pub fn override_state(&self) -> OverrideState {
        self.override_state
    }

    /// Borrow the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Clear any override and drive the output de-energised.
    pub fn begin(&mut self, now_ms: u64) {
        self.override_state = OverrideState::Normal;
        self.write(false);
        self.operation = OperationState::Inactive;
        self.since_ms = now_ms;
        self.notify();
    }

    /// Energise the output. Ignored while overridden.
    ///
    /// On an already active relay this restarts the actuation timer.
    pub fn activate(&mut self, now_ms: u64) {
        if self.override_state != OverrideState::Normal {
            log::trace!("relay {}: activate ignored ({})", self.name, self.override_state.label());
            return;
        }
        if self.drive(true, now_ms) {
            self.notify();
        }
    }

    /// De-energise the output. Ignored while overridden.
    pub fn deactivate(&mut self, now_ms: u64) {
        if self.override_state != OverrideState::Normal {
            log::trace!("relay {}: deactivate ignored ({})", self.name, self.override_state.label());
            return;
        }
        if self.drive(false, now_ms) {
            self.notify();
        }
    }

    /// Pin the output energised until [`release`](Self::release).
    pub fn hold(&mut self, now_ms: u64) {
        self.drive(true, now_ms);
        self.set_override(OverrideState::Holding);
    }

    /// Pin the output de-energised until [`release`](Self::release).
    pub fn lockout(&mut self, now_ms: u64) {
        self.drive(false, now_ms);
        self.set_override(OverrideState::LockedOut);
    }

    /// Return to self-timing. No-op if already normal.
    ///
    /// The output is left where it is; a held relay that has outlived its
    /// actuation time deactivates on the next [`update`](Self::update).
    pub fn release(&mut self) {
        if self.override_state == OverrideState::Normal {
            return;
        }
        self.set_override(OverrideState::Normal);
    }

    /// Advance timing. Returns true if the relay auto-deactivated.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let elapsed = now_ms.saturating_sub(self.since_ms);
        match self.operation {
            OperationState::Activating | OperationState::Deactivating => {
                if elapsed > self.delay_ms {
                    self.operation = if self.operation == OperationState::Activating {
                        OperationState::Active
                    } else {
                        OperationState::Inactive
                    };
                    log::trace!("relay {}: {}", self.name, self.operation.label());
                    self.notify();
                }
                false
            }
            OperationState::Active => {
                // Measured from activation start, delay included
                if self.override_state == OverrideState::Normal
                    && self.actuation_ms > 0
                    && elapsed > self.actuation_ms
                {
                    self.deactivate(now_ms);
                    true
                } else {
                    false
                }
            }
            OperationState::Inactive => false,
        }
    }

    /// Move toward `energised`. Returns true if the operation state changed.
    fn drive(&mut self, energised: bool, now_ms: u64) -> bool {
        self.write(energised);
        self.since_ms = now_ms;
        if self.operation.is_energised() == energised {
            return false;
        }
        self.operation = match (energised, self.delay_ms > 0) {
            (true, true) => OperationState::Activating,
            (true, false) => OperationState::Active,
            (false, true) => OperationState::Deactivating,
            (false, false) => OperationState::Inactive,
        };
        log::debug!("relay {}: {}", self.name, self.operation.label());
        true
    }

    fn set_override(&mut self, state: OverrideState) {
        let changed = self.override_state != state;
        self.override_state = state;
        if changed {
            log::info!("relay {}: override {}", self.name, state.label());
        }
        self.notify();
    }

    fn write(&mut self, energised: bool) {
        if let Err(e) = self.driver.set_level(self.control.level(energised)) {
            log::error!("relay {}: output write failed: {:?}", self.name, e);
        }
    }

    fn notify(&mut self) {
        if let Some(cb) = self.on_change.as_mut() {
            cb(self.name, self.operation, self.override_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockRelayDriver;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    type Log = Rc<RefCell<Vec<(OperationState, OverrideState)>>>;

    fn relay(actuation_ms: u32, delay_ms: u32) -> (Relay<MockRelayDriver>, Log) {
        let config = RelayConfig::default()
            .with_actuation_ms(actuation_ms)
            .with_delay_ms(delay_ms);
        let mut relay = Relay::new("test", MockRelayDriver::new(), &config);
        relay.begin(0);
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        relay.set_on_change(Box::new(move |_, op, ov| sink.borrow_mut().push((op, ov))));
        (relay, log)
    }

    // ========================================================================
    // Polarity
    // ========================================================================

    #[test]
    fn active_low_drives_low_when_energised() {
        let (mut r, _) = relay(0, 0);
        assert!(r.driver().level); // begin(): de-energised = high
        r.activate(0);
        assert!(!r.driver().level);
    }

    #[test]
    fn active_high_polarity() {
        let config = RelayConfig::default().with_control(ControlType::ActiveHigh);
        let mut r = Relay::new("x", MockRelayDriver::new(), &config);
        r.begin(0);
        assert!(!r.driver().level);
        r.activate(0);
        assert!(r.driver().level);
    }

    // ========================================================================
    // Timing
    // ========================================================================

    #[test]
    fn delay_walks_through_transients() {
        let (mut r, log) = relay(1000, 100);
        r.activate(0);
        assert_eq!(r.operation(), OperationState::Activating);
        r.update(100);
        assert_eq!(r.operation(), OperationState::Activating);
        r.update(101);
        assert_eq!(r.operation(), OperationState::Active);
        assert!(r.update(1001));
        assert_eq!(r.operation(), OperationState::Deactivating);
        r.update(1102);
        assert_eq!(r.operation(), OperationState::Inactive);

        let ops: Vec<_> = log.borrow().iter().map(|(op, _)| *op).collect();
        assert_eq!(
            ops,
            [
                OperationState::Activating,
                OperationState::Active,
                OperationState::Deactivating,
                OperationState::Inactive,
            ]
        );
    }

    #[test]
    fn auto_deactivate_happens_exactly_once() {
        let (mut r, _) = relay(500, 0);
        r.activate(0);
        let acted = (0..=2000).step_by(10).filter(|&t| r.update(t)).count();
        assert_eq!(acted, 1);
        assert_eq!(r.operation(), OperationState::Inactive);
    }

    #[test]
    fn zero_actuation_stays_active() {
        let (mut r, _) = relay(0, 0);
        r.activate(0);
        assert!(!r.update(1_000_000));
        assert_eq!(r.operation(), OperationState::Active);
    }

    #[test]
    fn activate_while_active_restarts_timer() {
        let (mut r, log) = relay(500, 0);
        r.activate(0);
        r.activate(400);
        assert!(!r.update(800));
        assert!(r.update(901));
        // Second activate was not a state change
        assert_eq!(log.borrow().len(), 2);
    }

    // ========================================================================
    // Overrides
    // ========================================================================

    #[test]
    fn hold_suppresses_timeout_and_commands() {
        let (mut r, _) = relay(500, 0);
        r.hold(0);
        assert_eq!(r.override_state(), OverrideState::Holding);
        assert!(!r.update(10_000));
        r.deactivate(10_000);
        assert_eq!(r.operation(), OperationState::Active);

        r.release();
        assert!(r.update(10_001));
        assert_eq!(r.operation(), OperationState::Inactive);
    }

    #[test]
    fn lockout_pins_inactive() {
        let (mut r, _) = relay(500, 0);
        r.activate(0);
        r.lockout(10);
        assert_eq!(r.operation(), OperationState::Inactive);
        r.activate(20);
        assert_eq!(r.operation(), OperationState::Inactive);
        assert_eq!(r.override_state(), OverrideState::LockedOut);
    }

    #[test]
    fn hold_on_active_relay_does_not_regress() {
        let (mut r, _) = relay(500, 100);
        r.activate(0);
        r.update(101);
        r.hold(200);
        assert_eq!(r.operation(), OperationState::Active);
    }

    #[test]
    fn release_when_normal_is_silent() {
        let (mut r, log) = relay(500, 0);
        r.release();
        assert!(log.borrow().is_empty());
        assert_eq!(r.override_state(), OverrideState::Normal);
        assert_eq!(r.operation(), OperationState::Inactive);
    }

    #[test]
    fn release_reports_normal() {
        let (mut r, log) = relay(500, 0);
        r.hold(0);
        r.release();
        assert_eq!(
            log.borrow().last(),
            Some(&(OperationState::Active, OverrideState::Normal))
        );
    }

    #[test]
    fn labels() {
        assert_eq!(OperationState::Deactivating.label(), "deactivating");
        assert_eq!(OverrideState::LockedOut.label(), "lockedout");
    }
}
