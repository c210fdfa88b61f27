//! Door supervisor: lock, indicator, alarm and actuator relays plus the
//! debounced door-position sensor, composed into one lifecycle.
//!
//! ```text
//! secure     -- activate() ------------> unlocked
//! secure     -- sensor open -----------> tamper
//! unlocked   -- sensor open -----------> open
//! unlocked   -- lock inactive ---------> locking
//! locking    -- sensor open -----------> open
//! locking    -- lock inactive ---------> secure
//! open       -- sensor closed ---------> locking
//! open       -- open too long ---------> alarm
//! alarm      -- sensor closed ---------> unalarming
//! unalarming -- sensor open -----------> alarm
//! unalarming -- lock inactive ---------> secure
//! tamper     -- sensor closed ---------> secure
//! tamper     -- still open after 10 s -> alarm
//! ```
//!
//! [`Door::update`] polls every relay and the sensor, then takes at most
//! one transition. Nothing outside this module assigns the state.
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::config::{DoorConfig, RelayConfig};
//! use rs_doorman::door::{Door, DoorRelays, DoorState};
//! use rs_doorman::hal::{MockContact, MockRelayDriver};
//! use rs_doorman::relay::Relay;
//! use rs_doorman::sensor::DebouncedContact;
//!
//! let lock = Relay::new("lock", MockRelayDriver::new(), &RelayConfig::default());
//! let relays = DoorRelays::with_lock(lock);
//! let sensor = DebouncedContact::new(MockContact::new(false), 2000);
//! let mut door = Door::new(relays, Some(sensor), &DoorConfig::default());
//!
//! door.begin(0);
//! assert_eq!(door.state(), DoorState::Locking);
//! door.update(10);
//! assert_eq!(door.state(), DoorState::Secure);
//!
//! assert!(door.activate(20));
//! assert_eq!(door.state(), DoorState::Unlocked);
//! ```

extern crate alloc;
use alloc::boxed::Box;

use crate::config::DoorConfig;
use crate::relay::{OperationState, OverrideState, Relay};
use crate::sensor::DebouncedContact;
use crate::traits::{DoorContact, RelayDriver};

/// Lifecycle state of the door.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorState {
    /// Closed and locked.
    Secure,
    /// Lock released after a grant, door still closed.
    Unlocked,
    /// Lock returning to inactive, verifying the door stays shut.
    Locking,
    /// Opened after a grant.
    Open,
    /// Open too long, or tamper escalated.
    Alarm,
    /// Closed after an alarm, waiting for the lock.
    Unalarming,
    /// Opened without a grant.
    Tamper,
}

impl DoorState {
    /// Label used in logs and telemetry.
    pub fn label(self) -> &'static str {
        match self {
            DoorState::Secure => "secure",
            DoorState::Unlocked => "unlocked",
            DoorState::Locking => "locking",
            DoorState::Open => "open",
            DoorState::Alarm => "alarm",
            DoorState::Unalarming => "unalarming",
            DoorState::Tamper => "tamper",
        }
    }
}

/// Notifications emitted by the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorEvent {
    /// The door entered a new state.
    StateChanged(DoorState),
    /// Tamper raised (`true`) or cleared (`false`).
    Tamper(bool),
    /// Alarm raised (`true`) or cleared (`false`).
    Alarm(bool),
}

/// Receives every [`DoorEvent`].
pub type DoorCallback = Box<dyn FnMut(DoorEvent)>;

/// The outputs a door may have. Any of them may be absent.
pub struct DoorRelays<D: RelayDriver> {
    /// Electric strike or maglock.
    pub lock: Option<Relay<D>>,
    /// Access indicator (LED, buzzer).
    pub indicator: Option<Relay<D>>,
    /// Siren.
    pub alarm: Option<Relay<D>>,
    /// Door-opener pulse, fired once per grant.
    pub open: Option<Relay<D>>,
    /// Door-closer pulse.
    pub close: Option<Relay<D>>,
}

impl<D: RelayDriver> Default for DoorRelays<D> {
    fn default() -> Self {
        Self {
            lock: None,
            indicator: None,
            alarm: None,
            open: None,
            close: None,
        }
    }
}

impl<D: RelayDriver> DoorRelays<D> {
    /// Only a lock relay.
    pub fn with_lock(lock: Relay<D>) -> Self {
        Self {
            lock: Some(lock),
            ..Self::default()
        }
    }

    /// Set the indicator relay.
    pub fn with_indicator(mut self, relay: Relay<D>) -> Self {
        self.indicator = Some(relay);
        self
    }

    /// Set the alarm relay.
    pub fn with_alarm(mut self, relay: Relay<D>) -> Self {
        self.alarm = Some(relay);
        self
    }

    /// Set the door-opener relay.
    pub fn with_open(mut self, relay: Relay<D>) -> Self {
        self.open = Some(relay);
        self
    }

    /// Set the door-closer relay.
    pub fn with_close(mut self, relay: Relay<D>) -> Self {
        self.close = Some(relay);
        self
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut Relay<D>> {
        [
            self.lock.as_mut(),
            self.indicator.as_mut(),
            self.alarm.as_mut(),
            self.open.as_mut(),
            self.close.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

fn hold(relay: &mut Option<Relay<impl RelayDriver>>, now_ms: u64) {
    if let Some(r) = relay {
        r.hold(now_ms);
    }
}

fn release(relay: &mut Option<Relay<impl RelayDriver>>) {
    if let Some(r) = relay {
        r.release();
    }
}

/// Release the override and drop the output.
fn clear(relay: &mut Option<Relay<impl RelayDriver>>, now_ms: u64) {
    if let Some(r) = relay {
        r.release();
        r.deactivate(now_ms);
    }
}

fn is_active(relay: &Option<Relay<impl RelayDriver>>) -> bool {
    relay
        .as_ref()
        .is_some_and(|r| r.operation() == OperationState::Active)
}

/// Hold unless something else already overrides it.
fn hold_if_normal(relay: &mut Option<Relay<impl RelayDriver>>, now_ms: u64) {
    if let Some(r) = relay {
        if r.override_state() == OverrideState::Normal {
            r.hold(now_ms);
        }
    }
}

/// Single-door supervisor.
pub struct Door<D: RelayDriver, C: DoorContact> {
    relays: DoorRelays<D>,
    sensor: Option<DebouncedContact<C>>,
    state: DoorState,
    since_ms: u64,
    trigger_open: bool,
    max_open_ms: u64,
    tamper_alarm_ms: u64,
    on_event: Option<DoorCallback>,
}

impl<D: RelayDriver, C: DoorContact> Door<D, C> {
    /// Compose a door. Call [`begin`](Self::begin) before the first update.
    pub fn new(relays: DoorRelays<D>, sensor: Option<DebouncedContact<C>>, config: &DoorConfig) -> Self {
        Self {
            relays,
            sensor,
            state: DoorState::Secure,
            since_ms: 0,
            trigger_open: false,
            max_open_ms: u64::from(config.max_open_secs) * 1000,
            tamper_alarm_ms: u64::from(config.tamper_alarm_ms),
            on_event: None,
        }
    }

    /// Register the event callback.
    pub fn set_on_event(&mut self, callback: DoorCallback) {
        self.on_event = Some(callback);
    }

    /// Current state.
    pub fn state(&self) -> DoorState {
        self.state
    }

    /// The door's relays.
    pub fn relays(&self) -> &DoorRelays<D> {
        &self.relays
    }

    /// Mutable access to the relays, e.g. to pulse the close relay.
    pub fn relays_mut(&mut self) -> &mut DoorRelays<D> {
        &mut self.relays
    }

    /// The debounced sensor, if fitted.
    pub fn sensor_mut(&mut self) -> Option<&mut DebouncedContact<C>> {
        self.sensor.as_mut()
    }

    /// Reset every relay and pick the boot state from the sensor.
    ///
    /// No sensor: `secure`. Door open: treated as a grant in progress
    /// (`unlocked`). Door closed: `locking`, which settles to `secure` once
    /// the lock reads inactive.
    pub fn begin(&mut self, now_ms: u64) {
        for relay in self.relays.all_mut() {
            relay.begin(now_ms);
        }
        let open = match self.sensor.as_mut() {
            Some(sensor) => {
                sensor.begin(now_ms);
                Some(sensor.is_open())
            }
            None => None,
        };
        self.trigger_open = false;
        match open {
            None => self.enter(DoorState::Secure, now_ms),
            Some(true) => {
                log::info!("door: open at boot, assuming previously activated");
                self.unlock(now_ms);
            }
            Some(false) => self.enter(DoorState::Locking, now_ms),
        }
    }

    /// Unlock for an authorised entry.
    ///
    /// Accepted in `secure`, `locking` and `unlocked` (restarts the unlock
    /// timing). Rejected in `open`, `alarm`, `unalarming` and `tamper`,
    /// where the relays are pinned by overrides. Returns whether the
    /// request was accepted.
    pub fn activate(&mut self, now_ms: u64) -> bool {
        match self.state {
            DoorState::Secure | DoorState::Locking | DoorState::Unlocked => {
                self.trigger_open = self.state == DoorState::Secure
                    || (self.state == DoorState::Unlocked && self.trigger_open);
                self.unlock(now_ms);
                true
            }
            DoorState::Open | DoorState::Alarm | DoorState::Unalarming | DoorState::Tamper => {
                log::warn!("door: activate rejected in state {}", self.state.label());
                false
            }
        }
    }

    /// Poll relays and sensor, then take at most one transition.
    ///
    /// Returns true if a relay auto-deactivated, the opener fired, or the
    /// state changed.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let mut acted = false;
        for relay in self.relays.all_mut() {
            acted |= relay.update(now_ms);
        }
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.update(now_ms);
        }

        let open = self.sensor_open();
        let lock = self.lock_operation();
        let elapsed = now_ms.saturating_sub(self.since_ms);

        let next = match self.state {
            DoorState::Secure => {
                if is_active(&self.relays.alarm) {
                    clear(&mut self.relays.alarm, now_ms);
                }
                if is_active(&self.relays.indicator) {
                    clear(&mut self.relays.indicator, now_ms);
                }
                if open {
                    self.trigger_open = false;
                    log::warn!("door: opened while secure, tamper");
                    self.emit(DoorEvent::Tamper(true));
                    Some(DoorState::Tamper)
                } else {
                    self.trigger_open = true;
                    None
                }
            }
            DoorState::Unlocked => {
                if open {
                    self.hold_lock_and_indicator(now_ms, false);
                    Some(DoorState::Open)
                } else if self.trigger_open && lock == OperationState::Active {
                    self.trigger_open = false;
                    if let Some(opener) = self.relays.open.as_mut() {
                        if opener.operation() == OperationState::Inactive {
                            opener.activate(now_ms);
                            acted = true;
                        }
                    }
                    None
                } else if lock == OperationState::Inactive {
                    release(&mut self.relays.indicator);
                    Some(DoorState::Locking)
                } else {
                    None
                }
            }
            DoorState::Locking => {
                if open {
                    self.hold_lock_and_indicator(now_ms, false);
                    Some(DoorState::Open)
                } else if lock == OperationState::Inactive {
                    Some(DoorState::Secure)
                } else {
                    None
                }
            }
            DoorState::Open => {
                if !open {
                    // Release only: a still-running actuation keeps its timing
                    release(&mut self.relays.lock);
                    Some(DoorState::Locking)
                } else if self.max_open_ms > 0 && elapsed > self.max_open_ms {
                    log::warn!("door: open longer than {} ms, alarm", self.max_open_ms);
                    self.raise_alarm(now_ms);
                    Some(DoorState::Alarm)
                } else {
                    None
                }
            }
            DoorState::Alarm => {
                if !open {
                    clear(&mut self.relays.lock, now_ms);
                    clear(&mut self.relays.indicator, now_ms);
                    Some(DoorState::Unalarming)
                } else {
                    None
                }
            }
            DoorState::Unalarming => {
                if open {
                    log::warn!("door: reopened before relock, alarm");
                    self.hold_lock_and_indicator(now_ms, true);
                    Some(DoorState::Alarm)
                } else if lock == OperationState::Inactive {
                    self.emit(DoorEvent::Alarm(false));
                    Some(DoorState::Secure)
                } else {
                    None
                }
            }
            DoorState::Tamper => {
                if !open {
                    self.emit(DoorEvent::Tamper(false));
                    Some(DoorState::Secure)
                } else if elapsed > self.tamper_alarm_ms {
                    log::warn!("door: tamper persisted {} ms, alarm", self.tamper_alarm_ms);
                    self.hold_lock_and_indicator(now_ms, true);
                    self.raise_alarm(now_ms);
                    Some(DoorState::Alarm)
                } else {
                    None
                }
            }
        };

        if let Some(next) = next {
            // Bouncing between open and locking keeps the first open time
            let keep_since = matches!(
                (self.state, next),
                (DoorState::Open, DoorState::Locking) | (DoorState::Locking, DoorState::Open)
            );
            let since = if keep_since { self.since_ms } else { now_ms };
            self.enter(next, now_ms);
            self.since_ms = since;
            acted = true;
        }
        acted
    }

    fn unlock(&mut self, now_ms: u64) {
        if let Some(lock) = self.relays.lock.as_mut() {
            lock.activate(now_ms);
        }
        if let Some(indicator) = self.relays.indicator.as_mut() {
            indicator.activate(now_ms);
        }
        if self.state == DoorState::Unlocked {
            self.since_ms = now_ms;
        } else {
            self.enter(DoorState::Unlocked, now_ms);
        }
    }

    fn hold_lock_and_indicator(&mut self, now_ms: u64, indicator_if_normal: bool) {
        hold(&mut self.relays.lock, now_ms);
        if indicator_if_normal {
            hold_if_normal(&mut self.relays.indicator, now_ms);
        } else {
            hold(&mut self.relays.indicator, now_ms);
        }
    }

    fn raise_alarm(&mut self, now_ms: u64) {
        if let Some(alarm) = self.relays.alarm.as_mut() {
            alarm.activate(now_ms);
        }
        self.emit(DoorEvent::Alarm(true));
    }

    fn enter(&mut self, next: DoorState, now_ms: u64) {
        log::info!("door: {} -> {}", self.state.label(), next.label());
        self.state = next;
        self.since_ms = now_ms;
        self.emit(DoorEvent::StateChanged(next));
    }

    fn emit(&mut self, event: DoorEvent) {
        if let Some(cb) = self.on_event.as_mut() {
            cb(event);
        }
    }

    fn sensor_open(&self) -> bool {
        self.sensor.as_ref().is_some_and(|s| s.is_open())
    }

    /// An absent lock reads as inactive.
    fn lock_operation(&self) -> OperationState {
        self.relays
            .lock
            .as_ref()
            .map_or(OperationState::Inactive, |r| r.operation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::hal::{MockContact, MockRelayDriver};
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    const DEBOUNCE: u64 = 2000;

    type TestDoor = Door<MockRelayDriver, MockContact>;

    fn relay(name: &'static str, actuation_ms: u32) -> Relay<MockRelayDriver> {
        let config = RelayConfig::default().with_actuation_ms(actuation_ms);
        Relay::new(name, MockRelayDriver::new(), &config)
    }

    fn door(open: bool, config: DoorConfig) -> (TestDoor, Rc<RefCell<Vec<DoorEvent>>>) {
        let relays = DoorRelays::with_lock(relay("lock", 3000))
            .with_indicator(relay("indicator", 3000))
            .with_alarm(relay("alarm", 0))
            .with_open(relay("open", 500));
        let sensor = DebouncedContact::new(MockContact::new(open), DEBOUNCE as u32);
        let mut door = Door::new(relays, Some(sensor), &config);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        door.set_on_event(Box::new(move |e| sink.borrow_mut().push(e)));
        door.begin(0);
        (door, events)
    }

    fn set_open(door: &mut TestDoor, open: bool) {
        if let Some(sensor) = door.sensor_mut() {
            sensor.contact_mut().open = open;
        }
    }

    /// Change the raw input and run updates until the debounce settles.
    fn settle(door: &mut TestDoor, open: bool, from_ms: u64) -> u64 {
        set_open(door, open);
        door.update(from_ms);
        door.update(from_ms + DEBOUNCE);
        from_ms + DEBOUNCE
    }

    fn secure_door(config: DoorConfig) -> (TestDoor, Rc<RefCell<Vec<DoorEvent>>>) {
        let (mut d, events) = door(false, config);
        d.update(1);
        assert_eq!(d.state(), DoorState::Secure);
        events.borrow_mut().clear();
        (d, events)
    }

    // ========================================================================
    // Boot
    // ========================================================================

    #[test]
    fn boot_without_sensor_is_secure() {
        let relays = DoorRelays::with_lock(relay("lock", 3000));
        let mut d: TestDoor = Door::new(relays, None, &DoorConfig::default());
        d.begin(0);
        assert_eq!(d.state(), DoorState::Secure);
    }

    #[test]
    fn boot_closed_is_locking_then_secure() {
        let (mut d, _) = door(false, DoorConfig::default());
        assert_eq!(d.state(), DoorState::Locking);
        d.update(1);
        assert_eq!(d.state(), DoorState::Secure);
    }

    #[test]
    fn boot_open_is_unlocked_then_open() {
        let (mut d, _) = door(true, DoorConfig::default());
        assert_eq!(d.state(), DoorState::Unlocked);
        d.update(1);
        assert_eq!(d.state(), DoorState::Open);
        let lock = d.relays().lock.as_ref().unwrap();
        assert_eq!(lock.override_state(), OverrideState::Holding);
    }

    // ========================================================================
    // Grant cycle
    // ========================================================================

    #[test]
    fn grant_without_opening_relocks() {
        let (mut d, _) = secure_door(DoorConfig::default());
        assert!(d.activate(100));
        assert_eq!(d.state(), DoorState::Unlocked);
        // Opener fires once the lock is active
        assert!(d.update(101));
        assert_eq!(
            d.relays().open.as_ref().unwrap().operation(),
            OperationState::Active
        );
        d.update(3000);
        assert_eq!(d.state(), DoorState::Unlocked);
        d.update(3101); // lock times out
        assert_eq!(d.state(), DoorState::Locking);
        d.update(3102);
        assert_eq!(d.state(), DoorState::Secure);
    }

    #[test]
    fn grant_then_open_then_close() {
        let (mut d, events) = secure_door(DoorConfig::default());
        d.activate(100);
        let t = settle(&mut d, true, 200);
        assert_eq!(d.state(), DoorState::Open);
        // Held well past the lock's actuation time
        d.update(t + 10_000);
        assert_eq!(d.state(), DoorState::Open);

        let t = settle(&mut d, false, t + 10_000);
        assert_eq!(d.state(), DoorState::Locking);
        d.update(t + 1); // released lock is overdue, deactivates
        d.update(t + 2);
        assert_eq!(d.state(), DoorState::Secure);

        let states: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                DoorEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            [
                DoorState::Unlocked,
                DoorState::Open,
                DoorState::Locking,
                DoorState::Secure
            ]
        );
    }

    #[test]
    fn reopen_while_locking_goes_back_to_open() {
        let (mut d, _) = secure_door(DoorConfig::default());
        d.activate(100);
        let t = settle(&mut d, true, 200);
        let t = settle(&mut d, false, t);
        assert_eq!(d.state(), DoorState::Locking);
        let lock = d.relays().lock.as_ref().unwrap();
        assert_eq!(lock.override_state(), OverrideState::Normal);

        settle(&mut d, true, t);
        assert_eq!(d.state(), DoorState::Open);
        let lock = d.relays().lock.as_ref().unwrap();
        assert_eq!(lock.override_state(), OverrideState::Holding);
    }

    // ========================================================================
    // Alarm and tamper
    // ========================================================================

    #[test]
    fn open_too_long_raises_alarm() {
        let config = DoorConfig::default().with_max_open_secs(30);
        let (mut d, events) = secure_door(config);
        d.activate(100);
        let t = settle(&mut d, true, 200);
        assert_eq!(d.state(), DoorState::Open);
        d.update(t + 30_000);
        assert_eq!(d.state(), DoorState::Open);
        d.update(t + 30_001);
        assert_eq!(d.state(), DoorState::Alarm);
        assert!(events.borrow().contains(&DoorEvent::Alarm(true)));
        assert_eq!(
            d.relays().alarm.as_ref().unwrap().operation(),
            OperationState::Active
        );

        let t = settle(&mut d, false, t + 30_001);
        assert_eq!(d.state(), DoorState::Unalarming);
        d.update(t + 1);
        assert_eq!(d.state(), DoorState::Secure);
        assert!(events.borrow().contains(&DoorEvent::Alarm(false)));
        // Secure clears the siren
        d.update(t + 2);
        assert_eq!(
            d.relays().alarm.as_ref().unwrap().operation(),
            OperationState::Inactive
        );
    }

    #[test]
    fn tamper_clears_when_closed() {
        let (mut d, events) = secure_door(DoorConfig::default());
        let t = settle(&mut d, true, 100);
        assert_eq!(d.state(), DoorState::Tamper);
        let t = settle(&mut d, false, t);
        assert_eq!(d.state(), DoorState::Secure);
        assert_eq!(
            events.borrow().iter().filter(|e| matches!(e, DoorEvent::Tamper(_))).count(),
            2
        );
    }

    #[test]
    fn tamper_escalates_after_timeout() {
        let (mut d, events) = secure_door(DoorConfig::default());
        let t = settle(&mut d, true, 100);
        d.update(t + 10_000);
        assert_eq!(d.state(), DoorState::Tamper);
        d.update(t + 10_001);
        assert_eq!(d.state(), DoorState::Alarm);
        assert!(events.borrow().contains(&DoorEvent::Alarm(true)));
        let lock = d.relays().lock.as_ref().unwrap();
        assert_eq!(lock.override_state(), OverrideState::Holding);
    }

    #[test]
    fn activate_rejected_while_open_or_alarmed() {
        let (mut d, _) = secure_door(DoorConfig::default());
        settle(&mut d, true, 100);
        assert_eq!(d.state(), DoorState::Tamper);
        assert!(!d.activate(2200));
        assert_eq!(d.state(), DoorState::Tamper);
    }

    #[test]
    fn activate_while_unlocked_restarts_timing() {
        let (mut d, _) = secure_door(DoorConfig::default());
        d.activate(100);
        d.update(101);
        assert!(d.activate(2000));
        d.update(3101);
        assert_eq!(d.state(), DoorState::Unlocked);
        d.update(5001);
        assert_eq!(d.state(), DoorState::Locking);
    }

    #[test]
    fn one_transition_per_update() {
        let (mut d, _) = door(false, DoorConfig::default());
        assert_eq!(d.state(), DoorState::Locking);
        // Locking -> Secure in this call; Secure's own checks wait for the next
        d.update(1);
        assert_eq!(d.state(), DoorState::Secure);
    }
}
