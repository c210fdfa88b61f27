//! Door supervisor scenarios with relays, contact and event stream

use std::cell::RefCell;
use std::rc::Rc;

use rs_doorman::{
    config::{DoorConfig, RelayConfig},
    hal::{MockContact, MockRelayDriver},
    sensor::{DebouncedContact, ExitButton},
    Door, DoorEvent, DoorRelays, DoorState, OperationState, OverrideState, Relay,
};

type TestDoor = Door<MockRelayDriver, MockContact>;
type Events = Rc<RefCell<Vec<DoorEvent>>>;

fn relay(name: &'static str, actuation_ms: u32, delay_ms: u32) -> Relay<MockRelayDriver> {
    let config = RelayConfig::default()
        .with_actuation_ms(actuation_ms)
        .with_delay_ms(delay_ms);
    Relay::new(name, MockRelayDriver::new(), &config)
}

/// Door with lock, indicator and a continuous alarm; contact debounce of zero.
fn door(config: DoorConfig) -> (TestDoor, Events) {
    let relays = DoorRelays::with_lock(relay("lock", 2000, 0))
        .with_indicator(relay("indicator", 2000, 0))
        .with_alarm(relay("alarm", 0, 0));
    let sensor = DebouncedContact::new(MockContact::new(false), 0);
    let mut door = Door::new(relays, Some(sensor), &config);
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    door.set_on_event(Box::new(move |e| sink.borrow_mut().push(e)));
    door.begin(0);
    door.update(1);
    assert_eq!(door.state(), DoorState::Secure);
    (door, events)
}

fn set_open(door: &mut TestDoor, open: bool) {
    door.sensor_mut().unwrap().contact_mut().open = open;
}

/// Two samples: one to see the change, one to accept it.
fn settle(door: &mut TestDoor, now_ms: u64) {
    door.update(now_ms);
    door.update(now_ms + 1);
}

fn lock_op(door: &TestDoor) -> OperationState {
    door.relays().lock.as_ref().unwrap().operation()
}

fn states(events: &Events) -> Vec<DoorState> {
    events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            DoorEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Relay Timing
// ============================================================================

#[test]
fn lock_with_mechanical_delay_runs_full_sequence() {
    let relays = DoorRelays::with_lock(relay("lock", 2000, 100));
    let mut door: TestDoor = Door::new(relays, None, &DoorConfig::default());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    door.relays_mut()
        .lock
        .as_mut()
        .unwrap()
        .set_on_change(Box::new(move |_, op, _| sink.borrow_mut().push(op)));

    door.begin(0);
    assert_eq!(door.state(), DoorState::Secure);
    // Active-low: de-energised reads high
    assert!(door.relays().lock.as_ref().unwrap().driver().level);

    assert!(door.activate(1000));
    assert_eq!(lock_op(&door), OperationState::Activating);
    assert!(!door.relays().lock.as_ref().unwrap().driver().level);

    door.update(1100);
    assert_eq!(lock_op(&door), OperationState::Activating);
    door.update(1101);
    assert_eq!(lock_op(&door), OperationState::Active);
    assert_eq!(door.state(), DoorState::Unlocked);

    // Actuation time counts from activation start
    door.update(3000);
    assert_eq!(lock_op(&door), OperationState::Active);
    assert!(door.update(3001));
    assert_eq!(lock_op(&door), OperationState::Deactivating);
    assert_eq!(door.state(), DoorState::Unlocked);

    door.update(3102);
    assert_eq!(lock_op(&door), OperationState::Inactive);
    assert_eq!(door.state(), DoorState::Locking);
    door.update(3103);
    assert_eq!(door.state(), DoorState::Secure);

    assert_eq!(
        *seen.borrow(),
        vec![
            OperationState::Inactive,
            OperationState::Activating,
            OperationState::Active,
            OperationState::Deactivating,
            OperationState::Inactive,
        ]
    );
}

// ============================================================================
// Normal Entry
// ============================================================================

#[test]
fn grant_open_close_relocks() {
    let (mut door, events) = door(DoorConfig::default().with_sensor_debounce_ms(0));

    assert!(door.activate(10));
    assert_eq!(door.state(), DoorState::Unlocked);

    set_open(&mut door, true);
    settle(&mut door, 20);
    assert_eq!(door.state(), DoorState::Open);
    let lock = door.relays().lock.as_ref().unwrap();
    assert_eq!(lock.override_state(), OverrideState::Holding);

    set_open(&mut door, false);
    settle(&mut door, 30);
    assert_eq!(door.state(), DoorState::Locking);
    assert_eq!(
        door.relays().lock.as_ref().unwrap().override_state(),
        OverrideState::Normal
    );

    // Held from 21, so the lock drops after 2000 ms from there
    door.update(2021);
    assert_eq!(door.state(), DoorState::Locking);
    door.update(2022);
    assert_eq!(lock_op(&door), OperationState::Inactive);
    assert_eq!(door.state(), DoorState::Secure);

    assert_eq!(
        states(&events),
        vec![
            DoorState::Locking,
            DoorState::Secure,
            DoorState::Unlocked,
            DoorState::Open,
            DoorState::Locking,
            DoorState::Secure,
        ]
    );
}

// ============================================================================
// Activation Policy
// ============================================================================

#[test]
fn activate_while_locking_unlocks_again() {
    let (mut door, _) = door(DoorConfig::default().with_sensor_debounce_ms(0));

    door.activate(10);
    set_open(&mut door, true);
    settle(&mut door, 20);
    set_open(&mut door, false);
    settle(&mut door, 30);
    assert_eq!(door.state(), DoorState::Locking);

    assert!(door.activate(40));
    assert_eq!(door.state(), DoorState::Unlocked);
    assert_eq!(lock_op(&door), OperationState::Active);

    // Unlock timing restarts from the second activation
    door.update(2040);
    assert_eq!(door.state(), DoorState::Unlocked);
    door.update(2041);
    assert_eq!(lock_op(&door), OperationState::Inactive);
    assert_eq!(door.state(), DoorState::Locking);
    door.update(2042);
    assert_eq!(door.state(), DoorState::Secure);
}

#[test]
fn exit_button_press_unlocks_secure_door() {
    let (mut door, _) = door(DoorConfig::default().with_sensor_debounce_ms(0));
    let mut button = ExitButton::new(MockContact::new(false), 30);
    button.begin(0);

    button.input_mut().open = true;
    for now in [100, 130] {
        if button.update(now) {
            assert!(door.activate(now));
        }
        door.update(now);
    }

    assert_eq!(door.state(), DoorState::Unlocked);
    assert_eq!(lock_op(&door), OperationState::Active);
}

#[test]
fn activate_rejected_while_open() {
    let (mut door, events) = door(DoorConfig::default().with_sensor_debounce_ms(0));

    door.activate(10);
    set_open(&mut door, true);
    settle(&mut door, 20);
    assert_eq!(door.state(), DoorState::Open);
    let before = events.borrow().len();

    assert!(!door.activate(25));
    assert_eq!(door.state(), DoorState::Open);
    assert_eq!(
        door.relays().lock.as_ref().unwrap().override_state(),
        OverrideState::Holding
    );
    assert_eq!(events.borrow().len(), before);
}

#[test]
fn activate_rejected_while_unalarming() {
    let config = DoorConfig::default()
        .with_sensor_debounce_ms(0)
        .with_max_open_secs(5);
    let (mut door, _) = door(config);

    door.activate(10);
    set_open(&mut door, true);
    settle(&mut door, 20);
    door.update(5022);
    assert_eq!(door.state(), DoorState::Alarm);

    set_open(&mut door, false);
    settle(&mut door, 5100);
    assert_eq!(door.state(), DoorState::Unalarming);

    assert!(!door.activate(5101));
    assert_eq!(door.state(), DoorState::Unalarming);
    assert_eq!(lock_op(&door), OperationState::Inactive);

    door.update(5102);
    assert_eq!(door.state(), DoorState::Secure);
}

// ============================================================================
// Alarms
// ============================================================================

#[test]
fn held_open_alarm_clears_after_close() {
    let config = DoorConfig::default()
        .with_sensor_debounce_ms(0)
        .with_max_open_secs(5);
    let (mut door, events) = door(config);

    door.activate(10);
    set_open(&mut door, true);
    settle(&mut door, 20);
    assert_eq!(door.state(), DoorState::Open);

    door.update(5021);
    assert_eq!(door.state(), DoorState::Open);
    door.update(5022);
    assert_eq!(door.state(), DoorState::Alarm);
    assert_eq!(
        door.relays().alarm.as_ref().unwrap().operation(),
        OperationState::Active
    );
    assert!(!door.activate(5030));

    set_open(&mut door, false);
    settle(&mut door, 5100);
    assert_eq!(door.state(), DoorState::Unalarming);
    door.update(5102);
    assert_eq!(door.state(), DoorState::Secure);
    door.update(5103);
    assert_eq!(
        door.relays().alarm.as_ref().unwrap().operation(),
        OperationState::Inactive
    );

    let log = events.borrow();
    assert!(log.contains(&DoorEvent::Alarm(true)));
    assert!(log.contains(&DoorEvent::Alarm(false)));
}

#[test]
fn forced_door_escalates_from_tamper_to_alarm() {
    let (mut door, events) = door(DoorConfig::default().with_sensor_debounce_ms(0));

    set_open(&mut door, true);
    settle(&mut door, 100);
    assert_eq!(door.state(), DoorState::Tamper);
    assert!(!door.activate(200));

    door.update(10_101);
    assert_eq!(door.state(), DoorState::Tamper);
    door.update(10_102);
    assert_eq!(door.state(), DoorState::Alarm);
    assert_eq!(
        door.relays().alarm.as_ref().unwrap().operation(),
        OperationState::Active
    );
    assert_eq!(
        door.relays().lock.as_ref().unwrap().override_state(),
        OverrideState::Holding
    );

    let log = events.borrow();
    assert!(log.contains(&DoorEvent::Tamper(true)));
    assert!(log.contains(&DoorEvent::Alarm(true)));
}
