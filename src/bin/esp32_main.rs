//! ESP32-C3 SuperMini single-door controller.
//!
//! This is the main entry point for the physical hardware controller.
//! It runs a 100Hz loop that:
//! - Decodes Wiegand frames captured by the D0/D1 interrupts
//! - Steps the access decision engine (local store, then MQTT lookup)
//! - Applies remote records, deletions and remote unlocks from MQTT
//! - Opens the door from the request-to-exit button
//! - Updates the door supervisor, its relays and the door contact
//! - Publishes access events, relay/contact changes and heartbeats
//! - Retries the WiFi association when it drops
//!
//! # Build
//!
//! ```bash
//! WIFI_SSID=... WIFI_PASSWORD=... MQTT_HOST=... \
//!     cargo build --release --features esp32 --bin esp32_main
//! ```

use std::ffi::CStr;
use std::sync::mpsc::{channel, Sender};
use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;

use rs_doorman::config::{MqttConfig, RelayConfig, WifiConfig};
use rs_doorman::hal::esp32::{
    pins, Esp32Clock, Esp32Mqtt, Esp32WiegandLines, Esp32Wifi, GpioContact, GpioRelay,
};
use rs_doorman::hal::FsRecordStore;
use rs_doorman::sensor::{DebouncedContact, ExitButton};
use rs_doorman::telemetry::{contact_payload, relay_payload, IoPayload};
use rs_doorman::traits::{Clock, WallClock};
use rs_doorman::{
    AccessController, AccessDecision, AccessHandler, Config, Door, DoorEvent, DoorRelays,
    EdgeCapture, InboundCommand, MqttLink, Relay, WiegandReader,
};

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 10;

/// Mount point of the record partition
const STORE_ROOT: &str = "/spiffs";
const STORE_ROOT_C: &CStr = c"/spiffs";

static CAPTURE: EdgeCapture = EdgeCapture::new();

type OutputDriver = GpioRelay<PinDriver<'static, AnyOutputPin, Output>>;
type ContactDriver = GpioContact<PinDriver<'static, AnyInputPin, Input>>;
type DoorUnit = Door<OutputDriver, ContactDriver>;
type IoSender = Sender<(&'static str, IoPayload)>;

/// Opens the door on a grant and keeps every verdict for publishing.
struct LoopHandler<'a> {
    door: &'a mut DoorUnit,
    now_ms: u64,
    verdicts: &'a mut Vec<AccessDecision>,
}

impl AccessHandler for LoopHandler<'_> {
    fn access_granted(&mut self, decision: &AccessDecision) {
        self.door.activate(self.now_ms);
        self.verdicts.push(decision.clone());
    }

    fn access_denied(&mut self, decision: &AccessDecision) {
        self.verdicts.push(decision.clone());
    }
}

fn main() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("rs-doorman starting");

    // =========================================================================
    // Configuration
    // =========================================================================
    let mut config = Config::default()
        .with_wifi(
            WifiConfig::default()
                .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
                .with_password(option_env!("WIFI_PASSWORD").unwrap_or("")),
        )
        .with_mqtt(
            MqttConfig::default()
                .with_host(option_env!("MQTT_HOST").unwrap_or("localhost"))
                .with_topic_prefix(option_env!("MQTT_PREFIX").unwrap_or("door")),
        );
    config.reader = config.reader.with_pins(pins::WIEGAND_D0, pins::WIEGAND_D1);
    config.relays.lock = config.relays.lock.with_pin(pins::LOCK);
    config.relays.indicator = config.relays.indicator.with_pin(pins::INDICATOR);
    config.relays.alarm = config.relays.alarm.with_pin(pins::ALARM);
    config.door = config
        .door
        .with_sensor_pin(pins::CONTACT)
        .with_exit_button_pin(pins::EXIT_BUTTON);
    config.validate()?;

    let peripherals = Peripherals::take()?;
    let clock = Esp32Clock::new();

    // =========================================================================
    // Network (WiFi, SNTP, MQTT)
    // =========================================================================
    let mut wifi = if config.wifi.is_configured() {
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        Some(Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?)
    } else {
        log::warn!("wifi not configured (set WIFI_SSID/WIFI_PASSWORD), running offline");
        None
    };

    // Record validity needs wall-clock time
    let _sntp = if wifi.is_some() {
        Some(EspSntp::new_default()?)
    } else {
        None
    };

    let link = match (wifi.is_some(), config.mqtt.enabled) {
        (true, true) => match Esp32Mqtt::new(&config.mqtt) {
            Ok(client) => {
                let mut link =
                    MqttLink::new(client, config.mqtt.clone(), config.device.hostname.as_str());
                link.subscribe_commands();
                link.publish_boot(clock.now_ms(), clock.epoch_secs());
                Some(link)
            }
            Err(e) => {
                log::warn!("mqtt unavailable: {:?}", e);
                None
            }
        },
        _ => None,
    };

    // =========================================================================
    // Record Store
    // =========================================================================
    mount_store()?;
    let store = FsRecordStore::new(STORE_ROOT);

    let mut engine = AccessController::new(config.access.clone(), store);
    if let Some(link) = link {
        engine = engine.with_remote(link);
    }

    // =========================================================================
    // Door (relays + contact)
    // =========================================================================
    let (io_tx, io_rx) = channel::<(&'static str, IoPayload)>();

    let lock = output_relay("lock", &config.relays.lock, &io_tx)?;
    let mut relays = match lock {
        Some(lock) => DoorRelays::with_lock(lock),
        None => DoorRelays::default(),
    };
    relays.indicator = output_relay("indicator", &config.relays.indicator, &io_tx)?;
    relays.alarm = output_relay("alarm", &config.relays.alarm, &io_tx)?;
    relays.open = output_relay("open", &config.relays.open, &io_tx)?;
    relays.close = output_relay("close", &config.relays.close, &io_tx)?;

    let sensor = match config.door.sensor_pin {
        Some(pin) => {
            let mut input = PinDriver::input(unsafe { AnyInputPin::new(i32::from(pin)) })?;
            input.set_pull(Pull::Up)?;
            let mut sensor =
                DebouncedContact::new(GpioContact::new(input), config.door.sensor_debounce_ms);
            let tx = io_tx.clone();
            sensor.set_on_change(Box::new(move |open| {
                let _ = tx.send(("contact", contact_payload(open)));
            }));
            Some(sensor)
        }
        None => None,
    };

    let mut door: DoorUnit = Door::new(relays, sensor, &config.door);
    let tx = io_tx.clone();
    door.set_on_event(Box::new(move |event| {
        let (name, text) = match event {
            DoorEvent::StateChanged(state) => ("door", state.label()),
            DoorEvent::Tamper(on) => ("tamper", if on { "true" } else { "false" }),
            DoorEvent::Alarm(on) => ("alarm_state", if on { "true" } else { "false" }),
        };
        let mut payload = IoPayload::new();
        let _ = payload.push_str(text);
        let _ = tx.send((name, payload));
    }));
    door.begin(clock.now_ms());

    let mut exit_button = match config.door.exit_button_pin {
        Some(pin) => {
            let mut input = PinDriver::input(unsafe { AnyInputPin::new(i32::from(pin)) })?;
            input.set_pull(Pull::Up)?;
            // Pressed pulls the line low
            let mut button = ExitButton::new(
                GpioContact::inverted(input),
                config.door.exit_button_debounce_ms,
            );
            button.begin(clock.now_ms());
            Some(button)
        }
        None => None,
    };

    // =========================================================================
    // Wiegand Reader
    // =========================================================================
    let _lines = Esp32WiegandLines::attach(&CAPTURE, config.reader.d0_pin, config.reader.d1_pin)?;
    let mut reader = WiegandReader::new(&CAPTURE, config.reader.clone());

    log::info!("ready, entering main loop");

    // =========================================================================
    // Main Loop
    // =========================================================================
    let mut verdicts: Vec<AccessDecision> = Vec::new();
    loop {
        let now = clock.now_ms();
        let epoch = clock.epoch_secs();

        if let Some(wifi) = wifi.as_mut() {
            wifi.ensure_connected(now);
        }

        // ---------------------------------------------------------------------
        // Card reads
        // ---------------------------------------------------------------------
        if let Some(Ok(read)) = reader.poll(clock.now_us(), now) {
            engine.on_read(&read, config.reader.radix);
        }

        // ---------------------------------------------------------------------
        // Inbound MQTT commands
        // ---------------------------------------------------------------------
        while let Some(cmd) = engine.remote_mut().and_then(|link| link.poll_incoming()) {
            match cmd {
                InboundCommand::AddUser(mut record) => {
                    if let Err(e) = engine.store_mut().save_update(&mut record, epoch) {
                        log::warn!("store: could not save record {}: {}", record.credential, e);
                    }
                    let credential = record.credential.clone();
                    engine.submit_remote_record(credential.as_str(), record);
                }
                InboundCommand::DeleteUser(credential) => {
                    if let Err(e) = engine.store_mut().remove(credential.as_str()) {
                        log::warn!("store: could not remove record {}: {}", credential, e);
                    }
                }
                InboundCommand::Unlock => {
                    log::info!("remote unlock requested");
                    door.activate(now);
                }
            }
        }

        // ---------------------------------------------------------------------
        // Exit button
        // ---------------------------------------------------------------------
        if let Some(button) = exit_button.as_mut() {
            if button.update(now) {
                door.activate(now);
                verdicts.push(AccessDecision::exit_button());
            }
        }

        // ---------------------------------------------------------------------
        // Access decision
        // ---------------------------------------------------------------------
        engine.poll(
            now,
            epoch,
            &mut LoopHandler {
                door: &mut door,
                now_ms: now,
                verdicts: &mut verdicts,
            },
        );

        // ---------------------------------------------------------------------
        // Door supervision
        // ---------------------------------------------------------------------
        door.update(now);

        // ---------------------------------------------------------------------
        // Telemetry
        // ---------------------------------------------------------------------
        match engine.remote_mut() {
            Some(link) => {
                link.heartbeat(now, epoch);
                for decision in verdicts.drain(..) {
                    link.publish_access(&decision, epoch);
                }
                for (name, payload) in io_rx.try_iter() {
                    link.publish_io(name, payload.as_str());
                }
            }
            None => {
                verdicts.clear();
                io_rx.try_iter().for_each(drop);
            }
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}

/// Build a relay on its configured pin, or `None` if it is not fitted.
fn output_relay(
    name: &'static str,
    config: &RelayConfig,
    io_tx: &IoSender,
) -> anyhow::Result<Option<Relay<OutputDriver>>> {
    let Some(pin) = config.pin else {
        return Ok(None);
    };
    let output = PinDriver::output(unsafe { AnyOutputPin::new(i32::from(pin)) })?;
    let mut relay = Relay::new(name, GpioRelay::new(output), config);
    let tx = io_tx.clone();
    relay.set_on_change(Box::new(move |name, operation, override_state| {
        let _ = tx.send((name, relay_payload(operation, override_state)));
    }));
    Ok(Some(relay))
}

/// Mount the SPIFFS partition holding the record files.
fn mount_store() -> anyhow::Result<()> {
    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: STORE_ROOT_C.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 5,
        format_if_mount_failed: true,
    };
    unsafe { esp_idf_sys::esp!(esp_idf_sys::esp_vfs_spiffs_register(&conf))? };
    log::info!("record store mounted at {}", STORE_ROOT);
    Ok(())
}
