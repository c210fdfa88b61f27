//! [`MqttClient`] over the ESP-IDF MQTT client.
//!
//! The connection runs on its own thread. Received messages cross to the
//! main loop on a channel and connection state is shared through atomics.
//! Publishes are queued in the client outbox, so scan events raised while
//! the broker is away go out after reconnecting. Topic filters are
//! remembered and subscribed again after every reconnect.
//!
//! ```ignore
//! let config = MqttConfig::default().with_host("192.168.1.100");
//! let mut link = MqttLink::new(Esp32Mqtt::new(&config)?, config, "front-door");
//! link.subscribe_commands();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use thiserror::Error;

use crate::config::MqttConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Stack for the connection thread; payloads are small JSON documents.
const EVENT_STACK: usize = 6 * 1024;

/// Failure reported by the ESP-IDF client.
#[derive(Debug, Error)]
pub enum Esp32MqttError {
    /// Publish rejected, usually because the outbox is full.
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Target topic.
        topic: String,
        /// ESP-IDF error text.
        reason: String,
    },
    /// Subscribe rejected.
    #[error("subscribe to {filter} failed: {reason}")]
    Subscribe {
        /// Topic filter.
        filter: String,
        /// ESP-IDF error text.
        reason: String,
    },
}

#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    resubscribe: AtomicBool,
}

/// Door controller's broker connection.
pub struct Esp32Mqtt {
    client: EspMqttClient<'static>,
    inbox: Receiver<MqttMessage>,
    flags: Arc<LinkFlags>,
    filters: Vec<String>,
}

impl Esp32Mqtt {
    /// Create the client and start the connection thread.
    ///
    /// Returns before the broker has accepted the session.
    pub fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        let url = format!("mqtt://{}:{}", config.host, config.port);

        let mut client_config = MqttClientConfiguration {
            client_id: Some(config.client_id.as_str()),
            keep_alive_interval: Some(Duration::from_secs(u64::from(config.keep_alive_secs))),
            ..Default::default()
        };
        if config.has_auth() {
            client_config.username = Some(config.username.as_str());
            client_config.password = Some(config.password.as_str());
        }

        let (tx, inbox) = channel();
        let flags = Arc::new(LinkFlags::default());
        let (client, connection) = EspMqttClient::new(&url, &client_config)?;

        let thread_flags = flags.clone();
        thread::Builder::new()
            .name("mqtt".into())
            .stack_size(EVENT_STACK)
            .spawn(move || run_connection(connection, tx, &thread_flags))?;

        log::info!("mqtt: connecting to {} as {}", url, config.client_id);

        Ok(Self {
            client,
            inbox,
            flags,
            filters: Vec::new(),
        })
    }

    fn restore_subscriptions(&mut self) {
        if !self.flags.resubscribe.swap(false, Ordering::AcqRel) {
            return;
        }
        for filter in &self.filters {
            match self.client.subscribe(filter, QoS::AtLeastOnce) {
                Ok(_) => log::debug!("mqtt: resubscribed {}", filter),
                Err(e) => log::warn!("mqtt: resubscribe {} failed: {:?}", filter, e),
            }
        }
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        // Retained io state and scan events must survive a dropped packet
        self.client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|e| Esp32MqttError::Publish {
                topic: topic.into(),
                reason: format!("{:?}", e),
            })
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        if !self.filters.iter().any(|f| f == topic) {
            self.filters.push(topic.into());
        }
        if !self.is_connected() {
            // Picked up by the next Connected event
            return Ok(());
        }
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|e| Esp32MqttError::Subscribe {
                filter: topic.into(),
                reason: format!("{:?}", e),
            })
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.restore_subscriptions();
        match self.inbox.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.flags.connected.store(false, Ordering::Release);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::Acquire)
    }
}

fn run_connection(mut connection: EspMqttConnection, tx: Sender<MqttMessage>, flags: &LinkFlags) {
    loop {
        let event = match connection.next() {
            Ok(event) => event,
            Err(e) => {
                log::warn!("mqtt: connection error: {:?}", e);
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        match event.payload() {
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                log::trace!("mqtt: {} ({} bytes)", topic, data.len());
                if tx.send(MqttMessage::new(topic.to_string(), data.to_vec())).is_err() {
                    return;
                }
            }
            EventPayload::Connected(_) => {
                log::info!("mqtt: connected");
                flags.connected.store(true, Ordering::Release);
                flags.resubscribe.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                log::warn!("mqtt: disconnected, lookups fall back to timeout");
                flags.connected.store(false, Ordering::Release);
            }
            _ => {}
        }
    }
}
