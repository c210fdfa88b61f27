//! WiFi station link.
//!
//! The door keeps working offline (local records only), so a dropped
//! association is retried from the main loop through
//! [`Esp32Wifi::ensure_connected`] instead of failing the firmware.

use std::net::Ipv4Addr;

use anyhow::anyhow;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use crate::config::WifiConfig;

/// Minimum time between reconnect attempts.
const RETRY_INTERVAL_MS: u64 = 30_000;

/// Station-mode connection, held for the lifetime of the firmware.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    last_attempt_ms: u64,
}

impl<'a> Esp32Wifi<'a> {
    /// Associate with the configured access point and wait for an address.
    ///
    /// Fails if the SSID or password does not fit the driver's buffers
    /// rather than connecting with a truncated credential.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let ssid = config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid longer than 32 bytes"))?;
        let password = config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password longer than 64 bytes"))?;

        let driver = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(driver, sysloop)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            ..Default::default()
        }))?;
        wifi.start()?;

        log::info!("wifi: joining '{}'", config.ssid);
        wifi.connect()?;
        wifi.wait_netif_up()?;

        let link = Self {
            wifi,
            last_attempt_ms: 0,
        };
        if let Some(ip) = link.ip_addr() {
            log::info!("wifi: up, address {}", ip);
        }
        Ok(link)
    }

    /// Station address, if associated.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi.wifi().sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    /// True while associated with the access point.
    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    /// Retry the association if it dropped, at most once per
    /// [`RETRY_INTERVAL_MS`]. Returns the connection state afterwards.
    ///
    /// Blocks for the duration of an attempt; door timing catches up on
    /// the next loop pass.
    pub fn ensure_connected(&mut self, now_ms: u64) -> bool {
        if self.is_connected() {
            return true;
        }
        if self.last_attempt_ms != 0 && now_ms.saturating_sub(self.last_attempt_ms) < RETRY_INTERVAL_MS {
            return false;
        }
        self.last_attempt_ms = now_ms.max(1);

        log::warn!("wifi: link down, reconnecting");
        let result = self.wifi.connect().and_then(|_| self.wifi.wait_netif_up());
        match result {
            Ok(()) => {
                log::info!("wifi: reconnected");
                true
            }
            Err(e) => {
                log::warn!("wifi: reconnect failed: {:?}", e);
                false
            }
        }
    }
}
