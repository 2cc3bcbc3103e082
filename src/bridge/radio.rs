//! The narrow surface of the native BLE stack consumed by the bridge, plus
//! its `bluest` implementation.
//!
//! Everything above this module talks to the radio through [`BleRadio`], so
//! the scan/execute logic can be exercised against a mock stack in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bridge::types::{
    Advertisement, CharacteristicInfo, DeviceRecord, ManufacturerData, RadioState, ServiceInfo,
};
use crate::error::BridgeError;

/// Interval between adapter availability probes.
const STATE_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Radio operations the device bridge needs. One discovery session at a
/// time; GATT operations address devices by the id handed out during
/// discovery.
#[async_trait]
pub trait BleRadio: Send + Sync + 'static {
    /// Current power state of the radio.
    fn state(&self) -> RadioState;

    /// Change notifications for [`state`](Self::state).
    fn state_changes(&self) -> watch::Receiver<RadioState>;

    /// Begins passive discovery, pushing one record per advertisement into
    /// `tx` until [`stop_discovery`](Self::stop_discovery). Returns once
    /// discovery is running; a second call while running is a no-op.
    async fn start_discovery(
        &self,
        tx: mpsc::UnboundedSender<DeviceRecord>,
    ) -> Result<(), BridgeError>;

    /// Halts discovery. No-op when not discovering.
    async fn stop_discovery(&self) -> Result<(), BridgeError>;

    /// Connects to a previously discovered device. Already-connected devices
    /// are left alone.
    async fn connect(&self, device_id: &str) -> Result<(), BridgeError>;

    /// Drops the connection to a device. No-op when not connected.
    async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError>;

    /// Direct connect by identifier without a prior discovery, where the
    /// platform supports it.
    async fn open_device(&self, device_id: &str) -> Result<(), BridgeError>;

    /// Enumerates every service and characteristic of a connected device.
    /// Records come back unnamed; the bridge annotates them.
    async fn enumerate_gatt(&self, device_id: &str) -> Result<Vec<ServiceInfo>, BridgeError>;

    /// Writes `payload` to the requested service/characteristic pair,
    /// failing with [`BridgeError::CharacteristicNotFound`] when the pair
    /// does not resolve on the device.
    async fn write(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        without_response: bool,
    ) -> Result<(), BridgeError>;
}

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// [`BleRadio`] backed by the `bluest` cross-platform BLE stack.
///
/// Device handles are cached by their platform id for the lifetime of the
/// radio; rediscovery overwrites the handle.
pub struct BluestRadio {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    scan_task: Mutex<Option<ScanTask>>,
    state_rx: watch::Receiver<RadioState>,
}

impl BluestRadio {
    pub async fn new() -> Result<Self, BridgeError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BridgeError::Backend(anyhow!("no Bluetooth adapter found")))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available");

        let (state_tx, state_rx) = watch::channel(RadioState::PoweredOn);
        Self::spawn_state_monitor(adapter.clone(), state_tx);

        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            scan_task: Mutex::new(None),
            state_rx,
        })
    }

    /// `bluest` has no portable adapter-state event stream, so the power
    /// state is derived from a periodic adapter probe.
    fn spawn_state_monitor(adapter: Adapter, state_tx: watch::Sender<RadioState>) {
        tokio::spawn(async move {
            loop {
                let state = match adapter.connected_devices().await {
                    Ok(_) => RadioState::PoweredOn,
                    Err(e) => {
                        debug!("Adapter probe failed: {e}");
                        RadioState::PoweredOff
                    }
                };
                if *state_tx.borrow() != state {
                    info!("Radio state changed to {state:?}");
                }
                if state_tx.send(state).is_err() {
                    // radio dropped
                    return;
                }
                tokio::time::sleep(STATE_PROBE_INTERVAL).await;
            }
        });
    }

    fn lookup(&self, device_id: &str) -> Result<Device, BridgeError> {
        self.devices
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .ok_or_else(|| BridgeError::DeviceNotFound(device_id.to_string()))
    }

    async fn scan_loop(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        tx: mpsc::UnboundedSender<DeviceRecord>,
        cancel: CancellationToken,
    ) {
        let mut stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start BLE scan: {e}");
                return;
            }
        };

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(found) => {
                        let record = Self::record_from_advertisement(&found);
                        debug!("Discovered {} ({}), RSSI {:?}", record.name, record.id, record.rssi);
                        devices
                            .lock()
                            .unwrap()
                            .insert(record.id.clone(), found.device.clone());
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("BLE scan stream ended");
                        break;
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
    }

    fn record_from_advertisement(found: &bluest::AdvertisingDevice) -> DeviceRecord {
        let id = found.device.id().to_string();
        let name = found
            .adv_data
            .local_name
            .clone()
            .or_else(|| found.device.name().ok())
            .unwrap_or_else(|| "Unknown Device".to_string());
        let address = extract_address(&id).unwrap_or_else(|| "N/A".to_string());

        DeviceRecord {
            id,
            name,
            address,
            rssi: found.rssi,
            advertisement: Advertisement {
                local_name: found.adv_data.local_name.clone(),
                service_uuids: found.adv_data.services.clone(),
                manufacturer_data: found.adv_data.manufacturer_data.as_ref().map(|m| {
                    ManufacturerData {
                        company_id: m.company_id,
                        data: m.data.to_vec(),
                    }
                }),
                tx_power_level: found.adv_data.tx_power_level,
            },
            connectable: found.adv_data.is_connectable,
        }
    }
}

#[async_trait]
impl BleRadio for BluestRadio {
    fn state(&self) -> RadioState {
        *self.state_rx.borrow()
    }

    fn state_changes(&self) -> watch::Receiver<RadioState> {
        self.state_rx.clone()
    }

    async fn start_discovery(
        &self,
        tx: mpsc::UnboundedSender<DeviceRecord>,
    ) -> Result<(), BridgeError> {
        let mut guard = self.scan_task.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::scan_loop(
            self.adapter.clone(),
            self.devices.clone(),
            tx,
            cancel.clone(),
        ));
        *guard = Some(ScanTask { cancel, handle });
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<(), BridgeError> {
        let task = self.scan_task.lock().unwrap().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    error!("Scan task ended with a join error: {e:?}");
                }
            }
        }
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<(), BridgeError> {
        let device = self.lookup(device_id)?;
        if !device.is_connected().await {
            info!("Connecting to {device_id}");
            self.adapter.connect_device(&device).await?;
        }
        Ok(())
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError> {
        let device = self.lookup(device_id)?;
        if device.is_connected().await {
            info!("Disconnecting from {device_id}");
            self.adapter.disconnect_device(&device).await?;
        }
        Ok(())
    }

    async fn open_device(&self, device_id: &str) -> Result<(), BridgeError> {
        // bluest device ids are platform-opaque and cannot be rebuilt from
        // the string form, so there is no direct connect-by-id here.
        warn!("Direct lookup of {device_id} requested but not supported by this backend");
        Err(BridgeError::PeripheralLookupUnsupported)
    }

    async fn enumerate_gatt(&self, device_id: &str) -> Result<Vec<ServiceInfo>, BridgeError> {
        let device = self.lookup(device_id)?;
        let mut services = Vec::new();
        for service in device.services().await? {
            let mut characteristics = Vec::new();
            for characteristic in service.characteristics().await? {
                let properties = characteristic.properties().await?;
                characteristics.push(CharacteristicInfo {
                    uuid: characteristic.uuid(),
                    name: None,
                    properties: property_flags(&properties),
                });
            }
            services.push(ServiceInfo {
                uuid: service.uuid(),
                name: None,
                characteristics,
            });
        }
        Ok(services)
    }

    async fn write(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        without_response: bool,
    ) -> Result<(), BridgeError> {
        let device = self.lookup(device_id)?;

        let services = device.services().await?;
        let target_service = services
            .iter()
            .find(|s| s.uuid() == service)
            .ok_or(BridgeError::CharacteristicNotFound {
                service,
                characteristic,
            })?;
        let target = target_service
            .characteristics()
            .await?
            .into_iter()
            .find(|c| c.uuid() == characteristic)
            .ok_or(BridgeError::CharacteristicNotFound {
                service,
                characteristic,
            })?;

        if without_response {
            target.write_without_response(payload).await?;
        } else {
            target.write(payload).await?;
        }
        Ok(())
    }
}

fn property_flags(properties: &bluest::CharacteristicProperties) -> Vec<String> {
    let mut flags = Vec::new();
    let mut push = |enabled: bool, flag: &str| {
        if enabled {
            flags.push(flag.to_string());
        }
    };
    push(properties.broadcast, "broadcast");
    push(properties.read, "read");
    push(properties.write_without_response, "writeWithoutResponse");
    push(properties.write, "write");
    push(properties.notify, "notify");
    push(properties.indicate, "indicate");
    flags
}

/// Pulls a MAC-looking address out of a platform device id. Not every
/// platform embeds one (macOS ids are UUIDs).
fn extract_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
