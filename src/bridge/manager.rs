//! The device bridge: one scan session at a time, a per-session device
//! cache, and a best-effort connect/write/disconnect flow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bridge::gatt;
use crate::bridge::radio::BleRadio;
use crate::bridge::types::{BridgeEvent, DeviceRecord, RadioState, ServiceInfo};
use crate::error::BridgeError;

/// How long the resolution rescan runs when a device id is requested
/// without a live scan.
const RESOLUTION_SCAN_DURATION: Duration = Duration::from_millis(500);

struct ScanSession {
    cancel: CancellationToken,
}

/// Facade over the native BLE stack. Cheap to clone; all clones share the
/// same cache, scan session and subscriber list.
pub struct DeviceBridge<R: BleRadio> {
    radio: Arc<R>,
    devices: Arc<Mutex<HashMap<String, DeviceRecord>>>,
    scan: Arc<Mutex<Option<ScanSession>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<BridgeEvent>>>>,
}

impl<R: BleRadio> Clone for DeviceBridge<R> {
    fn clone(&self) -> Self {
        Self {
            radio: self.radio.clone(),
            devices: self.devices.clone(),
            scan: self.scan.clone(),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<R: BleRadio> DeviceBridge<R> {
    pub fn new(radio: R) -> Self {
        Self {
            radio: Arc::new(radio),
            devices: Arc::new(Mutex::new(HashMap::new())),
            scan: Arc::new(Mutex::new(None)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Streams [`BridgeEvent`]s to the caller. Dropped receivers are pruned
    /// on the next emit.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<BridgeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn emit(&self, event: BridgeEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.lock().unwrap().is_some()
    }

    /// Devices cached in the current scan session.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices.lock().unwrap().values().cloned().collect()
    }

    /// Starts a scan session that stops on its own after `duration` unless
    /// stopped earlier. No-op when a session is already running; fails with
    /// [`BridgeError::RadioNotReady`] (cache untouched) when the radio is
    /// not powered on.
    pub async fn start_scanning(&self, duration: Duration) -> Result<(), BridgeError> {
        if self.is_scanning() {
            return Ok(());
        }
        if !self.radio.state().is_powered_on() {
            return Err(BridgeError::RadioNotReady);
        }

        self.devices.lock().unwrap().clear();

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.radio.start_discovery(tx).await?;

        let cancel = CancellationToken::new();
        *self.scan.lock().unwrap() = Some(ScanSession {
            cancel: cancel.clone(),
        });

        // Forward discoveries into the cache and out to subscribers. Later
        // events for an id overwrite the cached record.
        let bridge = self.clone();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                bridge
                    .devices
                    .lock()
                    .unwrap()
                    .insert(record.id.clone(), record.clone());
                bridge.emit(BridgeEvent::DeviceDiscovered(record));
            }
        });

        // Auto-stop on timeout, and force-stop if the radio leaves the
        // powered-on state mid-scan.
        let bridge = self.clone();
        let mut state_rx = self.radio.state_changes();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    info!("Scan duration elapsed, stopping scan");
                }
                _ = cancel.cancelled() => return,
                _ = wait_for_power_loss(&mut state_rx) => {
                    warn!("Radio left the powered-on state during scan, forcing stop");
                }
            }
            if let Err(e) = bridge.stop_scanning().await {
                error!("Failed to stop scan: {e}");
            }
        });

        info!("Scan started ({duration:?})");
        Ok(())
    }

    /// Ends the current scan session and emits the terminal
    /// [`BridgeEvent::ScanComplete`]. No-op (and no event) when not
    /// scanning.
    pub async fn stop_scanning(&self) -> Result<(), BridgeError> {
        let session = self.scan.lock().unwrap().take();
        let Some(session) = session else {
            return Ok(());
        };
        session.cancel.cancel();
        self.radio.stop_discovery().await?;

        let devices = self.devices();
        info!("Scan stopped with {} device(s) cached", devices.len());
        self.emit(BridgeEvent::ScanComplete(devices));
        Ok(())
    }

    /// Connects to the device if necessary and enumerates all of its
    /// services and characteristics, annotated with friendly names for
    /// known standard UUIDs.
    pub async fn discover_services(
        &self,
        device_id: &str,
    ) -> Result<Vec<ServiceInfo>, BridgeError> {
        self.resolve_device(device_id).await?;
        self.radio.connect(device_id).await?;
        let services = self.radio.enumerate_gatt(device_id).await?;
        Ok(services.into_iter().map(annotate_service).collect())
    }

    /// Connects if not already connected, writes `payload` to the requested
    /// service/characteristic pair, and disconnects afterwards no matter
    /// how the write went.
    pub async fn execute_command(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        without_response: bool,
    ) -> Result<(), BridgeError> {
        self.resolve_device(device_id).await?;

        let result = async {
            self.radio.connect(device_id).await?;
            self.radio
                .write(device_id, service, characteristic, payload, without_response)
                .await
        }
        .await;

        // The connection must not outlive the operation.
        if let Err(e) = self.radio.disconnect(device_id).await {
            warn!("Failed to disconnect from {device_id}: {e}");
        }

        result
    }

    /// Best-effort resolution of a device id when no live scan is in
    /// progress. Some platform backends cannot hand back a peripheral by id
    /// without one, so the cache is refreshed with a short passive scan
    /// before falling back to a direct open attempt.
    async fn resolve_device(&self, device_id: &str) -> Result<(), BridgeError> {
        if self.devices.lock().unwrap().contains_key(device_id) {
            return Ok(());
        }

        if self.radio.state().is_powered_on() && !self.is_scanning() {
            debug!("Device {device_id} not cached, refreshing with a short scan");
            let (tx, mut rx) = mpsc::unbounded_channel();
            if self.radio.start_discovery(tx).await.is_ok() {
                let deadline = tokio::time::sleep(RESOLUTION_SCAN_DURATION);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        record = rx.recv() => match record {
                            Some(record) => {
                                self.devices
                                    .lock()
                                    .unwrap()
                                    .insert(record.id.clone(), record);
                            }
                            None => break,
                        },
                        _ = &mut deadline => break,
                    }
                }
                if let Err(e) = self.radio.stop_discovery().await {
                    warn!("Failed to stop resolution scan: {e}");
                }
            }
        }

        if self.devices.lock().unwrap().contains_key(device_id) {
            return Ok(());
        }
        self.radio.open_device(device_id).await
    }
}

fn annotate_service(mut service: ServiceInfo) -> ServiceInfo {
    service.name = gatt::service_name(&service.uuid).map(str::to_owned);
    for characteristic in &mut service.characteristics {
        characteristic.name = gatt::characteristic_name(&characteristic.uuid).map(str::to_owned);
    }
    service
}

async fn wait_for_power_loss(state_rx: &mut watch::Receiver<RadioState>) {
    loop {
        if !state_rx.borrow_and_update().is_powered_on() {
            return;
        }
        if state_rx.changed().await.is_err() {
            // radio gone; nothing left to observe
            std::future::pending::<()>().await;
        }
    }
}
