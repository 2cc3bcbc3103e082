//! Shared data structures for the device bridge.
//!
//! Device and service records are ephemeral: rebuilt per scan or query and
//! never persisted.

use serde::Serialize;
use uuid::Uuid;

/// A device seen during the current scan session. Later discovery events for
/// the same id overwrite the whole record, they are not merged into it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Platform-specific unique identifier (the cache key).
    pub id: String,
    /// Display name, `"Unknown Device"` when the device advertises none.
    pub name: String,
    /// MAC address extracted from the platform id where possible, `"N/A"`
    /// otherwise (macOS hides the radio address).
    pub address: String,
    /// Signal strength at discovery time.
    pub rssi: Option<i16>,
    /// Advertisement payload captured with the discovery event.
    pub advertisement: Advertisement,
    /// Whether the advertisement marked the device as connectable.
    pub connectable: bool,
}

/// Relevant advertisement fields, passed through to the property inspector.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Option<ManufacturerData>,
    pub tx_power_level: Option<i16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

/// A GATT service with its characteristics, annotated with a friendly name
/// when the UUID is a known standard one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub characteristics: Vec<CharacteristicInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Capability flags such as "read", "write", "notify".
    pub properties: Vec<String>,
}

/// Power state of the radio as observed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOn,
    PoweredOff,
    Unavailable,
}

impl RadioState {
    pub fn is_powered_on(self) -> bool {
        self == Self::PoweredOn
    }
}

/// Notifications delivered to bridge subscribers during a scan session.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A newly seen or updated device (at least once per device per scan).
    DeviceDiscovered(DeviceRecord),
    /// Terminal event of a scan session, carrying the full cached list.
    ScanComplete(Vec<DeviceRecord>),
}
