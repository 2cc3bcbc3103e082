//! Device bridge: scan lifecycle, device/service caching and the
//! connect/write/disconnect flow over the native BLE stack.

mod gatt;
mod manager;
mod radio;
mod types;

pub use gatt::{characteristic_name, parse_uuid, service_name, uuid_from_short};
pub use manager::DeviceBridge;
pub use radio::{BleRadio, BluestRadio};
pub use types::{
    Advertisement, BridgeEvent, CharacteristicInfo, DeviceRecord, ManufacturerData, RadioState,
    ServiceInfo,
};
