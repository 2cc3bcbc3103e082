//! btdeck — bridges macro-pad button presses to Bluetooth Low Energy
//! characteristic writes.
//!
//! The crate sits between two external systems: a host automation SDK that
//! owns button lifecycle and settings persistence (consumed through the
//! [`host`] traits) and a native BLE stack that owns the radio (consumed
//! through [`bridge::BleRadio`], implemented over `bluest`). The bridge
//! scans, enumerates GATT services, and writes a user-configured command
//! buffer to a chosen characteristic when a button is pressed.

pub mod action;
pub mod bridge;
pub mod command;
pub mod error;
pub mod host;
pub mod plugin;

pub use action::{ButtonSettings, ControlAction, DEFAULT_TITLE};
pub use bridge::{BleRadio, BluestRadio, BridgeEvent, DeviceBridge, DeviceRecord, ServiceInfo};
pub use command::{Command, CommandData, CommandFormat, CommandKind};
pub use error::BridgeError;
pub use host::{ActionContext, HostConnection, HostEvent, PanelMessage, PanelRequest};
