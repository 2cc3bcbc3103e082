//! The host SDK boundary.
//!
//! The host automation SDK (button rendering, settings persistence,
//! property-inspector messaging) is an external collaborator. The plugin
//! only ever touches it through the narrow traits here, which keeps the
//! adapter boundary explicit and mockable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::ButtonSettings;
use crate::bridge::{DeviceRecord, ServiceInfo};

/// Per-button handle into the host SDK.
#[async_trait]
pub trait ActionContext: Clone + Send + Sync + 'static {
    async fn set_title(&self, title: &str) -> anyhow::Result<()>;
    async fn show_alert(&self) -> anyhow::Result<()>;
    async fn show_ok(&self) -> anyhow::Result<()>;
    async fn get_settings(&self) -> anyhow::Result<ButtonSettings>;
    async fn set_settings(&self, settings: &ButtonSettings) -> anyhow::Result<()>;
    async fn send_to_property_inspector(&self, message: &PanelMessage) -> anyhow::Result<()>;
}

/// Button-lifecycle events delivered by the host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    WillAppear { settings: ButtonSettings },
    PropertyInspectorDidAppear,
    KeyDown { settings: ButtonSettings },
    /// A request from the configuration panel; the payload is arbitrary
    /// JSON keyed by an `event` name, parsed into a [`PanelRequest`].
    SendToPlugin { payload: Value },
}

/// A registered connection to the host, yielding events until it closes.
#[async_trait]
pub trait HostConnection: Send {
    type Context: ActionContext;

    async fn next_event(&mut self) -> Option<(Self::Context, HostEvent)>;
}

/// Requests the configuration panel sends to the plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum PanelRequest {
    ScanDevices,
    #[serde(rename_all = "camelCase")]
    GetServices {
        device_id: String,
    },
    SaveSettings(ButtonSettings),
    TestCommand,
}

/// Messages the plugin sends back to the configuration panel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PanelMessage {
    SettingsUpdate { settings: ButtonSettings },
    DeviceDiscovered { device: DeviceRecord },
    ScanComplete,
    ServicesDiscovered { services: Vec<ServiceInfo> },
    SettingsSaved,
    Error { message: String },
}
