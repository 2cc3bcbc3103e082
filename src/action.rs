//! The button action: bridges host button-lifecycle events to the device
//! bridge and the command codec, and keeps the button title and the
//! configuration panel in sync.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::{self, BleRadio, BridgeEvent, DeviceBridge};
use crate::command::{self, Command};
use crate::error::BridgeError;
use crate::host::{ActionContext, PanelMessage, PanelRequest};

/// Title shown when no device is configured.
pub const DEFAULT_TITLE: &str = "BT Control";

const BUSY_TITLE: &str = "⏳";
const ERROR_TITLE: &str = "❌ Error";

/// How long a failed press keeps the error title before it is restored.
const ERROR_TITLE_HOLD: Duration = Duration::from_secs(2);

/// How long a panel-triggered scan runs before stopping on its own.
const SCAN_DURATION: Duration = Duration::from_secs(10);

/// Per-button configuration, owned and persisted by the host SDK. The
/// plugin reads and writes it but never stores it elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonSettings {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_address: Option<String>,
    pub service_uuid: Option<String>,
    pub characteristic_uuid: Option<String>,
    pub command: Option<Command>,
    pub without_response: bool,
}

/// Handler for one action type. The host may bind it to several buttons;
/// the in-flight guard is per handler instance.
pub struct ControlAction<R: BleRadio> {
    bridge: DeviceBridge<R>,
    executing: AtomicBool,
}

impl<R: BleRadio> ControlAction<R> {
    pub fn new(bridge: DeviceBridge<R>) -> Self {
        Self {
            bridge,
            executing: AtomicBool::new(false),
        }
    }

    /// Button became visible: show the configured device name and push the
    /// current settings to any open configuration panel.
    pub async fn on_will_appear<C: ActionContext>(
        &self,
        ctx: &C,
        settings: &ButtonSettings,
    ) -> anyhow::Result<()> {
        let title = settings.device_name.as_deref().unwrap_or(DEFAULT_TITLE);
        ctx.set_title(title).await?;
        ctx.send_to_property_inspector(&PanelMessage::SettingsUpdate {
            settings: settings.clone(),
        })
        .await
    }

    /// Panel state is not assumed to survive across appearances, so the
    /// settings are re-pushed every time it opens.
    pub async fn on_property_inspector_did_appear<C: ActionContext>(
        &self,
        ctx: &C,
    ) -> anyhow::Result<()> {
        let settings = ctx.get_settings().await?;
        ctx.send_to_property_inspector(&PanelMessage::SettingsUpdate { settings })
            .await
    }

    /// Dispatches a configuration-panel request and relays the result (or
    /// the error) back as a typed message.
    pub async fn on_send_to_plugin<C: ActionContext>(
        &self,
        ctx: &C,
        payload: Value,
    ) -> anyhow::Result<()> {
        let request: PanelRequest = match serde_json::from_value(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring malformed property inspector request: {e}");
                return Ok(());
            }
        };

        match request {
            PanelRequest::ScanDevices => self.handle_scan_devices(ctx).await,
            PanelRequest::GetServices { device_id } => {
                self.handle_get_services(ctx, &device_id).await
            }
            PanelRequest::SaveSettings(settings) => self.handle_save_settings(ctx, settings).await,
            PanelRequest::TestCommand => {
                let settings = ctx.get_settings().await?;
                self.on_key_down(ctx, &settings).await
            }
        }
    }

    /// Executes the configured command. Overlapping presses on the same
    /// instance are dropped with a log, not queued.
    pub async fn on_key_down<C: ActionContext>(
        &self,
        ctx: &C,
        settings: &ButtonSettings,
    ) -> anyhow::Result<()> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Command already executing, skipping key press");
            return Ok(());
        }

        let result = self.execute_configured(ctx, settings).await;
        self.executing.store(false, Ordering::SeqCst);
        result
    }

    async fn execute_configured<C: ActionContext>(
        &self,
        ctx: &C,
        settings: &ButtonSettings,
    ) -> anyhow::Result<()> {
        let (Some(device_id), Some(service), Some(characteristic), Some(cmd)) = (
            settings.device_id.as_deref(),
            settings.service_uuid.as_deref(),
            settings.characteristic_uuid.as_deref(),
            settings.command.as_ref(),
        ) else {
            warn!("Key pressed but {}", BridgeError::ConfigurationMissing);
            ctx.show_alert().await?;
            return Ok(());
        };

        ctx.set_title(BUSY_TITLE).await?;
        info!(
            "Executing {} on {} ({} / {})",
            command::format_for_display(cmd),
            settings.device_name.as_deref().unwrap_or(device_id),
            service,
            characteristic
        );

        let restore_title = settings
            .device_name
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        match self
            .run_command(device_id, service, characteristic, cmd, settings.without_response)
            .await
        {
            Ok(()) => {
                info!("Command executed successfully");
                ctx.show_ok().await?;
                ctx.set_title(&restore_title).await?;
            }
            Err(e) => {
                error!("Command failed: {e}");
                ctx.show_alert().await?;
                ctx.set_title(ERROR_TITLE).await?;
                // restore the label once the error has been visible for a
                // moment; the timer is fire-and-forget
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(ERROR_TITLE_HOLD).await;
                    let _ = ctx.set_title(&restore_title).await;
                });
            }
        }
        Ok(())
    }

    async fn run_command(
        &self,
        device_id: &str,
        service: &str,
        characteristic: &str,
        cmd: &Command,
        without_response: bool,
    ) -> Result<(), BridgeError> {
        let buffer = command::parse_command(cmd)?;
        let service = bridge::parse_uuid(service)?;
        let characteristic = bridge::parse_uuid(characteristic)?;
        self.bridge
            .execute_command(device_id, service, characteristic, &buffer, without_response)
            .await
    }

    async fn handle_scan_devices<C: ActionContext>(&self, ctx: &C) -> anyhow::Result<()> {
        let mut events = self.bridge.subscribe();

        if let Err(e) = self.bridge.start_scanning(SCAN_DURATION).await {
            error!("Failed to scan devices: {e}");
            return ctx
                .send_to_property_inspector(&PanelMessage::Error {
                    message: format!("Scan failed: {e}"),
                })
                .await;
        }

        // relay discoveries until the session's terminal event
        let ctx = ctx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let done = matches!(event, BridgeEvent::ScanComplete(_));
                let message = match event {
                    BridgeEvent::DeviceDiscovered(device) => {
                        PanelMessage::DeviceDiscovered { device }
                    }
                    BridgeEvent::ScanComplete(_) => PanelMessage::ScanComplete,
                };
                if ctx.send_to_property_inspector(&message).await.is_err() || done {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn handle_get_services<C: ActionContext>(
        &self,
        ctx: &C,
        device_id: &str,
    ) -> anyhow::Result<()> {
        match self.bridge.discover_services(device_id).await {
            Ok(services) => {
                ctx.send_to_property_inspector(&PanelMessage::ServicesDiscovered { services })
                    .await
            }
            Err(e) => {
                error!("Failed to discover services: {e}");
                ctx.send_to_property_inspector(&PanelMessage::Error {
                    message: format!("Service discovery failed: {e}"),
                })
                .await
            }
        }
    }

    async fn handle_save_settings<C: ActionContext>(
        &self,
        ctx: &C,
        settings: ButtonSettings,
    ) -> anyhow::Result<()> {
        ctx.set_settings(&settings).await?;
        if let Some(name) = &settings.device_name {
            ctx.set_title(name).await?;
        }
        ctx.send_to_property_inspector(&PanelMessage::SettingsSaved)
            .await
    }
}
