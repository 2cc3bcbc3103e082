//! Plugin glue: logging setup and the host event loop.

use log::{error, info};

use crate::action::ControlAction;
use crate::bridge::BleRadio;
use crate::host::{HostConnection, HostEvent};

/// Initialize logging. Level is controlled through `RUST_LOG`.
pub fn init_logging() {
    env_logger::init();
    info!("Logging initialized");
}

/// Dispatches host events to the action handler until the host connection
/// closes. A failed handler is logged and never takes the plugin down; the
/// next event is processed as usual.
pub async fn run<R, H>(action: ControlAction<R>, mut host: H) -> anyhow::Result<()>
where
    R: BleRadio,
    H: HostConnection,
{
    info!("BLE control action registered, waiting for host events");

    while let Some((ctx, event)) = host.next_event().await {
        let result = match event {
            HostEvent::WillAppear { settings } => action.on_will_appear(&ctx, &settings).await,
            HostEvent::PropertyInspectorDidAppear => {
                action.on_property_inspector_did_appear(&ctx).await
            }
            HostEvent::KeyDown { settings } => action.on_key_down(&ctx, &settings).await,
            HostEvent::SendToPlugin { payload } => action.on_send_to_plugin(&ctx, payload).await,
        };
        if let Err(e) = result {
            error!("Event handler failed: {e:#}");
        }
    }

    info!("Host connection closed, shutting down");
    Ok(())
}
