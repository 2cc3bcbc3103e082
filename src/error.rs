//! Error types shared by the command codec and the device bridge.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the bridge and codec. None of these are retried;
/// configuration flows report them to the property inspector, the key-press
/// flow reports them through the button alert.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bluetooth radio is not powered on")]
    RadioNotReady,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("characteristic {characteristic} not found under service {service}")]
    CharacteristicNotFound { service: Uuid, characteristic: Uuid },

    #[error("unknown command format")]
    UnknownCommandFormat,

    #[error("command payload does not match the declared {0} format")]
    PayloadMismatch(&'static str),

    #[error("peripheral lookup by id is not supported on this platform")]
    PeripheralLookupUnsupported,

    #[error("action is missing required configuration")]
    ConfigurationMissing,

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// Failure inside the native BLE stack.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<bluest::Error> for BridgeError {
    fn from(err: bluest::Error) -> Self {
        Self::Backend(err.into())
    }
}
