//! Helpers for standard (Bluetooth SIG) GATT identifiers: expanding short
//! UUID forms and naming the handful of services/characteristics the
//! property inspector cares about.

use uuid::Uuid;

use crate::error::BridgeError;

/// The Bluetooth base UUID, 0000xxxx-0000-1000-8000-00805f9b34fb.
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Mask for the short-code portion of a standard UUID.
const SHORT_CODE_MASK: u128 = 0xffffffff << 96;

/// Expands a 16- or 32-bit assigned number into a full 128-bit UUID.
pub fn uuid_from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Returns the 16-bit assigned number when the UUID sits on the Bluetooth
/// base, `None` for vendor-specific UUIDs.
pub fn short_code(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & !SHORT_CODE_MASK != BLUETOOTH_BASE_UUID {
        return None;
    }
    u16::try_from(value >> 96).ok()
}

/// Parses a UUID from panel-supplied text. Accepts full UUIDs as well as the
/// short forms common in BLE tooling ("180f", "0x180F", "0000180f").
pub fn parse_uuid(input: &str) -> Result<Uuid, BridgeError> {
    let trimmed = input.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if !bare.is_empty() && bare.len() <= 8 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        let short = u32::from_str_radix(bare, 16)
            .map_err(|_| BridgeError::InvalidUuid(input.to_string()))?;
        return Ok(uuid_from_short(short));
    }

    Uuid::parse_str(trimmed).map_err(|_| BridgeError::InvalidUuid(input.to_string()))
}

/// Friendly name for a known standard service UUID.
pub fn service_name(uuid: &Uuid) -> Option<&'static str> {
    match short_code(uuid)? {
        0x1800 => Some("Generic Access"),
        0x1801 => Some("Generic Attribute"),
        0x1805 => Some("Current Time Service"),
        0x180a => Some("Device Information"),
        0x180f => Some("Battery Service"),
        _ => None,
    }
}

/// Friendly name for a known standard characteristic UUID.
pub fn characteristic_name(uuid: &Uuid) -> Option<&'static str> {
    match short_code(uuid)? {
        0x2a00 => Some("Device Name"),
        0x2a01 => Some("Appearance"),
        0x2a19 => Some("Battery Level"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_round_trip() {
        let battery = uuid_from_short(0x180f);
        assert_eq!(
            battery,
            Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb)
        );
        assert_eq!(short_code(&battery), Some(0x180f));
    }

    #[test]
    fn vendor_uuids_have_no_short_code() {
        let vendor = Uuid::from_u128(0x4f63756c_7573_2054_6872_65656d6f7465);
        assert_eq!(short_code(&vendor), None);
        assert_eq!(service_name(&vendor), None);
    }

    #[test]
    fn parse_uuid_accepts_short_forms() {
        let expected = uuid_from_short(0x180f);
        for input in ["180f", "180F", "0x180f", "0000180f", " 180f "] {
            assert_eq!(parse_uuid(input).unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn parse_uuid_accepts_full_form() {
        let parsed = parse_uuid("0000180f-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(parsed, uuid_from_short(0x180f));
    }

    #[test]
    fn parse_uuid_rejects_garbage() {
        for input in ["", "not-a-uuid", "0x", "xyz1"] {
            assert!(
                matches!(parse_uuid(input), Err(BridgeError::InvalidUuid(_))),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn known_names() {
        assert_eq!(
            service_name(&uuid_from_short(0x180f)),
            Some("Battery Service")
        );
        assert_eq!(
            service_name(&uuid_from_short(0x1805)),
            Some("Current Time Service")
        );
        assert_eq!(
            characteristic_name(&uuid_from_short(0x2a19)),
            Some("Battery Level")
        );
        assert_eq!(characteristic_name(&uuid_from_short(0x2aff)), None);
    }
}
