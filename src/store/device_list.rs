//! Compact JSON encoding of the device roster.
//!
//! The roster is mirrored into a Home Assistant `input_text` helper whose value
//! is capped at 255 characters, so entries use one-letter keys:
//! `[{"n":"Lamp","e":"light.lamp"}]`. Decoding also accepts the long keys
//! `name` / `entityId` written by older clients.

use super::Device;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct CompactDevice<'a> {
    n: &'a str,
    e: &'a str,
}

pub fn encode(devices: &[Device]) -> String {
    let compact: Vec<CompactDevice<'_>> = devices
        .iter()
        .map(|device| CompactDevice {
            n: &device.name,
            e: &device.entity_id,
        })
        .collect();

    // Serializing borrowed strings cannot fail
    serde_json::to_string(&compact).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a roster; malformed input yields an empty list.
/// Entries missing a name or an entity id are dropped.
pub fn decode(raw: &str) -> Vec<Device> {
    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Failed to parse device list JSON: {}", e);
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = string_field(entry, "n", "name");
            let entity_id = string_field(entry, "e", "entityId");
            if name.is_empty() || entity_id.is_empty() {
                None
            } else {
                Some(Device { name, entity_id })
            }
        })
        .collect()
}

fn string_field(entry: &Value, short: &str, long: &str) -> String {
    entry
        .get(short)
        .or_else(|| entry.get(long))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_short_keys() {
        let encoded = encode(&[Device::new("Lamp", "light.lamp")]);
        assert_eq!(encoded, r#"[{"n":"Lamp","e":"light.lamp"}]"#);
        assert_eq!(encode(&[]), "[]");
    }

    #[test]
    fn test_decode_accepts_long_keys() {
        let devices = decode(r#"[{"name":"Fan","entityId":"fan.bedroom"},{"n":"Lamp","e":"light.lamp"}]"#);
        assert_eq!(
            devices,
            vec![Device::new("Fan", "fan.bedroom"), Device::new("Lamp", "light.lamp")]
        );
    }

    #[test]
    fn test_decode_malformed_is_empty() {
        assert!(decode("not json").is_empty());
        assert!(decode(r#"{"n":"Lamp"}"#).is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_decode_drops_incomplete_entries() {
        let devices = decode(r#"[{"n":"Lamp"},{"e":"light.x"},{"n":"","e":"light.y"},{"n":"Ok","e":"switch.ok"},42]"#);
        assert_eq!(devices, vec![Device::new("Ok", "switch.ok")]);
    }

    #[test]
    fn test_duplicates_survive_decoding() {
        let devices = decode(r#"[{"n":"A","e":"light.a"},{"n":"A again","e":"light.a"}]"#);
        assert_eq!(devices.len(), 2);
    }
}
