//! Document encodings.
//!
//! ## JSON document
//!
//! Plain `serde_json` rendering of [`DashboardState`]. Decoding reads
//! `schema_version` first:
//!
//! - missing or `1`: migrated to the current version
//! - current: decoded as-is
//! - newer: rejected, so an old client never truncates a newer document
//!
//! ## Binary envelope
//!
//! ```text
//! +-------+---------+------------------+
//! | DGRD  | version | postcard payload |
//! | 4 B   | 1 B     | ...              |
//! +-------+---------+------------------+
//! ```
//!
//! Every decoded document is validated before it is returned.

use crate::error::{DashboardError, Result};
use crate::model::{DashboardState, SCHEMA_VERSION};
use serde_json::Value;

/// Magic bytes at the start of the binary envelope.
pub const MAGIC: [u8; 4] = *b"DGRD";

/// Version of the binary envelope layout.
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

// =============================================================================
// JSON DOCUMENT
// =============================================================================

/// Render a document as pretty-printed JSON.
pub fn to_json(state: &DashboardState) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Render a document as a JSON string.
pub fn to_json_string(state: &DashboardState) -> Result<String> {
    Ok(serde_json::to_string(state)?)
}

/// Decode a JSON document, migrating older schema versions.
pub fn from_json(bytes: &[u8]) -> Result<DashboardState> {
    let value: Value = serde_json::from_slice(bytes)?;
    from_json_value(value)
}

/// Decode an already-parsed JSON document, migrating older schema versions.
pub fn from_json_value(mut value: Value) -> Result<DashboardState> {
    let version = schema_version_of(&value)?;

    if version > SCHEMA_VERSION {
        return Err(DashboardError::UnsupportedVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if version < SCHEMA_VERSION {
        migrate_v1(&mut value)?;
    }

    let state: DashboardState = serde_json::from_value(value)?;
    state.validate()?;
    Ok(state)
}

fn schema_version_of(value: &Value) -> Result<u32> {
    let object = value
        .as_object()
        .ok_or_else(|| DashboardError::InvalidFormat("document is not a JSON object".into()))?;

    match object.get("schema_version") {
        None => Ok(1),
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| DashboardError::InvalidFormat("schema_version is not a number".into())),
    }
}

/// Version 1 documents carry no id counter, revision or session.
fn migrate_v1(value: &mut Value) -> Result<()> {
    let object = value
        .as_object_mut()
        .ok_or_else(|| DashboardError::InvalidFormat("document is not a JSON object".into()))?;

    if !object.contains_key("next_widget_id") {
        let next = object
            .get("widgets")
            .and_then(Value::as_array)
            .map(|widgets| {
                widgets
                    .iter()
                    .filter_map(|w| w.get("id").and_then(Value::as_u64))
                    .map(|id| id.saturating_add(1))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        object.insert("next_widget_id".into(), Value::from(next));
    }
    object.insert("schema_version".into(), Value::from(SCHEMA_VERSION));
    Ok(())
}

// =============================================================================
// BINARY ENVELOPE
// =============================================================================

/// Encode a document into the binary envelope.
pub fn encode_binary(state: &DashboardState) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(state)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode and validate a binary envelope.
pub fn decode_binary(bytes: &[u8]) -> Result<DashboardState> {
    if bytes.len() < HEADER_LEN {
        return Err(DashboardError::InvalidFormat("envelope too short".into()));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..MAGIC.len()] != MAGIC {
        return Err(DashboardError::InvalidFormat("bad magic bytes".into()));
    }
    let version = header[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(DashboardError::InvalidFormat(format!(
            "unsupported envelope version {version}"
        )));
    }

    let state: DashboardState = postcard::from_bytes(payload)?;
    if state.schema_version > SCHEMA_VERSION {
        return Err(DashboardError::UnsupportedVersion {
            found: state.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    state.validate()?;
    Ok(state)
}

// =============================================================================
// CHECKSUMS
// =============================================================================

/// Hex checksum of an export.
///
/// FNV-1a (64 bit) by default; BLAKE3 with the `crypto-hash` feature.
#[cfg(not(feature = "crypto-hash"))]
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = bytes.iter().fold(OFFSET, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    format!("{hash:016x}")
}

/// Hex checksum of an export.
///
/// FNV-1a (64 bit) by default; BLAKE3 with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::DashboardService;
    use crate::types::{Size, Timestamp, WidgetKind};

    fn sample() -> DashboardState {
        let mut svc = DashboardService::new(12).expect("valid columns");
        svc.add_widget(WidgetKind::TaskList, Some("Inbox"), None, Timestamp(10))
            .expect("placement");
        svc.add_widget(WidgetKind::Stats, None, Some(Size::new(2, 2)), Timestamp(11))
            .expect("placement");
        svc.into_state()
    }

    #[test]
    fn json_document_decodes_to_same_state() {
        let state = sample();
        let bytes = to_json(&state).expect("encode");
        let decoded = from_json(&bytes).expect("decode");
        assert_eq!(decoded, state);
    }

    #[test]
    fn v1_document_is_migrated() {
        let v1 = br#"{
            "columns": 12,
            "widgets": [
                {"id": 4, "kind": "notes", "title": "Scratch",
                 "rect": {"x": 0, "y": 0, "w": 3, "h": 3},
                 "created_at": 5, "updated_at": 5}
            ],
            "updated_at": 5
        }"#;
        let state = from_json(v1).expect("migrate");
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert_eq!(state.next_widget_id, 5);
        assert_eq!(state.revision, 0);
        assert!(state.session.is_none());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let doc = br#"{"schema_version": 99, "columns": 12, "widgets": [], "next_widget_id": 0, "updated_at": 0}"#;
        assert!(matches!(
            from_json(doc),
            Err(DashboardError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn invalid_layout_is_rejected_on_load() {
        let doc = br#"{
            "schema_version": 2, "columns": 4, "next_widget_id": 1, "updated_at": 0,
            "widgets": [
                {"id": 0, "kind": "stats", "title": "s",
                 "rect": {"x": 2, "y": 0, "w": 4, "h": 1},
                 "created_at": 0, "updated_at": 0}
            ]
        }"#;
        assert!(matches!(
            from_json(doc),
            Err(DashboardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn oversized_widgets_are_rejected_on_load() {
        let tall = br#"{
            "schema_version": 2, "columns": 12, "next_widget_id": 1, "updated_at": 0,
            "widgets": [
                {"id": 0, "kind": "notes", "title": "n",
                 "rect": {"x": 0, "y": 0, "w": 2, "h": 4000000},
                 "created_at": 0, "updated_at": 0}
            ]
        }"#;
        assert!(matches!(
            from_json(tall),
            Err(DashboardError::OutOfBounds { .. })
        ));

        let deep = br#"{
            "schema_version": 2, "columns": 12, "next_widget_id": 1, "updated_at": 0,
            "widgets": [
                {"id": 0, "kind": "notes", "title": "n",
                 "rect": {"x": 0, "y": 4000000000, "w": 2, "h": 2},
                 "created_at": 0, "updated_at": 0}
            ]
        }"#;
        assert!(matches!(
            from_json(deep),
            Err(DashboardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            from_json(b"[1, 2, 3]"),
            Err(DashboardError::InvalidFormat(_))
        ));
    }

    #[test]
    fn binary_envelope_has_header() {
        let bytes = encode_binary(&sample()).expect("encode");
        assert_eq!(&bytes[..4], &MAGIC);
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(decode_binary(&bytes).expect("decode"), sample());
    }

    #[test]
    fn binary_envelope_rejects_bad_magic() {
        let mut bytes = encode_binary(&sample()).expect("encode");
        bytes[0] = b'X';
        assert!(decode_binary(&bytes).is_err());
        assert!(decode_binary(b"DG").is_err());
    }

    #[test]
    fn checksum_is_stable_and_sensitive() {
        let a = checksum(b"dashboard");
        assert_eq!(a, checksum(b"dashboard"));
        assert_ne!(a, checksum(b"dashboarc"));
    }
}
