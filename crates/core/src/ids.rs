use uuid::Uuid;

/// Lowercase hex, two digits per byte. Ids of unexpected length are kept as-is.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fresh opaque row identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
