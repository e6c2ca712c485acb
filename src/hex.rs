/// Renders bytes as a lowercase hex string, for diagnostics only.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
