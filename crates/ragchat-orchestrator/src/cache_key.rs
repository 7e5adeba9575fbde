use twox_hash::xxh3::hash128;

pub fn xxh3_128_hex(bytes: &[u8]) -> String {
    format!("{:032x}", hash128(bytes))
}

/// `"{digest(query)}_{fingerprint}"`: equal only for the same query text
/// against the same corpus state.
pub fn build_key(query: &str, fingerprint: &str) -> String {
    format!("{}_{}", xxh3_128_hex(query.as_bytes()), fingerprint)
}
