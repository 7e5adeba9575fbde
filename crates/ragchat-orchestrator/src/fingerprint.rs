use tracing::warn;

use ragchat_core::traits::VectorStore;
use ragchat_core::types::ChunkId;

/// Fingerprint of a store that holds no chunks (or could not be read).
pub const EMPTY_FINGERPRINT: &str = "empty";

/// Digest of the store's current chunk set. Independent of enumeration
/// order; any failure degrades to [`EMPTY_FINGERPRINT`].
pub async fn fingerprint(store: &dyn VectorStore) -> String {
    match store.count().await {
        Ok(0) => return EMPTY_FINGERPRINT.to_string(),
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "count failed, fingerprinting as empty");
            return EMPTY_FINGERPRINT.to_string();
        }
    }
    match store.chunk_ids().await {
        Ok(ids) => fingerprint_ids(ids),
        Err(e) => {
            warn!(error = %e, "chunk enumeration failed, fingerprinting as empty");
            EMPTY_FINGERPRINT.to_string()
        }
    }
}

pub fn fingerprint_ids(mut ids: Vec<ChunkId>) -> String {
    if ids.is_empty() {
        return EMPTY_FINGERPRINT.to_string();
    }
    ids.sort_unstable();
    crate::cache_key::xxh3_128_hex(ids.join("\n").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_does_not_matter() {
        let a = fingerprint_ids(vec!["b".into(), "a".into(), "c".into()]);
        let b = fingerprint_ids(vec!["c".into(), "b".into(), "a".into()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn membership_changes_digest() {
        let a = fingerprint_ids(vec!["a".into(), "b".into()]);
        let b = fingerprint_ids(vec!["a".into(), "b".into(), "c".into()]);
        assert_ne!(a, b);
        assert_eq!(fingerprint_ids(Vec::new()), EMPTY_FINGERPRINT);
    }
}
