//! Vector-store backends behind the `VectorStore` trait: an in-memory flat
//! index and a persistent LanceDB table. Both rank by exact cosine scan.

use std::sync::Arc;

use ragchat_core::config::{StoreBackend, StoreSettings};
use ragchat_core::traits::VectorStore;
use ragchat_core::Result;

pub mod flat;
pub mod lance;
pub mod schema;
pub mod similarity;
pub mod table;

pub use flat::FlatIndex;
pub use lance::LanceStore;

/// Builds the backend selected in configuration.
pub async fn open_store(settings: &StoreSettings, dim: usize) -> Result<Arc<dyn VectorStore>> {
    match settings.backend {
        StoreBackend::Flat => Ok(Arc::new(FlatIndex::new(dim))),
        StoreBackend::Lance => {
            let uri = settings.lance_path();
            let store = LanceStore::open(&uri.to_string_lossy(), &settings.table, dim).await?;
            Ok(Arc::new(store))
        }
    }
}
