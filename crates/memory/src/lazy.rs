//! Lazily connected vector store handle.

use pitchscout_core::error::StoreError;
use pitchscout_core::retrieval::{StoreConnector, VectorStore};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Connects on first use, exactly once per process.
///
/// Concurrent first callers wait on the same connection attempt. A failed
/// attempt leaves the cell empty, so the next call tries again.
pub struct LazyVectorStore {
    connector: Arc<dyn StoreConnector>,
    cell: OnceCell<Arc<dyn VectorStore>>,
}

impl LazyVectorStore {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            cell: OnceCell::new(),
        }
    }

    /// The connected store, connecting first if needed.
    pub async fn get(&self) -> Result<Arc<dyn VectorStore>, StoreError> {
        self.cell
            .get_or_try_init(|| async {
                info!(store = %self.connector.describe(), "Connecting to vector store");
                self.connector.connect().await.inspect_err(|e| {
                    error!(error = %e, "Vector store initialization failed");
                })
            })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }
}
