use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::store::MemoryStore;

/// Compact the store's WAL once it holds more than `threshold` frames
/// since the last compaction. Returns whether it compacted.
pub async fn compact_if_needed(store: &MemoryStore, threshold: u64) -> bool {
    let frames = store.frames_since_compact().await;
    if frames <= threshold {
        debug!("compactor: {frames} frames, below threshold {threshold}");
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that periodically checks whether the WAL needs compaction.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Grade;
    use crate::store::EntityStore;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotgrid_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = MemoryStore::open(&path).unwrap();
        for i in 0..3 {
            store
                .save_grade(Grade { id: Ulid::new(), name: format!("Grade {i}"), order: i })
                .await
                .unwrap();
        }
        assert!(!compact_if_needed(&store, 3).await);
        assert_eq!(store.frames_since_compact().await, 3);
        assert!(compact_if_needed(&store, 2).await);
        assert_eq!(store.frames_since_compact().await, 0);
        assert_eq!(store.snapshot().await.unwrap().grades.len(), 3);
    }
}
