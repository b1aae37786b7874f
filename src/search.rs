use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::media::{MediaStore, SearchOutcome};

/// Holds each query back for a settling delay; only the latest query still
/// pending when its delay elapses reaches the catalog.
pub struct SearchDebouncer {
    media: Arc<MediaStore>,
    delay: Duration,
    generation: AtomicU64,
}

impl SearchDebouncer {
    pub fn new(media: Arc<MediaStore>, delay: Duration) -> Self {
        Self {
            media,
            delay,
            generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn submit(&self, query: &str) -> SearchOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(query = %query, "Search superseded before settling");
            return SearchOutcome::Superseded;
        }
        self.media.search(query).await
    }
}
