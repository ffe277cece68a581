// Store connector
// Opens the configured backend once at startup, retrying on a fixed budget

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::lancedb::LanceStore;
use super::{MEMORY_URI, MemoryStore, VectorStore};
use crate::config::StoreConfig;
use crate::{DocvecError, Result};

/// Connect to the store at `uri`, retrying per `settings`.
///
/// A connection only counts once it answers a collection listing.
/// Exhausting the attempts yields [`DocvecError::Connection`].
#[inline]
pub async fn connect(uri: &str, settings: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store = connect_with_retry(
        settings.connect_attempts,
        Duration::from_secs(settings.connect_backoff_secs),
        || open_store(uri),
    )
    .await?;

    info!("Connected to {} vector store at {}", store.backend(), uri);
    Ok(store)
}

/// Run `connect_once` up to `attempts` times, sleeping `backoff` between failures
#[inline]
pub async fn connect_with_retry<T, F, Fut>(
    attempts: u32,
    backoff: Duration,
    mut connect_once: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match connect_once().await {
            Ok(connection) => {
                if attempt > 1 {
                    info!("Connected on attempt {}/{}", attempt, attempts);
                }
                return Ok(connection);
            }
            Err(e) => {
                warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(DocvecError::Connection(format!(
        "Could not connect to vector store after {} attempts: {}",
        attempts,
        last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
    )))
}

async fn open_store(uri: &str) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = if uri == MEMORY_URI {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(LanceStore::open(uri).await?)
    };

    let collections = store.list_collections().await?;
    debug!("Store at {} has {} collections", uri, collections.len());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = connect_with_retry(5, Duration::from_millis(1), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(DocvecError::Connection("refused".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_is_a_connection_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = connect_with_retry(4, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DocvecError::Database("down".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(DocvecError::Connection(message)) => {
                assert!(message.contains("4 attempts"));
                assert!(message.contains("down"));
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn memory_uri_opens_in_process_store() {
        let settings = StoreConfig {
            uri: Some(MEMORY_URI.to_string()),
            connect_attempts: 1,
            connect_backoff_secs: 0,
        };
        let store = connect(MEMORY_URI, &settings).await.expect("connects");
        assert_eq!(store.backend(), "memory");
        assert!(store.list_collections().await.expect("lists").is_empty());
    }
}
