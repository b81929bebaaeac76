use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing::{debug, warn};

use feedguard_core_types::NodeId;
use feedguard_document::{DocumentTree, MutationSource, SelectorList};

use crate::errors::WaitError;

/// Resolves with the first element matching `selector`, waiting for it to
/// appear for at most `limit`.
///
/// The subscription is taken before the initial lookup and dropped on every
/// outcome, so no observer outlives the call.
pub async fn wait_for_element(
    doc: &dyn DocumentTree,
    source: &dyn MutationSource,
    selector: &SelectorList,
    limit: Duration,
) -> Result<NodeId, WaitError> {
    let mut rx = source.subscribe();
    if let Some(found) = doc.query_first(doc.root(), selector) {
        return Ok(found);
    }

    let watch = async {
        loop {
            match rx.recv().await {
                // Any batch may have produced a match deeper than its records.
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if let Some(found) = doc.query_first(doc.root(), selector) {
                        return Ok(found);
                    }
                }
                Err(RecvError::Closed) => {
                    return Err(WaitError::SourceClosed(selector.source().to_string()));
                }
            }
        }
    };

    match timeout(limit, watch).await {
        Ok(Ok(found)) => {
            debug!(target: "feedguard.discovery", selector = %selector, %found, "element appeared");
            Ok(found)
        }
        Ok(Err(err)) => {
            warn!(target: "feedguard.discovery", %err, "stopped waiting for element");
            Err(err)
        }
        Err(_) => Err(WaitError::Timeout {
            selector: selector.source().to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedguard_document::{el, MemoryDocument};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn region() -> SelectorList {
        SelectorList::parse("ytd-page-manager").expect("selector")
    }

    #[tokio::test(start_paused = true)]
    async fn present_element_resolves_immediately() {
        let doc = MemoryDocument::new();
        let node = doc.insert(doc.root(), el("ytd-page-manager")).expect("insert");
        let found = wait_for_element(&doc, &doc, &region(), Duration::from_secs(10))
            .await
            .expect("found");
        assert_eq!(found, node);
        assert_eq!(doc.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn element_inserted_later_is_found() {
        let doc = Arc::new(MemoryDocument::new());
        let writer = doc.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(2)).await;
            writer.insert(writer.root(), el("ytd-app").child(el("ytd-page-manager")));
        });

        let found = wait_for_element(doc.as_ref(), doc.as_ref(), &region(), Duration::from_secs(10))
            .await
            .expect("found");
        assert_eq!(doc.tag_name(found).as_deref(), Some("ytd-page-manager"));
        assert_eq!(doc.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_times_out_and_detaches() {
        let doc = MemoryDocument::new();
        doc.insert(doc.root(), el("div"));
        let err = wait_for_element(&doc, &doc, &region(), Duration::from_secs(5))
            .await
            .expect_err("timeout");
        assert!(matches!(err, WaitError::Timeout { timeout_ms: 5000, .. }));
        assert_eq!(doc.observer_count(), 0);
    }
}
