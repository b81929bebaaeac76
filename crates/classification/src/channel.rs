use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use feedguard_core_types::Identifier;

use crate::authority::RemoteClassifier;
use crate::errors::ClassificationError;
use crate::model::ClassificationResult;

/// One lookup handed to the worker on the far side of the channel.
#[derive(Debug)]
pub struct ClassifyRequest {
    pub ids: Vec<Identifier>,
    pub reply: oneshot::Sender<Result<Vec<ClassificationResult>, String>>,
}

/// [`RemoteClassifier`] backed by a message channel to a background worker.
///
/// A dropped worker (or a reply sender dropped without answering) surfaces as
/// [`ClassificationError::ChannelClosed`].
#[derive(Clone)]
pub struct ChannelClassifier {
    requests: mpsc::Sender<ClassifyRequest>,
}

impl ChannelClassifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClassifyRequest>) {
        let (requests, rx) = mpsc::channel(capacity.max(1));
        (Self { requests }, rx)
    }

    pub fn from_sender(requests: mpsc::Sender<ClassifyRequest>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl RemoteClassifier for ChannelClassifier {
    async fn lookup(
        &self,
        ids: &[Identifier],
    ) -> Result<Vec<ClassificationResult>, ClassificationError> {
        let (reply, answer) = oneshot::channel();
        let request = ClassifyRequest {
            ids: ids.to_vec(),
            reply,
        };
        if self.requests.send(request).await.is_err() {
            debug!(target: "feedguard.classification", "worker channel closed before send");
            return Err(ClassificationError::ChannelClosed);
        }
        match answer.await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(message)) => Err(ClassificationError::Remote(message)),
            Err(_) => Err(ClassificationError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).expect("identifier")
    }

    #[tokio::test]
    async fn worker_replies_flow_back() {
        let (classifier, mut rx) = ChannelClassifier::new(4);
        let worker = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let results = request
                    .ids
                    .iter()
                    .map(|id| ClassificationResult::new(id.clone(), 2.0, 7))
                    .collect();
                let _ = request.reply.send(Ok(results));
            }
        });

        let results = classifier.lookup(&[id("AAAAAAAAAAA")]).await.expect("lookup");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].raw_count, 7);

        drop(classifier);
        worker.await.expect("worker");
    }

    #[tokio::test]
    async fn dropped_worker_is_an_expected_closure() {
        let (classifier, rx) = ChannelClassifier::new(1);
        drop(rx);
        let err = classifier.lookup(&[id("AAAAAAAAAAA")]).await.expect_err("closed");
        assert!(err.is_expected_closure());
    }

    #[tokio::test]
    async fn unanswered_request_is_an_expected_closure() {
        let (classifier, mut rx) = ChannelClassifier::new(1);
        tokio::spawn(async move {
            // receive and drop without replying
            let _ = rx.recv().await;
        });
        let err = classifier.lookup(&[id("AAAAAAAAAAA")]).await.expect_err("closed");
        assert_eq!(err, ClassificationError::ChannelClosed);
    }

    #[tokio::test]
    async fn worker_errors_are_remote_failures() {
        let (classifier, mut rx) = ChannelClassifier::new(1);
        tokio::spawn(async move {
            if let Some(request) = rx.recv().await {
                let _ = request.reply.send(Err("quota exceeded".into()));
            }
        });
        let err = classifier.lookup(&[id("AAAAAAAAAAA")]).await.expect_err("remote");
        assert_eq!(err, ClassificationError::Remote("quota exceeded".into()));
    }
}
