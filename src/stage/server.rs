use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, VersoError};
use super::{TranslateStage, TranslationRequest, TranslationResponse};

type Reply = oneshot::Sender<Result<TranslationResponse>>;

struct Job {
    request: TranslationRequest,
    reply: Reply,
}

/// Worker that drains queued requests into coalesced stage executions
pub struct StageServer {
    worker: JoinHandle<()>,
}

impl StageServer {
    /// Spawn the worker; at most `max_batch` requests are taken per execution
    pub fn spawn(stage: Arc<TranslateStage>, max_batch: usize, queue: usize) -> (Self, StageHandle) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let worker = tokio::spawn(run(stage, rx, max_batch.max(1)));
        (Self { worker }, StageHandle { tx })
    }

    /// Wait for the worker; it stops once every handle is dropped
    pub async fn shutdown(self) -> Result<()> {
        self.worker
            .await
            .map_err(|e| VersoError::Inference(format!("stage worker panicked: {}", e)))
    }
}

async fn run(stage: Arc<TranslateStage>, mut rx: mpsc::Receiver<Job>, max_batch: usize) {
    let mut executions = 0usize;
    while let Some(first) = rx.recv().await {
        let mut jobs = vec![first];
        while jobs.len() < max_batch {
            match rx.try_recv() {
                Ok(job) => jobs.push(job),
                Err(_) => break,
            }
        }

        executions += 1;
        debug!("Stage execution {} with {} requests", executions, jobs.len());

        let (requests, replies): (Vec<_>, Vec<_>) = jobs.into_iter().map(|j| (j.request, j.reply)).unzip();
        let results = stage.execute(&requests).await;
        for (reply, result) in replies.into_iter().zip(results) {
            // The caller may have gone away
            let _ = reply.send(result.map(|translations| TranslationResponse { translations }));
        }
    }
    info!("Stage worker stopped after {} executions", executions);
}

/// Cloneable client side of a `StageServer`
#[derive(Clone)]
pub struct StageHandle {
    tx: mpsc::Sender<Job>,
}

impl StageHandle {
    /// Queue a request; the receiver may be dropped to cancel interest in the answer
    pub async fn submit(&self, request: TranslationRequest) -> Result<oneshot::Receiver<Result<TranslationResponse>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { request, reply })
            .await
            .map_err(|_| VersoError::Inference("stage server is not running".to_string()))?;
        Ok(rx)
    }

    pub async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse> {
        let rx = self.submit(request).await?;
        rx.await
            .map_err(|_| VersoError::Inference("stage server dropped the request".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::RequestCounter;
    use crate::translate::fake::FakeBackend;

    fn fake_stage() -> Arc<TranslateStage> {
        Arc::new(TranslateStage::new(Arc::new(FakeBackend::new()), None))
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_answered_in_place() {
        let (server, handle) = StageServer::spawn(fake_stage(), 4, 16);
        let counter = Arc::new(RequestCounter::new());

        let mut tasks = Vec::new();
        for i in 0..10 {
            let handle = handle.clone();
            let counter = counter.clone();
            tasks.push(tokio::spawn(async move {
                let text = format!("sentence {}", i);
                let response = handle
                    .translate(TranslationRequest::single(text, "English", "French"))
                    .await;
                match &response {
                    Ok(_) => counter.record_success(),
                    Err(_) => counter.record_failure(),
                }
                (i, response)
            }));
        }

        counter.wait_for(10).await;
        for task in tasks {
            let (i, response) = task.await.unwrap();
            let expected: String = FakeBackend::transform_one(&format!("sentence {}", i));
            assert_eq!(response.unwrap().translations, vec![expected]);
        }
        assert_eq!(counter.succeeded(), 10);

        drop(handle);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_affect_others() {
        let (server, handle) = StageServer::spawn(fake_stage(), 8, 8);

        let abandoned = handle
            .submit(TranslationRequest::single("ignored", "English", "French"))
            .await
            .unwrap();
        drop(abandoned);

        let response = handle
            .translate(TranslationRequest::single("Hello", "English", "French"))
            .await
            .unwrap();
        assert_eq!(response.translations, vec!["FAKEo".to_string()]);

        drop(handle);
        server.shutdown().await.unwrap();
    }
}
