use likeness_core::{AgeReply, AgeService, ImageRequest, SimilarityReply, SimilarityService};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::Span;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
///
/// Each carries the caller's span so engine logs stay tied to the request.
enum EngineRequest {
    Age {
        request: ImageRequest,
        span: Span,
        reply: oneshot::Sender<AgeReply>,
    },
    Similarity {
        request: ImageRequest,
        span: Span,
        reply: oneshot::Sender<SimilarityReply>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Queue an age prediction and wait for its reply.
    pub async fn predict_age(&self, request: ImageRequest) -> Result<AgeReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Age {
                request,
                span: Span::current(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Queue a lookalike search and wait for its reply.
    pub async fn find_lookalikes(
        &self,
        request: ImageRequest,
    ) -> Result<SimilarityReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Similarity {
                request,
                span: Span::current(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns both services and drains a bounded work queue, so model
/// inference never runs on the async executor. A request that panics is
/// answered with its service's failure reply and the thread keeps serving.
pub fn spawn_engine(
    age: AgeService,
    similarity: SimilarityService,
    queue_depth: usize,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("likeness-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Age {
                        request,
                        span,
                        reply,
                    } => {
                        let _entered = span.enter();
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| age.predict(request)))
                                .unwrap_or_else(|payload| {
                                    let msg = panic_message(payload.as_ref());
                                    tracing::error!(service = "age", panic = %msg, "request panicked");
                                    AgeReply::Message(format!("Error processing image: {msg}"))
                                });
                        let _ = reply.send(result);
                    }
                    EngineRequest::Similarity {
                        request,
                        span,
                        reply,
                    } => {
                        let _entered = span.enter();
                        let result =
                            panic::catch_unwind(AssertUnwindSafe(|| similarity.predict(request)))
                                .unwrap_or_else(|payload| {
                                    let msg = panic_message(payload.as_ref());
                                    tracing::error!(
                                        service = "similarity",
                                        panic = %msg,
                                        "request panicked"
                                    );
                                    SimilarityReply::EmptySequence
                                });
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");

        let payload = panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicked with unknown payload");
    }
}
