use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use crate::renderer::{RenderError, RenderOutcome, RenderRequest, Renderer};

const QUEUE_DEPTH: usize = 32;

pub enum WorkerCommand {
    Invoke {
        request: RenderRequest,
        reply: oneshot::Sender<RenderOutcome>,
    },
    Shutdown,
}

/// Single worker task in front of the renderer.
///
/// The renderer is a single-instance desktop application, so requests are
/// run one at a time in the order they were submitted.
pub struct RenderQueue {
    command_tx: mpsc::Sender<WorkerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl RenderQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        let (command_tx, mut command_rx) = mpsc::channel::<WorkerCommand>(QUEUE_DEPTH);

        let handle = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    WorkerCommand::Invoke { request, reply } => {
                        let job_id = request.job_id;
                        let outcome = renderer.invoke(request).await;
                        if reply.send(outcome).is_err() {
                            debug!(%job_id, "Render finished after the caller went away");
                        }
                    }
                    WorkerCommand::Shutdown => break,
                }
            }
            info!("Render queue stopped");
        });

        Self {
            command_tx,
            handle: Some(handle),
        }
    }

    /// Queues a request and waits for its outcome.
    pub async fn submit(&self, request: RenderRequest) -> RenderOutcome {
        let (reply, outcome) = oneshot::channel();
        let job_id = request.job_id;

        if self
            .command_tx
            .send(WorkerCommand::Invoke { request, reply })
            .await
            .is_err()
        {
            return RenderOutcome::Failure(RenderError::Exception(
                "Render queue is not running".into(),
            ));
        }
        debug!(%job_id, "Queued render request");

        outcome.await.unwrap_or_else(|_| {
            RenderOutcome::Failure(RenderError::Exception(
                "Render queue dropped the request".into(),
            ))
        })
    }

    /// Lets queued work finish, then stops the worker.
    pub async fn shutdown(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown).await;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
