use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, trace};

use crate::task_dispatcher::TaskDispatcher;

pub struct TaskRunner();

impl TaskRunner {
    /// Consumes tasks one at a time until the dispatcher is stopped. The
    /// dispatcher lock is only held to claim and to complete a task, never
    /// while the task runs.
    pub async fn run(dispatcher: Arc<RwLock<TaskDispatcher>>) {
        let Some(mut notifier) = dispatcher.write().await.notifier_rx.take() else {
            info!("task runner already started");
            return;
        };
        // pick up anything queued before the runner started
        dispatcher.read().await.notify();

        loop {
            // stops the runner if the notifier was closed.
            if notifier.changed().await.is_err() {
                break;
            }

            // stops the runner if the value is `true`
            if *notifier.borrow() {
                break;
            }

            let claimed = dispatcher.write().await.claim_next();
            if let Some(claimed) = claimed {
                trace!("runner picked task {}", claimed.id());
                let result = claimed.execute().await;
                dispatcher.write().await.complete(&result);
            }
        }
        info!("task runner stopped");
    }
}
