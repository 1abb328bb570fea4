use anyhow::Error;
use async_trait::async_trait;
use store::model::TaskContent;

pub type TaskHandlerId = String;

/// Consumer of one kind of task. An `Err` marks the task as failed; the
/// message travels back to the submitter in the task result.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    fn handler_id(&self) -> &str;

    fn handler_name(&self) -> &str {
        ""
    }

    async fn run(&self, content: TaskContent) -> Result<(), Error>;
}

#[async_trait]
impl<T> TaskHandler for Box<T>
where
    T: TaskHandler,
{
    fn handler_id(&self) -> &str {
        (**self).handler_id()
    }

    fn handler_name(&self) -> &str {
        (**self).handler_name()
    }

    async fn run(&self, content: TaskContent) -> Result<(), Error> {
        (**self).run(content).await
    }
}

#[async_trait]
impl<T> TaskHandler for std::sync::Arc<T>
where
    T: TaskHandler,
{
    fn handler_id(&self) -> &str {
        (**self).handler_id()
    }

    fn handler_name(&self) -> &str {
        (**self).handler_name()
    }

    async fn run(&self, content: TaskContent) -> Result<(), Error> {
        (**self).run(content).await
    }
}
