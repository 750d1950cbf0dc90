//! 带缓冲的推送
//!
//! 请求路径只负责入队，后台任务按顺序转发给内部推送器。
//! 队列满时立即返回 [`PublishError::QueueFull`]，不会阻塞请求。

use std::sync::Arc;

use application::{MessagePublisher, PublishError};
use async_trait::async_trait;
use domain::{Message, StatusUpdate};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, RwLock,
};
use tokio::task::JoinHandle;

enum PublishJob {
    Message(Message),
    Status { user_id: String, update: StatusUpdate },
}

pub struct QueuedMessagePublisher {
    sender: RwLock<Option<mpsc::Sender<PublishJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    inner: Arc<dyn MessagePublisher>,
}

impl QueuedMessagePublisher {
    /// 创建并启动后台转发任务，必须在 tokio 运行时内调用
    pub fn new(inner: Arc<dyn MessagePublisher>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(Arc::clone(&inner), receiver));

        Self {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            inner,
        }
    }

    async fn enqueue(&self, job: PublishJob) -> Result<(), PublishError> {
        let guard = self.sender.read().await;
        let sender = guard.as_ref().ok_or(PublishError::Closed)?;
        sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => PublishError::QueueFull,
            TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

async fn run_worker(inner: Arc<dyn MessagePublisher>, mut receiver: mpsc::Receiver<PublishJob>) {
    while let Some(job) = receiver.recv().await {
        match job {
            PublishJob::Message(message) => {
                if let Err(error) = inner.publish_message(&message).await {
                    tracing::error!(
                        sender_id = %message.sender_id,
                        receiver_id = %message.receiver_id,
                        error = %error,
                        "队列中的消息推送失败"
                    );
                }
            }
            PublishJob::Status { user_id, update } => {
                if let Err(error) = inner.publish_status_update(&user_id, &update).await {
                    tracing::error!(
                        user_id = %user_id,
                        status = %update.status,
                        error = %error,
                        "队列中的状态推送失败"
                    );
                }
            }
        }
    }
    tracing::debug!("推送队列已清空，后台任务退出");
}

#[async_trait]
impl MessagePublisher for QueuedMessagePublisher {
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError> {
        self.enqueue(PublishJob::Message(message.clone())).await
    }

    async fn publish_status_update(
        &self,
        user_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), PublishError> {
        self.enqueue(PublishJob::Status {
            user_id: user_id.to_owned(),
            update: update.clone(),
        })
        .await
    }

    /// 停止接收新任务，等待队列中已有的通知发完后关闭内部推送器
    async fn close(&self) -> Result<(), PublishError> {
        self.sender.write().await.take();

        if let Some(worker) = self.worker.lock().await.take() {
            worker
                .await
                .map_err(|err| PublishError::transport(err.to_string()))?;
        }

        self.inner.close().await
    }
}
