use crate::config::toml_config::QueueConfig;
use crate::domain::model::{Document, Query};
use crate::domain::ports::{AuthBackend, DocumentStore};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 單通道請求佇列：同一時間只有一個請求在途，
/// 相鄰兩次嘗試之間至少間隔 `min_interval`，被限流時指數退避重試。
#[derive(Debug)]
pub struct RequestQueue {
    min_interval: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    // 上一次嘗試結束的時間，鎖本身就是通道
    lane: Mutex<Option<Instant>>,
}

impl RequestQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            lane: Mutex::new(None),
        }
    }

    /// 第 `attempt` 次重試前的等待時間
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_finished = self.lane.lock().await;
        let mut attempt = 0;

        loop {
            if let Some(finished) = *last_finished {
                let ready_at = finished + self.min_interval;
                if ready_at > Instant::now() {
                    tokio::time::sleep_until(ready_at).await;
                }
            }

            let result = op().await;
            *last_finished = Some(Instant::now());

            match result {
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Store rate limited, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// 讓所有存儲呼叫都經過同一個 [`RequestQueue`]
#[derive(Debug, Clone)]
pub struct QueuedStore<S> {
    inner: S,
    queue: Arc<RequestQueue>,
}

impl<S> QueuedStore<S> {
    pub fn new(inner: S, queue: Arc<RequestQueue>) -> Self {
        Self { inner, queue }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for QueuedStore<S> {
    async fn find(&self, class: &str, query: &Query) -> Result<Vec<Document>> {
        self.queue.run(|| self.inner.find(class, query)).await
    }

    async fn get(&self, class: &str, id: &str) -> Result<Document> {
        self.queue.run(|| self.inner.get(class, id)).await
    }

    async fn create(&self, class: &str, data: Document) -> Result<Document> {
        self.queue.run(|| self.inner.create(class, data.clone())).await
    }

    async fn update(&self, class: &str, id: &str, data: Document) -> Result<Document> {
        self.queue
            .run(|| self.inner.update(class, id, data.clone()))
            .await
    }

    async fn destroy(&self, class: &str, id: &str) -> Result<()> {
        self.queue.run(|| self.inner.destroy(class, id)).await
    }
}

#[async_trait]
impl<S: AuthBackend> AuthBackend for QueuedStore<S> {
    async fn log_in(&self, username: &str, password: &str) -> Result<Document> {
        self.queue.run(|| self.inner.log_in(username, password)).await
    }

    async fn become_user(&self, session_token: &str) -> Result<Document> {
        self.queue.run(|| self.inner.become_user(session_token)).await
    }

    async fn sign_up(&self, user: Document) -> Result<Document> {
        self.queue.run(|| self.inner.sign_up(user.clone())).await
    }

    async fn update_user(&self, session_token: &str, user_id: &str, data: Document) -> Result<()> {
        self.queue
            .run(|| self.inner.update_user(session_token, user_id, data.clone()))
            .await
    }

    async fn update_password(
        &self,
        session_token: &str,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.queue
            .run(|| {
                self.inner
                    .update_password(session_token, user_id, old_password, new_password)
            })
            .await
    }
}
