use crate::domain::model::{Document, Query};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// 託管文件存儲的最小操作集合
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, class: &str, query: &Query) -> Result<Vec<Document>>;
    async fn get(&self, class: &str, id: &str) -> Result<Document>;
    /// 返回寫入後的完整文件（含 `objectId` 與 `createdAt`）
    async fn create(&self, class: &str, data: Document) -> Result<Document>;
    async fn update(&self, class: &str, id: &str, data: Document) -> Result<Document>;
    async fn destroy(&self, class: &str, id: &str) -> Result<()>;
}

/// 存儲端的使用者與 session 原語
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn log_in(&self, username: &str, password: &str) -> Result<Document>;
    async fn become_user(&self, session_token: &str) -> Result<Document>;
    async fn sign_up(&self, user: Document) -> Result<Document>;
    async fn update_user(&self, session_token: &str, user_id: &str, data: Document) -> Result<()>;
    async fn update_password(
        &self,
        session_token: &str,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()>;
}

/// 本地鍵值存儲（取代瀏覽器 localStorage）
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
    fn set_item(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_item(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 每次資料請求前的登錄檢查
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn ensure_session(&self) -> Result<()>;
    /// 清除本地 session 狀態
    async fn invalidate(&self) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
