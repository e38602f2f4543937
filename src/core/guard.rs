use crate::domain::model::{Document, Query, User};
use crate::domain::ports::{DocumentStore, SessionGate};
use crate::utils::error::{Result, RosterError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// 指令所需的權限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// 依權限檢查目前使用者
pub fn authorize(access: Access, user: Option<&User>) -> Result<()> {
    match (access, user) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(RosterError::SessionExpired),
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::Admin, Some(user)) if user.is_admin() => Ok(()),
        (Access::Admin, Some(user)) => Err(RosterError::Forbidden {
            message: format!("user '{}' is not an admin", user.username),
        }),
    }
}

/// 每次資料請求前檢查登錄狀態；存儲端拒絕 session 時清除本地狀態
pub struct GuardedStore<S, G> {
    inner: S,
    gate: Arc<G>,
}

impl<S: Clone, G> Clone for GuardedStore<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<S, G> GuardedStore<S, G>
where
    S: DocumentStore,
    G: SessionGate,
{
    pub fn new(inner: S, gate: Arc<G>) -> Self {
        Self { inner, gate }
    }

    async fn guarded<T, Fut>(&self, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>> + Send,
    {
        self.gate.ensure_session().await?;
        match call.await {
            Err(e) if e.is_session_error() => {
                tracing::warn!("🔒 Store rejected the session, clearing local login state");
                self.gate.invalidate().await?;
                Err(e)
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S, G> DocumentStore for GuardedStore<S, G>
where
    S: DocumentStore,
    G: SessionGate,
{
    async fn find(&self, class: &str, query: &Query) -> Result<Vec<Document>> {
        self.guarded(self.inner.find(class, query)).await
    }

    async fn get(&self, class: &str, id: &str) -> Result<Document> {
        self.guarded(self.inner.get(class, id)).await
    }

    async fn create(&self, class: &str, data: Document) -> Result<Document> {
        self.guarded(self.inner.create(class, data)).await
    }

    async fn update(&self, class: &str, id: &str, data: Document) -> Result<Document> {
        self.guarded(self.inner.update(class, id, data)).await
    }

    async fn destroy(&self, class: &str, id: &str) -> Result<()> {
        self.guarded(self.inner.destroy(class, id)).await
    }
}
