//! 各實體的存儲服務。
//!
//! 所有服務共用一個 [`Roster`] 上下文：存儲、狀態規則與時鐘。
//! 服務之間的協作（例如銷假後更新成員）都透過它取得對方。

pub mod assessments;
pub mod auth;
pub mod blacklist;
pub mod leaves;
pub mod members;
pub mod quits;
pub mod tables;

pub use assessments::AssessmentService;
pub use auth::{AuthService, UpdateUserInfo};
pub use blacklist::BlacklistService;
pub use leaves::LeaveService;
pub use members::MemberService;
pub use quits::{BlacklistQuitService, QuitService};
pub use tables::TableService;

use crate::domain::model::{from_document, Document, Member, Query};
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::status::StatusRules;
use crate::utils::error::{Result, RosterError};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct Roster<S> {
    store: S,
    rules: Arc<StatusRules>,
    clock: Arc<dyn Clock>,
}

impl<S> Roster<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(store: S, rules: StatusRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rules(&self) -> &StatusRules {
        &self.rules
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn members(&self) -> MemberService<S> {
        MemberService::new(self.clone())
    }

    pub fn leaves(&self) -> LeaveService<S> {
        LeaveService::new(self.clone())
    }

    pub fn blacklist(&self) -> BlacklistService<S> {
        BlacklistService::new(self.clone())
    }

    pub fn quits(&self) -> QuitService<S> {
        QuitService::new(self.clone())
    }

    pub fn blacklist_quits(&self) -> BlacklistQuitService<S> {
        BlacklistQuitService::new(self.clone())
    }

    pub fn assessments(&self) -> AssessmentService<S> {
        AssessmentService::new(self.clone())
    }

    /// 查詢並反序列化；尚未建立的資料表視為空
    pub(crate) async fn find_all<T: DeserializeOwned>(&self, class: &str, query: &Query) -> Result<Vec<T>> {
        let docs = match self.store.find(class, query).await {
            Ok(docs) => docs,
            Err(e) if e.is_class_missing() => {
                tracing::debug!("Class {} does not exist yet, treating as empty", class);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        docs.into_iter().map(from_document).collect()
    }

    pub(crate) async fn get_as<T: DeserializeOwned>(&self, class: &str, id: &str) -> Result<T> {
        from_document(self.store.get(class, id).await?)
    }

    /// 刪除類別中所有屬於該成員的記錄
    pub(crate) async fn destroy_by_member(&self, class: &str, member_id: &str) -> Result<usize> {
        let docs: Vec<Document> = self.find_all(class, &Query::by_member(member_id)).await?;
        let mut removed = 0;
        for doc in docs {
            if let Some(id) = object_id(&doc) {
                self.store.destroy(class, id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 記錄缺少成員暱稱或 QQ 時，從成員資料補齊
    pub(crate) async fn member_snapshot(&self, member_id: &str) -> Result<Member> {
        if member_id.trim().is_empty() {
            return Err(RosterError::validation("memberId is required"));
        }
        self.members().get_member(member_id).await
    }
}

pub(crate) fn object_id(doc: &Document) -> Option<&str> {
    doc.get("objectId").and_then(Value::as_str)
}
