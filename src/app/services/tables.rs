use super::object_id;
use crate::domain::model::{classes, Document, MemberStatus, Query, TrainingStage};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{Result, RosterError};
use serde_json::Value;

/// 初始化結果
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl TableReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 資料表建立：LeanCloud 在第一次寫入時建立類別
pub struct TableService<S> {
    store: S,
}

impl<S: DocumentStore> TableService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 確保類別存在，返回是否為新建
    ///
    /// 類別不存在時寫入一筆佔位文件再刪除；成員表的佔位文件帶上各欄位，
    /// 讓存儲端以字串型別建立欄位。
    pub async fn ensure_class(&self, class: &str) -> Result<bool> {
        match self.store.find(class, &Query::new().limit(0)).await {
            Ok(_) => return Ok(false),
            Err(e) if e.is_class_missing() => {}
            Err(e) => return Err(e),
        }

        let placeholder = self
            .store
            .create(class, Self::placeholder(class))
            .await?;
        let id = object_id(&placeholder)
            .ok_or_else(|| RosterError::processing(format!("placeholder in {} has no objectId", class)))?
            .to_string();
        self.store.destroy(class, &id).await?;

        tracing::info!("🆕 Created table {}", class);
        Ok(true)
    }

    fn placeholder(class: &str) -> Document {
        let mut doc = Document::new();
        if class == classes::MEMBERS {
            for key in ["nickname", "qq", "gameId", "joinDate", "lastTrainingDate", "passDate"] {
                doc.insert(key.to_string(), Value::String(String::new()));
            }
            doc.insert(
                "stage".to_string(),
                Value::String(TrainingStage::Untrained.to_string()),
            );
            doc.insert(
                "status".to_string(),
                Value::String(MemberStatus::Normal.to_string()),
            );
        }
        doc
    }

    /// 逐一確保所有資料表；單一表失敗只記錄，不中斷其餘
    pub async fn initialize_tables(&self) -> TableReport {
        tracing::info!("🚀 Starting table initialization...");
        let mut report = TableReport::default();

        for class in classes::ALL {
            match self.ensure_class(class).await {
                Ok(true) => report.created.push(class.to_string()),
                Ok(false) => report.existing.push(class.to_string()),
                Err(e) => {
                    tracing::error!("❌ Failed to initialize table {}: {}", class, e);
                    report.failed.push((class.to_string(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "✅ Table initialization completed: {} created, {} existing, {} failed",
            report.created.len(),
            report.existing.len(),
            report.failed.len()
        );
        report
    }
}
