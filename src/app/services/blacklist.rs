use super::Roster;
use crate::domain::model::{
    classes, from_document, strip_reserved, to_document, BlacklistRecord, BlacklistRemoveRecord,
    BlacklistStatus, Document, Query,
};
use crate::domain::ports::DocumentStore;
use crate::utils::date::{format_date, normalize_date};
use crate::utils::error::{Result, RosterError};
use serde_json::Value;

/// 黑點記錄與消除記錄
pub struct BlacklistService<S> {
    ctx: Roster<S>,
}

impl<S> BlacklistService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    pub async fn list_records(&self) -> Result<Vec<BlacklistRecord>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::BLACKLIST_RECORDS, &query).await
    }

    pub async fn member_records(&self, member_id: &str) -> Result<Vec<BlacklistRecord>> {
        let query = Query::by_member(member_id).descending("createdAt");
        self.ctx.find_all(classes::BLACKLIST_RECORDS, &query).await
    }

    pub async fn get_record(&self, id: &str) -> Result<BlacklistRecord> {
        self.ctx.get_as(classes::BLACKLIST_RECORDS, id).await
    }

    /// 記一個黑點，之後重新計算成員狀態（可能達到違規退隊門檻）
    pub async fn add_record(&self, record: BlacklistRecord) -> Result<BlacklistRecord> {
        if record.reason.trim().is_empty() {
            return Err(RosterError::validation("blacklist reason is required"));
        }

        let member = self.ctx.member_snapshot(&record.member_id).await?;
        let mut record = record;
        if record.member_name.is_empty() {
            record.member_name = member.nickname;
        }
        if record.member_qq.is_empty() {
            record.member_qq = member.qq;
        }
        record.date = Some(match record.date.as_deref() {
            Some(date) => normalize_date(date),
            None => format_date(self.ctx.today()),
        });
        record.status = BlacklistStatus::Valid;

        let mut doc = to_document(&record)?;
        strip_reserved(&mut doc);
        let created = self.ctx.store().create(classes::BLACKLIST_RECORDS, doc).await?;
        tracing::info!("⚫ Blacklist point for {}: {}", record.member_name, record.reason);

        self.refresh_member(&record.member_id).await;
        from_document(created)
    }

    /// 消除黑點：記錄標記為已消除，並寫入一筆消除記錄
    pub async fn remove_point(&self, id: &str, reason: &str) -> Result<BlacklistRemoveRecord> {
        let record = self.get_record(id).await?;
        if record.status == BlacklistStatus::Removed {
            return Err(RosterError::validation(format!(
                "blacklist record {} is already removed",
                id
            )));
        }

        let mut doc = Document::new();
        doc.insert(
            "status".to_string(),
            Value::String(BlacklistStatus::Removed.to_string()),
        );
        self.ctx.store().update(classes::BLACKLIST_RECORDS, id, doc).await?;

        let removal = BlacklistRemoveRecord {
            member_id: record.member_id.clone(),
            member_name: record.member_name.clone(),
            member_qq: record.member_qq.clone(),
            blacklist_id: Some(id.to_string()),
            reason: reason.to_string(),
            remove_date: Some(format_date(self.ctx.today())),
            ..Default::default()
        };
        let created = self
            .ctx
            .store()
            .create(classes::BLACKLIST_REMOVE_RECORDS, to_document(&removal)?)
            .await?;
        tracing::info!("⚪ Removed blacklist point {} of {}", id, record.member_name);

        self.refresh_member(&record.member_id).await;
        from_document(created)
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let record = self.get_record(id).await?;
        self.ctx.store().destroy(classes::BLACKLIST_RECORDS, id).await?;
        tracing::info!("🗑️ Deleted blacklist record {}", id);
        self.refresh_member(&record.member_id).await;
        Ok(())
    }

    pub async fn list_removals(&self) -> Result<Vec<BlacklistRemoveRecord>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::BLACKLIST_REMOVE_RECORDS, &query).await
    }

    async fn refresh_member(&self, member_id: &str) {
        if let Err(e) = self.ctx.members().refresh_status(member_id).await {
            tracing::warn!("⚠️ Could not refresh status of {}: {}", member_id, e);
        }
    }
}
