use super::Roster;
use crate::domain::model::{classes, from_document, strip_reserved, to_document, LeaveRecord, LeaveStatus, Query};
use crate::domain::ports::DocumentStore;
use crate::utils::date::{format_date, parse_date};
use crate::utils::error::{Result, RosterError};
use crate::utils::validation::validate_date_order;
use chrono::NaiveDate;
use serde_json::Value;

pub struct LeaveService<S> {
    ctx: Roster<S>,
}

impl<S> LeaveService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    /// 列出請假記錄（新的在前）；假期已過但未銷假的記錄轉為等待銷假
    pub async fn list_leaves(&self) -> Result<Vec<LeaveRecord>> {
        let query = Query::new().descending("createdAt");
        let mut records: Vec<LeaveRecord> = self.ctx.find_all(classes::LEAVE_RECORDS, &query).await?;
        let today = self.ctx.today();

        for record in records.iter_mut() {
            if !Self::is_overdue(record, today) {
                continue;
            }
            let Some(id) = record.object_id.clone() else {
                continue;
            };

            let mut doc = crate::domain::model::Document::new();
            doc.insert(
                "status".to_string(),
                Value::String(LeaveStatus::AwaitingReturn.to_string()),
            );
            self.ctx.store().update(classes::LEAVE_RECORDS, &id, doc).await?;
            tracing::info!("⏰ Leave {} of {} is overdue, awaiting return", id, record.member_name);
            record.status = LeaveStatus::AwaitingReturn;
        }

        Ok(records)
    }

    fn is_overdue(record: &LeaveRecord, today: NaiveDate) -> bool {
        record.status == LeaveStatus::OnLeave
            && record
                .end_date
                .as_deref()
                .and_then(parse_date)
                .map(|end| end < today)
                .unwrap_or(false)
    }

    pub async fn get_leave(&self, id: &str) -> Result<LeaveRecord> {
        self.ctx.get_as(classes::LEAVE_RECORDS, id).await
    }

    /// 新增請假；成員暱稱與 QQ 從成員資料補齊
    pub async fn add_leave(&self, record: LeaveRecord) -> Result<LeaveRecord> {
        let mut record = record;

        let start = record.start_date.as_deref().and_then(parse_date);
        let end = record.end_date.as_deref().and_then(parse_date);
        let (Some(start), Some(end)) = (start, end) else {
            return Err(RosterError::validation(
                "leave start date and end date are required (YYYY-MM-DD)",
            ));
        };
        validate_date_order(start, end)?;

        let member = self.ctx.member_snapshot(&record.member_id).await?;
        if record.member_name.is_empty() {
            record.member_name = member.nickname.clone();
        }
        if record.member_qq.is_empty() {
            record.member_qq = member.qq.clone();
        }
        record.start_date = Some(format_date(start));
        record.end_date = Some(format_date(end));
        record.ended_date = None;
        record.status = LeaveStatus::OnLeave;

        let mut doc = to_document(&record)?;
        strip_reserved(&mut doc);
        let created = self.ctx.store().create(classes::LEAVE_RECORDS, doc).await?;
        tracing::info!("📝 Leave added for {} ({} ~ {})", record.member_name, start, end);

        if let Err(e) = self.ctx.members().refresh_status(&record.member_id).await {
            tracing::warn!("⚠️ Could not refresh status of {}: {}", record.member_id, e);
        }
        from_document(created)
    }

    /// 銷假：標記記錄、寫入歸檔副本，並以銷假日期作為成員最後參訓日期
    pub async fn end_leave(&self, id: &str, ended_on: Option<NaiveDate>) -> Result<LeaveRecord> {
        let mut record = self.get_leave(id).await?;
        if record.status == LeaveStatus::Returned {
            return Err(RosterError::validation(format!("leave {} has already ended", id)));
        }

        let ended_on = ended_on.unwrap_or_else(|| self.ctx.today());
        let ended_date = format_date(ended_on);

        let mut doc = crate::domain::model::Document::new();
        doc.insert("status".to_string(), Value::String(LeaveStatus::Returned.to_string()));
        doc.insert("endedDate".to_string(), Value::String(ended_date.clone()));
        self.ctx.store().update(classes::LEAVE_RECORDS, id, doc).await?;

        record.status = LeaveStatus::Returned;
        record.ended_date = Some(ended_date);

        let mut archived = to_document(&record)?;
        strip_reserved(&mut archived);
        self.ctx.store().create(classes::ENDED_LEAVES, archived).await?;

        match self.ctx.members().record_training(&record.member_id, ended_on).await {
            Ok(_) => {}
            Err(RosterError::NotFound { .. }) => {
                tracing::warn!("⚠️ Member {} no longer exists, skipped training date update", record.member_id);
            }
            Err(e) => return Err(e),
        }

        tracing::info!("✅ Leave {} of {} ended on {}", id, record.member_name, ended_on);
        Ok(record)
    }

    pub async fn list_ended_leaves(&self) -> Result<Vec<LeaveRecord>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::ENDED_LEAVES, &query).await
    }

    pub async fn delete_leave(&self, id: &str) -> Result<()> {
        let record = self.get_leave(id).await?;
        self.ctx.store().destroy(classes::LEAVE_RECORDS, id).await?;
        tracing::info!("🗑️ Deleted leave {}", id);

        if record.status.is_active() {
            if let Err(e) = self.ctx.members().refresh_status(&record.member_id).await {
                tracing::warn!("⚠️ Could not refresh status of {}: {}", record.member_id, e);
            }
        }
        Ok(())
    }

    pub async fn delete_ended_leave(&self, id: &str) -> Result<()> {
        self.ctx.store().destroy(classes::ENDED_LEAVES, id).await?;
        tracing::info!("🗑️ Deleted ended leave {}", id);
        Ok(())
    }
}
