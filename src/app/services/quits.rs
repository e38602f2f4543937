use super::{object_id, Roster};
use crate::domain::model::{
    classes, from_document, strip_reserved, to_document, BlacklistQuitRecord, Member, MemberStatus,
    Query, QuitRecord,
};
use crate::domain::ports::DocumentStore;
use crate::utils::date::{format_date, normalize_date};
use crate::utils::error::{Result, RosterError};
use serde_json::Value;

/// 未指定退隊類型時寫入的值
pub const UNKNOWN_QUIT_TYPE: &str = "未知";

/// 退隊記錄，每位成員最多一筆
pub struct QuitService<S> {
    ctx: Roster<S>,
}

impl<S> QuitService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    pub async fn list_quits(&self) -> Result<Vec<QuitRecord>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::QUIT_MEMBERS, &query).await
    }

    async fn existing(&self, member_id: &str) -> Result<Option<QuitRecord>> {
        let found: Vec<QuitRecord> = self
            .ctx
            .find_all(classes::QUIT_MEMBERS, &Query::by_member(member_id).limit(1))
            .await?;
        Ok(found.into_iter().next())
    }

    /// 新增或覆寫成員的退隊記錄（以 memberId 為鍵）
    pub async fn add_quit(&self, record: QuitRecord) -> Result<QuitRecord> {
        if record.member_id.trim().is_empty() {
            return Err(RosterError::validation("memberId is required"));
        }

        let mut record = record;
        if record.member_name.is_empty() || record.member_qq.is_empty() {
            let member = self.ctx.member_snapshot(&record.member_id).await?;
            if record.member_name.is_empty() {
                record.member_name = member.nickname;
            }
            if record.member_qq.is_empty() {
                record.member_qq = member.qq;
            }
        }
        record.quit_type = Some(
            record
                .quit_type
                .clone()
                .or_else(|| record.kind.clone())
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_QUIT_TYPE.to_string()),
        );
        record.quit_date = Some(match record.quit_date.as_deref() {
            Some(date) => normalize_date(date),
            None => format_date(self.ctx.today()),
        });

        let mut doc = to_document(&record)?;
        strip_reserved(&mut doc);

        let saved = match self.existing(&record.member_id).await? {
            Some(current) => {
                let id = current.object_id.unwrap_or_default();
                tracing::info!("✏️ Updating quit record {} of {}", id, record.member_name);
                let mut full = doc.clone();
                full.extend(self.ctx.store().update(classes::QUIT_MEMBERS, &id, doc).await?);
                full
            }
            None => {
                tracing::info!("🚪 Quit record added for {}", record.member_name);
                self.ctx.store().create(classes::QUIT_MEMBERS, doc).await?
            }
        };
        from_document(saved)
    }

    /// 成員進入退隊狀態時自動補記錄；已有記錄則不動，返回是否新增
    pub async fn record_automatic_quit(&self, member: &Member, status: &MemberStatus) -> Result<bool> {
        let Some(reason) = status.quit_reason() else {
            return Ok(false);
        };
        if member.id().is_empty() {
            return Err(RosterError::validation("member without objectId"));
        }
        if self.existing(member.id()).await?.is_some() {
            tracing::debug!("Quit record of {} already exists", member.id());
            return Ok(false);
        }

        let record = QuitRecord {
            member_id: member.id().to_string(),
            member_name: member.nickname.clone(),
            member_qq: member.qq.clone(),
            quit_date: Some(format_date(self.ctx.today())),
            reason: reason.to_string(),
            kind: Some(status.to_string()),
            quit_type: Some(status.to_string()),
            ..Default::default()
        };
        self.ctx
            .store()
            .create(classes::QUIT_MEMBERS, to_document(&record)?)
            .await?;
        tracing::info!("🚪 {} ({}) recorded as {}", member.nickname, member.id(), status);
        Ok(true)
    }

    /// 從舊版本地快取匯入已退隊成員，返回新增的記錄數
    pub async fn import_legacy(&self, members: &[Member]) -> Result<usize> {
        let mut created = 0;
        for member in members.iter().filter(|m| m.status.is_quit() && !m.id().is_empty()) {
            if self.record_automatic_quit(member, &member.status).await? {
                created += 1;
            }
        }
        tracing::info!("📥 Imported {} quit records from {} cached members", created, members.len());
        Ok(created)
    }

    pub async fn delete_quit(&self, id: &str) -> Result<()> {
        self.ctx.store().destroy(classes::QUIT_MEMBERS, id).await?;
        tracing::info!("🗑️ Deleted quit record {}", id);
        Ok(())
    }
}

/// 解析舊版快取：成員陣列，或 `{"results": [...]}` 形式
pub fn parse_legacy_cache(content: &str) -> Result<Vec<Member>> {
    let value: Value = serde_json::from_str(content)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(RosterError::validation(
                    "legacy cache must be a member array or contain a results array",
                ))
            }
        },
        _ => return Err(RosterError::validation("legacy cache must be a JSON array")),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(doc) => Some(doc),
            _ => None,
        })
        .map(from_document)
        .collect()
}

/// 違規（黑點累計）退隊記錄
pub struct BlacklistQuitService<S> {
    ctx: Roster<S>,
}

impl<S> BlacklistQuitService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    pub async fn list_records(&self) -> Result<Vec<BlacklistQuitRecord>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::BLACKLIST_QUIT_MEMBERS, &query).await
    }

    /// 黑點達到門檻時寫入；已有記錄則不動
    pub async fn record_violation(&self, member: &Member, points: usize) -> Result<bool> {
        let query = Query::by_member(member.id()).limit(1);
        let existing: Vec<crate::domain::model::Document> =
            self.ctx.find_all(classes::BLACKLIST_QUIT_MEMBERS, &query).await?;
        if let Some(doc) = existing.first() {
            tracing::debug!(
                "Violation quit record {:?} of {} already exists",
                object_id(doc),
                member.id()
            );
            return Ok(false);
        }

        let record = BlacklistQuitRecord {
            member_id: member.id().to_string(),
            member_name: member.nickname.clone(),
            member_qq: member.qq.clone(),
            quit_date: Some(format_date(self.ctx.today())),
            reason: MemberStatus::ViolationQuit
                .quit_reason()
                .unwrap_or_default()
                .to_string(),
            blacklist_count: Some(points as u64),
            ..Default::default()
        };
        self.ctx
            .store()
            .create(classes::BLACKLIST_QUIT_MEMBERS, to_document(&record)?)
            .await?;
        tracing::info!("⛔ {} reached {} blacklist points", member.nickname, points);
        Ok(true)
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        self.ctx.store().destroy(classes::BLACKLIST_QUIT_MEMBERS, id).await?;
        tracing::info!("🗑️ Deleted violation quit record {}", id);
        Ok(())
    }
}
