use super::Roster;
use crate::domain::model::{
    classes, from_document, strip_reserved, to_document, BlacklistRecord, LeaveRecord, Member,
    MemberPatch, MemberStatus, Query, TrainingStage,
};
use crate::domain::ports::DocumentStore;
use crate::domain::status::{calculate_member_status, valid_blacklist_count};
use crate::utils::date::{format_date, normalize_date};
use crate::utils::error::{Result, RosterError};
use chrono::NaiveDate;
use serde_json::Value;

pub struct MemberService<S> {
    ctx: Roster<S>,
}

impl<S> MemberService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    async fn relations(&self) -> Result<(Vec<BlacklistRecord>, Vec<LeaveRecord>)> {
        let blacklist = self
            .ctx
            .find_all(classes::BLACKLIST_RECORDS, &Query::new())
            .await?;
        let leaves = self.ctx.find_all(classes::LEAVE_RECORDS, &Query::new()).await?;
        Ok((blacklist, leaves))
    }

    /// 讀取全部成員並重新計算狀態。
    ///
    /// 狀態有變化的成員會寫回存儲；新進入退隊狀態的成員會補上退隊記錄，
    /// 違規退隊另外補上違規退隊記錄。補記錄失敗只記日誌，不影響讀取。
    pub async fn get_all_members(&self) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = self.ctx.find_all(classes::MEMBERS, &Query::new()).await?;
        let (blacklist, leaves) = self.relations().await?;
        let today = self.ctx.today();
        let mut changed = 0;

        for member in members.iter_mut() {
            let derived =
                calculate_member_status(member, &blacklist, &leaves, self.ctx.rules(), today);
            if derived == member.status {
                continue;
            }

            tracing::info!(
                "🔄 Member {} ({}) status {} -> {}",
                member.nickname,
                member.id(),
                member.status,
                derived
            );
            self.write_status(member.id(), &derived).await?;
            member.status = derived.clone();
            changed += 1;

            if derived.is_quit() {
                let points = valid_blacklist_count(member.id(), &blacklist);
                if let Err(e) = self.record_quit(member, &derived, points).await {
                    tracing::error!("❌ Failed to add quit record for {}: {}", member.id(), e);
                }
            }
        }

        tracing::debug!("Loaded {} members, {} status changes", members.len(), changed);
        Ok(members)
    }

    async fn write_status(&self, id: &str, status: &MemberStatus) -> Result<()> {
        let mut doc = crate::domain::model::Document::new();
        doc.insert("status".to_string(), Value::String(status.to_string()));
        self.ctx.store().update(classes::MEMBERS, id, doc).await?;
        Ok(())
    }

    async fn record_quit(&self, member: &Member, status: &MemberStatus, points: usize) -> Result<()> {
        self.ctx.quits().record_automatic_quit(member, status).await?;
        if *status == MemberStatus::ViolationQuit {
            self.ctx
                .blacklist_quits()
                .record_violation(member, points)
                .await?;
        }
        Ok(())
    }

    /// 只列出指定狀態的成員（讀取時同樣會刷新狀態）
    pub async fn members_with_status(&self, status: &MemberStatus) -> Result<Vec<Member>> {
        Ok(self
            .get_all_members()
            .await?
            .into_iter()
            .filter(|member| member.status == *status)
            .collect())
    }

    pub async fn get_member(&self, id: &str) -> Result<Member> {
        self.ctx.get_as(classes::MEMBERS, id).await
    }

    /// 新增成員；日期統一格式，未新訓成員初始狀態為催促參訓
    pub async fn add_member(&self, member: Member) -> Result<Member> {
        if member.nickname.trim().is_empty() {
            return Err(RosterError::validation("nickname is required"));
        }

        let mut member = member;
        member.join_date = Some(
            member
                .joined_on()
                .map(normalize_date)
                .unwrap_or_else(|| format_date(self.ctx.today())),
        );
        member.join_time = None;
        member.last_training_date = member.last_training_date.as_deref().map(normalize_date);
        member.pass_date = member.pass_date.as_deref().map(normalize_date);
        member.status = if member.stage == TrainingStage::Untrained {
            MemberStatus::UrgeToTrain
        } else {
            MemberStatus::Normal
        };

        let mut doc = to_document(&member)?;
        strip_reserved(&mut doc);
        let created = self.ctx.store().create(classes::MEMBERS, doc).await?;
        tracing::info!("➕ Added member {}", member.nickname);
        from_document(created)
    }

    /// 局部更新成員；涉及狀態或留隊申請時重新計算狀態
    pub async fn update_member(&self, id: &str, patch: MemberPatch) -> Result<Member> {
        let recompute = patch.touches_status();
        self.apply_patch(id, patch, recompute).await
    }

    /// 記錄一次參訓（或銷假歸隊）日期並重新計算狀態
    pub async fn record_training(&self, id: &str, date: NaiveDate) -> Result<Member> {
        let patch = MemberPatch {
            last_training_date: Some(format_date(date)),
            ..Default::default()
        };
        self.apply_patch(id, patch, true).await
    }

    /// 記錄考核通過日期
    pub async fn record_pass(&self, id: &str, date: NaiveDate) -> Result<Member> {
        let patch = MemberPatch {
            pass_date: Some(format_date(date)),
            ..Default::default()
        };
        self.apply_patch(id, patch, true).await
    }

    /// 依目前的黑點與請假記錄重新計算並寫回狀態
    pub async fn refresh_status(&self, id: &str) -> Result<Member> {
        self.apply_patch(id, MemberPatch::default(), true).await
    }

    async fn apply_patch(&self, id: &str, patch: MemberPatch, recompute: bool) -> Result<Member> {
        if patch.is_empty() && !recompute {
            return self.get_member(id).await;
        }

        let mut patch = patch;
        for date in [
            &mut patch.join_date,
            &mut patch.last_training_date,
            &mut patch.pass_date,
        ] {
            if let Some(value) = date.as_mut() {
                *value = normalize_date(value);
            }
        }

        let current = self.get_member(id).await?;
        let mut doc = to_document(&patch)?;

        let mut merged_doc = to_document(&current)?;
        merged_doc.extend(doc.clone());
        let merged: Member = from_document(merged_doc)?;

        let mut entered_quit = None;
        if recompute {
            let (blacklist, leaves) = self.relations().await?;
            let status = calculate_member_status(
                &merged,
                &blacklist,
                &leaves,
                self.ctx.rules(),
                self.ctx.today(),
            );
            let points = valid_blacklist_count(id, &blacklist);
            if status.is_quit() && status != current.status {
                entered_quit = Some((status.clone(), points));
            }
            doc.insert("status".to_string(), Value::String(status.to_string()));
        }

        tracing::debug!("Updating member {} with {:?}", id, doc);
        let updated = self.ctx.store().update(classes::MEMBERS, id, doc).await?;

        let mut full = to_document(&current)?;
        full.extend(updated);
        let member: Member = from_document(full)?;

        if let Some((status, points)) = entered_quit {
            if let Err(e) = self.record_quit(&member, &status, points).await {
                tracing::error!("❌ Failed to add quit record for {}: {}", id, e);
            }
        }
        Ok(member)
    }

    /// 刪除成員以及所有關聯記錄，返回刪除的關聯記錄數
    pub async fn delete_member(&self, id: &str) -> Result<usize> {
        self.ctx.store().destroy(classes::MEMBERS, id).await?;

        let mut removed = 0;
        for class in classes::MEMBER_RELATED {
            let count = self.ctx.destroy_by_member(class, id).await?;
            if count > 0 {
                tracing::debug!("Removed {} {} records of member {}", count, class, id);
            }
            removed += count;
        }

        tracing::info!("🗑️ Deleted member {} and {} related records", id, removed);
        Ok(removed)
    }
}
