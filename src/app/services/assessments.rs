use super::Roster;
use crate::domain::model::{classes, from_document, strip_reserved, to_document, Assessment, AssessmentResult, Query};
use crate::domain::ports::DocumentStore;
use crate::utils::date::{format_date, parse_date};
use crate::utils::error::{Result, RosterError};

pub struct AssessmentService<S> {
    ctx: Roster<S>,
}

impl<S> AssessmentService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(ctx: Roster<S>) -> Self {
        Self { ctx }
    }

    pub async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        let query = Query::new().descending("createdAt");
        self.ctx.find_all(classes::ASSESSMENTS, &query).await
    }

    pub async fn member_assessments(&self, member_id: &str) -> Result<Vec<Assessment>> {
        let query = Query::by_member(member_id).descending("createdAt");
        self.ctx.find_all(classes::ASSESSMENTS, &query).await
    }

    /// 新增考核；結果為通過時，考核日期寫入成員的通過日期
    pub async fn add_assessment(&self, assessment: Assessment) -> Result<Assessment> {
        let member = self.ctx.member_snapshot(&assessment.member_id).await?;

        let mut assessment = assessment;
        if assessment.member_name.is_empty() {
            assessment.member_name = member.nickname;
        }
        if assessment.member_qq.is_empty() {
            assessment.member_qq = member.qq;
        }
        let date = match assessment.assessment_date.as_deref() {
            Some(raw) => parse_date(raw).ok_or_else(|| {
                RosterError::validation(format!("invalid assessment date '{}'", raw))
            })?,
            None => self.ctx.today(),
        };
        assessment.assessment_date = Some(format_date(date));

        let mut doc = to_document(&assessment)?;
        strip_reserved(&mut doc);
        let created = self.ctx.store().create(classes::ASSESSMENTS, doc).await?;
        tracing::info!(
            "📋 Assessment for {} on {}: {}",
            assessment.member_name,
            date,
            assessment
                .result
                .as_ref()
                .map(|r| r.as_str())
                .unwrap_or("-")
        );

        if assessment.result == Some(AssessmentResult::Passed) {
            self.ctx
                .members()
                .record_pass(&assessment.member_id, date)
                .await?;
        }
        from_document(created)
    }

    pub async fn delete_assessment(&self, id: &str) -> Result<()> {
        self.ctx.store().destroy(classes::ASSESSMENTS, id).await?;
        tracing::info!("🗑️ Deleted assessment {}", id);
        Ok(())
    }
}
