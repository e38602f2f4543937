use crate::domain::model::{BlacklistRecord, BlacklistStatus, LeaveRecord, Member, MemberStatus, TrainingStage};
use crate::utils::date::{days_since, parse_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 狀態判定使用的門檻，可由配置 `[rules]` 覆寫
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRules {
    pub blacklist_quit_threshold: usize,
    pub untrained_grace_days: i64,
    pub urge_training_days: i64,
    pub timeout_quit_days: i64,
    pub terminal_stage: String,
}

impl Default for StatusRules {
    fn default() -> Self {
        Self {
            blacklist_quit_threshold: 4,
            untrained_grace_days: 3,
            urge_training_days: 7,
            timeout_quit_days: 10,
            terminal_stage: TrainingStage::Completed.as_str().to_string(),
        }
    }
}

impl StatusRules {
    pub fn is_terminal(&self, stage: &TrainingStage) -> bool {
        stage.as_str() == self.terminal_stage
    }
}

/// 有效黑點數
pub fn valid_blacklist_count(member_id: &str, blacklist: &[BlacklistRecord]) -> usize {
    blacklist
        .iter()
        .filter(|record| record.member_id == member_id && record.status == BlacklistStatus::Valid)
        .count()
}

pub fn is_on_leave(member_id: &str, leaves: &[LeaveRecord]) -> bool {
    leaves
        .iter()
        .any(|record| record.member_id == member_id && record.status.is_active())
}

/// 由成員記錄與關聯的黑點、請假記錄推導當前狀態。
///
/// 規則依序判斷，先命中者為準：
/// 1. 有效黑點達到門檻：違規退隊，覆蓋其他所有條件
/// 2. 已通過考核或處於結業階段：正常
/// 3. 請假中（含等待銷假）或留隊申請已通過：正常
/// 4. 未新訓：入隊超過寬限天數為未訓退隊，否則催促參訓
/// 5. 距最後一次新訓達到逾時天數為超時退隊，達到催促天數為催促參訓
/// 6. 其餘：正常
///
/// 無法解析的日期視為不存在。
pub fn calculate_member_status(
    member: &Member,
    blacklist: &[BlacklistRecord],
    leaves: &[LeaveRecord],
    rules: &StatusRules,
    today: NaiveDate,
) -> MemberStatus {
    let member_id = member.id();

    if valid_blacklist_count(member_id, blacklist) >= rules.blacklist_quit_threshold {
        return MemberStatus::ViolationQuit;
    }

    if member.pass_date.is_some() || rules.is_terminal(&member.stage) {
        return MemberStatus::Normal;
    }

    let approved = member.leave_request_approved();
    if approved || is_on_leave(member_id, leaves) {
        return MemberStatus::Normal;
    }

    if member.stage == TrainingStage::Untrained {
        let days_in_team = member
            .joined_on()
            .and_then(parse_date)
            .map(|joined| days_since(joined, today));

        return match days_in_team {
            Some(days) if days > rules.untrained_grace_days && !approved => {
                MemberStatus::UntrainedQuit
            }
            _ => MemberStatus::UrgeToTrain,
        };
    }

    if let Some(last) = member.last_training_date.as_deref().and_then(parse_date) {
        let idle_days = days_since(last, today);
        if idle_days >= rules.timeout_quit_days {
            return MemberStatus::TimeoutQuit;
        }
        if idle_days >= rules.urge_training_days {
            return MemberStatus::UrgeToTrain;
        }
    }

    MemberStatus::Normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LeaveRequest, LeaveStatus};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 20).unwrap()
    }

    fn member(stage: TrainingStage) -> Member {
        Member {
            object_id: Some("m1".to_string()),
            nickname: "小林".to_string(),
            qq: "123456".to_string(),
            join_date: Some("2024-06-01".to_string()),
            stage,
            ..Default::default()
        }
    }

    fn training(last: &str) -> Member {
        let mut m = member(TrainingStage::Other("新训中".to_string()));
        m.last_training_date = Some(last.to_string());
        m
    }

    fn points(member_id: &str, valid: usize, removed: usize) -> Vec<BlacklistRecord> {
        let mut records = Vec::new();
        for i in 0..valid + removed {
            records.push(BlacklistRecord {
                object_id: Some(format!("b{}", i)),
                member_id: member_id.to_string(),
                status: if i < valid {
                    BlacklistStatus::Valid
                } else {
                    BlacklistStatus::Removed
                },
                ..Default::default()
            });
        }
        records
    }

    fn leave(member_id: &str, status: LeaveStatus) -> Vec<LeaveRecord> {
        vec![LeaveRecord {
            member_id: member_id.to_string(),
            status,
            ..Default::default()
        }]
    }

    fn classify(m: &Member, blacklist: &[BlacklistRecord], leaves: &[LeaveRecord]) -> MemberStatus {
        calculate_member_status(m, blacklist, leaves, &StatusRules::default(), today())
    }

    #[test]
    fn test_four_valid_points_override_everything() {
        let mut m = member(TrainingStage::Completed);
        m.pass_date = Some("2024-06-10".to_string());
        m.leave_request = Some(LeaveRequest::Approved);

        let status = classify(&m, &points("m1", 4, 0), &leave("m1", LeaveStatus::OnLeave));
        assert_eq!(status, MemberStatus::ViolationQuit);
    }

    #[test]
    fn test_removed_and_foreign_points_do_not_count() {
        let m = training("2024-06-19");
        assert_eq!(classify(&m, &points("m1", 3, 5), &[]), MemberStatus::Normal);
        assert_eq!(classify(&m, &points("m2", 6, 0), &[]), MemberStatus::Normal);
    }

    #[test]
    fn test_passed_or_terminal_stage_is_normal() {
        let mut m = training("2024-05-01");
        m.pass_date = Some("2024-06-10".to_string());
        assert_eq!(classify(&m, &points("m1", 3, 0), &[]), MemberStatus::Normal);

        let mut m = member(TrainingStage::Completed);
        m.join_date = Some("2023-01-01".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::Normal);
    }

    #[test]
    fn test_leave_keeps_member_normal() {
        let m = training("2024-05-01");
        assert_eq!(
            classify(&m, &[], &leave("m1", LeaveStatus::OnLeave)),
            MemberStatus::Normal
        );
        assert_eq!(
            classify(&m, &[], &leave("m1", LeaveStatus::AwaitingReturn)),
            MemberStatus::Normal
        );
        assert_eq!(
            classify(&m, &[], &leave("m1", LeaveStatus::Returned)),
            MemberStatus::TimeoutQuit
        );
        assert_eq!(
            classify(&m, &[], &leave("m2", LeaveStatus::OnLeave)),
            MemberStatus::TimeoutQuit
        );
    }

    #[test]
    fn test_approved_leave_request_suppresses_quit() {
        let mut m = member(TrainingStage::Untrained);
        m.join_date = Some("2024-01-01".to_string());
        m.leave_request = Some(LeaveRequest::Approved);
        assert_eq!(classify(&m, &[], &[]), MemberStatus::Normal);

        let mut m = training("2024-01-01");
        m.leave_request = Some(LeaveRequest::Approved);
        assert_eq!(classify(&m, &[], &[]), MemberStatus::Normal);

        m.leave_request = Some(LeaveRequest::Pending);
        assert_eq!(classify(&m, &[], &[]), MemberStatus::TimeoutQuit);
    }

    #[test]
    fn test_untrained_grace_period_boundary() {
        let mut m = member(TrainingStage::Untrained);

        m.join_date = Some("2024-06-17".to_string()); // 3 天
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UrgeToTrain);

        m.join_date = Some("2024-06-16".to_string()); // 4 天
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UntrainedQuit);

        m.join_date = Some("2024-06-20".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UrgeToTrain);
    }

    #[test]
    fn test_untrained_uses_legacy_join_time_and_ignores_bad_dates() {
        let mut m = member(TrainingStage::Untrained);
        m.join_date = None;
        m.join_time = Some("2024-6-1".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UntrainedQuit);

        m.join_time = Some("不详".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UrgeToTrain);

        m.join_time = None;
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UrgeToTrain);
    }

    #[test]
    fn test_untrained_stage_ignores_last_training_date() {
        let mut m = member(TrainingStage::Untrained);
        m.join_date = Some("2024-06-19".to_string());
        m.last_training_date = Some("2024-01-01".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::UrgeToTrain);
    }

    #[test]
    fn test_training_staleness_thresholds() {
        assert_eq!(classify(&training("2024-06-14"), &[], &[]), MemberStatus::Normal); // 6 天
        assert_eq!(classify(&training("2024-06-13"), &[], &[]), MemberStatus::UrgeToTrain); // 7 天
        assert_eq!(classify(&training("2024-06-11"), &[], &[]), MemberStatus::UrgeToTrain); // 9 天
        assert_eq!(classify(&training("2024-06-10"), &[], &[]), MemberStatus::TimeoutQuit); // 10 天
    }

    #[test]
    fn test_missing_or_invalid_training_date_is_normal() {
        let mut m = member(TrainingStage::Other("新训中".to_string()));
        m.status = MemberStatus::Abnormal;
        assert_eq!(classify(&m, &[], &[]), MemberStatus::Normal);

        m.last_training_date = Some("??".to_string());
        assert_eq!(classify(&m, &[], &[]), MemberStatus::Normal);
    }

    #[test]
    fn test_custom_rules() {
        let rules = StatusRules {
            blacklist_quit_threshold: 2,
            urge_training_days: 3,
            timeout_quit_days: 5,
            terminal_stage: "结业".to_string(),
            ..Default::default()
        };

        let m = training("2024-06-16");
        assert_eq!(
            calculate_member_status(&m, &[], &[], &rules, today()),
            MemberStatus::UrgeToTrain
        );
        assert_eq!(
            calculate_member_status(&m, &points("m1", 2, 0), &[], &rules, today()),
            MemberStatus::ViolationQuit
        );

        let graduate = member(TrainingStage::Other("结业".to_string()));
        assert_eq!(
            calculate_member_status(&graduate, &[], &[], &rules, today()),
            MemberStatus::Normal
        );
    }
}
