use anyhow::Result;
use chrono::NaiveDate;
use roster_admin::app::services::Roster;
use roster_admin::core::{Document, DocumentStore, Query};
use roster_admin::domain::model::{
    classes, LeaveRequest, Member, MemberPatch, MemberStatus, TrainingStage,
};
use roster_admin::domain::ports::FixedClock;
use roster_admin::{InMemoryStore, StatusRules};
use serde_json::{json, Value};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 20).unwrap()
}

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn roster(store: &InMemoryStore) -> Roster<InMemoryStore> {
    Roster::new(store.clone(), StatusRules::default(), Arc::new(FixedClock(today())))
}

#[tokio::test]
async fn test_add_member_sets_defaults() -> Result<()> {
    let store = InMemoryStore::new();
    let members = roster(&store).members();

    let recruit = members
        .add_member(Member {
            nickname: "新人".to_string(),
            qq: "20001".to_string(),
            ..Default::default()
        })
        .await?;
    assert_eq!(recruit.join_date.as_deref(), Some("2024-06-20"));
    assert_eq!(recruit.status, MemberStatus::UrgeToTrain);
    assert!(recruit.object_id.is_some());

    let veteran = members
        .add_member(Member {
            nickname: "老兵".to_string(),
            join_date: Some("2024/1/5".to_string()),
            stage: TrainingStage::Completed,
            ..Default::default()
        })
        .await?;
    assert_eq!(veteran.join_date.as_deref(), Some("2024-01-05"));
    assert_eq!(veteran.status, MemberStatus::Normal);

    assert!(members.add_member(Member::default()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_listing_refreshes_status_and_records_quits_once() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::MEMBERS,
        doc(json!({
            "objectId": "m1", "nickname": "甲", "qq": "1",
            "joinDate": "2024-06-01", "stage": "未新训", "status": "正常"
        })),
    )?;
    store.insert(
        classes::MEMBERS,
        doc(json!({
            "objectId": "m2", "nickname": "乙", "qq": "2",
            "joinDate": "2024-05-01", "stage": "新训中",
            "lastTrainingDate": "2024-06-15", "status": "正常"
        })),
    )?;

    let roster = roster(&store);
    let members = roster.members().get_all_members().await?;

    let m1 = members.iter().find(|m| m.id() == "m1").unwrap();
    assert_eq!(m1.status, MemberStatus::UntrainedQuit);
    let m2 = members.iter().find(|m| m.id() == "m2").unwrap();
    assert_eq!(m2.status, MemberStatus::Normal);

    let stored = store.get(classes::MEMBERS, "m1").await?;
    assert_eq!(stored.get("status"), Some(&json!("未训退队")));

    let quits = roster.quits().list_quits().await?;
    assert_eq!(quits.len(), 1);
    assert_eq!(quits[0].member_id, "m1");
    assert_eq!(quits[0].reason, "未参训");
    assert_eq!(quits[0].quit_type.as_deref(), Some("未训退队"));
    assert_eq!(quits[0].quit_date.as_deref(), Some("2024-06-20"));

    roster.members().get_all_members().await?;
    assert_eq!(store.count(classes::QUIT_MEMBERS), 1);
    Ok(())
}

#[tokio::test]
async fn test_violation_quit_writes_both_records() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::MEMBERS,
        doc(json!({"objectId": "m1", "nickname": "丙", "qq": "3", "stage": "新训完成"})),
    )?;
    for _ in 0..4 {
        store.insert(
            classes::BLACKLIST_RECORDS,
            doc(json!({"memberId": "m1", "reason": "缺席", "status": "有效"})),
        )?;
    }

    let roster = roster(&store);
    let members = roster.members().get_all_members().await?;
    assert_eq!(members[0].status, MemberStatus::ViolationQuit);

    let violations = roster.blacklist_quits().list_records().await?;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].blacklist_count, Some(4));
    assert_eq!(violations[0].reason, "黑点累计达到上限");
    assert_eq!(store.count(classes::QUIT_MEMBERS), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_member_recomputes_only_when_status_touched() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::MEMBERS,
        doc(json!({
            "objectId": "m1", "nickname": "丁", "qq": "4",
            "joinDate": "2024-06-01", "stage": "未新训", "status": "未训退队"
        })),
    )?;
    let members = roster(&store).members();

    let renamed = members
        .update_member(
            "m1",
            MemberPatch {
                nickname: Some("丁丁".to_string()),
                join_date: Some("2024-6-2".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.nickname, "丁丁");
    assert_eq!(renamed.join_date.as_deref(), Some("2024-06-02"));
    assert_eq!(renamed.status, MemberStatus::UntrainedQuit);

    let approved = members
        .update_member(
            "m1",
            MemberPatch {
                leave_request: Some(LeaveRequest::Approved),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(approved.status, MemberStatus::Normal);
    assert_eq!(approved.nickname, "丁丁");

    // 手動寫入的狀態會被重新計算覆蓋
    let overridden = members
        .update_member(
            "m1",
            MemberPatch {
                status: Some(MemberStatus::TimeoutQuit),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(overridden.status, MemberStatus::Normal);
    Ok(())
}

#[tokio::test]
async fn test_record_training_moves_member_back_to_normal() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::MEMBERS,
        doc(json!({
            "objectId": "m1", "nickname": "戊", "stage": "新训中",
            "lastTrainingDate": "2024-06-01", "status": "超时退队"
        })),
    )?;
    let members = roster(&store).members();

    let member = members
        .record_training("m1", NaiveDate::from_ymd_opt(2024, 6, 18).unwrap())
        .await?;
    assert_eq!(member.last_training_date.as_deref(), Some("2024-06-18"));
    assert_eq!(member.status, MemberStatus::Normal);
    Ok(())
}

#[tokio::test]
async fn test_delete_member_cascades_to_related_records() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(classes::MEMBERS, doc(json!({"objectId": "m1", "nickname": "己"})))?;
    store.insert(classes::MEMBERS, doc(json!({"objectId": "m2", "nickname": "庚"})))?;
    for class in [
        classes::LEAVE_RECORDS,
        classes::BLACKLIST_RECORDS,
        classes::ASSESSMENTS,
        classes::QUIT_MEMBERS,
    ] {
        store.insert(class, doc(json!({"memberId": "m1"})))?;
        store.insert(class, doc(json!({"memberId": "m2"})))?;
    }
    store.insert(classes::ENDED_LEAVES, doc(json!({"memberId": "m1"})))?;

    let removed = roster(&store).members().delete_member("m1").await?;

    assert_eq!(removed, 5);
    assert_eq!(store.count(classes::MEMBERS), 1);
    assert_eq!(store.count(classes::LEAVE_RECORDS), 1);
    assert_eq!(store.count(classes::ENDED_LEAVES), 0);
    let left = store
        .find(classes::ASSESSMENTS, &Query::by_member("m2"))
        .await?;
    assert_eq!(left.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_members_with_status_filters_after_refresh() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::MEMBERS,
        doc(json!({"objectId": "m1", "stage": "新训中", "lastTrainingDate": "2024-06-12"})),
    )?;
    store.insert(
        classes::MEMBERS,
        doc(json!({"objectId": "m2", "stage": "新训中", "lastTrainingDate": "2024-06-19"})),
    )?;

    let urged = roster(&store)
        .members()
        .members_with_status(&MemberStatus::UrgeToTrain)
        .await?;
    assert_eq!(urged.len(), 1);
    assert_eq!(urged[0].id(), "m1");
    Ok(())
}
