use anyhow::Result;
use chrono::NaiveDate;
use roster_admin::app::services::Roster;
use roster_admin::core::{Document, DocumentStore};
use roster_admin::domain::model::{classes, LeaveRecord, LeaveStatus, MemberStatus};
use roster_admin::domain::ports::FixedClock;
use roster_admin::{InMemoryStore, RosterError, StatusRules};
use serde_json::{json, Value};
use std::sync::Arc;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn roster(store: &InMemoryStore) -> Roster<InMemoryStore> {
    Roster::new(
        store.clone(),
        StatusRules::default(),
        Arc::new(FixedClock(ymd(2024, 6, 20))),
    )
}

fn seed_member(store: &InMemoryStore) -> Result<()> {
    store.insert(
        classes::MEMBERS,
        doc(json!({
            "objectId": "m1", "nickname": "阿明", "qq": "10001",
            "joinDate": "2024-05-01", "stage": "新训中",
            "lastTrainingDate": "2024-06-01", "status": "超时退队"
        })),
    )?;
    Ok(())
}

#[tokio::test]
async fn test_add_leave_fills_member_and_protects_status() -> Result<()> {
    let store = InMemoryStore::new();
    seed_member(&store)?;
    let roster = roster(&store);

    let created = roster
        .leaves()
        .add_leave(LeaveRecord {
            member_id: "m1".to_string(),
            start_date: Some("2024-6-18".to_string()),
            end_date: Some("2024/6/25".to_string()),
            reason: "考试".to_string(),
            ..Default::default()
        })
        .await?;

    assert!(created.object_id.is_some());
    assert_eq!(created.member_name, "阿明");
    assert_eq!(created.member_qq, "10001");
    assert_eq!(created.start_date.as_deref(), Some("2024-06-18"));
    assert_eq!(created.end_date.as_deref(), Some("2024-06-25"));
    assert_eq!(created.status, LeaveStatus::OnLeave);

    let member = roster.members().get_member("m1").await?;
    assert_eq!(member.status, MemberStatus::Normal);
    Ok(())
}

#[tokio::test]
async fn test_add_leave_validates_dates_and_member() -> Result<()> {
    let store = InMemoryStore::new();
    seed_member(&store)?;
    let leaves = roster(&store).leaves();

    let reversed = leaves
        .add_leave(LeaveRecord {
            member_id: "m1".to_string(),
            start_date: Some("2024-06-25".to_string()),
            end_date: Some("2024-06-18".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(reversed, Err(RosterError::ValidationError { .. })));

    let missing_end = leaves
        .add_leave(LeaveRecord {
            member_id: "m1".to_string(),
            start_date: Some("2024-06-25".to_string()),
            ..Default::default()
        })
        .await;
    assert!(missing_end.is_err());

    let unknown_member = leaves
        .add_leave(LeaveRecord {
            member_id: "ghost".to_string(),
            start_date: Some("2024-06-18".to_string()),
            end_date: Some("2024-06-25".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(unknown_member, Err(RosterError::NotFound { .. })));
    assert_eq!(store.count(classes::LEAVE_RECORDS), 0);
    Ok(())
}

#[tokio::test]
async fn test_list_marks_overdue_leaves_awaiting_return() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({"objectId": "l1", "memberId": "m1", "endDate": "2024-06-19", "status": "请假中"})),
    )?;
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({"objectId": "l2", "memberId": "m2", "endDate": "2024-06-20", "status": "请假中"})),
    )?;
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({"objectId": "l3", "memberId": "m3", "endDate": "2024-06-01", "status": "已销假"})),
    )?;

    let records = roster(&store).leaves().list_leaves().await?;

    // 新的在前
    let ids: Vec<&str> = records.iter().filter_map(|r| r.object_id.as_deref()).collect();
    assert_eq!(ids, vec!["l3", "l2", "l1"]);
    assert_eq!(records[2].status, LeaveStatus::AwaitingReturn);
    assert_eq!(records[1].status, LeaveStatus::OnLeave);
    assert_eq!(records[0].status, LeaveStatus::Returned);

    let stored = store.get(classes::LEAVE_RECORDS, "l1").await?;
    assert_eq!(stored.get("status"), Some(&json!("等待销假")));
    Ok(())
}

#[tokio::test]
async fn test_end_leave_archives_and_updates_member() -> Result<()> {
    let store = InMemoryStore::new();
    seed_member(&store)?;
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({
            "objectId": "l1", "memberId": "m1", "memberName": "阿明", "memberQQ": "10001",
            "startDate": "2024-06-10", "endDate": "2024-06-18", "status": "等待销假"
        })),
    )?;
    let roster = roster(&store);

    let ended = roster.leaves().end_leave("l1", Some(ymd(2024, 6, 19))).await?;
    assert_eq!(ended.status, LeaveStatus::Returned);
    assert_eq!(ended.ended_date.as_deref(), Some("2024-06-19"));

    let archived = roster.leaves().list_ended_leaves().await?;
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].member_id, "m1");
    assert_eq!(archived[0].status, LeaveStatus::Returned);
    assert_ne!(archived[0].object_id.as_deref(), Some("l1"));

    let member = roster.members().get_member("m1").await?;
    assert_eq!(member.last_training_date.as_deref(), Some("2024-06-19"));
    assert_eq!(member.status, MemberStatus::Normal);

    let again = roster.leaves().end_leave("l1", None).await;
    assert!(matches!(again, Err(RosterError::ValidationError { .. })));
    Ok(())
}

#[tokio::test]
async fn test_end_leave_of_deleted_member_still_archives() -> Result<()> {
    let store = InMemoryStore::new();
    store.insert(classes::MEMBERS, doc(json!({"objectId": "m9"})))?;
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({"objectId": "l1", "memberId": "gone", "status": "请假中"})),
    )?;
    let roster = roster(&store);

    let ended = roster.leaves().end_leave("l1", None).await?;
    assert_eq!(ended.ended_date.as_deref(), Some("2024-06-20"));
    assert_eq!(store.count(classes::ENDED_LEAVES), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_leave_and_ended_leave() -> Result<()> {
    let store = InMemoryStore::new();
    seed_member(&store)?;
    store.insert(
        classes::LEAVE_RECORDS,
        doc(json!({"objectId": "l1", "memberId": "m1", "status": "请假中"})),
    )?;
    store.insert(
        classes::ENDED_LEAVES,
        doc(json!({"objectId": "e1", "memberId": "m1", "status": "已销假"})),
    )?;
    let roster = roster(&store);

    roster.leaves().delete_leave("l1").await?;
    roster.leaves().delete_ended_leave("e1").await?;

    assert_eq!(store.count(classes::LEAVE_RECORDS), 0);
    assert_eq!(store.count(classes::ENDED_LEAVES), 0);
    // 假期記錄刪除後重新判定：最後參訓已超過逾時天數
    let member = roster.members().get_member("m1").await?;
    assert_eq!(member.status, MemberStatus::TimeoutQuit);
    Ok(())
}
