use anyhow::Result;
use roster_admin::app::services::auth::session_keys;
use roster_admin::app::services::{AuthService, TableService, UpdateUserInfo};
use roster_admin::domain::model::classes;
use roster_admin::core::{
    authorize, Access, AuthBackend, Document, DocumentStore, GuardedStore, KeyValueStore, Query,
    SessionGate,
};
use roster_admin::{InMemoryStore, LocalSessionStore, MemorySessionStore, RosterError};
use std::sync::Arc;
use tempfile::TempDir;

fn backend() -> Result<InMemoryStore> {
    let store = InMemoryStore::new();
    store.register_user("admin", "admin-pass", "admin")?;
    store.register_user("alice", "alice-pass", "user")?;
    Ok(store)
}

#[tokio::test]
async fn test_login_persists_session_keys() -> Result<()> {
    let storage = MemorySessionStore::new();
    let auth = AuthService::new(backend()?, storage.clone());

    let user = auth.login("admin", "admin-pass", true).await?;
    assert!(user.is_admin());
    assert!(user.session_token.is_some());

    assert_eq!(
        storage.get_item(session_keys::REMEMBER_LOGIN).await?.as_deref(),
        Some("true")
    );
    assert_eq!(
        storage.get_item(session_keys::USER_ROLE).await?.as_deref(),
        Some("admin")
    );
    assert_eq!(storage.get_item(session_keys::SESSION_TOKEN).await?, user.session_token);
    assert!(auth.is_authenticated().await?);
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() -> Result<()> {
    let storage = MemorySessionStore::new();
    let auth = AuthService::new(backend()?, storage.clone());

    let err = auth.login("admin", "nope", false).await.unwrap_err();
    assert!(matches!(err, RosterError::Unauthorized { .. }));
    let err = auth.login("nobody", "nope", false).await.unwrap_err();
    assert!(matches!(err, RosterError::Unauthorized { .. }));

    assert!(storage.is_empty());
    assert!(!auth.is_authenticated().await?);
    Ok(())
}

#[tokio::test]
async fn test_session_file_survives_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.json");
    let store = backend()?;

    let first = AuthService::new(store.clone(), LocalSessionStore::new(&path));
    first.login("alice", "alice-pass", false).await?;

    let second = AuthService::new(store.clone(), LocalSessionStore::new(&path));
    let user = second.current_user().await?.expect("stored user");
    assert_eq!(user.username, "alice");
    assert_eq!(user.role.as_deref(), Some("user"));

    second.logout().await?;
    let third = AuthService::new(store, LocalSessionStore::new(&path));
    assert!(third.current_user().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_remembered_token_is_validated_remotely() -> Result<()> {
    let store = backend()?;
    let storage = MemorySessionStore::new();
    let auth = AuthService::new(store.clone(), storage.clone());
    let user = auth.login("alice", "alice-pass", true).await?;
    storage.remove_item(session_keys::CURRENT_USER).await?;

    let restored = AuthService::new(store.clone(), storage.clone());
    let current = restored.current_user().await?.expect("validated user");
    assert_eq!(current.id, user.id);
    assert_eq!(current.session_token, user.session_token);

    // 未勾選記住登錄時，缺少使用者資料即視為未登錄
    storage.set_item(session_keys::REMEMBER_LOGIN, "false").await?;
    let forgotten = AuthService::new(store.clone(), storage.clone());
    assert!(forgotten.current_user().await?.is_none());

    // 無效的 token
    storage.set_item(session_keys::REMEMBER_LOGIN, "true").await?;
    storage.set_item(session_keys::SESSION_TOKEN, "bogus").await?;
    let invalid = AuthService::new(store, storage);
    assert!(invalid.current_user().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_password_change_checks_old_password() -> Result<()> {
    let store = backend()?;
    let auth = AuthService::new(store.clone(), MemorySessionStore::new());
    auth.login("alice", "alice-pass", false).await?;

    let err = auth
        .update_user_info(UpdateUserInfo {
            username: "alice".to_string(),
            old_password: Some("wrong".to_string()),
            new_password: Some("next-pass".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RosterError::Unauthorized { ref message } if message == "旧密码不正确"));

    auth.update_user_info(UpdateUserInfo {
        username: "alice".to_string(),
        old_password: Some("alice-pass".to_string()),
        new_password: Some("next-pass".to_string()),
        ..Default::default()
    })
    .await?;

    assert!(store.log_in("alice", "alice-pass").await.is_err());
    assert!(store.log_in("alice", "next-pass").await.is_ok());
    assert!(auth.is_authenticated().await?);
    Ok(())
}

#[tokio::test]
async fn test_rename_and_avatar() -> Result<()> {
    let store = backend()?;
    let storage = MemorySessionStore::new();
    let auth = AuthService::new(store.clone(), storage.clone());
    auth.login("alice", "alice-pass", false).await?;

    let updated = auth
        .update_user_info(UpdateUserInfo {
            username: "alice2".to_string(),
            avatar: Some("https://example.com/a.png".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(updated.username, "alice2");
    assert_eq!(updated.avatar.as_deref(), Some("https://example.com/a.png"));
    assert_eq!(
        storage.get_item(session_keys::USERNAME).await?.as_deref(),
        Some("alice2")
    );

    let relogged = store.log_in("alice2", "alice-pass").await?;
    assert_eq!(
        relogged.get("avatar").and_then(|v| v.as_str()),
        Some("https://example.com/a.png")
    );
    Ok(())
}

#[tokio::test]
async fn test_ensure_user_creates_or_updates_role() -> Result<()> {
    let store = backend()?;
    let auth = AuthService::new(store.clone(), MemorySessionStore::new());

    assert!(auth.ensure_user("bob", "bob-pass", "user").await?);
    let bob = store.log_in("bob", "bob-pass").await?;
    assert_eq!(bob.get("email").and_then(|v| v.as_str()), Some("bob@example.com"));

    assert!(!auth.ensure_user("alice", "alice-pass", "admin").await?);
    let alice = store.log_in("alice", "alice-pass").await?;
    assert_eq!(alice.get("role").and_then(|v| v.as_str()), Some("admin"));

    // 不影響本地登錄狀態
    assert!(!auth.is_authenticated().await?);
    Ok(())
}

#[tokio::test]
async fn test_guarded_store_requires_login() -> Result<()> {
    let store = backend()?;
    let storage = MemorySessionStore::new();
    storage.set_item(session_keys::USERNAME, "leftover").await?;
    let auth = Arc::new(AuthService::new(store.clone(), storage.clone()));
    let guarded = GuardedStore::new(store.clone(), auth.clone());

    let err = guarded
        .create("assessments", Document::new())
        .await
        .unwrap_err();
    assert!(err.is_session_error());
    assert!(storage.is_empty());
    assert_eq!(store.count("assessments"), 0);

    let user = auth.login("alice", "alice-pass", false).await?;
    assert!(matches!(
        authorize(Access::Admin, Some(&user)),
        Err(RosterError::Forbidden { .. })
    ));
    guarded.create("assessments", Document::new()).await?;
    assert_eq!(guarded.find("assessments", &Query::new()).await?.len(), 1);

    auth.invalidate().await?;
    assert!(guarded.find("assessments", &Query::new()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_fresh_backend_bootstraps_without_session() -> Result<()> {
    let store = InMemoryStore::new();
    let storage = MemorySessionStore::new();
    let auth = AuthService::new(store.clone(), storage.clone());
    assert!(auth.current_user().await?.is_none());

    let report = TableService::new(store.clone()).initialize_tables().await;
    assert!(report.is_success());
    assert_eq!(report.created.len(), classes::ALL.len());

    assert!(auth.ensure_user("admin", "admin-pass", "admin").await?);
    let user = auth.login("admin", "admin-pass", false).await?;
    assert!(authorize(Access::Admin, Some(&user)).is_ok());
    Ok(())
}
