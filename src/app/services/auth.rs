use crate::domain::model::{Document, User};
use crate::domain::ports::{AuthBackend, KeyValueStore, SessionGate};
use crate::utils::error::{Result, RosterError, CODE_PASSWORD_MISMATCH, CODE_USER_NOT_FOUND};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// 本地 session 檔案使用的鍵
pub mod session_keys {
    pub const REMEMBER_LOGIN: &str = "rememberLogin";
    pub const USERNAME: &str = "username";
    pub const USER_ROLE: &str = "userRole";
    pub const SESSION_TOKEN: &str = "sessionToken";
    pub const USER_ID: &str = "userId";
    pub const CURRENT_USER: &str = "currentUser";

    pub const ALL: [&str; 6] = [
        REMEMBER_LOGIN,
        USERNAME,
        USER_ROLE,
        SESSION_TOKEN,
        USER_ID,
        CURRENT_USER,
    ];
}

/// 個人資料更新；密碼只有在新舊密碼都提供時才修改
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateUserInfo {
    pub username: String,
    pub avatar: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub struct AuthService<B, K> {
    backend: B,
    storage: K,
    current: RwLock<Option<User>>,
}

impl<B, K> AuthService<B, K>
where
    B: AuthBackend,
    K: KeyValueStore,
{
    pub fn new(backend: B, storage: K) -> Self {
        Self {
            backend,
            storage,
            current: RwLock::new(None),
        }
    }

    /// 非空字串原樣返回，否則使用預設值
    pub fn ensure_string(value: Option<&Value>, default_value: &str) -> String {
        match value.and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => default_value.to_string(),
        }
    }

    fn user_from_doc(doc: &Document, fallback_username: &str) -> User {
        let text = |key: &str| {
            doc.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };
        User {
            id: text("objectId").unwrap_or_default(),
            username: Self::ensure_string(doc.get("username"), fallback_username),
            role: text("role"),
            avatar: text("avatar"),
            session_token: text("sessionToken"),
        }
    }

    /// 以 session token 恢復使用者；token 無效時返回 None
    pub async fn validate_session(&self, session_token: &str) -> Result<Option<User>> {
        match self.backend.become_user(session_token).await {
            Ok(doc) => {
                let mut user = Self::user_from_doc(&doc, "unknown");
                if user.session_token.is_none() {
                    user.session_token = Some(session_token.to_string());
                }
                *self.current.write().await = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) if e.is_session_error() || e.store_code().is_some() => {
                tracing::warn!("🔒 Session validation failed: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, username: &str, password: &str, remember: bool) -> Result<User> {
        let doc = self
            .backend
            .log_in(username, password)
            .await
            .map_err(|e| match e.store_code() {
                Some(CODE_PASSWORD_MISMATCH) | Some(CODE_USER_NOT_FOUND) => {
                    RosterError::Unauthorized {
                        message: e.to_string(),
                    }
                }
                _ => e,
            })?;

        let user = Self::user_from_doc(&doc, username);
        if user.session_token.is_none() {
            return Err(RosterError::Unauthorized {
                message: "未获取到用户信息".to_string(),
            });
        }

        self.persist(&user, Some(remember)).await?;
        *self.current.write().await = Some(user.clone());
        tracing::info!("🔑 Logged in as {} ({})", user.username, user.role.as_deref().unwrap_or("-"));
        Ok(user)
    }

    async fn persist(&self, user: &User, remember: Option<bool>) -> Result<()> {
        if let Some(remember) = remember {
            self.storage
                .set_item(session_keys::REMEMBER_LOGIN, if remember { "true" } else { "false" })
                .await?;
        }
        self.storage.set_item(session_keys::USERNAME, &user.username).await?;
        self.storage
            .set_item(session_keys::USER_ROLE, user.role.as_deref().unwrap_or_default())
            .await?;
        self.storage.set_item(session_keys::USER_ID, &user.id).await?;
        if let Some(token) = &user.session_token {
            self.storage.set_item(session_keys::SESSION_TOKEN, token).await?;
        }
        self.storage
            .set_item(session_keys::CURRENT_USER, &serde_json::to_string(user)?)
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        *self.current.write().await = None;
        for key in session_keys::ALL {
            self.storage.remove_item(key).await?;
        }
        tracing::info!("👋 Logged out");
        Ok(())
    }

    /// 目前的使用者：記憶體快取，其次是本地 session 檔案
    ///
    /// 沒有 session token 時一律視為未登錄。記住登錄但缺少使用者資料時，
    /// 以 token 向存儲端重新驗證。
    pub async fn current_user(&self) -> Result<Option<User>> {
        if let Some(user) = self.current.read().await.clone() {
            return Ok(Some(user));
        }

        let Some(token) = self.storage.get_item(session_keys::SESSION_TOKEN).await? else {
            return Ok(None);
        };
        let remembered = self
            .storage
            .get_item(session_keys::REMEMBER_LOGIN)
            .await?
            .as_deref()
            == Some("true");
        let stored = match self.storage.get_item(session_keys::CURRENT_USER).await? {
            Some(json) => match serde_json::from_str::<User>(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("⚠️ Ignoring unreadable stored user: {}", e);
                    None
                }
            },
            None => None,
        };

        match stored {
            Some(mut user) => {
                if user.session_token.is_none() {
                    user.session_token = Some(token);
                }
                *self.current.write().await = Some(user.clone());
                Ok(Some(user))
            }
            None if remembered => self.validate_session(&token).await,
            None => Ok(None),
        }
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.current_user().await?.is_some())
    }

    /// 更新個人資料；修改使用者名稱或密碼後清除快取的使用者
    pub async fn update_user_info(&self, info: UpdateUserInfo) -> Result<User> {
        let user = self.current_user().await?.ok_or(RosterError::SessionExpired)?;
        let mut token = user.session_token.clone().ok_or(RosterError::SessionExpired)?;
        let original_username = user.username.clone();

        let mut password_changed = false;
        if let (Some(old), Some(new)) = (info.old_password.as_deref(), info.new_password.as_deref()) {
            let wrong_old_password = |e: RosterError| match e.store_code() {
                Some(CODE_PASSWORD_MISMATCH) => RosterError::Unauthorized {
                    message: "旧密码不正确".to_string(),
                },
                _ => e,
            };
            self.backend
                .log_in(&original_username, old)
                .await
                .map_err(wrong_old_password)?;
            self.backend
                .update_password(&token, &user.id, old, new)
                .await
                .map_err(wrong_old_password)?;

            let refreshed = self.backend.log_in(&original_username, new).await?;
            if let Some(new_token) = refreshed.get("sessionToken").and_then(Value::as_str) {
                token = new_token.to_string();
            }
            password_changed = true;
            tracing::info!("🔐 Password updated for {}", original_username);
        }

        let mut changes = Document::new();
        let username_changed = !info.username.trim().is_empty() && info.username != original_username;
        if username_changed {
            changes.insert("username".to_string(), Value::String(info.username.clone()));
        }
        if let Some(avatar) = info.avatar.as_ref().filter(|a| !a.is_empty()) {
            changes.insert("avatar".to_string(), Value::String(avatar.clone()));
        }
        if !changes.is_empty() {
            self.backend.update_user(&token, &user.id, changes).await?;
        }

        let updated = User {
            username: if username_changed {
                info.username.clone()
            } else {
                original_username
            },
            avatar: info.avatar.clone().filter(|a| !a.is_empty()).or(user.avatar.clone()),
            session_token: Some(token),
            ..user
        };
        self.persist(&updated, None).await?;

        if password_changed || username_changed {
            *self.current.write().await = None;
        } else {
            *self.current.write().await = Some(updated.clone());
        }
        Ok(updated)
    }

    /// 確保帳號存在並具有指定角色，返回是否新建。不影響本地 session。
    pub async fn ensure_user(&self, username: &str, password: &str, role: &str) -> Result<bool> {
        match self.backend.log_in(username, password).await {
            Ok(doc) => {
                let user = Self::user_from_doc(&doc, username);
                let token = user.session_token.clone().unwrap_or_default();
                let mut changes = Document::new();
                changes.insert("role".to_string(), Value::String(role.to_string()));
                self.backend.update_user(&token, &user.id, changes).await?;
                tracing::info!("👤 Updated role of {} to {}", username, role);
                Ok(false)
            }
            Err(e) if e.store_code().is_some() => {
                tracing::debug!("Login as {} failed ({}), signing up", username, e);
                let mut doc = Document::new();
                doc.insert("username".to_string(), Value::String(username.to_string()));
                doc.insert("password".to_string(), Value::String(password.to_string()));
                doc.insert("role".to_string(), Value::String(role.to_string()));
                doc.insert(
                    "email".to_string(),
                    Value::String(format!("{}@example.com", username)),
                );
                self.backend.sign_up(doc).await?;
                tracing::info!("👤 Created {} user {}", role, username);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<B, K> SessionGate for AuthService<B, K>
where
    B: AuthBackend,
    K: KeyValueStore,
{
    async fn ensure_session(&self) -> Result<()> {
        if self.current_user().await?.is_some() {
            return Ok(());
        }
        self.invalidate().await?;
        Err(RosterError::SessionExpired)
    }

    async fn invalidate(&self) -> Result<()> {
        *self.current.write().await = None;
        self.storage.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, MemorySessionStore};
    use serde_json::json;

    #[test]
    fn test_ensure_string() {
        type Auth = AuthService<InMemoryStore, MemorySessionStore>;
        assert_eq!(Auth::ensure_string(Some(&json!("alice")), "unknown"), "alice");
        assert_eq!(Auth::ensure_string(Some(&json!("  ")), "unknown"), "unknown");
        assert_eq!(Auth::ensure_string(Some(&json!(42)), "unknown"), "unknown");
        assert_eq!(Auth::ensure_string(None, "bob"), "bob");
    }

    #[tokio::test]
    async fn test_gate_clears_storage_without_user() {
        let storage = MemorySessionStore::new();
        storage.set_item(session_keys::USERNAME, "stale").await.unwrap();
        let auth = AuthService::new(InMemoryStore::new(), storage.clone());

        let err = auth.ensure_session().await.unwrap_err();
        assert!(matches!(err, RosterError::SessionExpired));
        assert!(storage.is_empty());
    }
}
