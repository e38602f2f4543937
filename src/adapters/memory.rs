use crate::domain::model::{strip_reserved, Document, Order, Query};
use crate::domain::ports::{AuthBackend, DocumentStore, KeyValueStore};
use crate::utils::error::{
    Result, RosterError, CODE_OBJECT_NOT_FOUND, CODE_PASSWORD_MISMATCH, CODE_USER_NOT_FOUND,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct StoreState {
    classes: HashMap<String, Vec<Document>>,
    users: HashMap<String, (String, Document)>,
    sessions: HashMap<String, String>,
    sequence: i64,
}

impl StoreState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}{:08}", prefix, self.sequence)
    }

    /// 遞增的時間戳，保證 `createdAt` 排序穩定
    fn next_timestamp(&mut self) -> String {
        self.sequence += 1;
        DateTime::from_timestamp_millis(1_700_000_000_000 + self.sequence * 1000)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    fn user_by_id(&mut self, user_id: &str) -> Option<&mut (String, Document)> {
        self.users
            .values_mut()
            .find(|(_, doc)| doc.get("objectId").and_then(Value::as_str) == Some(user_id))
    }
}

/// 進程內的文件存儲，行為貼近 LeanCloud：
/// 查詢從未寫入過的類別返回錯誤碼 101，寫入時自動建立類別。
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| RosterError::processing("in-memory store lock poisoned"))
    }

    /// 預先放入文件（測試用），保留給定的 `objectId`
    pub fn insert(&self, class: &str, doc: Document) -> Result<String> {
        let mut state = self.state()?;
        let id = match doc.get("objectId").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => state.next_id("obj"),
        };
        let created_at = state.next_timestamp();
        let mut doc = doc;
        doc.insert("objectId".to_string(), Value::String(id.clone()));
        doc.entry("createdAt".to_string())
            .or_insert(Value::String(created_at));
        state.classes.entry(class.to_string()).or_default().push(doc);
        Ok(id)
    }

    pub fn count(&self, class: &str) -> usize {
        self.state()
            .map(|state| state.classes.get(class).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.state()
            .map(|state| state.classes.contains_key(class))
            .unwrap_or(false)
    }

    /// 預先註冊使用者（測試用）
    pub fn register_user(&self, username: &str, password: &str, role: &str) -> Result<String> {
        let mut state = self.state()?;
        let id = state.next_id("user");
        let mut doc = Document::new();
        doc.insert("objectId".to_string(), Value::String(id.clone()));
        doc.insert("username".to_string(), Value::String(username.to_string()));
        doc.insert("role".to_string(), Value::String(role.to_string()));
        state
            .users
            .insert(username.to_string(), (password.to_string(), doc));
        Ok(id)
    }

    fn open_session(state: &mut StoreState, username: &str) -> Result<Document> {
        let token = state.next_id("session-");
        state.sessions.insert(token.clone(), username.to_string());
        let (_, doc) = state
            .users
            .get(username)
            .ok_or_else(|| RosterError::store(CODE_USER_NOT_FOUND, "Could not find user"))?;
        let mut doc = doc.clone();
        doc.insert("sessionToken".to_string(), Value::String(token));
        Ok(doc)
    }

    fn session_user(state: &StoreState, session_token: &str) -> Result<String> {
        state
            .sessions
            .get(session_token)
            .cloned()
            .ok_or(RosterError::SessionExpired)
    }
}

fn order_key(doc: &Document, key: &str) -> String {
    match doc.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(&self, class: &str, query: &Query) -> Result<Vec<Document>> {
        let state = self.state()?;
        let docs = state
            .classes
            .get(class)
            .ok_or_else(|| RosterError::store(CODE_OBJECT_NOT_FOUND, format!("Class or object doesn't exists: {}", class)))?;

        let mut results: Vec<Document> = docs.iter().filter(|doc| query.matches(doc)).cloned().collect();

        match &query.order {
            Some(Order::Ascending(key)) => results.sort_by_key(|doc| order_key(doc, key)),
            Some(Order::Descending(key)) => {
                results.sort_by_key(|doc| std::cmp::Reverse(order_key(doc, key)))
            }
            None => {}
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn get(&self, class: &str, id: &str) -> Result<Document> {
        let state = self.state()?;
        state
            .classes
            .get(class)
            .and_then(|docs| {
                docs.iter()
                    .find(|doc| doc.get("objectId").and_then(Value::as_str) == Some(id))
            })
            .cloned()
            .ok_or_else(|| RosterError::NotFound {
                class: class.to_string(),
                id: id.to_string(),
            })
    }

    async fn create(&self, class: &str, data: Document) -> Result<Document> {
        let mut state = self.state()?;
        let mut doc = data;
        strip_reserved(&mut doc);
        let id = state.next_id("obj");
        let created_at = state.next_timestamp();
        doc.insert("objectId".to_string(), Value::String(id));
        doc.insert("createdAt".to_string(), Value::String(created_at.clone()));
        doc.insert("updatedAt".to_string(), Value::String(created_at));
        state
            .classes
            .entry(class.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, class: &str, id: &str, data: Document) -> Result<Document> {
        let mut state = self.state()?;
        let updated_at = state.next_timestamp();
        let doc = state
            .classes
            .get_mut(class)
            .and_then(|docs| {
                docs.iter_mut()
                    .find(|doc| doc.get("objectId").and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| RosterError::NotFound {
                class: class.to_string(),
                id: id.to_string(),
            })?;

        let mut data = data;
        strip_reserved(&mut data);
        doc.extend(data);
        doc.insert("updatedAt".to_string(), Value::String(updated_at));
        Ok(doc.clone())
    }

    async fn destroy(&self, class: &str, id: &str) -> Result<()> {
        let mut state = self.state()?;
        if let Some(docs) = state.classes.get_mut(class) {
            docs.retain(|doc| doc.get("objectId").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for InMemoryStore {
    async fn log_in(&self, username: &str, password: &str) -> Result<Document> {
        let mut state = self.state()?;
        match state.users.get(username) {
            None => return Err(RosterError::store(CODE_USER_NOT_FOUND, "Could not find user")),
            Some((stored, _)) if stored != password => {
                return Err(RosterError::store(
                    CODE_PASSWORD_MISMATCH,
                    "The username and password mismatch",
                ))
            }
            Some(_) => {}
        }
        Self::open_session(&mut state, username)
    }

    async fn become_user(&self, session_token: &str) -> Result<Document> {
        let state = self.state()?;
        let username = Self::session_user(&state, session_token)?;
        let (_, doc) = state.users.get(&username).ok_or(RosterError::SessionExpired)?;
        let mut doc = doc.clone();
        doc.insert(
            "sessionToken".to_string(),
            Value::String(session_token.to_string()),
        );
        Ok(doc)
    }

    async fn sign_up(&self, user: Document) -> Result<Document> {
        let mut user = user;
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| RosterError::validation("username is required"))?;
        let password = user
            .remove("password")
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| RosterError::validation("password is required"))?;

        let mut state = self.state()?;
        if state.users.contains_key(&username) {
            return Err(RosterError::store(202, "Username has already been taken"));
        }
        let id = state.next_id("user");
        user.insert("objectId".to_string(), Value::String(id));
        state.users.insert(username.clone(), (password, user));
        Self::open_session(&mut state, &username)
    }

    async fn update_user(&self, session_token: &str, user_id: &str, data: Document) -> Result<()> {
        let mut state = self.state()?;
        let username = Self::session_user(&state, session_token)?;

        let new_username = data
            .get("username")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        let (password, doc) = state
            .user_by_id(user_id)
            .ok_or_else(|| RosterError::store(CODE_USER_NOT_FOUND, "Could not find user"))?;
        let mut data = data;
        strip_reserved(&mut data);
        doc.extend(data);
        let entry = (password.clone(), doc.clone());

        if let Some(new_username) = new_username.filter(|name| *name != username) {
            state.users.remove(&username);
            state.users.insert(new_username.clone(), entry);
            for owner in state.sessions.values_mut() {
                if *owner == username {
                    *owner = new_username.clone();
                }
            }
        }
        Ok(())
    }

    async fn update_password(
        &self,
        session_token: &str,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut state = self.state()?;
        Self::session_user(&state, session_token)?;
        let (password, _) = state
            .user_by_id(user_id)
            .ok_or_else(|| RosterError::store(CODE_USER_NOT_FOUND, "Could not find user"))?;
        if password != old_password {
            return Err(RosterError::store(
                CODE_PASSWORD_MISMATCH,
                "The username and password mismatch",
            ));
        }
        *password = new_password.to_string();
        Ok(())
    }
}

/// 進程內的 session 鍵值存儲
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| RosterError::processing("session store lock poisoned"))
    }

    pub fn is_empty(&self) -> bool {
        self.items().map(|items| items.is_empty()).unwrap_or(true)
    }
}

impl KeyValueStore for MemorySessionStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items()?.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.items()?.clear();
        Ok(())
    }
}
