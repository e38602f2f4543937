use crate::config::toml_config::StoreConfig;
use crate::domain::model::{strip_reserved, Document, Query};
use crate::domain::ports::{AuthBackend, DocumentStore};
use crate::utils::error::{Result, RosterError, CODE_OBJECT_NOT_FOUND};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const API_VERSION: &str = "1.1";
/// 未指定數量時取 LeanCloud 允許的最大值（預設只返回 100 筆）
const DEFAULT_QUERY_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct QueryResults {
    #[serde(default)]
    results: Vec<Document>,
}

/// LeanCloud REST API 的文件存儲實作
#[derive(Debug, Clone)]
pub struct LeanCloudStore {
    client: Client,
    base_url: String,
    app_id: String,
    app_key: String,
    session_token: Option<String>,
}

impl LeanCloudStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", config.server_url.trim_end_matches('/'), API_VERSION),
            app_id: config.app_id.clone(),
            app_key: config.app_key.clone(),
            session_token: None,
        })
    }

    /// 資料請求附帶的使用者 session
    pub fn with_session(mut self, session_token: Option<String>) -> Self {
        self.session_token = session_token;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, session: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("X-LC-Id", &self.app_id)
            .header("X-LC-Key", &self.app_key);

        if let Some(token) = session.or(self.session_token.as_deref()) {
            request = request.header("X-LC-Session", token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("LeanCloud response status: {}", status);

        let text = response.text().await?;
        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Object(Document::new()));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        Err(Self::map_error(status, &text))
    }

    fn map_error(status: StatusCode, body: &str) -> RosterError {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .map(|b| b.error.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS => RosterError::RateLimited { message },
            StatusCode::UNAUTHORIZED => RosterError::SessionExpired,
            _ => RosterError::StoreError {
                code: parsed
                    .map(|b| b.code)
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                message,
            },
        }
    }

    fn into_document(value: Value) -> Result<Document> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(RosterError::processing(format!(
                "unexpected LeanCloud response: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl DocumentStore for LeanCloudStore {
    async fn find(&self, class: &str, query: &Query) -> Result<Vec<Document>> {
        let mut request = self.request(Method::GET, &format!("classes/{}", class), None);

        let where_clause = query.where_clause();
        if !where_clause.is_empty() {
            request = request.query(&[("where", Value::Object(where_clause).to_string())]);
        }
        if let Some(order) = query.order_param() {
            request = request.query(&[("order", order)]);
        }
        let limit = query.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        request = request.query(&[("limit", limit.to_string())]);

        tracing::debug!("📡 Querying class {}", class);
        let results: QueryResults = serde_json::from_value(self.send(request).await?)?;
        Ok(results.results)
    }

    async fn get(&self, class: &str, id: &str) -> Result<Document> {
        let request = self.request(Method::GET, &format!("classes/{}/{}", class, id), None);
        let not_found = || RosterError::NotFound {
            class: class.to_string(),
            id: id.to_string(),
        };

        match self.send(request).await {
            Ok(value) => {
                let doc = Self::into_document(value)?;
                // 物件不存在時 LeanCloud 可能返回空物件
                if doc.is_empty() {
                    return Err(not_found());
                }
                Ok(doc)
            }
            Err(e) if e.store_code() == Some(CODE_OBJECT_NOT_FOUND) => Err(not_found()),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, class: &str, data: Document) -> Result<Document> {
        let mut data = data;
        strip_reserved(&mut data);

        let request = self
            .request(Method::POST, &format!("classes/{}", class), None)
            .json(&data);
        let created = Self::into_document(self.send(request).await?)?;

        // 回應只包含 objectId/createdAt，合併成完整文件
        data.extend(created);
        Ok(data)
    }

    async fn update(&self, class: &str, id: &str, data: Document) -> Result<Document> {
        let mut data = data;
        strip_reserved(&mut data);

        let request = self
            .request(Method::PUT, &format!("classes/{}/{}", class, id), None)
            .json(&data);
        let updated = match self.send(request).await {
            Err(e) if e.store_code() == Some(CODE_OBJECT_NOT_FOUND) => {
                return Err(RosterError::NotFound {
                    class: class.to_string(),
                    id: id.to_string(),
                })
            }
            other => Self::into_document(other?)?,
        };

        data.extend(updated);
        data.insert("objectId".to_string(), Value::String(id.to_string()));
        Ok(data)
    }

    async fn destroy(&self, class: &str, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("classes/{}/{}", class, id), None);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for LeanCloudStore {
    async fn log_in(&self, username: &str, password: &str) -> Result<Document> {
        let request = self
            .request(Method::POST, "login", None)
            .json(&serde_json::json!({ "username": username, "password": password }));
        Self::into_document(self.send(request).await?)
    }

    async fn become_user(&self, session_token: &str) -> Result<Document> {
        let request = self.request(Method::GET, "users/me", Some(session_token));
        Self::into_document(self.send(request).await?)
    }

    async fn sign_up(&self, user: Document) -> Result<Document> {
        let mut user = user;
        let request = self.request(Method::POST, "users", None).json(&user);
        let created = Self::into_document(self.send(request).await?)?;

        user.remove("password");
        user.extend(created);
        Ok(user)
    }

    async fn update_user(&self, session_token: &str, user_id: &str, data: Document) -> Result<()> {
        let mut data = data;
        strip_reserved(&mut data);
        let request = self
            .request(Method::PUT, &format!("users/{}", user_id), Some(session_token))
            .json(&data);
        self.send(request).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        session_token: &str,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let request = self
            .request(
                Method::PUT,
                &format!("users/{}/updatePassword", user_id),
                Some(session_token),
            )
            .json(&serde_json::json!({
                "old_password": old_password,
                "new_password": new_password,
            }));
        self.send(request).await?;
        Ok(())
    }
}
