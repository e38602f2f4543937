use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 存儲端的原始文件：欄位自由、以 `objectId` 為鍵
pub type Document = serde_json::Map<String, Value>;

/// 寫入時必須移除的保留欄位
pub const RESERVED_KEYS: [&str; 3] = ["objectId", "createdAt", "updatedAt"];

/// 各實體對應的存儲類別名稱
pub mod classes {
    pub const MEMBERS: &str = "training_members";
    pub const LEAVE_RECORDS: &str = "leave_records";
    pub const ENDED_LEAVES: &str = "ended_leaves";
    pub const BLACKLIST_RECORDS: &str = "blacklist_records";
    pub const BLACKLIST_REMOVE_RECORDS: &str = "blacklist_remove_records";
    pub const QUIT_MEMBERS: &str = "quit_members";
    pub const BLACKLIST_QUIT_MEMBERS: &str = "blacklist_quit_members";
    pub const ASSESSMENTS: &str = "assessments";

    pub const ALL: [&str; 8] = [
        MEMBERS,
        LEAVE_RECORDS,
        BLACKLIST_RECORDS,
        QUIT_MEMBERS,
        BLACKLIST_QUIT_MEMBERS,
        ASSESSMENTS,
        ENDED_LEAVES,
        BLACKLIST_REMOVE_RECORDS,
    ];

    /// 以 `memberId` 關聯到成員的類別，刪除成員時需要一併清理
    pub const MEMBER_RELATED: [&str; 7] = [
        LEAVE_RECORDS,
        ENDED_LEAVES,
        BLACKLIST_RECORDS,
        BLACKLIST_REMOVE_RECORDS,
        ASSESSMENTS,
        QUIT_MEMBERS,
        BLACKLIST_QUIT_MEMBERS,
    ];
}

/// 以存儲中的中文標籤序列化的列舉，未知標籤保留在 `Other`
macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Other(value) => value.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $($label => $name::$variant,)+
                    _ => $name::Other(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                match value {
                    $name::Other(value) => value,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labeled_enum!(
    /// 成員狀態（衍生欄位，讀取時重新計算）
    MemberStatus {
        Normal => "正常",
        Abnormal => "异常",
        UrgeToTrain => "催促参训",
        UntrainedQuit => "未训退队",
        TimeoutQuit => "超时退队",
        ViolationQuit => "违规退队",
    }
);

impl MemberStatus {
    pub fn is_quit(&self) -> bool {
        matches!(
            self,
            MemberStatus::UntrainedQuit | MemberStatus::TimeoutQuit | MemberStatus::ViolationQuit
        )
    }

    /// 自動寫入退隊記錄時使用的原因
    pub fn quit_reason(&self) -> Option<&'static str> {
        match self {
            MemberStatus::UntrainedQuit => Some("未参训"),
            MemberStatus::TimeoutQuit => Some("超时未参训"),
            MemberStatus::ViolationQuit => Some("黑点累计达到上限"),
            _ => None,
        }
    }
}

impl Default for MemberStatus {
    fn default() -> Self {
        MemberStatus::Normal
    }
}

labeled_enum!(
    /// 新訓階段，除初始與結業外的值都是中間階段
    TrainingStage {
        Untrained => "未新训",
        Completed => "新训完成",
    }
);

impl Default for TrainingStage {
    fn default() -> Self {
        TrainingStage::Untrained
    }
}

labeled_enum!(
    LeaveRequest {
        Approved => "通过",
        Pending => "待审核",
        Rejected => "拒绝",
    }
);

labeled_enum!(
    LeaveStatus {
        OnLeave => "请假中",
        AwaitingReturn => "等待销假",
        Returned => "已销假",
    }
);

impl LeaveStatus {
    /// 仍在假期內（含逾期未銷假）
    pub fn is_active(&self) -> bool {
        matches!(self, LeaveStatus::OnLeave | LeaveStatus::AwaitingReturn)
    }
}

impl Default for LeaveStatus {
    fn default() -> Self {
        LeaveStatus::OnLeave
    }
}

labeled_enum!(
    BlacklistStatus {
        Valid => "有效",
        Removed => "已消除",
    }
);

impl Default for BlacklistStatus {
    fn default() -> Self {
        BlacklistStatus::Valid
    }
}

labeled_enum!(
    AssessmentResult {
        Passed => "通过",
        Failed => "未通过",
    }
);

/// 接受字串、LeanCloud Date 物件或 null，空字串視為缺失
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(obj)) => obj
            .get("iso")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Ok(text.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub qq: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    /// 早期版本使用的入隊時間欄位
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub join_time: Option<String>,
    #[serde(default)]
    pub stage: TrainingStage,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub last_training_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub pass_date: Option<String>,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_request: Option<LeaveRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Member {
    pub fn id(&self) -> &str {
        self.object_id.as_deref().unwrap_or_default()
    }

    pub fn joined_on(&self) -> Option<&str> {
        self.join_date.as_deref().or(self.join_time.as_deref())
    }

    pub fn leave_request_approved(&self) -> bool {
        matches!(self.leave_request, Some(LeaveRequest::Approved))
    }
}

/// 成員局部更新，只序列化有設定的欄位
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<TrainingStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_training_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_request: Option<LeaveRequest>,
}

impl MemberPatch {
    /// 更新涉及狀態或留隊申請時需要重新計算狀態
    pub fn touches_status(&self) -> bool {
        self.status.is_some() || self.leave_request.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == MemberPatch::default()
    }
}

/// 請假記錄，銷假後的歸檔記錄（`ended_leaves`）沿用同一結構
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub ended_date: Option<String>,
    #[serde(default)]
    pub status: LeaveStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub status: BlacklistStatus,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistRemoveRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist_id: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub remove_date: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub quit_date: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_type: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

/// 違規（黑點）退隊記錄
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistQuitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub quit_date: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default, rename = "memberQQ")]
    pub member_qq: String,
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub assessment_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AssessmentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

/// 已登錄的管理端使用者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// 查詢條件：等值過濾、排序與數量限制
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub equal_to: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Ascending(String),
    Descending(String),
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal_to(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equal_to.push((key.into(), value.into()));
        self
    }

    pub fn ascending(mut self, key: impl Into<String>) -> Self {
        self.order = Some(Order::Ascending(key.into()));
        self
    }

    pub fn descending(mut self, key: impl Into<String>) -> Self {
        self.order = Some(Order::Descending(key.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn by_member(member_id: &str) -> Self {
        Self::new().equal_to("memberId", member_id)
    }

    /// LeanCloud `where` 參數
    pub fn where_clause(&self) -> Document {
        self.equal_to
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// LeanCloud `order` 參數，降序以 `-` 前綴
    pub fn order_param(&self) -> Option<String> {
        self.order.as_ref().map(|order| match order {
            Order::Ascending(key) => key.clone(),
            Order::Descending(key) => format!("-{}", key),
        })
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.equal_to
            .iter()
            .all(|(key, value)| doc.get(key) == Some(value))
    }
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::utils::error::RosterError::processing(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

pub fn strip_reserved(doc: &mut Document) {
    for key in RESERVED_KEYS {
        doc.remove(key);
    }
}
