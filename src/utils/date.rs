use chrono::{DateTime, NaiveDate};

/// 存儲端統一使用的日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 寬鬆解析存儲中的日期字串
///
/// 舊資料可能是 `2024-1-5`、`2024/1/5` 或完整的 RFC 3339 時間戳，
/// 空字串與無法解析的值都視為沒有日期。
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in [DATE_FORMAT, "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `from` 到 `today` 之間經過的整天數
pub fn days_since(from: NaiveDate, today: NaiveDate) -> i64 {
    (today - from).num_days()
}

/// 解析並重新格式化，無法解析時保留原值
pub fn normalize_date(value: &str) -> String {
    parse_date(value)
        .map(format_date)
        .unwrap_or_else(|| value.to_string())
}
