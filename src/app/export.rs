use crate::domain::model::Member;
use crate::utils::error::Result;
use std::io::Write;

/// 匯出的欄位順序
pub const MEMBER_COLUMNS: [&str; 9] = [
    "objectId",
    "nickname",
    "qq",
    "gameId",
    "joinDate",
    "stage",
    "lastTrainingDate",
    "passDate",
    "status",
];

/// 將成員名冊寫成 CSV，返回寫入的資料列數
pub fn write_members_csv<W: Write>(writer: W, members: &[Member]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(MEMBER_COLUMNS)?;

    for member in members {
        csv_writer.write_record([
            member.id(),
            member.nickname.as_str(),
            member.qq.as_str(),
            member.game_id.as_deref().unwrap_or_default(),
            member.joined_on().unwrap_or_default(),
            member.stage.as_str(),
            member.last_training_date.as_deref().unwrap_or_default(),
            member.pass_date.as_deref().unwrap_or_default(),
            member.status.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    tracing::debug!("Exported {} members to CSV", members.len());
    Ok(members.len())
}
