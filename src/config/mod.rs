pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use command::{
    AssessmentCommand, BlacklistCommand, CliConfig, Command, LeaveCommand, MemberCommand,
    MemberFields, QuitCommand,
};

#[cfg(feature = "cli")]
mod command {
    use crate::core::Access;
    use crate::domain::model::{
        Assessment, AssessmentResult, BlacklistRecord, LeaveRecord, LeaveRequest, Member,
        MemberPatch, MemberStatus, QuitRecord, TrainingStage,
    };
    use chrono::NaiveDate;
    use clap::{Args, Parser, Subcommand};

    #[derive(Debug, Parser)]
    #[command(name = "roster")]
    #[command(about = "Roster and training management for the admin team")]
    pub struct CliConfig {
        /// Path to TOML configuration file
        #[arg(short, long, default_value = "roster.toml")]
        pub config: String,

        /// Enable verbose output
        #[arg(short, long, global = true)]
        pub verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long, global = true)]
        pub log_json: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// Create missing tables and seed configured users
        Init,
        Login {
            #[arg(long)]
            username: String,
            #[arg(long)]
            password: String,
            /// Keep the session across runs
            #[arg(long)]
            remember: bool,
        },
        Logout,
        Whoami,
        /// Update the logged-in user's name, avatar or password
        Profile {
            #[arg(long)]
            username: String,
            #[arg(long)]
            avatar: Option<String>,
            #[arg(long, requires = "new_password")]
            old_password: Option<String>,
            #[arg(long, requires = "old_password")]
            new_password: Option<String>,
        },
        #[command(subcommand)]
        Member(MemberCommand),
        #[command(subcommand)]
        Leave(LeaveCommand),
        #[command(subcommand)]
        Blacklist(BlacklistCommand),
        #[command(subcommand)]
        Quit(QuitCommand),
        #[command(subcommand)]
        Assessment(AssessmentCommand),
    }

    impl Command {
        /// 指令所需的權限
        pub fn access(&self) -> Access {
            match self {
                // 初始化在尚無任何使用者時也要能執行
                Command::Init | Command::Login { .. } | Command::Logout => Access::Public,
                Command::Member(MemberCommand::Delete { .. }) => Access::Admin,
                _ => Access::Authenticated,
            }
        }
    }

    #[derive(Debug, Default, Args)]
    pub struct MemberFields {
        #[arg(long)]
        pub nickname: Option<String>,
        #[arg(long)]
        pub qq: Option<String>,
        #[arg(long)]
        pub game_id: Option<String>,
        #[arg(long)]
        pub join_date: Option<String>,
        #[arg(long)]
        pub stage: Option<String>,
        #[arg(long)]
        pub last_training_date: Option<String>,
        #[arg(long)]
        pub pass_date: Option<String>,
    }

    #[derive(Debug, Subcommand)]
    pub enum MemberCommand {
        List {
            /// Only members with this status label
            #[arg(long)]
            status: Option<String>,
        },
        Show {
            id: String,
        },
        Add {
            #[command(flatten)]
            fields: MemberFields,
        },
        Update {
            id: String,
            #[command(flatten)]
            fields: MemberFields,
            #[arg(long)]
            status: Option<String>,
            #[arg(long)]
            leave_request: Option<String>,
        },
        Delete {
            id: String,
        },
        Export {
            #[arg(short, long, default_value = "members.csv")]
            output: String,
        },
    }

    impl MemberCommand {
        pub fn new_member(fields: &MemberFields) -> Member {
            Member {
                nickname: fields.nickname.clone().unwrap_or_default(),
                qq: fields.qq.clone().unwrap_or_default(),
                game_id: fields.game_id.clone(),
                join_date: fields.join_date.clone(),
                stage: fields
                    .stage
                    .as_deref()
                    .map(TrainingStage::from)
                    .unwrap_or_default(),
                last_training_date: fields.last_training_date.clone(),
                pass_date: fields.pass_date.clone(),
                ..Default::default()
            }
        }

        pub fn patch(
            fields: &MemberFields,
            status: Option<&str>,
            leave_request: Option<&str>,
        ) -> MemberPatch {
            MemberPatch {
                nickname: fields.nickname.clone(),
                qq: fields.qq.clone(),
                game_id: fields.game_id.clone(),
                join_date: fields.join_date.clone(),
                stage: fields.stage.as_deref().map(TrainingStage::from),
                last_training_date: fields.last_training_date.clone(),
                pass_date: fields.pass_date.clone(),
                status: status.map(MemberStatus::from),
                leave_request: leave_request.map(LeaveRequest::from),
            }
        }
    }

    #[derive(Debug, Subcommand)]
    pub enum LeaveCommand {
        List,
        Add {
            #[arg(long)]
            member_id: String,
            #[arg(long)]
            start: String,
            #[arg(long)]
            end: String,
            #[arg(long, default_value = "")]
            reason: String,
        },
        /// Mark a leave as returned
        End {
            id: String,
            /// Return date, defaults to today
            #[arg(long)]
            date: Option<NaiveDate>,
        },
        Ended,
        Delete {
            id: String,
        },
        DeleteEnded {
            id: String,
        },
    }

    impl LeaveCommand {
        pub fn record(member_id: &str, start: &str, end: &str, reason: &str) -> LeaveRecord {
            LeaveRecord {
                member_id: member_id.to_string(),
                start_date: Some(start.to_string()),
                end_date: Some(end.to_string()),
                reason: reason.to_string(),
                ..Default::default()
            }
        }
    }

    #[derive(Debug, Subcommand)]
    pub enum BlacklistCommand {
        List,
        Add {
            #[arg(long)]
            member_id: String,
            #[arg(long)]
            reason: String,
            #[arg(long)]
            date: Option<String>,
        },
        /// Remove a point and keep a removal record
        Remove {
            id: String,
            #[arg(long)]
            reason: String,
        },
        Delete {
            id: String,
        },
        Removals,
    }

    impl BlacklistCommand {
        pub fn record(member_id: &str, reason: &str, date: Option<&str>) -> BlacklistRecord {
            BlacklistRecord {
                member_id: member_id.to_string(),
                reason: reason.to_string(),
                date: date.map(str::to_string),
                ..Default::default()
            }
        }
    }

    #[derive(Debug, Subcommand)]
    pub enum QuitCommand {
        List,
        Add {
            #[arg(long)]
            member_id: String,
            #[arg(long, default_value = "")]
            reason: String,
            #[arg(long = "type")]
            quit_type: Option<String>,
            #[arg(long)]
            date: Option<String>,
        },
        Delete {
            id: String,
        },
        /// List violation quit records
        Violations,
        /// Create quit records from an old members cache dump
        ImportLegacy {
            #[arg(long)]
            file: String,
        },
    }

    impl QuitCommand {
        pub fn record(
            member_id: &str,
            reason: &str,
            quit_type: Option<&str>,
            date: Option<&str>,
        ) -> QuitRecord {
            QuitRecord {
                member_id: member_id.to_string(),
                reason: reason.to_string(),
                quit_type: quit_type.map(str::to_string),
                quit_date: date.map(str::to_string),
                ..Default::default()
            }
        }
    }

    #[derive(Debug, Subcommand)]
    pub enum AssessmentCommand {
        List,
        Add {
            #[arg(long)]
            member_id: String,
            /// `通过` or `未通过`
            #[arg(long)]
            result: String,
            #[arg(long)]
            date: Option<String>,
            #[arg(long)]
            examiner: Option<String>,
            #[arg(long)]
            remark: Option<String>,
        },
        Delete {
            id: String,
        },
    }

    impl AssessmentCommand {
        pub fn record(
            member_id: &str,
            result: &str,
            date: Option<&str>,
            examiner: Option<&str>,
            remark: Option<&str>,
        ) -> Assessment {
            Assessment {
                member_id: member_id.to_string(),
                result: Some(AssessmentResult::from(result)),
                assessment_date: date.map(str::to_string),
                examiner: examiner.map(str::to_string),
                remark: remark.map(str::to_string),
                ..Default::default()
            }
        }
    }

}
