use clap::Parser;
use roster_admin::app::export::write_members_csv;
use roster_admin::app::services::quits::parse_legacy_cache;
use roster_admin::app::services::auth::session_keys;
use roster_admin::app::services::{AuthService, Roster, TableService, UpdateUserInfo};
use roster_admin::config::{
    AssessmentCommand, BlacklistCommand, Command, LeaveCommand, MemberCommand, QuitCommand,
};
use roster_admin::core::{
    authorize, Access, GuardedStore, KeyValueStore, QueuedStore, RequestQueue, SessionGate,
};
use roster_admin::domain::model::{LeaveRecord, Member, MemberStatus};
use roster_admin::domain::ports::SystemClock;
use roster_admin::utils::error::Result;
use roster_admin::utils::{logger, validation::Validate};
use roster_admin::{CliConfig, LeanCloudStore, LocalSessionStore, RosterConfig};
use std::sync::Arc;

type Remote = QueuedStore<LeanCloudStore>;
type Auth = AuthService<Remote, LocalSessionStore>;
type Store = GuardedStore<Remote, Auth>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("📁 Loading configuration from: {}", cli.config);
    let config = match RosterConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = e.severity().exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(command: Command, config: &RosterConfig) -> Result<()> {
    let session = LocalSessionStore::new(&config.session.path);
    let token = session.get_item(session_keys::SESSION_TOKEN).await?;

    let queue = Arc::new(RequestQueue::new(&config.queue));
    let remote = QueuedStore::new(LeanCloudStore::new(&config.store)?.with_session(token), queue);
    let auth = Arc::new(AuthService::new(remote.clone(), session));

    let access = command.access();
    if access != Access::Public {
        let user = auth.current_user().await?;
        if user.is_none() {
            auth.invalidate().await?;
        }
        authorize(access, user.as_ref())?;
    }

    let store: Store = GuardedStore::new(remote.clone(), auth.clone());
    let roster = Roster::new(store, config.rules.clone(), Arc::new(SystemClock));

    match command {
        Command::Init => init(TableService::new(remote), &auth, config).await,
        Command::Login {
            username,
            password,
            remember,
        } => {
            let user = auth.login(&username, &password, remember).await?;
            println!("✅ 已登錄：{} ({})", user.username, user.role.as_deref().unwrap_or("-"));
            Ok(())
        }
        Command::Logout => {
            auth.logout().await?;
            println!("👋 已退出登錄");
            Ok(())
        }
        Command::Whoami => {
            if let Some(user) = auth.current_user().await? {
                println!("{}\t{}\t{}", user.id, user.username, user.role.as_deref().unwrap_or("-"));
            }
            Ok(())
        }
        Command::Profile {
            username,
            avatar,
            old_password,
            new_password,
        } => {
            let user = auth
                .update_user_info(UpdateUserInfo {
                    username,
                    avatar,
                    old_password,
                    new_password,
                })
                .await?;
            println!("✅ 已更新：{}", user.username);
            Ok(())
        }
        Command::Member(cmd) => member(&roster, cmd).await,
        Command::Leave(cmd) => leave(&roster, cmd).await,
        Command::Blacklist(cmd) => blacklist(&roster, cmd).await,
        Command::Quit(cmd) => quit(&roster, cmd).await,
        Command::Assessment(cmd) => assessment(&roster, cmd).await,
    }
}

async fn init(tables: TableService<Remote>, auth: &Auth, config: &RosterConfig) -> Result<()> {
    let report = tables.initialize_tables().await;
    println!(
        "📦 資料表：新建 {}，已存在 {}，失敗 {}",
        report.created.len(),
        report.existing.len(),
        report.failed.len()
    );
    for (class, error) in &report.failed {
        eprintln!("⚠️ {}: {}", class, error);
    }

    for seed in &config.seed_users {
        match auth.ensure_user(&seed.username, &seed.password, &seed.role).await {
            Ok(true) => println!("👤 已建立 {} ({})", seed.username, seed.role),
            Ok(false) => println!("👤 已更新 {} 的角色為 {}", seed.username, seed.role),
            Err(e) => {
                tracing::error!("❌ Failed to ensure user {}: {}", seed.username, e);
                eprintln!("⚠️ {}: {}", seed.username, e.user_friendly_message());
            }
        }
    }
    Ok(())
}

fn print_member(member: &Member) {
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        member.id(),
        member.nickname,
        member.qq,
        member.stage,
        member.status,
        member.last_training_date.as_deref().unwrap_or("-")
    );
}

async fn member(roster: &Roster<Store>, cmd: MemberCommand) -> Result<()> {
    let members = roster.members();
    match cmd {
        MemberCommand::List { status } => {
            let list = match status {
                Some(status) => members.members_with_status(&MemberStatus::from(status)).await?,
                None => members.get_all_members().await?,
            };
            list.iter().for_each(print_member);
            println!("共 {} 名成員", list.len());
        }
        MemberCommand::Show { id } => print_member(&members.get_member(&id).await?),
        MemberCommand::Add { fields } => {
            let created = members.add_member(MemberCommand::new_member(&fields)).await?;
            print_member(&created);
        }
        MemberCommand::Update {
            id,
            fields,
            status,
            leave_request,
        } => {
            let patch = MemberCommand::patch(&fields, status.as_deref(), leave_request.as_deref());
            print_member(&members.update_member(&id, patch).await?);
        }
        MemberCommand::Delete { id } => {
            let removed = members.delete_member(&id).await?;
            println!("🗑️ 已刪除成員 {} 及 {} 筆關聯記錄", id, removed);
        }
        MemberCommand::Export { output } => {
            let list = members.get_all_members().await?;
            let file = std::fs::File::create(&output)?;
            let rows = write_members_csv(file, &list)?;
            println!("📁 已匯出 {} 名成員到 {}", rows, output);
        }
    }
    Ok(())
}

fn print_leaves(records: &[LeaveRecord]) {
    for r in records {
        println!(
            "{}\t{}\t{}\t{} ~ {}\t{}\t{}",
            r.object_id.as_deref().unwrap_or("-"),
            r.member_name,
            r.member_qq,
            r.start_date.as_deref().unwrap_or("-"),
            r.end_date.as_deref().unwrap_or("-"),
            r.status,
            r.reason
        );
    }
}

async fn leave(roster: &Roster<Store>, cmd: LeaveCommand) -> Result<()> {
    let leaves = roster.leaves();
    match cmd {
        LeaveCommand::List => print_leaves(&leaves.list_leaves().await?),
        LeaveCommand::Add {
            member_id,
            start,
            end,
            reason,
        } => {
            let created = leaves
                .add_leave(LeaveCommand::record(&member_id, &start, &end, &reason))
                .await?;
            print_leaves(&[created]);
        }
        LeaveCommand::End { id, date } => print_leaves(&[leaves.end_leave(&id, date).await?]),
        LeaveCommand::Ended => print_leaves(&leaves.list_ended_leaves().await?),
        LeaveCommand::Delete { id } => leaves.delete_leave(&id).await?,
        LeaveCommand::DeleteEnded { id } => leaves.delete_ended_leave(&id).await?,
    }
    Ok(())
}

async fn blacklist(roster: &Roster<Store>, cmd: BlacklistCommand) -> Result<()> {
    let service = roster.blacklist();
    match cmd {
        BlacklistCommand::List => {
            for r in service.list_records().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.object_id.as_deref().unwrap_or("-"),
                    r.member_name,
                    r.member_qq,
                    r.date.as_deref().unwrap_or("-"),
                    r.status,
                    r.reason
                );
            }
        }
        BlacklistCommand::Add {
            member_id,
            reason,
            date,
        } => {
            let created = service
                .add_record(BlacklistCommand::record(&member_id, &reason, date.as_deref()))
                .await?;
            println!("⚫ {}", created.object_id.as_deref().unwrap_or("-"));
        }
        BlacklistCommand::Remove { id, reason } => {
            service.remove_point(&id, &reason).await?;
            println!("⚪ 已消除黑點 {}", id);
        }
        BlacklistCommand::Delete { id } => service.delete_record(&id).await?,
        BlacklistCommand::Removals => {
            for r in service.list_removals().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    r.blacklist_id.as_deref().unwrap_or("-"),
                    r.member_name,
                    r.member_qq,
                    r.remove_date.as_deref().unwrap_or("-"),
                    r.reason
                );
            }
        }
    }
    Ok(())
}

async fn quit(roster: &Roster<Store>, cmd: QuitCommand) -> Result<()> {
    let quits = roster.quits();
    match cmd {
        QuitCommand::List => {
            for r in quits.list_quits().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.object_id.as_deref().unwrap_or("-"),
                    r.member_name,
                    r.member_qq,
                    r.quit_date.as_deref().unwrap_or("-"),
                    r.quit_type.as_deref().unwrap_or("-"),
                    r.reason
                );
            }
        }
        QuitCommand::Add {
            member_id,
            reason,
            quit_type,
            date,
        } => {
            let saved = quits
                .add_quit(QuitCommand::record(
                    &member_id,
                    &reason,
                    quit_type.as_deref(),
                    date.as_deref(),
                ))
                .await?;
            println!("🚪 {} {}", saved.member_name, saved.quit_type.as_deref().unwrap_or("-"));
        }
        QuitCommand::Delete { id } => quits.delete_quit(&id).await?,
        QuitCommand::Violations => {
            for r in roster.blacklist_quits().list_records().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    r.object_id.as_deref().unwrap_or("-"),
                    r.member_name,
                    r.member_qq,
                    r.quit_date.as_deref().unwrap_or("-"),
                    r.blacklist_count.unwrap_or_default()
                );
            }
        }
        QuitCommand::ImportLegacy { file } => {
            let content = std::fs::read_to_string(&file)?;
            let members = parse_legacy_cache(&content)?;
            let created = quits.import_legacy(&members).await?;
            println!("📥 已匯入 {} 筆退隊記錄", created);
        }
    }
    Ok(())
}

async fn assessment(roster: &Roster<Store>, cmd: AssessmentCommand) -> Result<()> {
    let service = roster.assessments();
    match cmd {
        AssessmentCommand::List => {
            for a in service.list_assessments().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    a.object_id.as_deref().unwrap_or("-"),
                    a.member_name,
                    a.member_qq,
                    a.assessment_date.as_deref().unwrap_or("-"),
                    a.result.as_ref().map(|r| r.as_str()).unwrap_or("-"),
                    a.examiner.as_deref().unwrap_or("-")
                );
            }
        }
        AssessmentCommand::Add {
            member_id,
            result,
            date,
            examiner,
            remark,
        } => {
            let created = service
                .add_assessment(AssessmentCommand::record(
                    &member_id,
                    &result,
                    date.as_deref(),
                    examiner.as_deref(),
                    remark.as_deref(),
                ))
                .await?;
            println!("📋 {}", created.object_id.as_deref().unwrap_or("-"));
        }
        AssessmentCommand::Delete { id } => service.delete_assessment(&id).await?,
    }
    Ok(())
}
