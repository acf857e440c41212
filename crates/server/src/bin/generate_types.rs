//! Write the TypeScript declarations the web client compiles against.
//!
//! `generate_types [output]` (default `shared/types.ts`).

use std::{fs, path::PathBuf};

use ts_rs::TS;

fn declarations() -> Vec<String> {
    vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::user::Theme::decl(),
        db::models::user::User::decl(),
        db::models::user::UpdatePreferences::decl(),
        db::models::membership::MemberRole::decl(),
        db::models::membership::BoardMember::decl(),
        db::models::membership::MemberWithProfile::decl(),
        db::models::membership::InviteMember::decl(),
        db::models::membership::UpdateMemberRole::decl(),
        db::models::board::Board::decl(),
        db::models::board::BoardWithRole::decl(),
        db::models::board::CreateBoard::decl(),
        db::models::board::UpdateBoard::decl(),
        db::models::board::BoardSnapshot::decl(),
        db::models::column::Column::decl(),
        db::models::column::CreateColumn::decl(),
        db::models::column::UpdateColumn::decl(),
        db::models::column::MoveColumn::decl(),
        db::models::task::Task::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::task::MoveTask::decl(),
        db::models::task::TaskFilter::decl(),
        db::models::notification::NotificationKind::decl(),
        db::models::notification::Notification::decl(),
        db::models::notification::NotificationQuery::decl(),
        db::models::push_subscription::PushSubscription::decl(),
        db::models::push_subscription::PushKeys::decl(),
        db::models::push_subscription::RegisterPushSubscription::decl(),
        db::models::push_subscription::UnregisterPushSubscription::decl(),
        services::services::access::Permission::decl(),
        services::services::events::Snapshot::decl(),
        services::services::push::PushPayload::decl(),
        services::services::sync_queue::SyncOperation::decl(),
        services::services::sync_queue::QueuedOperation::decl(),
        services::services::sync_queue::ReplayStatus::decl(),
        services::services::sync_queue::ReplayResult::decl(),
        services::services::sync_queue::ReplayReport::decl(),
        server::routes::identity::MeResponse::decl(),
        server::routes::notifications::MarkAllReadResponse::decl(),
    ]
}

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shared/types.ts"));

    let mut body = String::from(
        "// This file was generated by `generate_types`. Do not edit it by hand.\n\n",
    );
    for decl in declarations() {
        body.push_str("export ");
        body.push_str(&decl);
        body.push_str("\n\n");
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, body)?;
    println!("Wrote {}", output.display());
    Ok(())
}
