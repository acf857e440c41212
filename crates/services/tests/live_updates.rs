mod support;

use std::time::Duration;

use db::models::{
    membership::{InviteMember, MemberRole, UpdateMemberRole},
    notification::NotificationKind,
    task::CreateTask,
};
use futures::StreamExt;
use services::services::{
    events::{EventsError, Snapshot, Subscription, Topic},
    members::MemberError,
};
use support::Harness;
use tokio::time::timeout;

async fn next_snapshot(sub: &mut Subscription) -> Result<Snapshot, EventsError> {
    timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("subscription ended")
}

fn board_snapshot(snapshot: Snapshot) -> db::models::board::BoardSnapshot {
    match snapshot {
        Snapshot::Board(board) => board,
        Snapshot::Inbox(_) => panic!("expected a board snapshot"),
    }
}

#[tokio::test]
async fn subscribers_get_initial_and_updated_snapshots() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let (board, columns) = h.board(&ada).await;

    let mut sub = h.events.subscribe_as(Topic::Board(board.id), ada.id);
    let initial = board_snapshot(next_snapshot(&mut sub).await.unwrap());
    assert_eq!(initial.columns.len(), 3);
    assert!(initial.tasks.is_empty());

    h.tasks
        .create_task(
            &ada,
            board.id,
            &CreateTask {
                column_id: columns[1].id,
                title: "ship it".into(),
                description: None,
                assignee_id: None,
                index: None,
            },
        )
        .await
        .unwrap();

    let updated = board_snapshot(next_snapshot(&mut sub).await.unwrap());
    assert_eq!(updated.tasks.len(), 1);
    assert_eq!(updated.tasks[0].title, "ship it");
    assert_eq!(updated.tasks[0].column_id, columns[1].id);
}

#[tokio::test]
async fn other_boards_do_not_wake_a_subscriber() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let (watched, _) = h.board(&ada).await;
    let (other, other_columns) = h.board(&ada).await;

    let mut sub = h.events.subscribe(Topic::Board(watched.id));
    next_snapshot(&mut sub).await.unwrap();

    h.boards
        .rename_column(ada.id, other.id, other_columns[0].id, &db::models::column::UpdateColumn {
            name: "Backlog".into(),
        })
        .await
        .unwrap();

    let woke = timeout(Duration::from_millis(200), sub.next()).await;
    assert!(woke.is_err(), "unrelated change produced a snapshot");
}

#[tokio::test]
async fn unsubscribe_ends_the_stream() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let (board, _) = h.board(&ada).await;

    let mut sub = h.events.subscribe(Topic::Board(board.id));
    next_snapshot(&mut sub).await.unwrap();
    assert_eq!(h.events.subscriber_count(), 1);

    sub.unsubscribe();
    let end = timeout(Duration::from_secs(5), sub.next()).await.unwrap();
    assert!(end.is_none());

    drop(sub);
    assert_eq!(h.events.subscriber_count(), 0);
}

#[tokio::test]
async fn removed_member_is_cut_off() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let bob = h.user("bob").await;
    let (board, _) = h.board(&ada).await;
    h.add_member(board.id, &bob, MemberRole::Member).await;

    let mut sub = h.events.subscribe_as(Topic::Board(board.id), bob.id);
    next_snapshot(&mut sub).await.unwrap();

    h.members.remove(ada.id, board.id, bob.id).await.unwrap();

    let err = next_snapshot(&mut sub).await.unwrap_err();
    assert!(matches!(err, EventsError::AccessRevoked));
    let end = timeout(Duration::from_secs(5), sub.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn deleted_board_ends_subscription() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let (board, _) = h.board(&ada).await;

    let mut sub = h.events.subscribe_as(Topic::Board(board.id), ada.id);
    next_snapshot(&mut sub).await.unwrap();

    h.boards.delete_board(ada.id, board.id).await.unwrap();
    let err = next_snapshot(&mut sub).await.unwrap_err();
    assert!(matches!(err, EventsError::BoardGone));
}

#[tokio::test]
async fn invite_notifies_and_updates_inbox_stream() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let bob = h.user("bob").await;
    let (board, _) = h.board(&ada).await;

    let mut inbox = h.events.subscribe(Topic::Inbox(bob.id));
    match next_snapshot(&mut inbox).await.unwrap() {
        Snapshot::Inbox(items) => assert!(items.is_empty()),
        Snapshot::Board(_) => panic!("expected inbox"),
    }

    let member = h
        .members
        .invite(
            &ada,
            board.id,
            &InviteMember {
                email: "BOB@example.com".into(),
                role: MemberRole::Editor,
            },
        )
        .await
        .unwrap();
    assert_eq!(member.user_id, bob.id);
    assert_eq!(member.role, MemberRole::Editor);

    match next_snapshot(&mut inbox).await.unwrap() {
        Snapshot::Inbox(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].kind, NotificationKind::BoardInvite);
        }
        Snapshot::Board(_) => panic!("expected inbox"),
    }

    let again = h
        .members
        .invite(
            &ada,
            board.id,
            &InviteMember {
                email: "bob@example.com".into(),
                role: MemberRole::Member,
            },
        )
        .await;
    assert!(matches!(again, Err(MemberError::AlreadyMember)));
}

#[tokio::test]
async fn owner_role_cannot_be_granted_or_changed() {
    let h = Harness::new().await;
    let ada = h.user("ada").await;
    let bob = h.user("bob").await;
    let (board, _) = h.board(&ada).await;
    h.add_member(board.id, &bob, MemberRole::Member).await;

    let grant = h
        .members
        .change_role(ada.id, board.id, bob.id, &UpdateMemberRole { role: MemberRole::Owner })
        .await;
    assert!(matches!(grant, Err(MemberError::OwnerRoleNotAssignable)));

    let demote = h
        .members
        .change_role(ada.id, board.id, ada.id, &UpdateMemberRole { role: MemberRole::Member })
        .await;
    assert!(matches!(demote, Err(MemberError::OwnerImmutable)));

    let promoted = h
        .members
        .change_role(ada.id, board.id, bob.id, &UpdateMemberRole { role: MemberRole::Editor })
        .await
        .unwrap();
    assert_eq!(promoted.role, MemberRole::Editor);

    // Members may leave on their own.
    h.members.remove(bob.id, board.id, bob.id).await.unwrap();
    let members = h.members.list_members(ada.id, board.id).await.unwrap();
    assert_eq!(members.len(), 1);
}
