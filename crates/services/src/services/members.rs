//! Board collaborators: invite, role changes, removal.

use db::{
    models::{
        membership::{BoardMember, InviteMember, MemberRole, MemberWithProfile, UpdateMemberRole},
        notification::NotificationKind,
        task::Task,
        user::User,
    },
    validation::{ValidationError, validate_email},
};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::{
    access::{AccessError, Permission, authorize},
    events::{BoardEvents, Topic},
    notifications::{NotificationDraft, Notifier, Recipients},
};

#[derive(Debug, Error)]
pub enum MemberError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("No user with that email has signed in yet")]
    UserNotFound,
    #[error("Member not found")]
    MemberNotFound,
    #[error("User is already a member of this board")]
    AlreadyMember,
    #[error("The owner role cannot be granted")]
    OwnerRoleNotAssignable,
    #[error("The board owner's membership cannot be changed")]
    OwnerImmutable,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct MemberService {
    pool: SqlitePool,
    events: BoardEvents,
    notifier: Notifier,
}

impl MemberService {
    pub fn new(pool: SqlitePool, events: BoardEvents, notifier: Notifier) -> Self {
        Self {
            pool,
            events,
            notifier,
        }
    }

    pub async fn list_members(
        &self,
        actor_id: Uuid,
        board_id: Uuid,
    ) -> Result<Vec<MemberWithProfile>, MemberError> {
        authorize(&self.pool, board_id, actor_id, Permission::View).await?;
        Ok(BoardMember::list_with_profiles(&self.pool, board_id).await?)
    }

    /// Add an existing user by email. The invitee is notified.
    pub async fn invite(
        &self,
        actor: &User,
        board_id: Uuid,
        data: &InviteMember,
    ) -> Result<MemberWithProfile, MemberError> {
        let access = authorize(&self.pool, board_id, actor.id, Permission::ManageMembers).await?;
        if data.role == MemberRole::Owner {
            return Err(MemberError::OwnerRoleNotAssignable);
        }
        let email = validate_email(&data.email)?;
        let invitee = User::find_by_email(&self.pool, &email)
            .await?
            .ok_or(MemberError::UserNotFound)?;
        if BoardMember::find(&self.pool, board_id, invitee.id)
            .await?
            .is_some()
        {
            return Err(MemberError::AlreadyMember);
        }

        let member = BoardMember::create(&self.pool, board_id, invitee.id, data.role).await?;
        tracing::info!(board_id = %board_id, user_id = %invitee.id, role = %member.role, "Member invited");
        self.events.publish(Topic::Board(board_id));

        let draft = NotificationDraft {
            kind: NotificationKind::BoardInvite,
            board_id: Some(board_id),
            task_id: None,
            title: "Board invitation".to_string(),
            body: format!(
                "{} added you to \"{}\" as {}",
                actor.display_name, access.board.name, member.role
            ),
        };
        if let Err(e) = self
            .notifier
            .notify(Recipients::User(invitee.id), draft)
            .await
        {
            tracing::warn!(board_id = %board_id, error = %e, "Failed to notify invitee");
        }

        Ok(MemberWithProfile {
            user_id: invitee.id,
            email: invitee.email,
            display_name: invitee.display_name,
            role: member.role,
            joined_at: member.created_at,
        })
    }

    pub async fn change_role(
        &self,
        actor_id: Uuid,
        board_id: Uuid,
        user_id: Uuid,
        data: &UpdateMemberRole,
    ) -> Result<BoardMember, MemberError> {
        let access = authorize(&self.pool, board_id, actor_id, Permission::ManageMembers).await?;
        if data.role == MemberRole::Owner {
            return Err(MemberError::OwnerRoleNotAssignable);
        }
        if user_id == access.board.owner_id {
            return Err(MemberError::OwnerImmutable);
        }

        let member = BoardMember::set_role(&self.pool, board_id, user_id, data.role)
            .await?
            .ok_or(MemberError::MemberNotFound)?;
        self.events.publish(Topic::Board(board_id));
        Ok(member)
    }

    /// Owners remove anyone but themselves; any member may leave. The removed
    /// user's task assignments on the board are cleared.
    pub async fn remove(
        &self,
        actor_id: Uuid,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), MemberError> {
        let permission = if actor_id == user_id {
            Permission::View
        } else {
            Permission::ManageMembers
        };
        let access = authorize(&self.pool, board_id, actor_id, permission).await?;
        if user_id == access.board.owner_id {
            return Err(MemberError::OwnerImmutable);
        }

        let mut tx = self.pool.begin().await?;
        let unassigned = Task::clear_assignee_on_board(&mut *tx, board_id, user_id).await?;
        let removed = BoardMember::delete(&mut *tx, board_id, user_id).await?;
        if removed == 0 {
            return Err(MemberError::MemberNotFound);
        }
        tx.commit().await?;

        tracing::info!(
            board_id = %board_id,
            user_id = %user_id,
            unassigned,
            "Member removed"
        );
        self.events.publish(Topic::Board(board_id));
        Ok(())
    }
}
