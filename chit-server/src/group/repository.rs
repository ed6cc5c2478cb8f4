#[cfg(test)]
use mockall::automock;
use {
    super::entities,
    crate::{
        api::RestError,
        kernel::{
            db::{
                classify_db_error,
                DB,
            },
            entities::{
                GroupId,
                User,
                UserId,
            },
        },
    },
    axum::async_trait,
    sqlx::FromRow,
};

/// A group row joined with the user id of its organizer, resolved through the
/// organization -> organizer-profile chain.
#[derive(Clone, Debug, FromRow)]
pub struct GroupWithOrganizer {
    pub id:                GroupId,
    pub name:              String,
    pub state:             Option<String>,
    pub city:              Option<String>,
    pub current_members:   i32,
    pub organizer_user_id: Option<UserId>,
}

impl GroupWithOrganizer {
    pub fn get_group_entity(&self) -> entities::Group {
        entities::Group {
            id:              self.id,
            name:            self.name.clone(),
            state:           self.state.clone(),
            city:            self.city.clone(),
            current_members: self.current_members,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn get_group_with_organizer(
        &self,
        group_id: GroupId,
    ) -> Result<Option<GroupWithOrganizer>, RestError>;
    async fn is_active_member(&self, group_id: GroupId, user_id: UserId)
        -> Result<bool, RestError>;
    async fn has_membership(&self, group_id: GroupId, user_id: UserId) -> Result<bool, RestError>;
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>, RestError>;
    async fn add_member(&self, group_id: GroupId, user: &User) -> Result<(), RestError>;
}

#[async_trait]
impl Database for DB {
    #[tracing::instrument(skip_all, fields(group_id = %group_id))]
    async fn get_group_with_organizer(
        &self,
        group_id: GroupId,
    ) -> Result<Option<GroupWithOrganizer>, RestError> {
        sqlx::query_as(
            "SELECT g.id, g.name, g.state, g.city, g.current_members, p.user_id AS organizer_user_id
             FROM chit_groups g
             LEFT JOIN organizer_profiles p ON p.organization_id = g.organization_id
             WHERE g.id = $1",
        )
        .bind(group_id)
        .fetch_optional(self)
        .await
        .map_err(|e| classify_db_error(e, "get_group_with_organizer"))
    }

    async fn is_active_member(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<bool, RestError> {
        let member_id: Option<UserId> = sqlx::query_scalar(
            "SELECT id FROM chit_group_members
             WHERE chit_group_id = $1 AND user_id = $2 AND status = 'ACTIVE'",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(self)
        .await
        .map_err(|e| classify_db_error(e, "is_active_member"))?;
        Ok(member_id.is_some())
    }

    async fn has_membership(&self, group_id: GroupId, user_id: UserId) -> Result<bool, RestError> {
        let member_id: Option<UserId> = sqlx::query_scalar(
            "SELECT id FROM chit_group_members WHERE chit_group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(self)
        .await
        .map_err(|e| classify_db_error(e, "has_membership"))?;
        Ok(member_id.is_some())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>, RestError> {
        sqlx::query_as("SELECT id, name, email, phone FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self)
            .await
            .map_err(|e| classify_db_error(e, "get_user"))
    }

    #[tracing::instrument(skip_all, fields(group_id = %group_id, user_id = %user.id))]
    async fn add_member(&self, group_id: GroupId, user: &User) -> Result<(), RestError> {
        let mut tx = self
            .begin()
            .await
            .map_err(|e| classify_db_error(e, "add_member_begin"))?;
        let inserted = sqlx::query(
            "INSERT INTO chit_group_members (chit_group_id, user_id, name, email, phone)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (chit_group_id, user_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "add_member_insert"))?;
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE chit_groups SET current_members = current_members + 1 WHERE id = $1")
                .bind(group_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| classify_db_error(e, "add_member_count"))?;
        }
        tx.commit()
            .await
            .map_err(|e| classify_db_error(e, "add_member_commit"))?;
        Ok(())
    }
}

pub struct Repository {
    pub db: Box<dyn Database>,
}

impl Repository {
    pub fn new(db: impl Database) -> Self {
        Self { db: Box::new(db) }
    }
}
