use {
    super::{
        entities,
        repository::{
            Database,
            Repository,
        },
    },
    crate::{
        api::RestError,
        kernel::entities::{
            GroupId,
            UserId,
        },
    },
    std::sync::Arc,
};

pub struct ServiceInner {
    repo: Repository,
}

#[derive(Clone)]
pub struct Service(Arc<ServiceInner>);
impl std::ops::Deref for Service {
    type Target = ServiceInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Service {
    pub fn new(db: impl Database) -> Self {
        Self(Arc::new(ServiceInner {
            repo: Repository::new(db),
        }))
    }
}

impl ServiceInner {
    /// Resolves the caller's role facts for a group. Fails closed with `GroupNotFound`
    /// when the group does not exist; role checks are left to the caller so that each
    /// operation can reject with its own specific message.
    #[tracing::instrument(skip_all, fields(group_id = %group_id, user_id = %user_id))]
    pub async fn get_access(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<entities::GroupAccess, RestError> {
        let group = self
            .repo
            .db
            .get_group_with_organizer(group_id)
            .await?
            .ok_or(RestError::GroupNotFound)?;
        let is_organizer = group.organizer_user_id == Some(user_id);
        let is_approved_member = self.repo.db.is_active_member(group_id, user_id).await?;
        Ok(entities::GroupAccess {
            organizer_id: group.organizer_user_id,
            group: group.get_group_entity(),
            is_organizer,
            is_approved_member,
        })
    }

    /// Admits a first-time contributor as an ACTIVE group member. Idempotent per
    /// (group, user) pair: a user with any prior membership row is never re-admitted,
    /// so repeated contributions cannot create double-memberships.
    #[tracing::instrument(skip_all, fields(group_id = %group_id, user_id = %user_id))]
    pub async fn admit_contributor(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), RestError> {
        if self.repo.db.has_membership(group_id, user_id).await? {
            return Ok(());
        }
        let user = self
            .repo
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| RestError::BadParameters("Unknown contributor".to_string()))?;
        self.repo.db.add_member(group_id, &user).await
    }
}
