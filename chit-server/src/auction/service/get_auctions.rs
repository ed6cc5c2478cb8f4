use {
    super::ServiceInner,
    crate::{
        api::RestError,
        auction::entities,
        group,
        kernel::entities::{
            GroupId,
            UserId,
        },
    },
};

pub struct GetAuctionsInput {
    pub group_id: GroupId,
    pub user_id:  UserId,
}

impl ServiceInner {
    /// All auctions of a group, newest first, together with the caller's role facts
    /// so the response can carry what the caller may do.
    pub async fn get_auctions(
        &self,
        input: GetAuctionsInput,
    ) -> Result<(Vec<entities::Auction>, group::entities::GroupAccess), RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        let auctions = self.repo.get_auctions_for_group(input.group_id).await?;
        Ok((auctions, access))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{
            super::test_utils::*,
            *,
        },
        crate::auction::repository::{
            AuctionStatus,
            MockDatabase,
        },
        crate::escrow::repository::MockDatabase as MockEscrowDatabase,
        uuid::Uuid,
    };

    #[tokio::test]
    async fn lists_auctions_with_access_facts() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let group_id = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auctions().returning(move |group_id| {
            Ok(vec![auction_row(
                group_id,
                Uuid::new_v4(),
                AuctionStatus::Active,
                "1000",
            )])
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let (auctions, access) = service
            .get_auctions(GetAuctionsInput {
                group_id,
                user_id: member,
            })
            .await
            .unwrap();
        assert_eq!(auctions.len(), 1);
        assert!(access.is_approved_member);
        assert!(!access.is_organizer);
    }

    #[tokio::test]
    async fn outsiders_are_rejected() {
        let service = service(
            MockDatabase::new(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            MockEscrowDatabase::new(),
        );
        let err = service
            .get_auctions(GetAuctionsInput {
                group_id: Uuid::new_v4(),
                user_id:  Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::Forbidden("Only group members can access auctions".to_string())
        );
    }
}
