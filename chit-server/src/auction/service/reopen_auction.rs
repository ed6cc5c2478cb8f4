use {
    super::ServiceInner,
    crate::{
        api::RestError,
        auction::entities,
        kernel::entities::{
            AuctionId,
            GroupId,
            UserId,
        },
    },
    time::OffsetDateTime,
};

pub struct ReopenAuctionInput {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
}

impl ServiceInner {
    /// Reopens a WON auction whose winner let the payment window lapse. The winner
    /// fields are cleared and bidding resumes; a paid winner can never be undone.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, user_id = %input.user_id))]
    pub async fn reopen_auction(
        &self,
        input: ReopenAuctionInput,
    ) -> Result<entities::Auction, RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        if !access.is_organizer {
            return Err(RestError::Forbidden(
                "Only organizer can reopen auctions".to_string(),
            ));
        }
        let auction = self.repo.get_auction(input.group_id, input.auction_id).await?;
        if auction.status != entities::AuctionStatus::Won {
            return Err(RestError::InvalidState(
                "Only won auctions can be reopened".to_string(),
            ));
        }
        if auction.winner_paid_at.is_some() {
            return Err(RestError::InvalidState(
                "Cannot reopen a paid winner auction".to_string(),
            ));
        }
        if !auction.payment_window_expired(OffsetDateTime::now_utc()) {
            return Err(RestError::InvalidState(
                "Winner payment window is still active; cannot reopen yet".to_string(),
            ));
        }
        // The store re-checks every guard, so a payment confirmed between our read
        // and this update wins and the reopen is refused.
        if !self.repo.db.reopen(auction.id).await? {
            return Err(RestError::InvalidState(
                "Auction can no longer be reopened".to_string(),
            ));
        }
        self.repo.get_auction(input.group_id, input.auction_id).await
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
        time::Duration,
        uuid::Uuid,
    };

    fn won_auction(
        group_id: Uuid,
        id: Uuid,
        due_offset: Duration,
        paid: bool,
    ) -> crate::auction::repository::Auction {
        let mut row = auction_row(group_id, Uuid::new_v4(), AuctionStatus::Won, "1800");
        row.id = id;
        row.winner_id = Some(Uuid::new_v4());
        row.winner_declared_at = Some(now_primitive());
        let due = OffsetDateTime::now_utc() + due_offset;
        row.winner_payment_due_at =
            Some(time::PrimitiveDateTime::new(due.date(), due.time()));
        if paid {
            row.winner_paid_at = Some(now_primitive());
        }
        row
    }

    #[tokio::test]
    async fn lapsed_window_allows_reopen() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            Ok(Some(won_auction(group_id, id, Duration::hours(-1), false)))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));
        db.expect_reopen().times(1).returning(|_| Ok(true));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        service
            .reopen_auction(ReopenAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn active_window_blocks_reopen() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            Ok(Some(won_auction(group_id, id, Duration::hours(2), false)))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));
        db.expect_reopen().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .reopen_auction(ReopenAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::InvalidState(
                "Winner payment window is still active; cannot reopen yet".to_string()
            )
        );
    }

    #[tokio::test]
    async fn paid_winner_blocks_reopen() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            Ok(Some(won_auction(group_id, id, Duration::hours(-1), true)))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));
        db.expect_reopen().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .reopen_auction(ReopenAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::InvalidState("Cannot reopen a paid winner auction".to_string())
        );
    }

    #[tokio::test]
    async fn non_won_auction_cannot_be_reopened() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, Uuid::new_v4(), AuctionStatus::Closed, "1800");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .reopen_auction(ReopenAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::InvalidState("Only won auctions can be reopened".to_string())
        );
    }
}
