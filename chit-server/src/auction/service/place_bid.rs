use {
    super::{
        bid_amount_from,
        ServiceInner,
    },
    crate::{
        api::RestError,
        auction::{
            entities,
            repository::NewBid,
        },
        kernel::entities::{
            AuctionId,
            GroupId,
            UserId,
        },
    },
};

pub struct PlaceBidInput {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
    pub bid_amount: f64,
}

impl ServiceInner {
    /// Places a bid on an active auction. The store serializes concurrent bids on
    /// the same auction, so acceptance is always judged against the latest
    /// committed highest bid; a per-bidder cooldown throttles rapid re-bidding.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, user_id = %input.user_id))]
    pub async fn place_bid(&self, input: PlaceBidInput) -> Result<entities::Auction, RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        if access.is_organizer {
            return Err(RestError::Forbidden(
                "Organizer cannot place bids".to_string(),
            ));
        }
        let bid_amount = bid_amount_from(input.bid_amount)?;
        self.repo
            .db
            .add_bid(NewBid {
                group_id: input.group_id,
                auction_id: input.auction_id,
                bidder_id: input.user_id,
                bid_amount,
                cooldown: self.config.bid_cooldown,
            })
            .await?;
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
        uuid::Uuid,
    };

    #[tokio::test]
    async fn accepted_bid_returns_updated_auction() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let auction_id = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_add_bid()
            .withf(move |bid| {
                bid.auction_id == auction_id
                    && bid.bid_amount == amount("1800")
                    && bid.cooldown == time::Duration::seconds(10)
            })
            .returning(|_| Ok(()));
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, Uuid::new_v4(), AuctionStatus::Active, "1800");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let auction = service
            .place_bid(PlaceBidInput {
                group_id,
                auction_id,
                user_id: member,
                bid_amount: 1800.0,
            })
            .await
            .unwrap();
        assert_eq!(auction.highest_bid, amount("1800"));
    }

    #[tokio::test]
    async fn rejections_from_the_store_pass_through() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_add_bid().returning(|_| Err(RestError::RateLimited));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .place_bid(PlaceBidInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    member,
                bid_amount: 2000.0,
            })
            .await
            .unwrap_err();
        assert_eq!(err, RestError::RateLimited);
    }

    #[tokio::test]
    async fn organizer_cannot_bid() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let service = service(
            MockDatabase::new(),
            organizer,
            member,
            MockEscrowDatabase::new(),
        );
        let err = service
            .place_bid(PlaceBidInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
                bid_amount: 2000.0,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::Forbidden("Organizer cannot place bids".to_string())
        );
    }

    #[tokio::test]
    async fn outsider_cannot_bid() {
        let service = service(
            MockDatabase::new(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            MockEscrowDatabase::new(),
        );
        let err = service
            .place_bid(PlaceBidInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    Uuid::new_v4(),
                bid_amount: 2000.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Forbidden(_)));
    }
}
