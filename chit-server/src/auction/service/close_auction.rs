use {
    super::ServiceInner,
    crate::{
        api::RestError,
        auction::{
            entities,
            repository::WinnerUpdate,
        },
        kernel::entities::{
            AuctionId,
            GroupId,
            UserId,
        },
    },
    time::OffsetDateTime,
};

pub struct CloseAuctionInput {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
}

impl ServiceInner {
    /// Closes an auction that has not been won yet; re-closing a CLOSED auction
    /// is a no-op that succeeds. If nobody outbid the creator's opening bid the
    /// creator wins outright and the payment window opens immediately; otherwise
    /// the auction moves to CLOSED awaiting a winner declaration.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, user_id = %input.user_id))]
    pub async fn close_auction(
        &self,
        input: CloseAuctionInput,
    ) -> Result<entities::Auction, RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        if !access.is_organizer {
            return Err(RestError::Forbidden(
                "Only organizer can close auctions".to_string(),
            ));
        }
        let auction = self.repo.get_auction(input.group_id, input.auction_id).await?;
        if auction.status == entities::AuctionStatus::Won {
            return Err(RestError::InvalidState(
                "Auction winner already declared".to_string(),
            ));
        }

        let updated = if auction.bids.len() <= 1 && auction.winner_id.is_none() {
            let now = OffsetDateTime::now_utc();
            self.repo
                .db
                .set_winner(WinnerUpdate {
                    auction_id: auction.id,
                    winner_id: auction.created_by,
                    winning_amount: auction.highest_bid.clone(),
                    declared_at: now,
                    due_at: now + self.config.payment_window,
                    expected_update_time: auction.update_time,
                })
                .await?
        } else {
            self.repo.db.set_closed(auction.id, auction.update_time).await?
        };
        if !updated {
            return Err(RestError::InvalidState(
                "Auction was updated concurrently".to_string(),
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
        std::sync::{
            Arc,
            Mutex,
        },
        uuid::Uuid,
    };

    #[tokio::test]
    async fn only_organizer_can_close() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let service = service(
            MockDatabase::new(),
            organizer,
            member,
            MockEscrowDatabase::new(),
        );
        let err = service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    member,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::Forbidden("Only organizer can close auctions".to_string())
        );
    }

    #[tokio::test]
    async fn closing_with_competing_bids_moves_to_closed() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let auction_id = Uuid::new_v4();
        let status = Arc::new(Mutex::new(AuctionStatus::Active));

        let mut db = MockDatabase::new();
        let status_reader = status.clone();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, creator, status_reader.lock().unwrap().clone(), "1800");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(move |ids| {
            Ok(vec![
                bid_row(ids[0], member, "1800", 20),
                bid_row(ids[0], creator, "1500", 0),
            ])
        });
        let status_writer = status.clone();
        db.expect_set_closed().times(1).returning(move |_, _| {
            *status_writer.lock().unwrap() = AuctionStatus::Closed;
            Ok(true)
        });
        db.expect_set_winner().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let auction = service
            .close_auction(CloseAuctionInput {
                group_id: Uuid::new_v4(),
                auction_id,
                user_id: organizer,
            })
            .await
            .unwrap();
        assert_eq!(auction.status, crate::auction::entities::AuctionStatus::Closed);
    }

    #[tokio::test]
    async fn closing_with_only_the_seed_bid_crowns_the_creator() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, creator, AuctionStatus::Active, "1500");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids()
            .returning(move |ids| Ok(vec![bid_row(ids[0], creator, "1500", 0)]));
        db.expect_set_winner()
            .times(1)
            .withf(move |update| {
                update.winner_id == creator
                    && update.winning_amount == amount("1500")
                    && update.due_at - update.declared_at == time::Duration::hours(24)
            })
            .returning(|_| Ok(true));
        db.expect_set_closed().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reclosing_a_closed_auction_succeeds() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, creator, AuctionStatus::Closed, "1800");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(move |ids| {
            Ok(vec![
                bid_row(ids[0], member, "1800", 20),
                bid_row(ids[0], creator, "1500", 0),
            ])
        });
        db.expect_set_closed().times(1).returning(|_, _| Ok(true));
        db.expect_set_winner().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let auction = service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap();
        assert_eq!(auction.status, crate::auction::entities::AuctionStatus::Closed);
    }

    #[tokio::test]
    async fn closed_auction_with_only_the_seed_bid_is_still_auto_won() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, creator, AuctionStatus::Closed, "1500");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids()
            .returning(move |ids| Ok(vec![bid_row(ids[0], creator, "1500", 0)]));
        db.expect_set_winner()
            .times(1)
            .withf(move |update| update.winner_id == creator)
            .returning(|_| Ok(true));
        db.expect_set_closed().never();

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closing_a_won_auction_is_rejected() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, Uuid::new_v4(), AuctionStatus::Won, "1500");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(|_| Ok(vec![]));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::InvalidState("Auction winner already declared".to_string())
        );
    }

    #[tokio::test]
    async fn stale_close_is_refused_when_the_row_moved_on() {
        let organizer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let mut db = MockDatabase::new();
        db.expect_get_auction().returning(move |group_id, id| {
            let mut row = auction_row(group_id, creator, AuctionStatus::Active, "1800");
            row.id = id;
            Ok(Some(row))
        });
        db.expect_get_bids().returning(move |ids| {
            Ok(vec![
                bid_row(ids[0], member, "1800", 20),
                bid_row(ids[0], creator, "1500", 0),
            ])
        });
        // A bid landed after the read, so the versioned update misses.
        db.expect_set_closed().returning(|_, _| Ok(false));

        let service = service(db, organizer, member, MockEscrowDatabase::new());
        let err = service
            .close_auction(CloseAuctionInput {
                group_id:   Uuid::new_v4(),
                auction_id: Uuid::new_v4(),
                user_id:    organizer,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RestError::InvalidState("Auction was updated concurrently".to_string())
        );
    }
}
