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

pub struct DeclareWinnerInput {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
    /// Explicit winner override; when absent the best bid wins (highest amount,
    /// earliest on ties).
    pub winner_id:  Option<UserId>,
}

impl ServiceInner {
    /// Declares the auction winner and opens their payment window. An explicitly
    /// named winner must have bid; their best bid becomes the winning amount.
    /// Re-declaring on a WON auction is the organizer's override: the winner is
    /// replaced, the window restarts and any prior paid stamp is cleared.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, user_id = %input.user_id))]
    pub async fn declare_winner(
        &self,
        input: DeclareWinnerInput,
    ) -> Result<entities::Auction, RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        if !access.is_organizer {
            return Err(RestError::Forbidden(
                "Only organizer can declare winners".to_string(),
            ));
        }
        let auction = self.repo.get_auction(input.group_id, input.auction_id).await?;
        if auction.bids.is_empty() {
            return Err(RestError::InvalidState(
                "Cannot declare winner without bids".to_string(),
            ));
        }
        let winning_bid = match input.winner_id {
            Some(winner_id) => auction.winning_bid_for(winner_id).ok_or_else(|| {
                RestError::BadParameters("Winner must be a bidder in this auction".to_string())
            })?,
            None => self::winning_bid(&auction)?,
        };

        let now = OffsetDateTime::now_utc();
        let updated = self
            .repo
            .db
            .set_winner(WinnerUpdate {
                auction_id: auction.id,
                winner_id: winning_bid.bidder_id,
                winning_amount: winning_bid.amount.clone(),
                declared_at: now,
                due_at: now + self.config.payment_window,
                expected_update_time: auction.update_time,
            })
            .await?;
        if !updated {
            return Err(RestError::InvalidState(
                "Auction was updated concurrently".to_string(),
            ));
        }
        self.repo.get_auction(input.group_id, input.auction_id).await
    }
}

fn winning_bid(auction: &entities::Auction) -> Result<&entities::Bid, RestError> {
    auction.select_winning_bid().ok_or_else(|| {
        RestError::InvalidState("Cannot declare winner without bids".to_string())
    })
}
