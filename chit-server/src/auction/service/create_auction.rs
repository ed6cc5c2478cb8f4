use {
    super::{
        bid_amount_from,
        ServiceInner,
    },
    crate::{
        api::RestError,
        auction::{
            entities,
            repository::NewAuction,
        },
        kernel::entities::{
            GroupId,
            UserId,
        },
    },
};

pub struct CreateAuctionInput {
    pub group_id:     GroupId,
    pub user_id:      UserId,
    pub bid_amount:   f64,
    pub reason:       Option<String>,
    pub round_number: Option<i32>,
}

impl ServiceInner {
    /// Opens a new auction for the group with the creator's opening bid. The
    /// creator's bid seeds the ledger and sets the initial `highest_bid`.
    #[tracing::instrument(skip_all, fields(group_id = %input.group_id, user_id = %input.user_id))]
    pub async fn create_auction(
        &self,
        input: CreateAuctionInput,
    ) -> Result<entities::Auction, RestError> {
        let access = self.get_checked_access(input.group_id, input.user_id).await?;
        if !access.is_approved_member {
            return Err(RestError::Forbidden(
                "Only group members can create auctions".to_string(),
            ));
        }
        let bid_amount = bid_amount_from(input.bid_amount)?;
        let auction_id = self
            .repo
            .db
            .add_auction(NewAuction {
                group_id: input.group_id,
                state: access.group.state.clone(),
                city: access.group.city.clone(),
                created_by: input.user_id,
                bid_amount,
                reason: input.reason,
                round_number: input.round_number,
            })
            .await?;
        self.repo.get_auction(input.group_id, auction_id).await
    }
}
