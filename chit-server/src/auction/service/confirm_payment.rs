use {
    super::ServiceInner,
    crate::{
        api::RestError,
        auction::entities,
        escrow::entities::TransactionStatus,
        kernel::entities::{
            AuctionId,
            GroupId,
            TransactionId,
            UserId,
        },
    },
    bigdecimal::ToPrimitive,
    sqlx::types::BigDecimal,
    time::OffsetDateTime,
};

pub struct ConfirmPaymentInput {
    pub group_id:       GroupId,
    pub auction_id:     AuctionId,
    pub user_id:        UserId,
    pub transaction_id: TransactionId,
}

impl ServiceInner {
    /// The winner submits their settled escrow transaction to complete the auction.
    /// The transaction must belong to the winner and this group, be CONFIRMED, and
    /// cover the winning amount; only then is the winner marked paid.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, transaction_id = %input.transaction_id))]
    pub async fn confirm_payment(
        &self,
        input: ConfirmPaymentInput,
    ) -> Result<entities::Auction, RestError> {
        self.get_checked_access(input.group_id, input.user_id).await?;
        let auction = self.repo.get_auction(input.group_id, input.auction_id).await?;
        if auction.status != entities::AuctionStatus::Won
            || auction.winner_id != Some(input.user_id)
        {
            return Err(RestError::Forbidden(
                "Only winner can confirm payment".to_string(),
            ));
        }
        if auction.winner_paid_at.is_some() {
            return Err(RestError::InvalidState(
                "Winner payment already completed".to_string(),
            ));
        }
        // No deadline check here: a late gateway confirmation still completes the
        // auction as long as the organizer has not reopened it. The reopen update
        // is guarded on the paid stamp, so the two can never both win.
        let transaction = self.escrow_service.get_transaction(input.transaction_id).await?;
        if transaction.user_id != input.user_id {
            return Err(RestError::Forbidden(
                "Transaction does not belong to winner".to_string(),
            ));
        }
        if transaction.chit_group_id != input.group_id {
            return Err(RestError::BadParameters(
                "Transaction does not belong to this group".to_string(),
            ));
        }
        if transaction.status != TransactionStatus::Confirmed {
            return Err(RestError::InvalidState(
                "Payment is not confirmed yet".to_string(),
            ));
        }
        // Settlement happens in whole currency units, so the confirmed amount is
        // held against the rounded winning amount.
        let winning_amount = auction.highest_bid.to_f64().ok_or_else(|| {
            RestError::BadParameters("Bid amount must be a positive number".to_string())
        })?;
        let expected = crate::escrow::service::ServiceInner::settle_amount(winning_amount)?;
        if transaction.amount < BigDecimal::from(expected) {
            return Err(RestError::InvalidState(
                "Confirmed payment is less than winning amount".to_string(),
            ));
        }

        if !self
            .repo
            .db
            .set_winner_paid(auction.id, input.user_id, OffsetDateTime::now_utc())
            .await?
        {
            return Err(RestError::InvalidState(
                "Winner payment already completed".to_string(),
            ));
        }
        self.repo.get_auction(input.group_id, input.auction_id).await
    }
}
