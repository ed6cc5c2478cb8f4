use {
    super::ServiceInner,
    crate::{
        api::RestError,
        escrow::entities::EscrowTransaction,
        kernel::{
            entities::{
                AuctionId,
                GroupId,
                UserId,
            },
            gateway::PaymentOrder,
        },
    },
    bigdecimal::ToPrimitive,
    time::OffsetDateTime,
};

pub struct ProceedPaymentInput {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
}

impl ServiceInner {
    /// The declared winner initiates settlement of their winning amount: a PENDING
    /// escrow contribution is recorded and a gateway order opened for it. Nothing
    /// is credited until the gateway confirms.
    #[tracing::instrument(skip_all, fields(auction_id = %input.auction_id, user_id = %input.user_id))]
    pub async fn proceed_payment(
        &self,
        input: ProceedPaymentInput,
    ) -> Result<(EscrowTransaction, PaymentOrder), RestError> {
        self.get_checked_access(input.group_id, input.user_id).await?;
        let auction = self.repo.get_auction(input.group_id, input.auction_id).await?;
        if !auction.can_proceed_payment(input.user_id) {
            if auction.winner_id == Some(input.user_id) && auction.winner_paid_at.is_some() {
                return Err(RestError::InvalidState(
                    "Winner payment already completed".to_string(),
                ));
            }
            return Err(RestError::Forbidden(
                "Only declared winner can proceed to payment".to_string(),
            ));
        }
        if auction.payment_window_expired(OffsetDateTime::now_utc()) {
            return Err(RestError::InvalidState(
                "Payment window expired. Organizer can reopen auction.".to_string(),
            ));
        }
        let amount = auction.highest_bid.to_f64().ok_or_else(|| {
            RestError::BadParameters("Bid amount must be a positive number".to_string())
        })?;
        let amount = crate::escrow::service::ServiceInner::settle_amount(amount)?;
        self.escrow_service
            .create_pending_contribution(input.group_id, input.user_id, amount)
            .await
    }
}
