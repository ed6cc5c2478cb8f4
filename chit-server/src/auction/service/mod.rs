use {
    super::repository::{
        Database,
        Repository,
    },
    crate::{
        api::RestError,
        escrow,
        group,
        kernel::entities::{
            GroupId,
            UserId,
        },
    },
    sqlx::types::BigDecimal,
    std::sync::Arc,
    time::Duration,
};

mod close_auction;
mod confirm_payment;
mod create_auction;
mod declare_winner;
mod get_auctions;
mod place_bid;
mod proceed_payment;
mod reopen_auction;

pub use {
    close_auction::CloseAuctionInput,
    confirm_payment::ConfirmPaymentInput,
    create_auction::CreateAuctionInput,
    declare_winner::DeclareWinnerInput,
    get_auctions::GetAuctionsInput,
    place_bid::PlaceBidInput,
    proceed_payment::ProceedPaymentInput,
    reopen_auction::ReopenAuctionInput,
};

pub struct Config {
    pub payment_window: Duration,
    pub bid_cooldown:   Duration,
}

pub struct ServiceInner {
    config:         Config,
    repo:           Repository,
    group_service:  group::service::Service,
    escrow_service: escrow::service::Service,
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
    pub fn new(
        db: impl Database,
        config: Config,
        group_service: group::service::Service,
        escrow_service: escrow::service::Service,
    ) -> Self {
        Self(Arc::new(ServiceInner {
            config,
            repo: Repository::new(db),
            group_service,
            escrow_service,
        }))
    }
}

impl ServiceInner {
    /// The access guard shared by all auction operations: the caller must be the
    /// group's organizer or an ACTIVE member. The group's existence is checked
    /// first, so unknown groups 404 before any role check.
    pub(super) async fn get_checked_access(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<group::entities::GroupAccess, RestError> {
        let access = self.group_service.get_access(group_id, user_id).await?;
        if !access.can_access_auctions() {
            return Err(RestError::Forbidden(
                "Only group members can access auctions".to_string(),
            ));
        }
        Ok(access)
    }
}

pub(super) fn bid_amount_from(value: f64) -> Result<BigDecimal, RestError> {
    use bigdecimal::FromPrimitive;
    if !value.is_finite() || value <= 0.0 {
        return Err(RestError::BadParameters(
            "Bid amount must be a positive number".to_string(),
        ));
    }
    BigDecimal::from_f64(value).ok_or_else(|| {
        RestError::BadParameters("Bid amount must be a positive number".to_string())
    })
}
