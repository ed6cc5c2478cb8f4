use {
    super::escrow::PaymentInitiation,
    crate::{
        api::{
            Auth,
            ErrorBodyResponse,
            RestError,
        },
        auction::{
            entities,
            service::{
                CloseAuctionInput,
                ConfirmPaymentInput,
                CreateAuctionInput,
                DeclareWinnerInput,
                GetAuctionsInput,
                PlaceBidInput,
                ProceedPaymentInput,
                ReopenAuctionInput,
            },
        },
        group,
        kernel::entities::{
            AuctionId,
            BidId,
            GroupId,
            TransactionId,
            UserId,
        },
        state::StoreNew,
    },
    axum::{
        extract::{
            Path,
            State,
        },
        Json,
    },
    bigdecimal::ToPrimitive,
    serde::{
        Deserialize,
        Serialize,
    },
    std::sync::Arc,
    time::OffsetDateTime,
    utoipa::ToSchema,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuctionStatus {
    Active,
    Closed,
    Won,
}

impl From<entities::AuctionStatus> for AuctionStatus {
    fn from(status: entities::AuctionStatus) -> Self {
        match status {
            entities::AuctionStatus::Active => AuctionStatus::Active,
            entities::AuctionStatus::Closed => AuctionStatus::Closed,
            entities::AuctionStatus::Won => AuctionStatus::Won,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    #[schema(value_type = String)]
    pub id:          BidId,
    #[schema(value_type = String)]
    pub auction_id:  AuctionId,
    #[schema(value_type = String)]
    pub bidder_id:   UserId,
    pub bidder_name: String,
    pub bid_amount:  f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at:  OffsetDateTime,
}

impl From<entities::Bid> for Bid {
    fn from(bid: entities::Bid) -> Self {
        Self {
            id:          bid.id,
            auction_id:  bid.auction_id,
            bidder_id:   bid.bidder_id,
            bidder_name: bid.bidder_name,
            bid_amount:  bid.amount.to_f64().unwrap_or_default(),
            created_at:  bid.creation_time,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    #[schema(value_type = String)]
    pub id: AuctionId,
    #[schema(value_type = String)]
    pub group_id: GroupId,
    pub state: Option<String>,
    pub city: Option<String>,
    #[schema(value_type = String)]
    pub created_by: UserId,
    pub created_by_name: String,
    pub highest_bid: f64,
    pub reason: Option<String>,
    pub round_number: Option<i32>,
    pub status: AuctionStatus,
    #[schema(value_type = Option<String>)]
    pub winner_id: Option<UserId>,
    pub winner_name: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub winner_declared_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub winner_payment_due_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub winner_paid_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub bids: Vec<Bid>,
    pub total_bids: usize,
    /// Whether the requesting user is the declared, not-yet-paid winner and may
    /// initiate settlement.
    pub can_current_user_proceed_payment: bool,
}

impl Auction {
    pub fn from_entity(auction: entities::Auction, user_id: UserId) -> Self {
        let can_proceed = auction.can_proceed_payment(user_id);
        Self {
            id: auction.id,
            group_id: auction.group_id,
            state: auction.state,
            city: auction.city,
            created_by: auction.created_by,
            created_by_name: auction.created_by_name,
            highest_bid: auction.highest_bid.to_f64().unwrap_or_default(),
            reason: auction.reason,
            round_number: auction.round_number,
            status: auction.status.into(),
            winner_id: auction.winner_id,
            winner_name: auction.winner_name,
            winner_declared_at: auction.winner_declared_at,
            winner_payment_due_at: auction.winner_payment_due_at,
            winner_paid_at: auction.winner_paid_at,
            created_at: auction.creation_time,
            updated_at: auction.update_time,
            total_bids: auction.bids.len(),
            bids: auction.bids.into_iter().map(Bid::from).collect(),
            can_current_user_proceed_payment: can_proceed,
        }
    }
}

/// The caller's role facts within the group, echoed so clients can render the
/// organizer controls without a second round trip.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessFacts {
    pub is_organizer:       bool,
    pub is_approved_member: bool,
}

impl From<group::entities::GroupAccess> for AccessFacts {
    fn from(access: group::entities::GroupAccess) -> Self {
        Self {
            is_organizer:       access.is_organizer,
            is_approved_member: access.is_approved_member,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuctionsResponse {
    pub data:   Vec<Auction>,
    pub access: AccessFacts,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuction {
    /// The creator's opening bid in whole currency units.
    #[schema(example = 1500.0)]
    pub bid_amount:   f64,
    pub reason:       Option<String>,
    pub round_number: Option<i32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBid {
    #[schema(example = 1800.0)]
    pub bid_amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeclareWinner {
    /// Leave empty to let the best bid win.
    #[schema(value_type = Option<String>)]
    pub winner_id: Option<UserId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    #[schema(value_type = String)]
    pub transaction_id: TransactionId,
}

/// List the group's auctions, newest first.
#[utoipa::path(get, path = "/v1/groups/{group_id}/auctions",
    params(("group_id" = String, Path, description = "The chit group to list auctions for")),
    responses(
        (status = 200, description = "The group's auctions and the caller's role facts", body = AuctionsResponse),
        (status = 404, description = "Group was not found", body = ErrorBodyResponse),
    ),
)]
pub async fn get_auctions(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path(group_id): Path<GroupId>,
) -> Result<Json<AuctionsResponse>, RestError> {
    let user_id = auth.user.id;
    let (auctions, access) = store
        .auction_service
        .get_auctions(GetAuctionsInput { group_id, user_id })
        .await?;
    Ok(Json(AuctionsResponse {
        data:   auctions
            .into_iter()
            .map(|auction| Auction::from_entity(auction, user_id))
            .collect(),
        access: access.into(),
    }))
}

/// Open a new auction with the caller's opening bid.
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions",
    params(("group_id" = String, Path, description = "The chit group to open the auction in")),
    request_body = CreateAuction,
    responses(
        (status = 200, description = "The newly opened auction", body = Auction),
        (status = 400, response = ErrorBodyResponse),
    ),
)]
pub async fn post_auction(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path(group_id): Path<GroupId>,
    Json(params): Json<CreateAuction>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .create_auction(CreateAuctionInput {
            group_id,
            user_id,
            bid_amount: params.bid_amount,
            reason: params.reason,
            round_number: params.round_number,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}

/// Place a bid on an active auction.
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/bids",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The auction to bid on"),
    ),
    request_body = PlaceBid,
    responses(
        (status = 200, description = "The auction including the accepted bid", body = Auction),
        (status = 429, description = "The bidder must wait out the cooldown", body = ErrorBodyResponse),
    ),
)]
pub async fn post_bid(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
    Json(params): Json<PlaceBid>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .place_bid(PlaceBidInput {
            group_id,
            auction_id,
            user_id,
            bid_amount: params.bid_amount,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}

/// Close an active auction (organizer only).
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/close",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The auction to close"),
    ),
    responses(
        (status = 200, description = "The closed auction; the creator wins outright when unchallenged", body = Auction),
        (status = 403, description = "Caller is not the organizer", body = ErrorBodyResponse),
    ),
)]
pub async fn post_close(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .close_auction(CloseAuctionInput {
            group_id,
            auction_id,
            user_id,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}

/// Declare the auction winner and open their payment window (organizer only).
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/winner",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The auction to declare a winner for"),
    ),
    request_body = DeclareWinner,
    responses(
        (status = 200, description = "The auction with its declared winner", body = Auction),
        (status = 400, response = ErrorBodyResponse),
    ),
)]
pub async fn post_winner(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
    Json(params): Json<DeclareWinner>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .declare_winner(DeclareWinnerInput {
            group_id,
            auction_id,
            user_id,
            winner_id: params.winner_id,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}

/// Reopen a won auction whose winner let the payment window lapse (organizer only).
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/reopen",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The auction to reopen"),
    ),
    responses(
        (status = 200, description = "The auction back in ACTIVE with winner fields cleared", body = Auction),
        (status = 400, response = ErrorBodyResponse),
    ),
)]
pub async fn post_reopen(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .reopen_auction(ReopenAuctionInput {
            group_id,
            auction_id,
            user_id,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}

/// Initiate settlement of the winning amount (declared winner only).
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/proceed-payment",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The won auction to settle"),
    ),
    responses(
        (status = 200, description = "The pending escrow transaction and its gateway order", body = PaymentInitiation),
        (status = 403, description = "Caller is not the declared winner", body = ErrorBodyResponse),
    ),
)]
pub async fn post_proceed_payment(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
) -> Result<Json<PaymentInitiation>, RestError> {
    let (transaction, order) = store
        .auction_service
        .proceed_payment(ProceedPaymentInput {
            group_id,
            auction_id,
            user_id: auth.user.id,
        })
        .await?;
    Ok(Json(PaymentInitiation::new(transaction, order, Some(auction_id))))
}

/// Complete the auction by submitting the settled escrow transaction (winner only).
#[utoipa::path(post, path = "/v1/groups/{group_id}/auctions/{auction_id}/confirm-payment",
    params(
        ("group_id" = String, Path, description = "The chit group the auction belongs to"),
        ("auction_id" = String, Path, description = "The won auction being settled"),
    ),
    request_body = ConfirmPayment,
    responses(
        (status = 200, description = "The auction with its winner marked paid", body = Auction),
        (status = 400, response = ErrorBodyResponse),
    ),
)]
pub async fn post_confirm_payment(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path((group_id, auction_id)): Path<(GroupId, AuctionId)>,
    Json(params): Json<ConfirmPayment>,
) -> Result<Json<Auction>, RestError> {
    let user_id = auth.user.id;
    let auction = store
        .auction_service
        .confirm_payment(ConfirmPaymentInput {
            group_id,
            auction_id,
            user_id,
            transaction_id: params.transaction_id,
        })
        .await?;
    Ok(Json(Auction::from_entity(auction, user_id)))
}
