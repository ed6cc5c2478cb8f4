use {
    crate::{
        config::RunOptions,
        kernel::entities::User,
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
        state::StoreNew,
    },
    anyhow::Result,
    axum::{
        async_trait,
        extract::FromRequestParts,
        http::{
            request::Parts,
            StatusCode,
        },
        response::{
            IntoResponse,
            Response,
        },
        routing::{
            get,
            post,
        },
        Json,
        Router,
    },
    axum_extra::{
        headers::{
            authorization::Bearer,
            Authorization,
        },
        TypedHeader,
    },
    clap::crate_version,
    serde::Serialize,
    std::sync::{
        atomic::Ordering,
        Arc,
    },
    tower_http::cors::CorsLayer,
    utoipa::{
        OpenApi,
        ToResponse,
        ToSchema,
    },
    utoipa_redoc::{
        Redoc,
        Servable,
    },
};

pub mod auction;
pub mod escrow;

async fn root() -> String {
    format!("Chit Auction Server API {}", crate_version!())
}

pub async fn live() -> Response {
    (StatusCode::OK, "OK").into_response()
}

#[derive(Clone, Debug, PartialEq)]
pub enum RestError {
    /// The request contained invalid parameters.
    BadParameters(String),
    /// The operation is not legal in the auction's current status.
    InvalidState(String),
    /// The caller lacks the required role or ownership.
    Forbidden(String),
    /// The caller did not present a valid access token.
    Unauthorized,
    /// The group was not found.
    GroupNotFound,
    /// The auction was not found.
    AuctionNotFound,
    /// The escrow transaction was not found.
    TransactionNotFound,
    /// The escrow account was not found.
    EscrowAccountNotFound,
    /// The bidder must wait for the anti-spam cooldown to elapse.
    RateLimited,
    /// The storage schema has not been provisioned yet.
    SchemaNotProvisioned,
    /// The external payment gateway rejected or failed the request.
    PaymentGatewayError(String),
    /// Internal error occurred during processing the request.
    TemporarilyUnavailable,
}

impl RestError {
    pub fn to_status_and_message(&self) -> (StatusCode, String) {
        match self {
            RestError::BadParameters(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad parameters: {}", msg))
            }
            RestError::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RestError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            RestError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing access token".to_string(),
            ),
            RestError::GroupNotFound => (StatusCode::NOT_FOUND, "Group not found".to_string()),
            RestError::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                "Auction with the specified id was not found".to_string(),
            ),
            RestError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "Transaction with the specified id was not found".to_string(),
            ),
            RestError::EscrowAccountNotFound => {
                (StatusCode::NOT_FOUND, "Escrow account not found".to_string())
            }
            RestError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Please wait a few seconds before placing another bid".to_string(),
            ),
            RestError::SchemaNotProvisioned => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Auction storage schema is not provisioned; run the database migrations and restart"
                    .to_string(),
            ),
            RestError::PaymentGatewayError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            RestError::TemporarilyUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "This service is temporarily unavailable".to_string(),
            ),
        }
    }
}

#[derive(ToResponse, ToSchema, Serialize)]
#[response(description = "An error occurred processing the request")]
pub struct ErrorBodyResponse {
    error: String,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, msg) = self.to_status_and_message();
        (status, Json(ErrorBodyResponse { error: msg })).into_response()
    }
}

/// The authenticated caller, resolved from the bearer access token.
pub struct Auth {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<Arc<StoreNew>> for Auth {
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<StoreNew>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| RestError::Unauthorized)?;
        let user = state
            .store
            .get_user_by_access_token(bearer.token())
            .await?
            .ok_or(RestError::Unauthorized)?;
        Ok(Auth { user })
    }
}

pub async fn start_api(run_options: RunOptions, store: Arc<StoreNew>) -> Result<()> {
    // Make sure functions included in the paths section have distinct names, otherwise some api
    // generators will fail
    #[derive(OpenApi)]
    #[openapi(
    paths(
    auction::get_auctions,
    auction::post_auction,
    auction::post_bid,
    auction::post_close,
    auction::post_winner,
    auction::post_reopen,
    auction::post_proceed_payment,
    auction::post_confirm_payment,
    escrow::post_contribution,
    escrow::get_escrow_balance,
    escrow::post_payment_confirmed,
    escrow::post_payment_failed,
    ),
    components(
    schemas(
    auction::Auction,
    auction::AuctionStatus,
    auction::Bid,
    auction::AuctionsResponse,
    auction::AccessFacts,
    auction::CreateAuction,
    auction::PlaceBid,
    auction::DeclareWinner,
    auction::ConfirmPayment,
    escrow::Contribution,
    escrow::PaymentInitiation,
    escrow::EscrowBalance,
    escrow::PaymentConfirmedWebhook,
    escrow::PaymentFailedWebhook,
    ErrorBodyResponse,
    ),
    responses(
    ErrorBodyResponse,
    ),
    ),
    tags(
    (name = "Chit Auction Server", description = "The auction server operates the per-cycle \
    reverse-bid auctions of chit fund groups and settles the winning bid through the group's \
    escrow ledger.")
    )
    )]
    struct ApiDoc;

    let auction_routes = Router::new()
        .route("/", get(auction::get_auctions).post(auction::post_auction))
        .route("/:auction_id/bids", post(auction::post_bid))
        .route("/:auction_id/close", post(auction::post_close))
        .route("/:auction_id/winner", post(auction::post_winner))
        .route("/:auction_id/reopen", post(auction::post_reopen))
        .route(
            "/:auction_id/proceed-payment",
            post(auction::post_proceed_payment),
        )
        .route(
            "/:auction_id/confirm-payment",
            post(auction::post_confirm_payment),
        );
    let group_routes = Router::new()
        .nest("/:group_id/auctions", auction_routes)
        .route("/:group_id/contributions", post(escrow::post_contribution))
        .route("/:group_id/escrow", get(escrow::get_escrow_balance));
    let webhook_routes = Router::new()
        .route("/payments/confirmed", post(escrow::post_payment_confirmed))
        .route("/payments/failed", post(escrow::post_payment_failed));

    let v1_routes = Router::new().nest(
        "/v1",
        Router::new()
            .nest("/groups", group_routes)
            .nest("/webhooks", webhook_routes),
    );

    let app: Router<()> = Router::new()
        .merge(Redoc::with_url("/docs", ApiDoc::openapi()))
        .merge(v1_routes)
        .route("/", get(root))
        .route("/live", get(live))
        .layer(CorsLayer::permissive())
        .with_state(store);

    let listener = tokio::net::TcpListener::bind(&run_options.server.listen_addr).await?;
    tracing::info!(addr = %run_options.server.listen_addr, "Starting API server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            while !SHOULD_EXIT.load(Ordering::Acquire) {
                tokio::time::sleep(EXIT_CHECK_INTERVAL).await;
            }
            tracing::info!("Shutting down API server...");
        })
        .await?;
    Ok(())
}
