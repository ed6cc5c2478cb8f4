use {
    crate::{
        api::{
            Auth,
            ErrorBodyResponse,
            RestError,
        },
        escrow::entities,
        kernel::{
            entities::{
                AuctionId,
                GroupId,
                TransactionId,
            },
            gateway::PaymentOrder,
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
    utoipa::ToSchema,
};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// The contribution in whole currency units; fractions are rounded.
    #[schema(example = 2000.0)]
    pub amount: f64,
}

/// A pending escrow transaction paired with the gateway order the payer should
/// complete. Funds move only once the gateway confirms.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    #[schema(value_type = String)]
    pub transaction_id: TransactionId,
    pub order_id:       String,
    /// Order amount in the gateway's smallest currency unit (paise).
    pub amount:         i64,
    pub currency:       String,
    #[schema(value_type = Option<String>)]
    pub auction_id:     Option<AuctionId>,
}

impl PaymentInitiation {
    pub fn new(
        transaction: entities::EscrowTransaction,
        order: PaymentOrder,
        auction_id: Option<AuctionId>,
    ) -> Self {
        Self {
            transaction_id: transaction.id,
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            auction_id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EscrowBalance {
    pub total_collected:      f64,
    pub locked_amount:        f64,
    pub available_for_payout: f64,
}

impl From<entities::EscrowAccount> for EscrowBalance {
    fn from(account: entities::EscrowAccount) -> Self {
        let available = account.available_for_payout().to_f64().unwrap_or_default();
        Self {
            total_collected:      account.total_collected.to_f64().unwrap_or_default(),
            locked_amount:        account.locked_amount.to_f64().unwrap_or_default(),
            available_for_payout: available,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmedWebhook {
    #[schema(value_type = String)]
    pub transaction_id: TransactionId,
    /// The gateway's own payment reference, stored for reconciliation.
    pub gateway_txn_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailedWebhook {
    #[schema(value_type = String)]
    pub transaction_id:    TransactionId,
    pub error_description: Option<String>,
}

/// Contribute to the group's escrow. First-time contributors are admitted as
/// members once the payment is confirmed.
#[utoipa::path(post, path = "/v1/groups/{group_id}/contributions",
    params(("group_id" = String, Path, description = "The chit group to contribute to")),
    request_body = Contribution,
    responses(
        (status = 200, description = "The pending transaction and its gateway order", body = PaymentInitiation),
        (status = 404, description = "Group was not found", body = ErrorBodyResponse),
    ),
)]
pub async fn post_contribution(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path(group_id): Path<GroupId>,
    Json(params): Json<Contribution>,
) -> Result<Json<PaymentInitiation>, RestError> {
    let (transaction, order) = store
        .escrow_service
        .contribute(group_id, auth.user.id, params.amount)
        .await?;
    Ok(Json(PaymentInitiation::new(transaction, order, None)))
}

/// The group's escrow balance (members only).
#[utoipa::path(get, path = "/v1/groups/{group_id}/escrow",
    params(("group_id" = String, Path, description = "The chit group to inspect")),
    responses(
        (status = 200, description = "The escrow counters", body = EscrowBalance),
        (status = 404, description = "No escrow account exists for the group yet", body = ErrorBodyResponse),
    ),
)]
pub async fn get_escrow_balance(
    State(store): State<Arc<StoreNew>>,
    auth: Auth,
    Path(group_id): Path<GroupId>,
) -> Result<Json<EscrowBalance>, RestError> {
    let account = store
        .escrow_service
        .get_balance(group_id, auth.user.id)
        .await?;
    Ok(Json(account.into()))
}

/// Payment gateway confirmation callback. Settles the transaction, credits the
/// escrow and admits first-time contributors; replays are acknowledged without
/// crediting twice.
#[utoipa::path(post, path = "/v1/webhooks/payments/confirmed",
    request_body = PaymentConfirmedWebhook,
    responses(
        (status = 200, description = "The payment was settled"),
        (status = 404, description = "Transaction was not found", body = ErrorBodyResponse),
    ),
)]
pub async fn post_payment_confirmed(
    State(store): State<Arc<StoreNew>>,
    Json(params): Json<PaymentConfirmedWebhook>,
) -> Result<Json<()>, RestError> {
    store
        .escrow_service
        .handle_payment_confirmed(params.transaction_id, params.gateway_txn_id)
        .await?;
    Ok(Json(()))
}

/// Payment gateway failure callback.
#[utoipa::path(post, path = "/v1/webhooks/payments/failed",
    request_body = PaymentFailedWebhook,
    responses(
        (status = 200, description = "The transaction was marked failed"),
        (status = 404, description = "Transaction was not found", body = ErrorBodyResponse),
    ),
)]
pub async fn post_payment_failed(
    State(store): State<Arc<StoreNew>>,
    Json(params): Json<PaymentFailedWebhook>,
) -> Result<Json<()>, RestError> {
    if let Some(description) = &params.error_description {
        tracing::warn!(transaction_id = %params.transaction_id, description, "Payment failed");
    }
    store
        .escrow_service
        .handle_payment_failed(params.transaction_id)
        .await?;
    Ok(Json(()))
}
