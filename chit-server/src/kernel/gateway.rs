#[cfg(test)]
use mockall::automock;
use {
    crate::{
        api::RestError,
        kernel::entities::TransactionId,
    },
    axum::async_trait,
    serde::{
        Deserialize,
        Serialize,
    },
};

const CURRENCY: &str = "INR";

/// An order handle returned by the external payment gateway. The `amount` is in the
/// gateway's smallest currency unit (paise).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id:       String,
    pub amount:   i64,
    pub currency: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Creates a payment order for the given whole-currency amount, tagged with the
    /// escrow transaction id so the gateway confirmation can be correlated back.
    async fn create_order(
        &self,
        amount: i64,
        receipt: TransactionId,
    ) -> Result<PaymentOrder, RestError>;
}

#[derive(Debug)]
pub struct RazorpayGateway {
    client:     reqwest::Client,
    base_url:   String,
    key_id:     String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderRequest {
    amount:   i64,
    currency: &'static str,
    receipt:  String,
}

impl RazorpayGateway {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[tracing::instrument(skip_all, fields(receipt = %receipt, amount))]
    async fn create_order(
        &self,
        amount: i64,
        receipt: TransactionId,
    ) -> Result<PaymentOrder, RestError> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(RestError::PaymentGatewayError(
                "Payment gateway is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                // The gateway works in paise and requires an integer amount.
                amount: amount * 100,
                currency: CURRENCY,
                receipt: receipt.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach payment gateway");
                RestError::PaymentGatewayError("Failed to create payment order".to_string())
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RestError::PaymentGatewayError(
                "Payment gateway authentication failed".to_string(),
            ));
        }
        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "Payment gateway rejected order");
            return Err(RestError::PaymentGatewayError(
                "Failed to create payment order".to_string(),
            ));
        }

        response.json::<PaymentOrder>().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to decode payment gateway response");
            RestError::PaymentGatewayError("Invalid payment gateway response".to_string())
        })
    }
}
