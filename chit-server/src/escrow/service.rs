use {
    super::{
        entities,
        repository::{
            self,
            Database,
            NewTransaction,
            Repository,
        },
    },
    crate::{
        api::RestError,
        group,
        kernel::{
            entities::{
                GroupId,
                TransactionId,
                UserId,
            },
            gateway::{
                PaymentGateway,
                PaymentOrder,
            },
        },
    },
    sqlx::types::BigDecimal,
    std::sync::Arc,
};

pub struct ServiceInner {
    repo:          Repository,
    group_service: group::service::Service,
    gateway:       Arc<dyn PaymentGateway>,
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
        group_service: group::service::Service,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self(Arc::new(ServiceInner {
            repo: Repository::new(db),
            group_service,
            gateway,
        }))
    }
}

impl ServiceInner {
    /// Whole-currency settlement amount: rounded to the nearest unit with a floor
    /// of 1, since the gateway rejects zero-amount orders.
    pub fn settle_amount(amount: f64) -> Result<i64, RestError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RestError::BadParameters(
                "Amount must be a positive number".to_string(),
            ));
        }
        Ok((amount.round() as i64).max(1))
    }

    /// Records a PENDING contribution against the group's escrow account and opens a
    /// gateway order for it. The account is created lazily on first use. Funds move
    /// only when the gateway later confirms the transaction.
    #[tracing::instrument(skip_all, fields(group_id = %group_id, user_id = %user_id, amount))]
    pub async fn create_pending_contribution(
        &self,
        group_id: GroupId,
        user_id: UserId,
        amount: i64,
    ) -> Result<(entities::EscrowTransaction, PaymentOrder), RestError> {
        let account = self.repo.db.get_or_create_account(group_id).await?;
        let transaction_id = self
            .repo
            .db
            .add_transaction(NewTransaction {
                account_id: account.id,
                user_id,
                transaction_type: repository::TransactionType::Contribution,
                amount: BigDecimal::from(amount),
            })
            .await?;
        let order = self.gateway.create_order(amount, transaction_id).await?;
        let transaction = self
            .repo
            .db
            .get_transaction(transaction_id)
            .await?
            .ok_or(RestError::TransactionNotFound)?;
        Ok((transaction.get_transaction_entity(), order))
    }

    /// A voluntary contribution into the group's escrow. Contributors do not need
    /// to be members yet; they are admitted when the payment is confirmed.
    pub async fn contribute(
        &self,
        group_id: GroupId,
        user_id: UserId,
        amount: f64,
    ) -> Result<(entities::EscrowTransaction, PaymentOrder), RestError> {
        self.group_service.get_access(group_id, user_id).await?;
        let amount = Self::settle_amount(amount)?;
        self.create_pending_contribution(group_id, user_id, amount).await
    }

    pub async fn get_balance(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<entities::EscrowAccount, RestError> {
        let access = self.group_service.get_access(group_id, user_id).await?;
        if !access.can_access_auctions() {
            return Err(RestError::Forbidden(
                "Only group members can view the escrow balance".to_string(),
            ));
        }
        Ok(self
            .repo
            .db
            .get_account(group_id)
            .await?
            .ok_or(RestError::EscrowAccountNotFound)?
            .get_account_entity())
    }

    pub async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<entities::EscrowTransaction, RestError> {
        Ok(self
            .repo
            .db
            .get_transaction(transaction_id)
            .await?
            .ok_or(RestError::TransactionNotFound)?
            .get_transaction_entity())
    }

    /// Gateway confirmation webhook. Confirming settles the transaction, credits the
    /// escrow counters and admits a first-time contributor as a group member. A
    /// replayed confirmation is acknowledged without crediting twice.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn handle_payment_confirmed(
        &self,
        transaction_id: TransactionId,
        gateway_txn_id: Option<String>,
    ) -> Result<(), RestError> {
        match self
            .repo
            .db
            .confirm_transaction(transaction_id, gateway_txn_id)
            .await?
        {
            Some(transaction) => {
                self.group_service
                    .admit_contributor(transaction.chit_group_id, transaction.user_id)
                    .await
            }
            None => {
                let transaction = self
                    .repo
                    .db
                    .get_transaction(transaction_id)
                    .await?
                    .ok_or(RestError::TransactionNotFound)?;
                match transaction.status {
                    repository::TransactionStatus::Confirmed => Ok(()),
                    _ => Err(RestError::InvalidState(
                        "Transaction is not pending".to_string(),
                    )),
                }
            }
        }
    }

    /// Gateway failure webhook. Only PENDING transactions can fail; a replayed
    /// failure is acknowledged, anything else is rejected.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn handle_payment_failed(
        &self,
        transaction_id: TransactionId,
    ) -> Result<(), RestError> {
        if self.repo.db.fail_transaction(transaction_id).await? {
            return Ok(());
        }
        let transaction = self
            .repo
            .db
            .get_transaction(transaction_id)
            .await?
            .ok_or(RestError::TransactionNotFound)?;
        match transaction.status {
            repository::TransactionStatus::Failed => Ok(()),
            _ => Err(RestError::InvalidState(
                "Transaction is not pending".to_string(),
            )),
        }
    }
}
