#[cfg(test)]
use mockall::automock;
use {
    crate::{
        api::RestError,
        escrow::entities,
        kernel::{
            db::{
                classify_db_error,
                DB,
            },
            entities::{
                AccountId,
                GroupId,
                TransactionId,
                UserId,
            },
        },
    },
    axum::async_trait,
    sqlx::{
        types::BigDecimal,
        FromRow,
    },
    time::{
        OffsetDateTime,
        PrimitiveDateTime,
        UtcOffset,
    },
    tracing::instrument,
};

#[derive(Clone, Debug, PartialEq, sqlx::Type)]
#[sqlx(type_name = "escrow_status", rename_all = "UPPERCASE")]
pub enum EscrowStatus {
    Active,
    Frozen,
}

impl From<EscrowStatus> for entities::EscrowStatus {
    fn from(status: EscrowStatus) -> Self {
        match status {
            EscrowStatus::Active => entities::EscrowStatus::Active,
            EscrowStatus::Frozen => entities::EscrowStatus::Frozen,
        }
    }
}

#[derive(Clone, Debug, PartialEq, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "UPPERCASE")]
pub enum TransactionType {
    Contribution,
    Payout,
}

impl From<TransactionType> for entities::TransactionType {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Contribution => entities::TransactionType::Contribution,
            TransactionType::Payout => entities::TransactionType::Payout,
        }
    }
}

#[derive(Clone, Debug, PartialEq, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl From<TransactionStatus> for entities::TransactionStatus {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending => entities::TransactionStatus::Pending,
            TransactionStatus::Confirmed => entities::TransactionStatus::Confirmed,
            TransactionStatus::Failed => entities::TransactionStatus::Failed,
        }
    }
}

fn to_utc(time: PrimitiveDateTime) -> OffsetDateTime {
    time.assume_offset(UtcOffset::UTC)
}

#[derive(Clone, Debug, FromRow)]
pub struct Account {
    pub id:              AccountId,
    pub chit_group_id:   GroupId,
    pub status:          EscrowStatus,
    pub total_collected: BigDecimal,
    pub locked_amount:   BigDecimal,
    pub total_released:  BigDecimal,
    pub creation_time:   PrimitiveDateTime,
}

impl Account {
    pub fn get_account_entity(self) -> entities::EscrowAccount {
        entities::EscrowAccount {
            id:              self.id,
            chit_group_id:   self.chit_group_id,
            status:          self.status.into(),
            total_collected: self.total_collected,
            locked_amount:   self.locked_amount,
            total_released:  self.total_released,
            creation_time:   to_utc(self.creation_time),
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Transaction {
    pub id:                TransactionId,
    pub escrow_account_id: AccountId,
    pub chit_group_id:     GroupId,
    pub user_id:           UserId,
    pub transaction_type:  TransactionType,
    pub amount:            BigDecimal,
    pub status:            TransactionStatus,
    pub gateway_txn_id:    Option<String>,
    pub creation_time:     PrimitiveDateTime,
}

impl Transaction {
    pub fn get_transaction_entity(self) -> entities::EscrowTransaction {
        entities::EscrowTransaction {
            id:               self.id,
            account_id:       self.escrow_account_id,
            chit_group_id:    self.chit_group_id,
            user_id:          self.user_id,
            transaction_type: self.transaction_type.into(),
            amount:           self.amount,
            status:           self.status.into(),
            gateway_txn_id:   self.gateway_txn_id,
            creation_time:    to_utc(self.creation_time),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub account_id:       AccountId,
    pub user_id:          UserId,
    pub transaction_type: TransactionType,
    pub amount:           BigDecimal,
}

const ACCOUNT_COLUMNS: &str =
    "id, chit_group_id, status, total_collected, locked_amount, total_released, creation_time";

const TRANSACTION_SELECT: &str = "SELECT t.id, t.escrow_account_id, a.chit_group_id, t.user_id, \
     t.type AS transaction_type, t.amount, t.status, t.gateway_txn_id, t.creation_time \
     FROM escrow_transactions t \
     JOIN escrow_accounts a ON a.id = t.escrow_account_id";

pub struct Repository {
    pub db: Box<dyn Database>,
}

impl Repository {
    pub fn new(db: impl Database) -> Self {
        Self { db: Box::new(db) }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn get_or_create_account(&self, group_id: GroupId) -> Result<Account, RestError>;
    async fn get_account(&self, group_id: GroupId) -> Result<Option<Account>, RestError>;
    async fn add_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<TransactionId, RestError>;
    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, RestError>;
    async fn confirm_transaction(
        &self,
        transaction_id: TransactionId,
        gateway_txn_id: Option<String>,
    ) -> Result<Option<Transaction>, RestError>;
    async fn fail_transaction(&self, transaction_id: TransactionId) -> Result<bool, RestError>;
}

#[async_trait]
impl Database for DB {
    async fn get_or_create_account(&self, group_id: GroupId) -> Result<Account, RestError> {
        // The no-op DO UPDATE makes the upsert always return the row.
        sqlx::query_as(&format!(
            "INSERT INTO escrow_accounts (chit_group_id) VALUES ($1) \
             ON CONFLICT (chit_group_id) DO UPDATE SET chit_group_id = EXCLUDED.chit_group_id \
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(group_id)
        .fetch_one(self)
        .await
        .map_err(|e| classify_db_error(e, "get_or_create_account"))
    }

    async fn get_account(&self, group_id: GroupId) -> Result<Option<Account>, RestError> {
        sqlx::query_as(&format!(
            "SELECT {} FROM escrow_accounts WHERE chit_group_id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(self)
        .await
        .map_err(|e| classify_db_error(e, "get_account"))
    }

    #[instrument(name = "db_add_transaction", skip_all, fields(account_id = %transaction.account_id, user_id = %transaction.user_id))]
    async fn add_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<TransactionId, RestError> {
        sqlx::query_scalar(
            "INSERT INTO escrow_transactions (escrow_account_id, user_id, type, amount) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(transaction.account_id)
        .bind(transaction.user_id)
        .bind(&transaction.transaction_type)
        .bind(&transaction.amount)
        .fetch_one(self)
        .await
        .map_err(|e| classify_db_error(e, "add_transaction"))
    }

    async fn get_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, RestError> {
        sqlx::query_as(&format!("{} WHERE t.id = $1", TRANSACTION_SELECT))
            .bind(transaction_id)
            .fetch_optional(self)
            .await
            .map_err(|e| classify_db_error(e, "get_transaction"))
    }

    /// Settles a pending transaction. The status flip and the account counter
    /// increments commit together, and the PENDING guard makes a replayed
    /// confirmation a no-op rather than a double credit.
    #[instrument(name = "db_confirm_transaction", skip_all, fields(transaction_id = %transaction_id))]
    async fn confirm_transaction(
        &self,
        transaction_id: TransactionId,
        gateway_txn_id: Option<String>,
    ) -> Result<Option<Transaction>, RestError> {
        let mut tx = self
            .begin()
            .await
            .map_err(|e| classify_db_error(e, "confirm_transaction_begin"))?;
        let confirmed: Option<(AccountId, BigDecimal)> = sqlx::query_as(
            "UPDATE escrow_transactions \
             SET status = 'CONFIRMED', gateway_txn_id = COALESCE($2, gateway_txn_id) \
             WHERE id = $1 AND status = 'PENDING' \
             RETURNING escrow_account_id, amount",
        )
        .bind(transaction_id)
        .bind(gateway_txn_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "confirm_transaction_update"))?;

        let Some((account_id, amount)) = confirmed else {
            return Ok(None);
        };
        sqlx::query(
            "UPDATE escrow_accounts \
             SET total_collected = total_collected + $2, locked_amount = locked_amount + $2 \
             WHERE id = $1",
        )
        .bind(account_id)
        .bind(&amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "confirm_transaction_credit"))?;

        let transaction = sqlx::query_as(&format!("{} WHERE t.id = $1", TRANSACTION_SELECT))
            .bind(transaction_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify_db_error(e, "confirm_transaction_fetch"))?;
        tx.commit()
            .await
            .map_err(|e| classify_db_error(e, "confirm_transaction_commit"))?;
        Ok(Some(transaction))
    }

    async fn fail_transaction(&self, transaction_id: TransactionId) -> Result<bool, RestError> {
        let result = sqlx::query(
            "UPDATE escrow_transactions SET status = 'FAILED' \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(transaction_id)
        .execute(self)
        .await
        .map_err(|e| classify_db_error(e, "fail_transaction"))?;
        Ok(result.rows_affected() > 0)
    }
}
