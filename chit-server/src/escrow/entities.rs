use {
    crate::kernel::entities::{
        AccountId,
        GroupId,
        TransactionId,
        UserId,
    },
    sqlx::types::BigDecimal,
    time::OffsetDateTime,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscrowStatus {
    Active,
    Frozen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionType {
    Contribution,
    Payout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

/// The per-group escrow ledger. Counters are only ever moved by confirmed
/// transactions, inside the same unit of work that confirms them.
#[derive(Clone, Debug)]
pub struct EscrowAccount {
    pub id:              AccountId,
    pub chit_group_id:   GroupId,
    pub status:          EscrowStatus,
    pub total_collected: BigDecimal,
    pub locked_amount:   BigDecimal,
    pub total_released:  BigDecimal,
    pub creation_time:   OffsetDateTime,
}

impl EscrowAccount {
    pub fn available_for_payout(&self) -> BigDecimal {
        &self.total_collected - &self.locked_amount
    }
}

#[derive(Clone, Debug)]
pub struct EscrowTransaction {
    pub id:               TransactionId,
    pub account_id:       AccountId,
    pub chit_group_id:    GroupId,
    pub user_id:          UserId,
    pub transaction_type: TransactionType,
    pub amount:           BigDecimal,
    pub status:           TransactionStatus,
    pub gateway_txn_id:   Option<String>,
    pub creation_time:    OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::str::FromStr,
        uuid::Uuid,
    };

    #[test]
    fn available_for_payout_excludes_locked_funds() {
        let account = EscrowAccount {
            id:              Uuid::new_v4(),
            chit_group_id:   Uuid::new_v4(),
            status:          EscrowStatus::Active,
            total_collected: BigDecimal::from_str("5000").unwrap(),
            locked_amount:   BigDecimal::from_str("1200").unwrap(),
            total_released:  BigDecimal::from_str("0").unwrap(),
            creation_time:   OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        };
        assert_eq!(
            account.available_for_payout(),
            BigDecimal::from_str("3800").unwrap()
        );
    }
}
