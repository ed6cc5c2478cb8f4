#[cfg(test)]
use mockall::automock;
use {
    crate::{
        api::RestError,
        auction::entities,
        kernel::{
            db::{
                classify_db_error,
                DB,
            },
            entities::{
                AuctionId,
                BidId,
                GroupId,
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
        Duration,
        OffsetDateTime,
        PrimitiveDateTime,
        UtcOffset,
    },
    tracing::instrument,
};

#[derive(Clone, Debug, PartialEq, sqlx::Type)]
#[sqlx(type_name = "auction_status", rename_all = "UPPERCASE")]
pub enum AuctionStatus {
    Active,
    Closed,
    Won,
}

impl From<AuctionStatus> for entities::AuctionStatus {
    fn from(status: AuctionStatus) -> Self {
        match status {
            AuctionStatus::Active => entities::AuctionStatus::Active,
            AuctionStatus::Closed => entities::AuctionStatus::Closed,
            AuctionStatus::Won => entities::AuctionStatus::Won,
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Auction {
    pub id:                    AuctionId,
    pub group_id:              GroupId,
    pub state:                 Option<String>,
    pub city:                  Option<String>,
    pub created_by:            UserId,
    pub created_by_name:       String,
    pub highest_bid:           BigDecimal,
    pub reason:                Option<String>,
    pub round_number:          Option<i32>,
    pub status:                AuctionStatus,
    pub winner_id:             Option<UserId>,
    pub winner_name:           Option<String>,
    pub winner_declared_at:    Option<PrimitiveDateTime>,
    pub winner_payment_due_at: Option<PrimitiveDateTime>,
    pub winner_paid_at:        Option<PrimitiveDateTime>,
    pub creation_time:         PrimitiveDateTime,
    pub update_time:           PrimitiveDateTime,
}

fn to_utc(time: PrimitiveDateTime) -> OffsetDateTime {
    time.assume_offset(UtcOffset::UTC)
}

impl Auction {
    pub fn get_auction_entity(self, bids: Vec<entities::Bid>) -> entities::Auction {
        entities::Auction {
            id: self.id,
            group_id: self.group_id,
            state: self.state,
            city: self.city,
            created_by: self.created_by,
            created_by_name: self.created_by_name,
            highest_bid: self.highest_bid,
            reason: self.reason,
            round_number: self.round_number,
            status: self.status.into(),
            winner_id: self.winner_id,
            winner_name: self.winner_name,
            winner_declared_at: self.winner_declared_at.map(to_utc),
            winner_payment_due_at: self.winner_payment_due_at.map(to_utc),
            winner_paid_at: self.winner_paid_at.map(to_utc),
            creation_time: to_utc(self.creation_time),
            update_time: to_utc(self.update_time),
            bids,
        }
    }

    /// Validation applied while the auction row lock is held, so the `highest_bid`
    /// seen here is the latest committed value and accepted amounts are strictly
    /// increasing with no lost updates.
    pub fn validate_new_bid(
        &self,
        bidder_id: UserId,
        amount: &BigDecimal,
        last_bid_time: Option<PrimitiveDateTime>,
        cooldown: Duration,
        now: OffsetDateTime,
    ) -> Result<(), RestError> {
        if self.status != AuctionStatus::Active {
            return Err(RestError::InvalidState("Auction is not active".to_string()));
        }
        if self.created_by == bidder_id {
            return Err(RestError::Forbidden(
                "Auction creator cannot place additional bids".to_string(),
            ));
        }
        if *amount <= self.highest_bid {
            return Err(RestError::BadParameters(
                "Bid must be higher than the current highest bid".to_string(),
            ));
        }
        if let Some(last) = last_bid_time {
            if now - to_utc(last) < cooldown {
                return Err(RestError::RateLimited);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Bid {
    pub id:            BidId,
    pub auction_id:    AuctionId,
    pub bidder_id:     UserId,
    pub bidder_name:   String,
    pub bid_amount:    BigDecimal,
    pub creation_time: PrimitiveDateTime,
}

impl Bid {
    pub fn get_bid_entity(self) -> entities::Bid {
        entities::Bid {
            id:            self.id,
            auction_id:    self.auction_id,
            bidder_id:     self.bidder_id,
            bidder_name:   self.bidder_name,
            amount:        self.bid_amount,
            creation_time: to_utc(self.creation_time),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewAuction {
    pub group_id:     GroupId,
    pub state:        Option<String>,
    pub city:         Option<String>,
    pub created_by:   UserId,
    pub bid_amount:   BigDecimal,
    pub reason:       Option<String>,
    pub round_number: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct NewBid {
    pub group_id:   GroupId,
    pub auction_id: AuctionId,
    pub bidder_id:  UserId,
    pub bid_amount: BigDecimal,
    pub cooldown:   Duration,
}

#[derive(Clone, Debug)]
pub struct WinnerUpdate {
    pub auction_id:     AuctionId,
    pub winner_id:      UserId,
    pub winning_amount: BigDecimal,
    pub declared_at:    OffsetDateTime,
    pub due_at:         OffsetDateTime,
    /// The `update_time` the caller read its decision from. The write only lands
    /// if the row is still at that version, so a bid or transition committed in
    /// between can never be silently overwritten.
    pub expected_update_time: OffsetDateTime,
}

const AUCTION_SELECT: &str = "SELECT a.id, a.group_id, a.state, a.city, a.created_by, \
     c.name AS created_by_name, a.highest_bid, a.reason, a.round_number, a.status, \
     a.winner_id, w.name AS winner_name, a.winner_declared_at, a.winner_payment_due_at, \
     a.winner_paid_at, a.creation_time, a.update_time \
     FROM auctions a \
     JOIN users c ON c.id = a.created_by \
     LEFT JOIN users w ON w.id = a.winner_id";

fn now_primitive() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

fn to_primitive(time: OffsetDateTime) -> PrimitiveDateTime {
    let utc = time.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn add_auction(&self, auction: NewAuction) -> Result<AuctionId, RestError>;
    async fn get_auction(
        &self,
        group_id: GroupId,
        auction_id: AuctionId,
    ) -> Result<Option<Auction>, RestError>;
    async fn get_auctions(&self, group_id: GroupId) -> Result<Vec<Auction>, RestError>;
    async fn get_bids(&self, auction_ids: Vec<AuctionId>) -> Result<Vec<Bid>, RestError>;
    async fn add_bid(&self, bid: NewBid) -> Result<(), RestError>;
    async fn set_closed(
        &self,
        auction_id: AuctionId,
        expected_update_time: OffsetDateTime,
    ) -> Result<bool, RestError>;
    async fn set_winner(&self, update: WinnerUpdate) -> Result<bool, RestError>;
    async fn reopen(&self, auction_id: AuctionId) -> Result<bool, RestError>;
    async fn set_winner_paid(
        &self,
        auction_id: AuctionId,
        winner_id: UserId,
        paid_at: OffsetDateTime,
    ) -> Result<bool, RestError>;
}

#[async_trait]
impl Database for DB {
    #[instrument(name = "db_add_auction", skip_all, fields(group_id = %auction.group_id))]
    async fn add_auction(&self, auction: NewAuction) -> Result<AuctionId, RestError> {
        let mut tx = self
            .begin()
            .await
            .map_err(|e| classify_db_error(e, "add_auction_begin"))?;
        let auction_id: AuctionId = sqlx::query_scalar(
            "INSERT INTO auctions (group_id, state, city, created_by, highest_bid, reason, round_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(auction.group_id)
        .bind(&auction.state)
        .bind(&auction.city)
        .bind(auction.created_by)
        .bind(&auction.bid_amount)
        .bind(&auction.reason)
        .bind(auction.round_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "add_auction_insert"))?;
        // The creator's opening bid seeds the ledger in the same unit of work.
        sqlx::query("INSERT INTO auction_bids (auction_id, bidder_id, bid_amount) VALUES ($1, $2, $3)")
            .bind(auction_id)
            .bind(auction.created_by)
            .bind(&auction.bid_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_db_error(e, "add_auction_seed_bid"))?;
        tx.commit()
            .await
            .map_err(|e| classify_db_error(e, "add_auction_commit"))?;
        Ok(auction_id)
    }

    async fn get_auction(
        &self,
        group_id: GroupId,
        auction_id: AuctionId,
    ) -> Result<Option<Auction>, RestError> {
        sqlx::query_as(&format!(
            "{} WHERE a.id = $1 AND a.group_id = $2",
            AUCTION_SELECT
        ))
        .bind(auction_id)
        .bind(group_id)
        .fetch_optional(self)
        .await
        .map_err(|e| classify_db_error(e, "get_auction"))
    }

    async fn get_auctions(&self, group_id: GroupId) -> Result<Vec<Auction>, RestError> {
        sqlx::query_as(&format!(
            "{} WHERE a.group_id = $1 ORDER BY a.creation_time DESC",
            AUCTION_SELECT
        ))
        .bind(group_id)
        .fetch_all(self)
        .await
        .map_err(|e| classify_db_error(e, "get_auctions"))
    }

    async fn get_bids(&self, auction_ids: Vec<AuctionId>) -> Result<Vec<Bid>, RestError> {
        sqlx::query_as(
            "SELECT b.id, b.auction_id, b.bidder_id, u.name AS bidder_name, b.bid_amount, \
             b.creation_time \
             FROM auction_bids b \
             JOIN users u ON u.id = b.bidder_id \
             WHERE b.auction_id = ANY($1) \
             ORDER BY b.creation_time DESC",
        )
        .bind(auction_ids)
        .fetch_all(self)
        .await
        .map_err(|e| classify_db_error(e, "get_bids"))
    }

    /// The whole read-validate-write sequence of bid placement runs inside one
    /// transaction holding the auction row lock, so concurrent bids on the same
    /// auction are linearized by the store and the second writer always validates
    /// against the first writer's committed `highest_bid`.
    #[instrument(name = "db_add_bid", skip_all, fields(auction_id = %bid.auction_id, bidder_id = %bid.bidder_id))]
    async fn add_bid(&self, bid: NewBid) -> Result<(), RestError> {
        let mut tx = self
            .begin()
            .await
            .map_err(|e| classify_db_error(e, "add_bid_begin"))?;
        let auction: Auction = sqlx::query_as(&format!(
            "{} WHERE a.id = $1 AND a.group_id = $2 FOR UPDATE OF a",
            AUCTION_SELECT
        ))
        .bind(bid.auction_id)
        .bind(bid.group_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "add_bid_lock"))?
        .ok_or(RestError::AuctionNotFound)?;

        let last_bid_time: Option<PrimitiveDateTime> = sqlx::query_scalar(
            "SELECT creation_time FROM auction_bids \
             WHERE auction_id = $1 AND bidder_id = $2 \
             ORDER BY creation_time DESC LIMIT 1",
        )
        .bind(bid.auction_id)
        .bind(bid.bidder_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify_db_error(e, "add_bid_last_time"))?;

        auction.validate_new_bid(
            bid.bidder_id,
            &bid.bid_amount,
            last_bid_time,
            bid.cooldown,
            OffsetDateTime::now_utc(),
        )?;

        sqlx::query("INSERT INTO auction_bids (auction_id, bidder_id, bid_amount) VALUES ($1, $2, $3)")
            .bind(bid.auction_id)
            .bind(bid.bidder_id)
            .bind(&bid.bid_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_db_error(e, "add_bid_insert"))?;
        sqlx::query("UPDATE auctions SET highest_bid = $1, update_time = $2 WHERE id = $3")
            .bind(&bid.bid_amount)
            .bind(now_primitive())
            .bind(bid.auction_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_db_error(e, "add_bid_update"))?;
        tx.commit()
            .await
            .map_err(|e| classify_db_error(e, "add_bid_commit"))?;
        Ok(())
    }

    /// Versioned on `update_time`: a bid accepted after the caller's read bumps
    /// the version and this write misses, so `highest_bid` never regresses below
    /// an accepted bid.
    async fn set_closed(
        &self,
        auction_id: AuctionId,
        expected_update_time: OffsetDateTime,
    ) -> Result<bool, RestError> {
        let result = sqlx::query(
            "UPDATE auctions SET status = 'CLOSED', update_time = $2 \
             WHERE id = $1 AND update_time = $3",
        )
        .bind(auction_id)
        .bind(now_primitive())
        .bind(to_primitive(expected_update_time))
        .execute(self)
        .await
        .map_err(|e| classify_db_error(e, "set_closed"))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "db_set_winner", skip_all, fields(auction_id = %update.auction_id, winner_id = %update.winner_id))]
    async fn set_winner(&self, update: WinnerUpdate) -> Result<bool, RestError> {
        let result = sqlx::query(
            "UPDATE auctions SET status = 'WON', winner_id = $2, highest_bid = $3, \
             winner_declared_at = $4, winner_payment_due_at = $5, winner_paid_at = NULL, \
             update_time = $4 \
             WHERE id = $1 AND update_time = $6",
        )
        .bind(update.auction_id)
        .bind(update.winner_id)
        .bind(&update.winning_amount)
        .bind(to_primitive(update.declared_at))
        .bind(to_primitive(update.due_at))
        .bind(to_primitive(update.expected_update_time))
        .execute(self)
        .await
        .map_err(|e| classify_db_error(e, "set_winner"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn reopen(&self, auction_id: AuctionId) -> Result<bool, RestError> {
        // The deadline is re-checked in the WHERE clause as well, so a racing
        // confirm-payment can never be overwritten by a reopen.
        let result = sqlx::query(
            "UPDATE auctions SET status = 'ACTIVE', winner_id = NULL, winner_declared_at = NULL, \
             winner_payment_due_at = NULL, winner_paid_at = NULL, update_time = $2 \
             WHERE id = $1 AND status = 'WON' AND winner_paid_at IS NULL \
             AND winner_payment_due_at IS NOT NULL AND winner_payment_due_at <= $2",
        )
        .bind(auction_id)
        .bind(now_primitive())
        .execute(self)
        .await
        .map_err(|e| classify_db_error(e, "reopen"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_winner_paid(
        &self,
        auction_id: AuctionId,
        winner_id: UserId,
        paid_at: OffsetDateTime,
    ) -> Result<bool, RestError> {
        let result = sqlx::query(
            "UPDATE auctions SET winner_paid_at = $3, update_time = $3 \
             WHERE id = $1 AND status = 'WON' AND winner_id = $2 AND winner_paid_at IS NULL",
        )
        .bind(auction_id)
        .bind(winner_id)
        .bind(to_primitive(paid_at))
        .execute(self)
        .await
        .map_err(|e| classify_db_error(e, "set_winner_paid"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::str::FromStr,
        uuid::Uuid,
    };

    fn amount(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn auction_row(status: AuctionStatus, highest: &str) -> Auction {
        let now = now_primitive();
        Auction {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            state: None,
            city: None,
            created_by: Uuid::new_v4(),
            created_by_name: "creator".to_string(),
            highest_bid: amount(highest),
            reason: None,
            round_number: None,
            status,
            winner_id: None,
            winner_name: None,
            winner_declared_at: None,
            winner_payment_due_at: None,
            winner_paid_at: None,
            creation_time: now,
            update_time: now,
        }
    }

    const COOLDOWN: Duration = Duration::seconds(10);

    #[test]
    fn bid_on_non_active_auction_is_rejected() {
        let auction = auction_row(AuctionStatus::Closed, "1000");
        let err = auction
            .validate_new_bid(
                Uuid::new_v4(),
                &amount("1500"),
                None,
                COOLDOWN,
                OffsetDateTime::now_utc(),
            )
            .unwrap_err();
        assert_eq!(err, RestError::InvalidState("Auction is not active".to_string()));
    }

    #[test]
    fn creator_cannot_outbid_their_own_listing() {
        let auction = auction_row(AuctionStatus::Active, "1000");
        let err = auction
            .validate_new_bid(
                auction.created_by,
                &amount("1500"),
                None,
                COOLDOWN,
                OffsetDateTime::now_utc(),
            )
            .unwrap_err();
        assert!(matches!(err, RestError::Forbidden(_)));
    }

    #[test]
    fn bid_must_strictly_exceed_highest() {
        let auction = auction_row(AuctionStatus::Active, "1000");
        for value in ["1000", "999.99"] {
            let err = auction
                .validate_new_bid(
                    Uuid::new_v4(),
                    &amount(value),
                    None,
                    COOLDOWN,
                    OffsetDateTime::now_utc(),
                )
                .unwrap_err();
            assert!(matches!(err, RestError::BadParameters(_)));
        }
        auction
            .validate_new_bid(
                Uuid::new_v4(),
                &amount("1000.01"),
                None,
                COOLDOWN,
                OffsetDateTime::now_utc(),
            )
            .unwrap();
    }

    #[test]
    fn rebid_within_cooldown_is_rate_limited() {
        let auction = auction_row(AuctionStatus::Active, "1000");
        let bidder = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let last = to_primitive(now - Duration::seconds(3));

        let err = auction
            .validate_new_bid(bidder, &amount("1500"), Some(last), COOLDOWN, now)
            .unwrap_err();
        assert_eq!(err, RestError::RateLimited);

        // The same bid is accepted once the cooldown has elapsed.
        let stale = to_primitive(now - Duration::seconds(11));
        auction
            .validate_new_bid(bidder, &amount("1500"), Some(stale), COOLDOWN, now)
            .unwrap();
    }
}
