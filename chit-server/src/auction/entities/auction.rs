use {
    super::bid::Bid,
    crate::kernel::entities::{
        AuctionId,
        GroupId,
        UserId,
    },
    sqlx::types::BigDecimal,
    time::OffsetDateTime,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuctionStatus {
    Active,
    Closed,
    Won,
}

/// One chit cycle's reverse-bid auction, hydrated with its full bid ledger.
#[derive(Clone, Debug)]
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
    pub winner_declared_at:    Option<OffsetDateTime>,
    pub winner_payment_due_at: Option<OffsetDateTime>,
    pub winner_paid_at:        Option<OffsetDateTime>,
    pub creation_time:         OffsetDateTime,
    pub update_time:           OffsetDateTime,

    pub bids: Vec<Bid>,
}

impl Auction {
    /// Bids ordered by amount descending, ties broken by earliest creation.
    pub fn sorted_bids(&self) -> Vec<&Bid> {
        let mut bids: Vec<&Bid> = self.bids.iter().collect();
        bids.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then(a.creation_time.cmp(&b.creation_time))
        });
        bids
    }

    /// The default winner when the organizer declares without naming one: the bid
    /// with the numerically highest amount, earliest-created on ties.
    pub fn select_winning_bid(&self) -> Option<&Bid> {
        self.sorted_bids().first().copied()
    }

    /// The best bid recorded for the given bidder, or None if they never bid.
    pub fn winning_bid_for(&self, bidder_id: UserId) -> Option<&Bid> {
        self.sorted_bids()
            .into_iter()
            .find(|bid| bid.bidder_id == bidder_id)
    }

    /// Whether the given user is the declared, not-yet-paid winner of this auction.
    pub fn can_proceed_payment(&self, user_id: UserId) -> bool {
        self.status == AuctionStatus::Won
            && self.winner_id == Some(user_id)
            && self.winner_paid_at.is_none()
    }

    /// Lazily evaluated payment deadline: true only once `winner_payment_due_at` is
    /// set and in the past.
    pub fn payment_window_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.winner_payment_due_at, Some(due) if due <= now)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::str::FromStr,
        time::Duration,
        uuid::Uuid,
    };

    fn amount(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn bid(bidder_id: UserId, value: &str, offset_secs: i64) -> Bid {
        Bid {
            id:            Uuid::new_v4(),
            auction_id:    Uuid::new_v4(),
            bidder_id,
            bidder_name:   "bidder".to_string(),
            amount:        amount(value),
            creation_time: OffsetDateTime::from_unix_timestamp(1_700_000_000 + offset_secs)
                .unwrap(),
        }
    }

    fn auction(bids: Vec<Bid>) -> Auction {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        Auction {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            state: None,
            city: None,
            created_by: Uuid::new_v4(),
            created_by_name: "creator".to_string(),
            highest_bid: amount("1000"),
            reason: None,
            round_number: None,
            status: AuctionStatus::Active,
            winner_id: None,
            winner_name: None,
            winner_declared_at: None,
            winner_payment_due_at: None,
            winner_paid_at: None,
            creation_time: now,
            update_time: now,
            bids,
        }
    }

    #[test]
    fn winning_bid_is_the_maximum_amount() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let auction = auction(vec![
            bid(a, "1000", 0),
            bid(b, "1500", 10),
            bid(c, "1200", 20),
        ]);
        assert_eq!(auction.select_winning_bid().unwrap().bidder_id, b);
    }

    #[test]
    fn winning_bid_tie_breaks_on_earliest_creation() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let auction = auction(vec![bid(b, "1500", 30), bid(a, "1500", 10)]);
        assert_eq!(auction.select_winning_bid().unwrap().bidder_id, a);
    }

    #[test]
    fn winning_bid_for_ignores_other_bidders() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let auction = auction(vec![bid(a, "1000", 0), bid(b, "1500", 10), bid(a, "1200", 20)]);
        assert_eq!(auction.winning_bid_for(a).unwrap().amount, amount("1200"));
        assert!(auction.winning_bid_for(Uuid::new_v4()).is_none());
    }

    #[test]
    fn can_proceed_payment_requires_unpaid_won_winner() {
        let winner = Uuid::new_v4();
        let mut auction = auction(vec![]);
        assert!(!auction.can_proceed_payment(winner));

        auction.status = AuctionStatus::Won;
        auction.winner_id = Some(winner);
        assert!(auction.can_proceed_payment(winner));
        assert!(!auction.can_proceed_payment(Uuid::new_v4()));

        auction.winner_paid_at = Some(auction.creation_time);
        assert!(!auction.can_proceed_payment(winner));
    }

    #[test]
    fn payment_window_expiry_is_lazy_on_the_clock() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let mut auction = auction(vec![]);
        assert!(!auction.payment_window_expired(now));

        auction.winner_payment_due_at = Some(now + Duration::hours(1));
        assert!(!auction.payment_window_expired(now));
        assert!(auction.payment_window_expired(now + Duration::hours(2)));
    }
}
