use {
    crate::kernel::entities::{
        AuctionId,
        BidId,
        UserId,
    },
    sqlx::types::BigDecimal,
    time::OffsetDateTime,
};

/// One entry of the append-only bid ledger. Bids are never edited or deleted; the
/// auction's `highest_bid` is a projection maintained transactionally on acceptance.
#[derive(Clone, Debug, PartialEq)]
pub struct Bid {
    pub id:            BidId,
    pub auction_id:    AuctionId,
    pub bidder_id:     UserId,
    pub bidder_name:   String,
    pub amount:        BigDecimal,
    pub creation_time: OffsetDateTime,
}
