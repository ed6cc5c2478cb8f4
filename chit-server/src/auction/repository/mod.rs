use {
    crate::{
        api::RestError,
        auction::entities,
        kernel::entities::{
            AuctionId,
            GroupId,
        },
    },
    std::collections::HashMap,
};

mod models;

pub use models::*;

pub struct Repository {
    pub db: Box<dyn Database>,
}

impl Repository {
    pub fn new(db: impl Database) -> Self {
        Self { db: Box::new(db) }
    }

    /// All auctions of a group, newest first, each hydrated with its bid ledger.
    pub async fn get_auctions_for_group(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<entities::Auction>, RestError> {
        let rows = self.db.get_auctions(group_id).await?;
        let auction_ids: Vec<AuctionId> = rows.iter().map(|row| row.id).collect();
        let mut bids_by_auction: HashMap<AuctionId, Vec<entities::Bid>> = HashMap::new();
        for bid in self.db.get_bids(auction_ids).await? {
            bids_by_auction
                .entry(bid.auction_id)
                .or_default()
                .push(bid.get_bid_entity());
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let bids = bids_by_auction.remove(&row.id).unwrap_or_default();
                row.get_auction_entity(bids)
            })
            .collect())
    }

    pub async fn get_auction(
        &self,
        group_id: GroupId,
        auction_id: AuctionId,
    ) -> Result<entities::Auction, RestError> {
        let row = self
            .db
            .get_auction(group_id, auction_id)
            .await?
            .ok_or(RestError::AuctionNotFound)?;
        let bids = self
            .db
            .get_bids(vec![auction_id])
            .await?
            .into_iter()
            .map(models::Bid::get_bid_entity)
            .collect();
        Ok(row.get_auction_entity(bids))
    }
}
