use {
    serde::{
        Deserialize,
        Serialize,
    },
    uuid::Uuid,
};

pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type AuctionId = Uuid;
pub type BidId = Uuid;
pub type TransactionId = Uuid;
pub type AccountId = Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id:    UserId,
    pub name:  String,
    pub email: String,
    pub phone: Option<String>,
}
