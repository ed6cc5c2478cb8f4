use {
    crate::{
        api::RestError,
        auction,
        escrow,
        group,
        kernel::{
            db::{
                classify_db_error,
                DB,
            },
            entities::User,
        },
    },
    std::sync::Arc,
};

pub struct Store {
    pub db: DB,
}

impl Store {
    pub async fn get_user_by_access_token(&self, token: &str) -> Result<Option<User>, RestError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, phone FROM users WHERE access_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify_db_error(e, "get_user_by_access_token"))
    }
}

pub struct StoreNew {
    pub store:           Arc<Store>,
    pub group_service:   group::service::Service,
    pub auction_service: auction::service::Service,
    pub escrow_service:  escrow::service::Service,
}
