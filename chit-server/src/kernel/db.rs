use {
    crate::api::RestError,
    sqlx::{
        Pool,
        Postgres,
    },
};

pub type DB = Pool<Postgres>;

const UNDEFINED_TABLE: &str = "42P01";
const UNDEFINED_OBJECT: &str = "42704";

/// Maps a storage failure onto the REST taxonomy.
///
/// A missing table or enum type means migrations have not been applied yet, which is
/// surfaced distinctly so operators know to provision the schema rather than debug a
/// business error.
pub fn classify_db_error(error: sqlx::Error, context: &str) -> RestError {
    if let sqlx::Error::Database(db_error) = &error {
        if let Some(code) = db_error.code() {
            if code == UNDEFINED_TABLE || code == UNDEFINED_OBJECT {
                tracing::warn!(error = %db_error, context, "DB schema is not provisioned");
                return RestError::SchemaNotProvisioned;
            }
        }
    }
    tracing::error!(error = %error, context, "DB query failed");
    RestError::TemporarilyUnavailable
}
