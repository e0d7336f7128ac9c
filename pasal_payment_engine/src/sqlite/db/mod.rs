//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, maintained as simple functions (rather than stateful structs) that
//! accept a `&mut SqliteConnection` argument. Callers obtain a connection from a pool, or open a
//! transaction when atomicity is needed, and pass `&mut *tx` through without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod coupons;
pub mod earnings;
pub mod orders;
pub mod payments;
pub mod products;
pub mod seller_balances;
pub mod side_effects;

const SQLITE_DB_URL: &str = "sqlite://data/pasal_store.db";

pub fn db_url() -> String {
    let result = env::var("PPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("PPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
