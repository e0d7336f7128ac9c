use sqlx::SqliteConnection;

use crate::db_types::Coupon;

pub async fn fetch_coupon(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons WHERE code = $1").bind(code).fetch_optional(conn).await
}

pub async fn increment_usage(code: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE code = $1").bind(code).execute(conn).await?;
    Ok(())
}
