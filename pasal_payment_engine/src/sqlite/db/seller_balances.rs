use chrono::Utc;
use pasal_common::Rupee;
use sqlx::SqliteConnection;

/// Inserts the release row for the order. The UNIQUE constraint on `order_id` makes a second release
/// impossible; returns `true` only when the row was actually inserted.
pub async fn insert_release(
    order_id: i64,
    seller_id: i64,
    amount: Rupee,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO seller_balance_entries (order_id, seller_id, amount, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(seller_id)
    .bind(amount)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seller_balance(seller_id: i64, conn: &mut SqliteConnection) -> Result<Rupee, sqlx::Error> {
    let (balance,): (Rupee,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM seller_balance_entries WHERE seller_id = $1")
            .bind(seller_id)
            .fetch_one(conn)
            .await?;
    Ok(balance)
}
