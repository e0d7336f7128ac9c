use sqlx::SqliteConnection;

use crate::db_types::Product;

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

/// Takes up to `quantity` units off the shelf and returns how many were actually taken. A shelf that is
/// already short yields a partial take rather than a negative stock level. Caller must hold a transaction;
/// the read and the update are not atomic on their own.
pub async fn decrement_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let stock: Option<(i64,)> =
        sqlx::query_as("SELECT stock FROM products WHERE id = $1").bind(product_id).fetch_optional(&mut *conn).await?;
    let taken = stock.map(|(s,)| s.min(quantity)).unwrap_or_default();
    if taken > 0 {
        sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2")
            .bind(taken)
            .bind(product_id)
            .execute(conn)
            .await?;
    }
    Ok(taken)
}

pub async fn restore_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
        .bind(quantity)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}
