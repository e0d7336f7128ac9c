use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::SideEffectKind;

/// Claims the `(order_id, effect_kind)` idempotency key. Returns `true` exactly once per key; every later
/// attempt hits the UNIQUE constraint and returns `false`.
pub async fn try_claim(
    order_id: i64,
    kind: SideEffectKind,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO order_side_effects (order_id, effect_kind, applied_at) VALUES ($1, $2, $3)",
    )
    .bind(order_id)
    .bind(kind)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_applied(
    order_id: i64,
    kind: SideEffectKind,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM order_side_effects WHERE order_id = $1 AND effect_kind = $2")
            .bind(order_id)
            .bind(kind)
            .fetch_optional(conn)
            .await?;
    Ok(row.is_some())
}
