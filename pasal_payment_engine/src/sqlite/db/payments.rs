use chrono::Utc;
use pasal_common::Rupee;
use sqlx::SqliteConnection;

use crate::db_types::{GatewayPayment, LedgerEntry, NewLedgerEntry};

/// Records the latest gateway interaction for `(order, provider)`. Earlier rows for the same pair are
/// overwritten; the ledger keeps the history.
pub async fn upsert_gateway_payment(
    order_id: i64,
    provider: &str,
    reference: &str,
    amount: Rupee,
    status: &str,
    raw_response: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO gateway_payments (order_id, provider, reference, amount, status, raw_response, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id, provider) DO UPDATE SET
                reference = excluded.reference,
                amount = excluded.amount,
                status = excluded.status,
                raw_response = excluded.raw_response,
                updated_at = excluded.updated_at;
        "#,
    )
    .bind(order_id)
    .bind(provider)
    .bind(reference)
    .bind(amount)
    .bind(status)
    .bind(raw_response)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_gateway_payment(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<GatewayPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM gateway_payments WHERE order_id = $1 ORDER BY updated_at DESC LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await
}

/// Appends one row to the payment ledger. There is deliberately no update or delete counterpart.
pub async fn insert_ledger_entry(entry: NewLedgerEntry, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO payment_ledger (order_id, provider, direction, normalized_status, trace_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(entry.order_id)
    .bind(entry.provider)
    .bind(entry.direction)
    .bind(entry.normalized_status)
    .bind(entry.trace_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_ledger_entries(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_ledger WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
