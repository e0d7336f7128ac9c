use chrono::Utc;
use pasal_common::Rupee;
use sqlx::SqliteConnection;

use crate::db_types::{EarningStatus, ReferralEarning, Withdrawal};

/// The non-cancelled earning for the order, if one exists. The coordinator guarantees at most one.
pub async fn fetch_earning_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReferralEarning>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM referral_earnings WHERE order_id = $1 AND status != 'Cancelled' LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_earning(
    order_id: i64,
    user_id: i64,
    amount: Rupee,
    conn: &mut SqliteConnection,
) -> Result<ReferralEarning, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        r#"
            INSERT INTO referral_earnings (order_id, user_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'Pending', $4, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn set_earning_status(
    earning_id: i64,
    status: EarningStatus,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE referral_earnings SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(earning_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn referral_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Rupee, sqlx::Error> {
    let row: Option<(Rupee,)> = sqlx::query_as("SELECT balance FROM referral_balances WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(b,)| b).unwrap_or_default())
}

pub async fn credit_balance(user_id: i64, amount: Rupee, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO referral_balances (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET balance = balance + excluded.balance;
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}

/// Debits the balance, flooring at zero. Used when reversing an earning that was already paid out.
pub async fn debit_balance_floored(
    user_id: i64,
    amount: Rupee,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE referral_balances SET balance = MAX(balance - $1, 0) WHERE user_id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Debits exactly `amount` from the balance, failing if it would go negative. Used by withdrawals, where
/// flooring would silently eat the user's money.
pub async fn debit_balance_strict(
    user_id: i64,
    amount: Rupee,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE referral_balances SET balance = balance - $1 WHERE user_id = $2 AND balance >= $1")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_withdrawal(
    user_id: i64,
    amount: Rupee,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO withdrawals (user_id, amount, status, created_at)
            VALUES ($1, $2, 'Pending', $3)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}
