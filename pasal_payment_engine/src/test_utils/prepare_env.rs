use std::path::Path;

use log::*;
use pasal_common::Rupee;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{OrderStatus, PaymentStatus},
    SqliteDatabase,
};

/// Creates a fresh database at `url`, runs migrations and initialises logging. Call once at the top of
/// every integration test.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}.db", rand::random::<u64>())
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
}

/// Inserts a product row directly, bypassing the engine. Returns the product id.
///
/// Seeding goes through an awaited transaction so the row is committed before this returns. A bare
/// `RETURNING`-into-`fetch_one` on the pool hands the row back while the implicit commit is still in
/// flight, and the very next query can land on a connection that does not see it yet.
pub async fn seed_product(
    db: &SqliteDatabase,
    name: &str,
    price: Rupee,
    stock: i64,
    seller_id: Option<i64>,
    commission_rate_bp: Option<i64>,
) -> i64 {
    let mut tx = db.pool().begin().await.expect("Error opening seed transaction");
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO products (name, price, stock, seller_id, commission_rate_bp) VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .bind(seller_id)
    .bind(commission_rate_bp)
    .fetch_one(&mut *tx)
    .await
    .expect("Error seeding product");
    tx.commit().await.expect("Error committing seeded product");
    id
}

/// Inserts a coupon row directly, bypassing the engine.
#[allow(clippy::too_many_arguments)]
pub async fn seed_coupon(
    db: &SqliteDatabase,
    code: &str,
    kind: &str,
    value: i64,
    max_discount: Option<Rupee>,
    min_order_amount: Option<Rupee>,
    usage_limit: Option<i64>,
) {
    let mut tx = db.pool().begin().await.expect("Error opening seed transaction");
    sqlx::query(
        "INSERT INTO coupons (code, kind, value, max_discount, min_order_amount, usage_limit) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(code)
    .bind(kind)
    .bind(value)
    .bind(max_discount)
    .bind(min_order_amount)
    .bind(usage_limit)
    .execute(&mut *tx)
    .await
    .expect("Error seeding coupon");
    tx.commit().await.expect("Error committing seeded coupon");
}

/// Overwrites an order's status tuple directly, bypassing the engine, its legality checks and its side
/// effects. Lets a test stand in for a process that died between committing a transition and running the
/// coordinator.
pub async fn force_order_state(
    db: &SqliteDatabase,
    order_id: i64,
    status: OrderStatus,
    payment_status: PaymentStatus,
) {
    let mut tx = db.pool().begin().await.expect("Error opening transaction");
    sqlx::query("UPDATE orders SET status = $1, payment_status = $2 WHERE id = $3")
        .bind(status)
        .bind(payment_status)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .expect("Error forcing order state");
    tx.commit().await.expect("Error committing forced order state");
}

/// Current stock level for a product.
pub async fn product_stock(db: &SqliteDatabase, product_id: i64) -> i64 {
    let (stock,): (i64,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(db.pool())
        .await
        .expect("Error fetching stock");
    stock
}
