//! Integration tests for the side-effect coordinator: stock movement, the referral-earning lifecycle and
//! the seller-balance release gate.
use chrono::Duration;
use pasal_common::Rupee;
use pasal_payment_engine::{
    db_types::{EarningStatus, NewOrder, NewOrderItem, Order, OrderStatus, PaymentStatus, StatusUpdate, TransitionSource},
    events::EventProducers,
    test_utils::{force_order_state, prepare_test_env, product_stock, random_db_path, seed_product},
    EngineConfig,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};

async fn new_api(config: EngineConfig) -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    OrderFlowApi::new(db, EventProducers::default(), config)
}

async fn deliver(api: &OrderFlowApi<SqliteDatabase>, order_id: i64, source: TransitionSource) -> Order {
    for status in [OrderStatus::Processing, OrderStatus::Shipped] {
        api.request_transition(order_id, StatusUpdate::status(status), TransitionSource::Admin).await.unwrap();
    }
    api.request_transition(order_id, StatusUpdate::status(OrderStatus::Delivered), source)
        .await
        .unwrap()
        .expect("delivery transition")
        .order
}

#[tokio::test]
async fn stock_is_decremented_once_and_restored_once() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Himalayan salt 1kg", Rupee::from_rupees(200), 10, None, None).await;
    let (order, _) = api
        .process_new_order(NewOrder::new("INV-2001", 1, "cod"), vec![NewOrderItem { product_id: product, quantity: 3 }])
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 10, "stock is not committed at checkout");

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Confirmed), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 7);

    // Further forward movement does not decrement again.
    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Processing), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 7);

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Cancelled), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 10, "cancellation restores exactly what was taken");
}

#[tokio::test]
async fn oversold_order_restores_only_what_was_taken() {
    let api = new_api(EngineConfig::default()).await;
    // Only 2 on the shelf; the customer orders 5.
    let product = seed_product(api.db(), "Lapsi candy jar", Rupee::from_rupees(150), 2, None, None).await;
    let (order, _) = api
        .process_new_order(NewOrder::new("INV-2009", 1, "cod"), vec![NewOrderItem { product_id: product, quantity: 5 }])
        .await
        .unwrap();

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Confirmed), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 0, "the decrement floors at zero");

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Cancelled), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 2, "only the 2 units actually taken come back");
}

#[tokio::test]
async fn cancelling_a_fresh_order_never_restores_stock() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Juju dhau crock", Rupee::from_rupees(350), 4, None, None).await;
    let (order, _) = api
        .process_new_order(NewOrder::new("INV-2002", 1, "khalti"), vec![NewOrderItem { product_id: product, quantity: 2 }])
        .await
        .unwrap();

    // Never confirmed, so stock was never taken. Cancelling must not add phantom inventory.
    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Cancelled), TransitionSource::Poll)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 4);
}

#[tokio::test]
async fn repeating_a_transition_recovers_unapplied_side_effects() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Chiya masala tin", Rupee::from_rupees(250), 6, None, Some(1000)).await;
    let mut order = NewOrder::new("INV-2010", 14, "cod");
    order.referred_by = Some(88);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 2 }]).await.unwrap();

    // The transition committed but the process died before the coordinator ran.
    force_order_state(api.db(), order.id, OrderStatus::Confirmed, PaymentStatus::Paid).await;
    assert_eq!(product_stock(api.db(), product).await, 6);
    assert!(api.db().fetch_earning_for_order(order.id).await.unwrap().is_none());

    // Retrying the same tuple is a no-op on the order, but the missed effects are applied now.
    let change = api
        .request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    assert!(change.is_none());
    assert_eq!(product_stock(api.db(), product).await, 4);
    assert!(api.db().fetch_earning_for_order(order.id).await.unwrap().is_some());

    // And a further retry changes nothing more.
    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(product_stock(api.db(), product).await, 4);
}

#[tokio::test]
async fn referral_earning_lifecycle_pending_to_paid() {
    let api = new_api(EngineConfig::default()).await;
    // 10% commission on a Rs 1000 product.
    let product = seed_product(api.db(), "Allo fabric scarf", Rupee::from_rupees(1000), 10, None, Some(1000)).await;
    let mut order = NewOrder::new("INV-2003", 7, "cod");
    order.referred_by = Some(99);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 1 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    let earning = api.db().fetch_earning_for_order(order.id).await.unwrap().expect("earning created on confirmation");
    assert_eq!(earning.status, EarningStatus::Pending);
    assert_eq!(earning.amount, Rupee::from_rupees(100));
    assert_eq!(api.db().referral_balance(99).await.unwrap(), Rupee::default(), "pending earnings are not spendable");

    deliver(&api, order.id, TransitionSource::Admin).await;
    let earning = api.db().fetch_earning_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(earning.status, EarningStatus::Paid);
    assert_eq!(api.db().referral_balance(99).await.unwrap(), Rupee::from_rupees(100));

    // The balance is now withdrawable.
    let withdrawal = api.process_withdrawal(99, Rupee::from_rupees(60)).await.unwrap();
    assert_eq!(withdrawal.amount, Rupee::from_rupees(60));
    assert_eq!(api.db().referral_balance(99).await.unwrap(), Rupee::from_rupees(40));
}

#[tokio::test]
async fn cancellation_cancels_the_pending_earning() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Mithila painting", Rupee::from_rupees(2000), 3, None, Some(500)).await;
    let mut order = NewOrder::new("INV-2004", 8, "cod");
    order.referred_by = Some(55);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 1 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Confirmed), TransitionSource::Admin)
        .await
        .unwrap();
    assert!(api.db().fetch_earning_for_order(order.id).await.unwrap().is_some());

    api.request_transition(order.id, StatusUpdate::status(OrderStatus::Cancelled), TransitionSource::Admin)
        .await
        .unwrap();
    assert!(api.db().fetch_earning_for_order(order.id).await.unwrap().is_none(), "no non-cancelled earning remains");
    assert_eq!(api.db().referral_balance(55).await.unwrap(), Rupee::default());
}

#[tokio::test]
async fn refund_reverses_a_paid_earning() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Nettle tea box", Rupee::from_rupees(500), 10, None, Some(1000)).await;
    let mut order = NewOrder::new("INV-2005", 9, "cod");
    order.referred_by = Some(77);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 2 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    deliver(&api, order.id, TransitionSource::Admin).await;
    assert_eq!(api.db().referral_balance(77).await.unwrap(), Rupee::from_rupees(100));

    api.request_transition(order.id, StatusUpdate::payment(PaymentStatus::Refunded), TransitionSource::Admin)
        .await
        .unwrap();
    assert_eq!(api.db().referral_balance(77).await.unwrap(), Rupee::default(), "paid earning is clawed back");
}

#[tokio::test]
async fn courier_delivery_releases_seller_balance_immediately() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Bamboo basket", Rupee::from_rupees(600), 5, Some(31), None).await;
    let mut order = NewOrder::new("INV-2006", 10, "cod");
    order.seller_id = Some(31);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 2 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    let delivered = deliver(&api, order.id, TransitionSource::Courier).await;
    assert!(delivered.delivered_at.is_some());

    // Courier confirmation waives the wait period. Released amount is the merchandise value.
    assert_eq!(api.db().seller_balance(31).await.unwrap(), Rupee::from_rupees(1200));

    // The sweep finds nothing left to do and nothing doubles.
    let sweep = api.retry_pending_releases().await.unwrap();
    assert!(sweep.released.is_empty());
    assert_eq!(api.db().seller_balance(31).await.unwrap(), Rupee::from_rupees(1200));
}

#[tokio::test]
async fn admin_delivery_waits_out_the_hold_period() {
    let api = new_api(EngineConfig::default()).await;
    let product = seed_product(api.db(), "Felt slippers", Rupee::from_rupees(450), 5, Some(32), None).await;
    let mut order = NewOrder::new("INV-2007", 11, "cod");
    order.seller_id = Some(32);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 1 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    deliver(&api, order.id, TransitionSource::Admin).await;
    assert_eq!(api.db().seller_balance(32).await.unwrap(), Rupee::default(), "held during the wait period");

    let sweep = api.retry_pending_releases().await.unwrap();
    assert!(sweep.released.is_empty());
    assert_eq!(sweep.still_waiting, 1);
}

#[tokio::test]
async fn release_sweep_pays_out_after_the_wait() {
    // Zero wait stands in for "24 hours have passed".
    let api = new_api(EngineConfig::default().with_release_wait(Duration::zero())).await;
    let product = seed_product(api.db(), "Yak wool blanket", Rupee::from_rupees(3000), 2, Some(33), None).await;
    let mut order = NewOrder::new("INV-2008", 12, "cod");
    order.seller_id = Some(33);
    let (order, _) =
        api.process_new_order(order, vec![NewOrderItem { product_id: product, quantity: 1 }]).await.unwrap();

    api.request_transition(order.id, StatusUpdate::both(OrderStatus::Confirmed, PaymentStatus::Paid), TransitionSource::Admin)
        .await
        .unwrap();
    deliver(&api, order.id, TransitionSource::Admin).await;

    // With the wait elapsed the delivery itself already released. A second sweep changes nothing.
    assert_eq!(api.db().seller_balance(33).await.unwrap(), Rupee::from_rupees(3000));
    let sweep = api.retry_pending_releases().await.unwrap();
    assert!(sweep.released.is_empty());
    assert_eq!(api.db().seller_balance(33).await.unwrap(), Rupee::from_rupees(3000));
}
