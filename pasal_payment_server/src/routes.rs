//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that grow beyond request plumbing belong in
//! [`crate::integrations`]; keep this module neat and tidy 🙏
//!
//! Handlers are async end to end. Anything touching the database or a payment provider is awaited, so a
//! slow provider never blocks a worker thread.

use std::collections::HashMap;

use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;
use pasal_gateways::{
    CustomerInfo,
    GatewayAdapter,
    GatewayRegistry,
    GatewayResult,
    InitiateRequest,
    NormalizedStatus,
    PaymentAction,
};
use pasal_payment_engine::{
    db_types::{ClaimStatus, NewOrder, NewOrderItem, Order, PaymentStatus, SettlementClaim, StatusUpdate, TransitionSource},
    order_objects::OrderSnapshot,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use serde_json::{json, Value};

use crate::{
    data_objects::{CheckoutRequest, CheckoutResponse, JsonResponse, PaymentStatusResponse, TransitionRequest, WithdrawalRequest},
    errors::ServerError,
    helpers::new_invoice,
    integrations::{reconcile, resolve_order, verify_with_provider},
};

type Api = web::Data<OrderFlowApi<SqliteDatabase>>;
type Registry = web::Data<GatewayRegistry>;

// ----------------------------------------------   Health   ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ---------------------------------------------   Checkout   ---------------------------------------------------
/// Places a new order and, for digital gateways, starts the payment with the provider.
///
/// The response carries the action the storefront must take next: redirect the browser (Khalti), post a
/// signed form (eSewa), or nothing for manual gateways.
#[post("/checkout")]
pub async fn checkout(
    api: Api,
    registry: Registry,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let adapter = registry.get(&request.gateway)?;
    debug!("💻️ Checkout request for user #{} via {}", request.user_id, adapter.slug());
    let (order, items, customer) = new_order_from_request(request, adapter.slug());
    let (order, _inserted) = api.process_new_order(order, items).await?;
    let payment = initiate_payment(api.as_ref(), adapter.as_ref(), &order, customer).await?;
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        success: true,
        order_id: order.id,
        invoice: order.invoice.clone(),
        final_amount: order.final_amount,
        status: order.status,
        payment_status: order.payment_status,
        payment,
    }))
}

fn new_order_from_request(request: CheckoutRequest, slug: &str) -> (NewOrder, Vec<NewOrderItem>, CustomerInfo) {
    let customer =
        CustomerInfo { name: request.recipient_name.clone(), email: request.email, phone: request.phone.clone() };
    let mut order = NewOrder::new(new_invoice(), request.user_id, slug);
    order.referred_by = request.referred_by;
    order.seller_id = request.seller_id;
    order.recipient_name = request.recipient_name;
    order.phone = request.phone;
    order.address = request.address;
    order.city = request.city;
    order.coupon_code = request.coupon_code;
    order.delivery_fee = request.delivery_fee;
    let items = request
        .items
        .into_iter()
        .map(|line| NewOrderItem { product_id: line.product_id, quantity: line.quantity })
        .collect();
    (order, items, customer)
}

/// Starts the payment with the provider and records the initiation in the ledger. Manual gateways and
/// orders whose payment has already settled get `PaymentAction::None`.
async fn initiate_payment(
    api: &OrderFlowApi<SqliteDatabase>,
    adapter: &dyn GatewayAdapter,
    order: &Order,
    customer: CustomerInfo,
) -> Result<PaymentAction, ServerError> {
    if !adapter.is_digital() || order.payment_status != PaymentStatus::Pending {
        return Ok(PaymentAction::None);
    }
    let request = InitiateRequest {
        invoice: order.invoice.clone(),
        amount: order.final_amount,
        tax_amount: order.tax_amount,
        delivery_fee: order.delivery_fee,
        customer,
    };
    let response = adapter.initiate(&request).await?;
    let claim = SettlementClaim {
        provider: adapter.slug().to_string(),
        reference: response.reference.clone(),
        status: ClaimStatus::Initiated,
        amount: Some(order.final_amount),
        raw: json!({ "reference": response.reference }),
    };
    api.apply_gateway_result(order.id, claim, TransitionSource::Checkout).await?;
    Ok(response.action)
}

// -------------------------------------------   Payment status   -----------------------------------------------
/// Reports an order's payment state. A still-pending digital payment is verified with the provider's
/// lookup endpoint first, so polling this route is how the storefront settles payments whose webhook never
/// arrived.
#[get("/payment/{provider}/status/{order_id}")]
pub async fn payment_status(
    api: Api,
    registry: Registry,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, ServerError> {
    let (provider, order_id) = path.into_inner();
    let adapter = registry.get(&provider)?;
    let order = fetch_order(api.db(), order_id).await?;
    if order.gateway != adapter.slug() {
        return Err(ServerError::Conflict(format!("Order #{order_id} was placed with {}", order.gateway)));
    }
    let order = refresh_pending_payment(&api, adapter.as_ref(), order).await?;
    payment_status_response(&api, order).await
}

/// The provider bounces the customer's browser here after the hosted payment page. The payload in the query
/// string is recorded, but settlement is taken from the provider's lookup endpoint, never from an unsigned
/// browser return.
#[get("/payment/{provider}/success/{invoice}")]
pub async fn payment_success(
    api: Api,
    registry: Registry,
    path: web::Path<(String, String)>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ServerError> {
    let (provider, invoice) = path.into_inner();
    let adapter = registry.get(&provider)?;
    debug!("💻️ Payment return from {provider} for invoice {invoice}");
    let order = fetch_order_by_invoice(api.db(), &invoice).await?;
    let raw = query_to_value(query.into_inner())?;
    match adapter.handle_webhook(&raw) {
        Ok(result) => {
            if let Err(e) = reconcile(&api, &order, result, TransitionSource::Webhook).await {
                warn!("💻️ Return payload for invoice {invoice} was recorded but not applied. {e}");
            }
        },
        Err(e) => debug!("💻️ Return payload for invoice {invoice} could not be parsed as a claim. {e}"),
    }
    let order = fetch_order(api.db(), order.id).await?;
    let order = refresh_pending_payment(&api, adapter.as_ref(), order).await?;
    payment_status_response(&api, order).await
}

/// The provider bounces the customer here when they cancel or the payment fails on the hosted page. An
/// abandoned checkout can only ever cancel a still-pending payment, so the unauthenticated return is safe
/// to act on.
#[get("/payment/{provider}/failure/{invoice}")]
pub async fn payment_failure(
    api: Api,
    registry: Registry,
    path: web::Path<(String, String)>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ServerError> {
    let (provider, invoice) = path.into_inner();
    let adapter = registry.get(&provider)?;
    debug!("💻️ Payment failure return from {provider} for invoice {invoice}");
    let order = fetch_order_by_invoice(api.db(), &invoice).await?;
    let raw = query_to_value(query.into_inner())?;
    let result = adapter.handle_webhook(&raw).unwrap_or_else(|_| GatewayResult {
        provider: adapter.slug().to_string(),
        reference: format!("return-{invoice}"),
        status: NormalizedStatus::Cancelled,
        amount: None,
        raw,
    });
    if let Err(e) = reconcile(&api, &order, result, TransitionSource::Webhook).await {
        warn!("💻️ Failure return for invoice {invoice} was recorded but not applied. {e}");
    }
    let order = fetch_order(api.db(), order.id).await?;
    payment_status_response(&api, order).await
}

// ---------------------------------------------   Webhooks   ---------------------------------------------------
/// Server-to-server payment notifications. The response is 200 as soon as the claim has been recorded in
/// the ledger; a claim that conflicts with the order's state will not change on retry, so the provider is
/// told to stop resending it.
///
/// An unverifiable claim (Khalti webhooks are unsigned; an eSewa payload can fail its signature check) is
/// recorded and then taken to the provider's lookup endpoint, so a genuinely paid order settles off its
/// webhook instead of waiting for a status poll that may never come.
#[post("/payment/{provider}/webhook")]
pub async fn payment_webhook(
    api: Api,
    registry: Registry,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ServerError> {
    let provider = path.into_inner();
    let adapter = registry.get(&provider)?;
    let result = adapter.handle_webhook(&body)?;
    debug!("💻️ Webhook from {provider}: {} for reference {}", result.status, result.reference);
    let unverified = result.status == NormalizedStatus::Unverified;
    let order = resolve_order(api.db(), &result).await?;
    match reconcile(&api, &order, result, TransitionSource::Webhook).await {
        Ok(_) => {
            if unverified && adapter.is_digital() {
                settle_unverified_claim(api.as_ref(), adapter.as_ref(), &order).await;
            }
            Ok(HttpResponse::Ok().json(JsonResponse::success("ok")))
        },
        Err(e @ ServerError::Conflict(_)) => {
            warn!("💻️ Webhook for order #{} recorded but not applied. {e}", order.id);
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
        Err(e) => Err(e),
    }
}

/// The webhook claimed something it could not prove. Ask the provider directly; if it is unreachable the
/// recorded claim waits for the status poll or the expiry sweep instead.
async fn settle_unverified_claim(api: &OrderFlowApi<SqliteDatabase>, adapter: &dyn GatewayAdapter, order: &Order) {
    match verify_with_provider(api, adapter, order).await {
        Ok(Some(change)) => {
            info!(
                "💻️ Webhook claim for order #{} settled via {} lookup: {}/{}",
                order.id, adapter.slug(), change.new_status, change.new_payment_status
            );
        },
        Ok(None) => debug!("💻️ {} lookup left order #{} unchanged", adapter.slug(), order.id),
        Err(e) => warn!("💻️ Could not verify webhook claim for order #{} with {}. {e}", order.id, adapter.slug()),
    }
}

// ------------------------------------------   Admin endpoints   -----------------------------------------------
// Registered under the /admin scope, behind the API-key middleware.

#[get("/orders/{id}")]
pub async fn admin_order(api: Api, path: web::Path<i64>) -> Result<HttpResponse, ServerError> {
    let order = fetch_order(api.db(), path.into_inner()).await?;
    let snapshot = OrderSnapshot::assemble(api.db(), order).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Creates an order on a customer's behalf (phone orders, mostly). Payment settles out of band, so no
/// provider initiation happens here.
#[post("/orders")]
pub async fn admin_create_order(
    api: Api,
    registry: Registry,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let adapter = registry.get(&request.gateway)?;
    let (mut order, items, _customer) = new_order_from_request(request, adapter.slug());
    order.created_by_admin = true;
    let (order, _inserted) = api.process_new_order(order, items).await?;
    info!("💻️ Admin created order #{} (invoice {})", order.id, order.invoice);
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        success: true,
        order_id: order.id,
        invoice: order.invoice.clone(),
        final_amount: order.final_amount,
        status: order.status,
        payment_status: order.payment_status,
        payment: PaymentAction::None,
    }))
}

/// Applies a manual status change. `courier_confirmed` attributes the change to the delivery partner,
/// which waives the seller-release hold on delivery.
#[post("/orders/{id}/status")]
pub async fn admin_transition(
    api: Api,
    path: web::Path<i64>,
    body: web::Json<TransitionRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    if request.status.is_none() && request.payment_status.is_none() {
        return Err(ServerError::InvalidRequestBody("No change requested".to_string()));
    }
    let update = StatusUpdate { status: request.status, payment_status: request.payment_status };
    let source = if request.courier_confirmed { TransitionSource::Courier } else { TransitionSource::Admin };
    match api.request_transition(order_id, update, source).await? {
        Some(change) => Ok(HttpResponse::Ok().json(change)),
        None => Ok(HttpResponse::Ok().json(JsonResponse::success("The order is already in the requested state."))),
    }
}

#[post("/withdrawals")]
pub async fn admin_withdrawal(api: Api, body: web::Json<WithdrawalRequest>) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let withdrawal = api.process_withdrawal(request.user_id, request.amount).await?;
    Ok(HttpResponse::Ok().json(withdrawal))
}

// ----------------------------------------------   Helpers   ---------------------------------------------------

async fn fetch_order(db: &SqliteDatabase, order_id: i64) -> Result<Order, ServerError> {
    db.fetch_order_by_id(order_id)
        .await
        .map_err(ServerError::from)?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order #{order_id}")))
}

async fn fetch_order_by_invoice(db: &SqliteDatabase, invoice: &str) -> Result<Order, ServerError> {
    db.fetch_order_by_invoice(invoice)
        .await
        .map_err(ServerError::from)?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order with invoice {invoice}")))
}

fn query_to_value(query: HashMap<String, String>) -> Result<Value, ServerError> {
    serde_json::to_value(query).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
}

/// Verifies a still-pending digital payment with the provider and returns the order as it stands
/// afterwards. An unreachable provider is not fatal; the current state is reported instead.
async fn refresh_pending_payment(
    api: &OrderFlowApi<SqliteDatabase>,
    adapter: &dyn GatewayAdapter,
    order: Order,
) -> Result<Order, ServerError> {
    if !adapter.is_digital() || order.payment_status != PaymentStatus::Pending {
        return Ok(order);
    }
    match verify_with_provider(api, adapter, &order).await {
        Ok(Some(change)) => Ok(change.order),
        Ok(None) => Ok(order),
        Err(e @ (ServerError::ProviderUnavailable(_) | ServerError::NoRecordFound(_))) => {
            warn!("💻️ Could not verify order #{} with {}. {e}", order.id, adapter.slug());
            Ok(order)
        },
        Err(e) => Err(e),
    }
}

async fn payment_status_response(api: &OrderFlowApi<SqliteDatabase>, order: Order) -> Result<HttpResponse, ServerError> {
    let provider_status = api.db().fetch_gateway_payment(order.id).await.map_err(ServerError::from)?.map(|p| p.status);
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::new(&order, provider_status)))
}
