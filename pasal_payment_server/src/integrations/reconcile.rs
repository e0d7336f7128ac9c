use log::*;
use pasal_gateways::{GatewayAdapter, GatewayResult, NormalizedStatus};
use pasal_payment_engine::{
    db_types::{ClaimStatus, Order, OrderChanged, SettlementClaim, TransitionSource},
    OrderFlowApi,
    OrderManagement,
    PaymentGatewayDatabase,
};

use crate::errors::ServerError;

/// Lowers a gateway result into the engine's claim vocabulary. The two enums are deliberately identical;
/// the seam exists so the adapter crate never has to depend on the engine.
pub fn to_claim(result: GatewayResult) -> SettlementClaim {
    let status = match result.status {
        NormalizedStatus::Initiated => ClaimStatus::Initiated,
        NormalizedStatus::Pending => ClaimStatus::Pending,
        NormalizedStatus::Completed => ClaimStatus::Completed,
        NormalizedStatus::Failed => ClaimStatus::Failed,
        NormalizedStatus::Cancelled => ClaimStatus::Cancelled,
        NormalizedStatus::Unverified => ClaimStatus::Unverified,
    };
    SettlementClaim {
        provider: result.provider,
        reference: result.reference,
        status,
        amount: result.amount,
        raw: result.raw,
    }
}

/// Works out which invoice an inbound provider payload is talking about.
///
/// Khalti echoes our `purchase_order_id` back in its payloads; eSewa only carries the transaction uuid we
/// generated at initiation, which embeds the invoice as `ORDER-{invoice}-{timestamp}`.
pub fn invoice_from_result(result: &GatewayResult) -> Option<String> {
    if let Some(invoice) = result.raw["purchase_order_id"].as_str() {
        return Some(invoice.to_string());
    }
    invoice_from_reference(&result.reference)
}

fn invoice_from_reference(reference: &str) -> Option<String> {
    let rest = reference.strip_prefix("ORDER-")?;
    // The invoice itself contains dashes, so split the timestamp off the right-hand side.
    let (invoice, ts) = rest.rsplit_once('-')?;
    ts.parse::<i64>().ok()?;
    (!invoice.is_empty()).then(|| invoice.to_string())
}

/// Finds the order an inbound payload belongs to, or fails with a client error if the payload does not
/// identify one.
pub async fn resolve_order<B: OrderManagement>(db: &B, result: &GatewayResult) -> Result<Order, ServerError> {
    let Some(invoice) = invoice_from_result(result) else {
        return Err(ServerError::InvalidRequestBody(format!(
            "Cannot determine the order for {} reference {}",
            result.provider, result.reference
        )));
    };
    db.fetch_order_by_invoice(&invoice)
        .await
        .map_err(ServerError::from)?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order with invoice {invoice}")))
}

/// Records and applies a gateway result against an order.
pub async fn reconcile<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    order: &Order,
    result: GatewayResult,
    source: TransitionSource,
) -> Result<Option<OrderChanged>, ServerError> {
    debug!("🧩️ Reconciling {} claim '{}' against order #{}", result.provider, result.status, order.id);
    let change = api.apply_gateway_result(order.id, to_claim(result), source).await?;
    Ok(change)
}

/// Asks the provider's authoritative lookup endpoint about the order's most recent payment attempt and
/// applies the answer.
pub async fn verify_with_provider<B: PaymentGatewayDatabase>(
    api: &OrderFlowApi<B>,
    adapter: &dyn GatewayAdapter,
    order: &Order,
) -> Result<Option<OrderChanged>, ServerError> {
    let Some(payment) = api.db().fetch_gateway_payment(order.id).await.map_err(ServerError::from)? else {
        return Err(ServerError::NoRecordFound(format!("Order #{} has no recorded payment attempt", order.id)));
    };
    let result = adapter.verify(&payment.reference, order.final_amount).await?;
    reconcile(api, order, result, TransitionSource::Poll).await
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn khalti_payloads_carry_the_invoice_directly() {
        let result = GatewayResult {
            provider: "khalti".to_string(),
            reference: "Fr2GqkYmil".to_string(),
            status: NormalizedStatus::Cancelled,
            amount: None,
            raw: json!({ "pidx": "Fr2GqkYmil", "purchase_order_id": "PSL-1718452996-48151" }),
        };
        assert_eq!(invoice_from_result(&result).as_deref(), Some("PSL-1718452996-48151"));
    }

    #[test]
    fn esewa_references_embed_the_invoice() {
        assert_eq!(invoice_from_reference("ORDER-PSL-1718452996-48151-1718453001").as_deref(), Some("PSL-1718452996-48151"));
        assert_eq!(invoice_from_reference("ORDER--1718453001"), None);
        assert_eq!(invoice_from_reference("ORDER-PSL-1-notatimestamp"), None);
        assert_eq!(invoice_from_reference("random-reference"), None);
    }

    #[test]
    fn statuses_map_one_to_one() {
        let claim = |status| {
            to_claim(GatewayResult {
                provider: "esewa".to_string(),
                reference: "r".to_string(),
                status,
                amount: None,
                raw: json!({}),
            })
            .status
        };
        assert_eq!(claim(NormalizedStatus::Completed), ClaimStatus::Completed);
        assert_eq!(claim(NormalizedStatus::Unverified), ClaimStatus::Unverified);
        assert_eq!(claim(NormalizedStatus::Cancelled), ClaimStatus::Cancelled);
    }
}
