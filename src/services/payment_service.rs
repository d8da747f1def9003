use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};

use crate::{
    audit::log_audit,
    dto::payments::{GatewayReturnQuery, GatewayReturnResult},
    entity::payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    error::{AppError, AppResult},
    gateway,
    response::{ApiResponse, Meta},
    services::order_service::payment_from_entity,
    state::AppState,
    status::{PaymentMethod, PaymentStatus},
};

/// Consume the gateway's return redirect. `resultCode == "0"` (exact string
/// match) marks the order's payment PAID, anything else FAILED. A repeated
/// redirect for an already settled payment changes nothing; the stored state
/// is reported back instead.
pub async fn gateway_return(
    state: &AppState,
    query: GatewayReturnQuery,
) -> AppResult<ApiResponse<GatewayReturnResult>> {
    let txn = state.orm.begin().await?;

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(query.order_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let method = PaymentMethod::parse(&payment.payment_method)?;
    if !method.is_gateway() {
        return Err(AppError::BadRequest(
            "COD payments are settled manually, not by the gateway".into(),
        ));
    }

    let current = PaymentStatus::parse(&payment.status)?;
    let target = if gateway::gateway_succeeded(&query.result_code) {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Failed
    };

    let payment = if current == PaymentStatus::Pending {
        let now = Utc::now();
        let mut active: PaymentActive = payment.into();
        active.status = Set(target.as_str().into());
        active.updated_at = Set(now.into());
        match target {
            PaymentStatus::Paid => active.paid_at = Set(Some(now.into())),
            PaymentStatus::Failed => active.failed_at = Set(Some(now.into())),
            _ => {}
        }
        active.update(&txn).await?
    } else {
        payment
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "gateway_return",
        Some("payments"),
        Some(serde_json::json!({
            "order_id": query.order_id,
            "result_code": query.result_code,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    // Report the stored state: a replayed redirect carrying a different
    // code must not contradict the settled payment it returns.
    let outcome = match PaymentStatus::parse(&payment.status)? {
        PaymentStatus::Paid => "success",
        _ => "failed",
    };

    Ok(ApiResponse::success(
        "Gateway return processed",
        GatewayReturnResult {
            outcome: outcome.to_string(),
            payment: payment_from_entity(payment),
        },
        Some(Meta::empty()),
    ))
}
