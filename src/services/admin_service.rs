use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    dto::payments::{PaymentList, RefundPaymentRequest, RefundResult, UpdatePaymentStatusRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    gateway::RefundRequest,
    middleware::auth::{ensure_admin, AuthUser},
    models::{Order, Payment},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, PaymentListQuery, SortOrder},
    services::order_service::{
        apply_status_change, order_from_entity, order_item_from_entity, payment_from_entity,
    },
    state::AppState,
    status::{PaymentMethod, PaymentStatus},
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = crate::status::OrderStatus::parse(status)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .map(payment_from_entity);

    let data = OrderWithItems {
        order: order_from_entity(order),
        items,
        payment,
    };
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

/// Staff transition. Anything outside the staff table is rejected with a
/// 409 and the row is left untouched.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = crate::status::OrderStatus::parse(&existing.status)?;
    if !current.can_transition(payload.status, user.actor()) {
        return Err(AppError::TransitionDenied(format!(
            "{} -> {} is not allowed",
            current.as_str(),
            payload.status.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    apply_status_change(&mut active, payload.status, Utc::now());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    query: PaymentListQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = PaymentStatus::parse(status)?;
        condition = condition.add(PaymentCol::Status.eq(status.as_str()));
    }

    let finder = Payments::find()
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(meta),
    ))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(payment_from_entity);
    match payment {
        Some(p) => Ok(ApiResponse::success("Payment", p, Some(Meta::empty()))),
        None => Err(AppError::NotFound),
    }
}

/// Manual settlement for COD payments: PENDING -> PAID or PENDING -> FAILED.
/// Gateway-method payments are settled by the return redirect, never here.
pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let payment = Payments::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let method = PaymentMethod::parse(&payment.payment_method)?;
    if method.is_gateway() {
        return Err(AppError::TransitionDenied(
            "gateway payments cannot be settled manually".into(),
        ));
    }

    let current = PaymentStatus::parse(&payment.status)?;
    if payload.status == PaymentStatus::Refunded
        || !current.can_transition(payload.status, method)
    {
        return Err(AppError::TransitionDenied(format!(
            "{} -> {} is not allowed for {}",
            current.as_str(),
            payload.status.as_str(),
            method.as_str()
        )));
    }

    let now = Utc::now();
    let mut active: PaymentActive = payment.into();
    active.status = Set(payload.status.as_str().into());
    active.updated_at = Set(now.into());
    match payload.status {
        PaymentStatus::Paid => active.paid_at = Set(Some(now.into())),
        PaymentStatus::Failed => active.failed_at = Set(Some(now.into())),
        _ => {}
    }
    let payment = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_status_update",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "status": payment.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment updated",
        payment_from_entity(payment),
        Some(Meta::empty()),
    ))
}

/// Staff-initiated refund through the external gateway. Only a PAID non-COD
/// payment qualifies; if the gateway declines, the payment row is left
/// unchanged and the gateway's message is surfaced verbatim.
pub async fn refund_payment(
    state: &AppState,
    user: &AuthUser,
    payload: RefundPaymentRequest,
) -> AppResult<ApiResponse<RefundResult>> {
    ensure_admin(user)?;

    // The row lock is held across the gateway call: a concurrent refund for
    // the same payment blocks here and re-reads REFUNDED after the commit,
    // so the gateway is invoked at most once per payment.
    let txn = state.orm.begin().await?;
    let payment = Payments::find_by_id(payload.payment_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let method = PaymentMethod::parse(&payment.payment_method)?;
    let current = PaymentStatus::parse(&payment.status)?;
    if !current.can_transition(PaymentStatus::Refunded, method) {
        return Err(AppError::TransitionDenied(format!(
            "{} {} payment cannot be refunded",
            method.as_str(),
            current.as_str()
        )));
    }

    // A decline or transport failure returns here and rolls the
    // transaction back with the row untouched.
    let receipt = state
        .refund
        .refund(&RefundRequest {
            payment_id: payment.id.to_string(),
            amount: payment.amount,
            method: method.as_str().to_string(),
        })
        .await?;

    let now = Utc::now();
    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Refunded.as_str().into());
    active.refunded_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let payment = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_refund",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Refund completed",
        RefundResult {
            payment: payment_from_entity(payment),
            message: receipt.message,
        },
        Some(Meta::empty()),
    ))
}
