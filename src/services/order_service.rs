use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CancelOrderRequest, CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, Payment, ShippingAddress},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::promotion_service,
    state::AppState,
    status::{Actor, OrderStatus, PaymentStatus},
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        // reject typos up front instead of returning an empty page
        let status = OrderStatus::parse(status)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Build an order from the caller's cart: snapshot product names and prices,
/// apply at most one promotion, charge the flat shipping fee, decrement
/// stock, clear the cart, and open a PENDING payment for the same amount.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .all(&txn)
        .await?;

    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let product_ids: Vec<Uuid> = cart.iter().map(|c| c.product_id).collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    let products: HashMap<Uuid, _> = products.into_iter().map(|p| (p.id, p)).collect();

    let mut subtotal: i64 = 0;
    let mut total_items: i64 = 0;
    for row in &cart {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let product = products
            .get(&row.product_id)
            .ok_or_else(|| AppError::BadRequest("Cart references a missing product".into()))?;
        if product.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        subtotal += product.price * (row.quantity as i64);
        total_items += row.quantity as i64;
    }

    let now = Utc::now();
    let (promotion_code, discount_amount) = match payload.promotion_code.as_deref() {
        Some(code) => {
            let (promotion, amount) =
                promotion_service::apply_code(&txn, code, subtotal, now).await?;
            (Some(promotion.code), amount)
        }
        None => (None, 0),
    };

    let shipping_fee = pricing::shipping_fee(total_items);
    let total_amount = pricing::order_total(subtotal, discount_amount, shipping_fee);

    let order_id = Uuid::new_v4();
    let address = payload.shipping_address;

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending.as_str().into()),
        subtotal: Set(subtotal),
        discount_amount: Set(discount_amount),
        shipping_fee: Set(shipping_fee),
        total_amount: Set(total_amount),
        promotion_code: Set(promotion_code),
        payment_method: Set(payload.payment_method.as_str().into()),
        recipient_name: Set(address.recipient_name),
        phone: Set(address.phone),
        province: Set(address.province),
        district: Set(address.district),
        ward: Set(address.ward),
        address_detail: Set(address.detail),
        is_reviewed: Set(false),
        confirmed_at: Set(None),
        shipping_at: Set(None),
        delivered_at: Set(None),
        cancelled_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for row in &cart {
        let product = &products[&row.product_id];
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            name: Set(product.name.clone()),
            price: Set(product.price),
            quantity: Set(row.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(row.quantity))
            .filter(ProdCol::Id.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        status: Set(PaymentStatus::Pending.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        amount: Set(total_amount),
        paid_at: Set(None),
        failed_at: Set(None),
        refunded_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
            payment: Some(payment_from_entity(payment)),
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
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

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
            payment,
        },
        Some(Meta::empty()),
    ))
}

/// Customer-side cancel. Narrower than the staff table: only the order's own
/// owner, and only while the order is still PENDING.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&order.status)?;
    if !current.can_transition(OrderStatus::Cancelled, Actor::Customer) {
        return Err(AppError::TransitionDenied(format!(
            "cannot cancel an order in status {}",
            current.as_str()
        )));
    }

    let mut active: OrderActive = order.into();
    apply_status_change(&mut active, OrderStatus::Cancelled, Utc::now());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "reason": payload.reason })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Write the new status plus its transition timestamp. Timestamps are set on
/// first entry only; the transition tables never revisit a status, so a
/// plain Set is enough.
pub(crate) fn apply_status_change(
    active: &mut OrderActive,
    next: OrderStatus,
    now: DateTime<Utc>,
) {
    active.status = Set(next.as_str().into());
    active.updated_at = Set(now.into());
    match next {
        OrderStatus::Confirmed => active.confirmed_at = Set(Some(now.into())),
        OrderStatus::Shipping => active.shipping_at = Set(Some(now.into())),
        OrderStatus::Delivered => active.delivered_at = Set(Some(now.into())),
        OrderStatus::Cancelled => active.cancelled_at = Set(Some(now.into())),
        OrderStatus::Pending => {}
    }
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        status: model.status,
        subtotal: model.subtotal,
        discount_amount: model.discount_amount,
        shipping_fee: model.shipping_fee,
        total_amount: model.total_amount,
        promotion_code: model.promotion_code,
        payment_method: model.payment_method,
        shipping_address: ShippingAddress {
            recipient_name: model.recipient_name,
            phone: model.phone,
            province: model.province,
            district: model.district,
            ward: model.ward,
            detail: model.address_detail,
        },
        is_reviewed: model.is_reviewed,
        confirmed_at: model.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        shipping_at: model.shipping_at.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        price: model.price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        status: model.status,
        payment_method: model.payment_method,
        amount: model.amount,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        failed_at: model.failed_at.map(|dt| dt.with_timezone(&Utc)),
        refunded_at: model.refunded_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
