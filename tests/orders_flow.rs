use axum_coffee_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        orders::{CancelOrderRequest, CheckoutRequest, UpdateOrderStatusRequest},
        payments::{GatewayReturnQuery, RefundPaymentRequest, UpdatePaymentStatusRequest},
        promotions::ValidatePromotionRequest,
        reviews::CreateReviewRequest,
    },
    entity::{
        payments::{ActiveModel as PaymentActive, Entity as Payments},
        products::ActiveModel as ProductActive,
        promotions::ActiveModel as PromotionActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    gateway::RefundClient,
    middleware::auth::AuthUser,
    models::ShippingAddress,
    services::{admin_service, cart_service, order_service, payment_service, promotion_service, review_service},
    state::AppState,
    status::{OrderStatus, PaymentMethod, PaymentStatus},
};
use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: customer checks out with a promotion, staff walks the
// order through its lifecycle, and reviews unlock on delivery. Skips when no
// database is configured.
#[tokio::test]
async fn checkout_transition_and_review_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = auth_user(create_user(&state, "user", "customer@example.com").await?, "user");
    let staff = auth_user(create_user(&state, "admin", "staff@example.com").await?, "admin");

    // 145000 * 3 = 435000 subtotal
    let product = create_product(&state, "Espresso Blend", 145_000, 10).await?;

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 3,
        },
    )
    .await?;

    let checkout = order_service::checkout(&state, &customer, checkout_request(PaymentMethod::Cod, None))
        .await?
        .data
        .unwrap();
    let order = checkout.order;
    assert_eq!(order.status, "PENDING");
    assert_eq!(order.subtotal, 435_000);
    assert_eq!(order.shipping_fee, 15_000);
    assert_eq!(order.discount_amount, 0);
    assert_eq!(order.total_amount, 450_000);

    let payment = checkout.payment.expect("payment created at checkout");
    assert_eq!(payment.status, "PENDING");
    assert_eq!(payment.amount, 450_000);

    // skipping straight to DELIVERED is outside the table
    let denied = admin_service::update_order_status(
        &state,
        &staff,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await;
    assert!(matches!(denied, Err(AppError::TransitionDenied(_))));

    // reviews stay locked until delivery
    let locked = review_service::create_review(
        &state,
        &customer,
        CreateReviewRequest {
            order_id: order.id,
            product_id: product,
            rating: 5,
            comment: "great".into(),
        },
    )
    .await;
    assert!(matches!(locked, Err(AppError::BadRequest(_))));

    for next in [OrderStatus::Confirmed, OrderStatus::Shipping, OrderStatus::Delivered] {
        let updated = admin_service::update_order_status(
            &state,
            &staff,
            order.id,
            UpdateOrderStatusRequest { status: next },
        )
        .await?
        .data
        .unwrap();
        assert_eq!(updated.status, next.as_str());
    }

    let delivered = admin_service::get_order_admin(&state, &staff, order.id)
        .await?
        .data
        .unwrap()
        .order;
    assert!(delivered.confirmed_at.is_some());
    assert!(delivered.shipping_at.is_some());
    assert!(delivered.delivered_at.is_some());
    assert!(!delivered.is_reviewed);

    // COD settles manually
    let paid = admin_service::update_payment_status(
        &state,
        &staff,
        payment.id,
        UpdatePaymentStatusRequest {
            status: PaymentStatus::Paid,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.status, "PAID");
    assert!(paid.paid_at.is_some());

    // no refund path for COD
    let refund = admin_service::refund_payment(
        &state,
        &staff,
        RefundPaymentRequest {
            payment_id: payment.id,
        },
    )
    .await;
    assert!(matches!(refund, Err(AppError::TransitionDenied(_))));

    // single line item: one review flips is_reviewed
    let review = review_service::create_review(
        &state,
        &customer,
        CreateReviewRequest {
            order_id: order.id,
            product_id: product,
            rating: 5,
            comment: "smooth and rich".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(review.rating, 5);

    let reviews = review_service::list_order_reviews(&state, &customer, order.id)
        .await?
        .data
        .unwrap();
    assert!(reviews.order_reviewed);
    assert_eq!(reviews.items.len(), 1);

    // one review per (order, product)
    let duplicate = review_service::create_review(
        &state,
        &customer,
        CreateReviewRequest {
            order_id: order.id,
            product_id: product,
            rating: 4,
            comment: "again".into(),
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn oversized_fixed_promotion_clamps_to_subtotal() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = auth_user(create_user(&state, "user", "promo@example.com").await?, "user");
    let product = create_product(&state, "Cold Brew", 145_000, 10).await?;

    let now = Utc::now();
    PromotionActive {
        id: Set(Uuid::new_v4()),
        code: Set("BIGFIXED".into()),
        discount_type: Set("FIXED".into()),
        discount_value: Set(600_000),
        min_order_value: Set(0),
        starts_at: Set((now - Duration::days(1)).into()),
        ends_at: Set((now + Duration::days(1)).into()),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // validation endpoint agrees with the checkout math, twice over
    let first = promotion_service::validate(
        &state,
        ValidatePromotionRequest {
            code: "bigfixed".into(),
            order_value: 435_000,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(first.valid);
    assert_eq!(first.discount_amount, 435_000);

    let second = promotion_service::validate(
        &state,
        ValidatePromotionRequest {
            code: "BIGFIXED".into(),
            order_value: 435_000,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(second.discount_amount, first.discount_amount);

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 3,
        },
    )
    .await?;

    let checkout = order_service::checkout(
        &state,
        &customer,
        checkout_request(PaymentMethod::Cod, Some("BIGFIXED".into())),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(checkout.order.discount_amount, 435_000);
    assert_eq!(checkout.order.total_amount, 15_000);

    Ok(())
}

#[tokio::test]
async fn customer_cancel_is_pending_only() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = auth_user(create_user(&state, "user", "cancel@example.com").await?, "user");
    let product = create_product(&state, "Phin Filter", 75_000, 5).await?;

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?;

    let order = order_service::checkout(&state, &customer, checkout_request(PaymentMethod::Cod, None))
        .await?
        .data
        .unwrap()
        .order;

    let cancelled = order_service::cancel_order(
        &state,
        &customer,
        order.id,
        CancelOrderRequest { reason: None },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.status, "CANCELLED");
    assert!(cancelled.cancelled_at.is_some());

    // CANCELLED is absorbing
    let again = order_service::cancel_order(
        &state,
        &customer,
        order.id,
        CancelOrderRequest { reason: None },
    )
    .await;
    assert!(matches!(again, Err(AppError::TransitionDenied(_))));

    Ok(())
}

#[tokio::test]
async fn gateway_return_settles_by_strict_result_code() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = auth_user(create_user(&state, "user", "momo@example.com").await?, "user");
    let product = create_product(&state, "Single Origin", 185_000, 10).await?;

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::checkout(&state, &customer, checkout_request(PaymentMethod::Momo, None))
        .await?
        .data
        .unwrap()
        .order;

    let settled = payment_service::gateway_return(
        &state,
        GatewayReturnQuery {
            result_code: "0".into(),
            order_id: order.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(settled.outcome, "success");
    assert_eq!(settled.payment.status, "PAID");
    assert!(settled.payment.paid_at.is_some());

    // a second redirect does not rewrite the settled payment, and the
    // reported outcome follows the stored state rather than the stray code
    let replay = payment_service::gateway_return(
        &state,
        GatewayReturnQuery {
            result_code: "1".into(),
            order_id: order.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(replay.payment.status, "PAID");
    assert_eq!(replay.outcome, "success");

    Ok(())
}

#[tokio::test]
async fn refund_validates_under_lock_and_rolls_back_on_gateway_failure() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let customer = auth_user(create_user(&state, "user", "refund@example.com").await?, "user");
    let staff = auth_user(create_user(&state, "admin", "ops@example.com").await?, "admin");
    let product = create_product(&state, "Moka Pot", 320_000, 4).await?;

    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?;
    let checkout = order_service::checkout(&state, &customer, checkout_request(PaymentMethod::Momo, None))
        .await?
        .data
        .unwrap();
    let payment_id = checkout.payment.expect("payment created at checkout").id;

    payment_service::gateway_return(
        &state,
        GatewayReturnQuery {
            result_code: "0".into(),
            order_id: checkout.order.id,
        },
    )
    .await?;

    // gateway unreachable: the refund errors and the locked row is rolled
    // back still PAID
    let failed = admin_service::refund_payment(
        &state,
        &staff,
        RefundPaymentRequest { payment_id },
    )
    .await;
    assert!(matches!(failed, Err(AppError::Gateway(_))));

    let after = admin_service::get_payment(&state, &staff, payment_id)
        .await?
        .data
        .unwrap();
    assert_eq!(after.status, "PAID");
    assert!(after.refunded_at.is_none());

    // once REFUNDED, a repeat request is rejected inside the transaction
    // before the gateway would ever be contacted
    let settled = Payments::find_by_id(payment_id)
        .one(&state.orm)
        .await?
        .expect("payment row");
    let mut active: PaymentActive = settled.into();
    active.status = Set("REFUNDED".into());
    active.refunded_at = Set(Some(Utc::now().into()));
    active.update(&state.orm).await?;

    let repeated = admin_service::refund_payment(
        &state,
        &staff,
        RefundPaymentRequest { payment_id },
    )
    .await;
    assert!(matches!(repeated, Err(AppError::TransitionDenied(_))));

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE reviews, payments, order_items, orders, cart_items, promotions, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(Some(AppState {
        pool,
        orm,
        refund: RefundClient::new("http://127.0.0.1:1/refund")
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    }))
}

fn auth_user(user_id: Uuid, role: &str) -> AuthUser {
    AuthUser {
        user_id,
        role: role.into(),
    }
}

fn checkout_request(method: PaymentMethod, promotion_code: Option<String>) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: ShippingAddress {
            recipient_name: "Nguyen Van A".into(),
            phone: "0900000000".into(),
            province: "Ho Chi Minh".into(),
            district: "District 1".into(),
            ward: "Ben Nghe".into(),
            detail: "12 Le Loi".into(),
        },
        payment_method: method,
        promotion_code,
    }
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(Some("test product".into())),
        image_url: Set(None),
        price: Set(price),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
