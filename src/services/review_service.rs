use std::collections::HashSet;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    state::AppState,
    status::OrderStatus,
};

/// One review per (order, product), unlocked only once the order is
/// DELIVERED. Creating the last missing review flips `orders.is_reviewed`.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(payload.order_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let status = OrderStatus::parse(&order.status)?;
    if !status.can_review() {
        return Err(AppError::BadRequest(
            "Reviews open once the order is delivered".into(),
        ));
    }

    let item_product_ids: HashSet<Uuid> = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|item| item.product_id)
        .collect();

    if !item_product_ids.contains(&payload.product_id) {
        return Err(AppError::BadRequest(
            "Product is not part of this order".into(),
        ));
    }

    let existing = Reviews::find()
        .filter(
            Condition::all()
                .add(ReviewCol::OrderId.eq(order.id))
                .add(ReviewCol::ProductId.eq(payload.product_id)),
        )
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "This product is already reviewed; update the existing review".into(),
        ));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(payload.product_id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let reviewed_product_ids: HashSet<Uuid> = Reviews::find()
        .filter(ReviewCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.product_id)
        .collect();

    // is_reviewed holds only when every distinct line item has a review
    if item_product_ids.is_subset(&reviewed_product_ids) && !order.is_reviewed {
        let mut active: OrderActive = order.into();
        active.is_reviewed = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "order_id": review.order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

/// Reviews are editable but never deletable by the customer.
pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
    }

    let review = Reviews::find()
        .filter(
            Condition::all()
                .add(ReviewCol::Id.eq(id))
                .add(ReviewCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?;
    let review = match review {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    let mut active: ReviewActive = review.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(comment) = payload.comment {
        active.comment = Set(comment);
    }
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_update",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review updated",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_order_reviews(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(order_id));
    if user.role != "admin" {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    let order = Orders::find().filter(condition).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = Reviews::find()
        .filter(ReviewCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        ReviewList {
            items,
            order_reviewed: order.is_reviewed,
        },
        Some(Meta::empty()),
    ))
}

fn validate_rating(rating: i16) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".into(),
        ));
    }
    Ok(())
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        user_id: model.user_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
