use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    dto::promotions::{ValidatePromotionRequest, ValidatePromotionResponse},
    entity::promotions::{Column as PromoCol, Entity as Promotions, Model as PromotionModel},
    error::{AppError, AppResult},
    models::Promotion,
    pricing::{self, DiscountType, PromotionRule},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Check a code against an order value. An ineligible code comes back as
/// `valid: false` with the reason, not as an error, so the storefront can
/// explain why the code is greyed out.
pub async fn validate(
    state: &AppState,
    payload: ValidatePromotionRequest,
) -> AppResult<ApiResponse<ValidatePromotionResponse>> {
    let code = payload.code.trim().to_uppercase();
    let promotion = Promotions::find()
        .filter(PromoCol::Code.eq(code))
        .one(&state.orm)
        .await?;
    let promotion = match promotion {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let rule = rule_from_model(&promotion)?;
    let data = match pricing::compute_discount(&rule, payload.order_value, Utc::now()) {
        Ok(amount) => ValidatePromotionResponse {
            valid: true,
            discount_amount: amount,
            reason: None,
            promotion: Some(promotion_from_entity(promotion)),
        },
        Err(reason) => ValidatePromotionResponse {
            valid: false,
            discount_amount: 0,
            reason: Some(reason.to_string()),
            promotion: Some(promotion_from_entity(promotion)),
        },
    };

    Ok(ApiResponse::success("Promotion checked", data, Some(Meta::empty())))
}

/// Checkout-time application: unlike [`validate`], an ineligible code here is
/// a hard error so the order is never created with a discount it did not earn.
pub(crate) async fn apply_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<(PromotionModel, i64)> {
    let code = code.trim().to_uppercase();
    let promotion = Promotions::find()
        .filter(PromoCol::Code.eq(code.clone()))
        .one(conn)
        .await?;
    let promotion = match promotion {
        Some(p) => p,
        None => return Err(AppError::BadRequest(format!("Unknown promotion code {code}"))),
    };

    let rule = rule_from_model(&promotion)?;
    let amount = pricing::compute_discount(&rule, subtotal, now)
        .map_err(|reason| AppError::BadRequest(reason.to_string()))?;

    Ok((promotion, amount))
}

pub(crate) fn rule_from_model(model: &PromotionModel) -> AppResult<PromotionRule> {
    Ok(PromotionRule {
        discount_type: DiscountType::parse(&model.discount_type)?,
        discount_value: model.discount_value,
        min_order_value: model.min_order_value,
        starts_at: model.starts_at.with_timezone(&Utc),
        ends_at: model.ends_at.with_timezone(&Utc),
        active: model.active,
    })
}

fn promotion_from_entity(model: PromotionModel) -> Promotion {
    Promotion {
        id: model.id,
        code: model.code,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        min_order_value: model.min_order_value,
        starts_at: model.starts_at.with_timezone(&Utc),
        ends_at: model.ends_at.with_timezone(&Utc),
        active: model.active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
