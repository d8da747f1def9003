use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::promotions::{ValidatePromotionRequest, ValidatePromotionResponse},
    error::AppResult,
    response::ApiResponse,
    services::promotion_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate_promotion))
}

#[utoipa::path(
    post,
    path = "/api/promotions/validate",
    request_body = ValidatePromotionRequest,
    responses(
        (status = 200, description = "Eligibility check for a promotion code", body = ApiResponse<ValidatePromotionResponse>),
        (status = 404, description = "Unknown code"),
    ),
    tag = "Promotions"
)]
pub async fn validate_promotion(
    State(state): State<AppState>,
    Json(payload): Json<ValidatePromotionRequest>,
) -> AppResult<Json<ApiResponse<ValidatePromotionResponse>>> {
    let resp = promotion_service::validate(&state, payload).await?;
    Ok(Json(resp))
}
