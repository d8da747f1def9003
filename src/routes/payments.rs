use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::payments::{GatewayReturnQuery, GatewayReturnResult},
    error::AppResult,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway-return", get(gateway_return))
}

// No bearer auth here: the gateway redirects the customer's browser straight
// to this URL.
#[utoipa::path(
    get,
    path = "/api/payments/gateway-return",
    params(
        ("resultCode" = String, Query, description = "Gateway result code; exactly \"0\" means success"),
        ("orderId" = Uuid, Query, description = "Order the payment belongs to"),
    ),
    responses(
        (status = 200, description = "Payment settled from the gateway redirect", body = ApiResponse<GatewayReturnResult>),
        (status = 404, description = "No payment for that order"),
    ),
    tag = "Payments"
)]
pub async fn gateway_return(
    State(state): State<AppState>,
    Query(query): Query<GatewayReturnQuery>,
) -> AppResult<Json<ApiResponse<GatewayReturnResult>>> {
    let resp = payment_service::gateway_return(&state, query).await?;
    Ok(Json(resp))
}
