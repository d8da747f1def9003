use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Promotion;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePromotionRequest {
    pub code: String,
    pub order_value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidatePromotionResponse {
    pub valid: bool,
    pub discount_amount: i64,
    /// Set when `valid` is false; explains which condition failed.
    pub reason: Option<String>,
    pub promotion: Option<Promotion>,
}
