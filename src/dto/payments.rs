use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Payment;
use crate::status::PaymentStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundPaymentRequest {
    pub payment_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResult {
    pub payment: Payment,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

/// Query string the gateway appends to its return redirect.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayReturnQuery {
    #[serde(rename = "resultCode")]
    pub result_code: String,
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayReturnResult {
    pub outcome: String,
    pub payment: Payment,
}
