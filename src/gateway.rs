//! Refund gateway client and return-redirect handling.
//!
//! The gateway reports outcomes through a `resultCode` query parameter on its
//! redirect. The wire contract is a *string* comparison: exactly `"0"` means
//! success, any other string means failure. Do not parse it as a number.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const GATEWAY_SUCCESS_CODE: &str = "0";

/// Strict string comparison against the gateway's success sentinel.
pub fn gateway_succeeded(result_code: &str) -> bool {
    result_code == GATEWAY_SUCCESS_CODE
}

#[derive(Debug, Serialize)]
pub struct RefundRequest {
    pub payment_id: String,
    pub amount: i64,
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub result_code: String,
    pub message: String,
}

/// Thin HTTP client for the external refund endpoint.
#[derive(Debug, Clone)]
pub struct RefundClient {
    client: reqwest::Client,
    refund_url: String,
}

impl RefundClient {
    pub fn new(refund_url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("http client: {e}")))?;
        Ok(Self {
            client,
            refund_url: refund_url.into(),
        })
    }

    /// Ask the gateway to refund a payment. A declined refund surfaces the
    /// gateway's message verbatim so the operator sees what the gateway said.
    pub async fn refund(&self, request: &RefundRequest) -> AppResult<RefundResponse> {
        let response = self
            .client
            .post(&self.refund_url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "gateway returned an error".to_string());
            return Err(AppError::Gateway(text));
        }

        let body: RefundResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid gateway response: {e}")))?;

        if !gateway_succeeded(&body.result_code) {
            return Err(AppError::Gateway(body.message));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exact_zero_string_succeeds() {
        assert!(gateway_succeeded("0"));
        assert!(!gateway_succeeded("1"));
        assert!(!gateway_succeeded("00"));
        assert!(!gateway_succeeded("0 "));
        assert!(!gateway_succeeded(""));
        assert!(!gateway_succeeded("success"));
    }
}
