use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub refund_gateway_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let refund_gateway_url = env::var("REFUND_GATEWAY_URL")
            .unwrap_or_else(|_| "https://payment.momo.vn/v2/gateway/api/refund".to_string());
        Ok(Self {
            port,
            database_url,
            host,
            refund_gateway_url,
        })
    }
}
