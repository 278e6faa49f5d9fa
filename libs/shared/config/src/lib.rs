use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub payment_timeout_secs: u64,
    pub connect_refresh_url: String,
    pub connect_return_url: String,
    pub notification_webhook_url: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_SECRET_KEY not set, using empty value");
                    String::new()
                }),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_WEBHOOK_SECRET not set, using empty value");
                    String::new()
                }),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            payment_timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            connect_refresh_url: env::var("CONNECT_REFRESH_URL")
                .unwrap_or_else(|_| {
                    warn!("CONNECT_REFRESH_URL not set, using default");
                    "http://localhost:3000/professional/payouts".to_string()
                }),
            connect_return_url: env::var("CONNECT_RETURN_URL")
                .unwrap_or_else(|_| {
                    warn!("CONNECT_RETURN_URL not set, using default");
                    "http://localhost:3000/professional/payouts?onboarded=1".to_string()
                }),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").ok()
                .filter(|v| !v.is_empty()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_payments_configured() {
            warn!("Stripe not configured - payment endpoints will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty()
            && !self.stripe_api_base.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            payment_timeout_secs: 15,
            connect_refresh_url: String::new(),
            connect_return_url: String::new(),
            notification_webhook_url: None,
            port: 3000,
        }
    }
}
