use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_api_base: String,
    pub stripe_webhook_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            stripe_api_base: "http://localhost:12111/v1".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: self.stripe_webhook_secret.clone(),
            stripe_api_base: self.stripe_api_base.clone(),
            payment_timeout_secs: 5,
            connect_refresh_url: "http://localhost:3000/refresh".to_string(),
            connect_return_url: "http://localhost:3000/return".to_string(),
            notification_webhook_url: None,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "client".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn professional(email: &str) -> Self {
        Self::new(email, "professional")
    }

    pub fn client(email: &str) -> Self {
        Self::new(email, "client")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are UUIDs")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    fn sign(payload: Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        }), secret)
    }

    /// Token shaped like Supabase issues them: postgres role at the top level,
    /// marketplace role in `app_metadata`.
    pub fn create_supabase_style_token(user: &TestUser, secret: &str) -> String {
        let now = Utc::now();
        Self::sign(json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp()
        }), secret)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    /// Appointment row as PostgREST returns it, unassigned and pending.
    pub fn appointment_row(id: Uuid, client_id: Uuid, proposed_to: &[Uuid]) -> Value {
        let routing_status = if proposed_to.is_empty() { "general" } else { "proposed" };
        json!({
            "id": id,
            "client_id": client_id,
            "professional_id": null,
            "date": "2025-03-10",
            "time": "14:00",
            "duration": 50,
            "type": "video",
            "therapy_type": "solo",
            "issue_type": "anxiety",
            "notes": null,
            "status": "pending",
            "routing_status": routing_status,
            "proposed_to": proposed_to,
            "refused_by": [],
            "refusals": [],
            "payment": {
                "price": 0,
                "platform_fee": 0,
                "professional_payout": 0,
                "currency": "CAD",
                "status": "pending"
            },
            "created_at": "2025-03-01T00:00:00Z",
            "updated_at": "2025-03-01T00:00:00Z"
        })
    }

    pub fn platform_settings_row() -> Value {
        json!({
            "key": "global",
            "default_prices": { "solo": 120, "couple": 150, "group": 80 },
            "platform_fee_percentage": 10.0,
            "currency": "CAD",
            "free_cancellation_hours": 24,
            "late_cancellation_fee_percentage": 50.0
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(app_config.is_configured());
        assert!(app_config.is_payments_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::professional("pro@example.com");
        assert_eq!(user.role, "professional");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
