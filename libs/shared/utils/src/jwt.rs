use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::{TimeZone, Utc};
use tracing::debug;
use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| format!("Invalid {} encoding", what))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse {}: {}", what, e);
        format!("Invalid {} format", what)
    })
}

/// Marketplace role lives in `app_metadata.role`; the top-level `role` claim
/// is Supabase's postgres role ("authenticated") unless a custom hook set it.
fn resolve_role(claims: &JwtClaims) -> Option<String> {
    claims
        .app_metadata
        .as_ref()
        .and_then(|meta| meta.get("role"))
        .and_then(|role| role.as_str())
        .map(str::to_string)
        .or_else(|| claims.role.clone())
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }
    let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let header: JwtHeader = decode_segment(header_b64, "header")?;
    if header.alg != "HS256" {
        return Err(format!("Unsupported token algorithm: {}", header.alg));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims: JwtClaims = decode_segment(claims_b64, "claims")?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        role: resolve_role(&claims),
        id: claims.sub,
        email: claims.email,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated for user {} with role {:?}", user.id, user.role);
    Ok(user)
}
