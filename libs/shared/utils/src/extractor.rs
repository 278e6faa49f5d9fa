use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Verifies the bearer token and stores the resulting `User` in request
/// extensions for `Extension<User>` extraction in handlers.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    debug!("Authenticated request {} {} as {}", request.method(), request.uri().path(), user.id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}
