use axum::{extract::FromRequestParts, http::header};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    entity::Users,
    error::AppError,
    models::Role,
    services::auth_service::verify_token,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_producer(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Producer)
}

pub fn ensure_merchant(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Merchant)
}

/// Pulls the token out of an `Authorization: Bearer <jwt>` header value.
pub fn bearer_token(header_value: &str) -> Result<&str, AppError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?
        .trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing token".into()));
    }
    Ok(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = verify_token(bearer_token(auth_str)?, &state.config.jwt_secret)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        // The account must still exist and be active; its stored role wins over the claim.
        let user = Users::find_by_id(user_id)
            .one(&state.orm)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("Invalid token".into()))?;

        let role = Role::parse(&user.role)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role {}", user.role)))?;

        Ok(AuthUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token("Bearer abc.def").unwrap(), "abc.def");
        assert!(matches!(bearer_token("Basic abc"), Err(AppError::Unauthorized(_))));
        assert!(matches!(bearer_token("Bearer   "), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn ensure_role_rejects_other_role() {
        let merchant = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Merchant,
        };
        assert!(ensure_merchant(&merchant).is_ok());
        assert!(matches!(ensure_producer(&merchant), Err(AppError::Forbidden)));
    }
}
