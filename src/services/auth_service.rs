use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::auth::{AuthResponse, Claims, LoginRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::{Role, User},
    response::{ApiResponse, Meta},
    services::{
        mapping::user_from_entity,
        validate::{
            MAX_COMPANY_LEN, MAX_LOCATION_LEN, MAX_NAME_LEN, MAX_PHONE_LEN, optional_text,
            required_text,
        },
    },
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(user_id: Uuid, role: Role, secret: &str, ttl_hours: i64) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = required_text("email", email, Some(254))?.to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::BadRequest("email is invalid".into()));
    }
    Ok(email)
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&payload.email)?;
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let first_name = required_text("first_name", &payload.first_name, Some(MAX_NAME_LEN))?;
    let last_name = required_text("last_name", &payload.last_name, Some(MAX_NAME_LEN))?;
    let phone = required_text("phone", &payload.phone, Some(MAX_PHONE_LEN))?;
    let location = required_text("location", &payload.location, Some(MAX_LOCATION_LEN))?;
    let company_name = match payload.role {
        Role::Merchant => Some(required_text(
            "company_name",
            payload.company_name.as_deref().unwrap_or_default(),
            Some(MAX_COMPANY_LEN),
        )?),
        Role::Producer => None,
    };
    let profile_image = optional_text("profile_image", payload.profile_image.as_deref(), None)?;

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let active = UserActive {
        id: Set(Uuid::new_v4()),
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(email),
        password_hash: Set(password_hash),
        phone: Set(phone),
        location: Set(location),
        role: Set(payload.role.as_str().to_string()),
        company_name: Set(company_name),
        profile_image: Set(profile_image),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let user = match active.insert(&state.orm).await {
        Ok(user) => user_from_entity(user)?,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::BadRequest("Email is already taken".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");

    let token = issue_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
    )?;
    Ok(ApiResponse::success(
        "User created",
        AuthResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    let user = user_from_entity(user)?;
    let token = issue_token(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
    )?;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "OK",
        user_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_subject_and_role() {
        let id = Uuid::new_v4();
        let token = issue_token(id, Role::Merchant, "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, "MERCHANT");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::Producer, "secret", 1).unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::Producer, "secret", -2).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("demo123").unwrap();
        assert!(verify_password("demo123", &hash).unwrap());
        assert!(!verify_password("demo124", &hash).unwrap());
    }

    #[test]
    fn email_is_trimmed_lowercased_and_checked() {
        assert_eq!(normalize_email("  Fatou@Demo.COM ").unwrap(), "fatou@demo.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@demo.com").is_err());
    }
}
