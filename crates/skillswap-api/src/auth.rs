use axum::{Json, extract::State};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use skillswap_types::Error;
use skillswap_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use skillswap_types::models::Role;

use crate::error::ApiResult;
use crate::users::parse_role_claim;
use crate::validation::{sanitize_text, validate_display_name, validate_email, validate_password};
use crate::{AppState, blocking};

/// Create the account and its empty profile: no skills, no needs, streak 0.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    let display_name = sanitize_text(&req.display_name);
    validate_display_name(&display_name)?;

    let email = req.email.trim().to_ascii_lowercase();

    // Check if the address is taken
    let db = state.db.clone();
    let lookup_email = email.clone();
    if blocking(move || db.get_auth_by_email(&lookup_email))
        .await?
        .is_some()
    {
        return Err(Error::validation("An account with this email already exists").into());
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| Error::Backend(anyhow::anyhow!("password hash failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let insert_name = display_name.clone();
    let insert_email = email.clone();
    blocking(move || {
        db.create_user(
            &user_id.to_string(),
            &insert_email,
            &insert_name,
            &password_hash,
            Utc::now(),
        )
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &display_name, Role::User)?;

    Ok(Json(RegisterResponse { user_id, token }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.trim().to_ascii_lowercase();

    let db = state.db.clone();
    let user = blocking(move || db.get_auth_by_email(&email))
        .await?
        .ok_or(Error::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| Error::Backend(anyhow::anyhow!("stored hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| Error::Unauthorized)?;

    // Banned accounts cannot sign in
    if user.status == "banned" {
        return Err(Error::Forbidden.into());
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| Error::Backend(anyhow::anyhow!("corrupt user id: {e}")))?;
    let role = parse_role_claim(&user.role)?;

    let db = state.db.clone();
    let uid = user.id.clone();
    blocking(move || db.record_login(&uid, Utc::now())).await?;

    let token = create_token(&state.jwt_secret, user_id, &user.display_name, role)?;

    Ok(Json(LoginResponse {
        user_id,
        display_name: user.display_name,
        token,
    }))
}

pub(crate) fn create_token(
    secret: &str,
    user_id: Uuid,
    display_name: &str,
    role: Role,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id,
        display_name: display_name.to_string(),
        role,
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Backend(anyhow::anyhow!("token encoding failed: {e}")))
}
