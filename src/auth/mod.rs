//! Customer authentication: argon2 password storage, JWT issuance and the
//! [`CurrentUser`] extractor used by every authenticated route.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::customer;
use crate::errors::ServiceError;

/// JWT claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Customer id
    pub sub: Uuid,
    pub email: String,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl AuthService {
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    pub fn issue_token(&self, customer: &customer::Model) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: customer.id,
            email: customer.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.expiration_secs)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ServiceError::Unauthorized("invalid or expired token".to_string()))
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("stored hash is malformed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub customer_id: Uuid,
    pub email: String,
}

/// Creates a customer account and returns a fresh token.
#[instrument(skip(db, auth, req), fields(email = %req.email))]
pub async fn register(
    db: &DbPool,
    auth: &AuthService,
    req: RegisterRequest,
) -> Result<AuthResponse, ServiceError> {
    req.validate()?;

    let existing = customer::Entity::find()
        .filter(customer::Column::Email.eq(req.email.clone()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ServiceError::Conflict(
            "an account with this email already exists".to_string(),
        ));
    }

    let model = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(req.email.clone()),
        password_hash: Set(hash_password(&req.password)?),
        remote_customer_id: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    };
    let saved = model.insert(db).await?;

    info!(customer_id = %saved.id, "customer registered");
    let token = auth.issue_token(&saved)?;
    Ok(AuthResponse {
        token,
        customer_id: saved.id,
        email: saved.email,
    })
}

/// Verifies credentials and returns a fresh token. The same message is
/// returned for unknown email and wrong password.
#[instrument(skip(db, auth, req), fields(email = %req.email))]
pub async fn login(
    db: &DbPool,
    auth: &AuthService,
    req: LoginRequest,
) -> Result<AuthResponse, ServiceError> {
    req.validate()?;

    let customer = customer::Entity::find()
        .filter(customer::Column::Email.eq(req.email.clone()))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::AuthError("invalid email or password".to_string()))?;

    if !verify_password(&req.password, &customer.password_hash)? {
        return Err(ServiceError::AuthError(
            "invalid email or password".to_string(),
        ));
    }

    let token = auth.issue_token(&customer)?;
    Ok(AuthResponse {
        token,
        customer_id: customer.id,
        email: customer.email,
    })
}

/// Authenticated caller, extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthService::from_ref(state);
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing authorization header".to_string())
            })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("authorization header must be a bearer token".to_string())
        })?;
        let claims = auth.validate_token(token)?;
        Ok(CurrentUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}
