use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, PublicUser, RegisterRequest, RegisterResponse,
            VerifyEmailQuery, VerifyEmailResponse,
        },
        password::{dummy_verify, hash_password, verify_password},
        repo_types::User,
        sessions, token,
    },
    error::ApiError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify-email", get(verify_email))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_login(login: &str) -> Result<(), &'static str> {
    if login.len() < 3 || login.len() > 30 {
        return Err("Login must be between 3 and 30 characters");
    }
    if !login
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Login may only contain letters, digits, underscore and hyphen");
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 || password.len() > 100 {
        return Err("Password must be between 8 and 100 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit");
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.login = payload.login.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.login.is_empty() || payload.password.is_empty() || payload.email.is_empty() {
        return Err(ApiError::Validation(
            "Login, password and email are required".into(),
        ));
    }
    validate_login(&payload.login).map_err(|m| ApiError::Validation(m.into()))?;
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    validate_password(&payload.password).map_err(|m| ApiError::Validation(m.into()))?;

    // Separate uniqueness checks so the client learns which field collided.
    if User::find_by_login(&state.db, &payload.login).await?.is_some() {
        warn!(login = %payload.login, "login already taken");
        return Err(ApiError::Conflict("Login already taken"));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let verification_token = token::generate();
    let user = User::create(
        &state.db,
        &payload.login,
        &payload.email,
        &hash,
        &verification_token,
    )
    .await?;

    let link = format!(
        "{}/verify-email?token={}",
        state.config.public_base_url, verification_token
    );
    let email_sent = match state.mailer.send_verification(&user.email, &link).await {
        Ok(()) => true,
        Err(e) => {
            // The account exists either way; the client is told the mail
            // may not have arrived.
            warn!(error = %e, user_id = %user.id, "verification email failed to send");
            false
        }
    };

    info!(user_id = %user.id, login = %user.login, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: PublicUser {
                id: user.id,
                login: user.login,
            },
            email_sent,
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    payload.login = payload.login.trim().to_string();

    if payload.login.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Login and password are required".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    if state.login_limiter.is_blocked(&payload.login, now) {
        warn!(login = %payload.login, "login rate limited");
        return Err(ApiError::RateLimited);
    }

    let user = match User::find_by_login(&state.db, &payload.login).await? {
        Some(u) => u,
        None => {
            // Burn a hash comparison so unknown logins are not
            // distinguishable by response time.
            dummy_verify(&payload.password);
            state.login_limiter.record_failure(&payload.login, now);
            warn!(login = %payload.login, "login unknown");
            return Err(ApiError::Unauthorized("Invalid login or password"));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(ApiError::Internal)?;
    if !ok {
        state.login_limiter.record_failure(&payload.login, now);
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid login or password"));
    }

    if !user.email_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(ApiError::Forbidden("Email not verified"));
    }

    state.login_limiter.clear(&payload.login);
    let cookie = sessions::issue(&state, user.id).await?;

    info!(user_id = %user.id, login = %user.login, "user logged in");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: PublicUser {
                id: user.id,
                login: user.login,
            },
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let jar = sessions::revoke(&state, jar).await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

#[instrument(skip(state))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    let token = query.token.as_deref().unwrap_or("").trim();
    if token.is_empty() {
        return Err(ApiError::Validation(
            "Verification token is required".into(),
        ));
    }

    let user = User::find_by_verification_token(&state.db, token)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid verification token".into()))?;

    if user.email_verified {
        return Ok(Json(VerifyEmailResponse {
            message: "Email already verified".into(),
        }));
    }

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(VerifyEmailResponse {
        message: "Email verified successfully".into(),
    }))
}
