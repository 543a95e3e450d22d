use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::token;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "paragonik_session";
pub const SESSION_TTL: Duration = Duration::days(7);
/// Below this remaining lifetime a validated session gets a fresh TTL.
pub const RENEWAL_THRESHOLD: Duration = Duration::hours(24);

/// Server-side session row. The token is the only thing the client ever
/// holds; it is opaque and revocable, never a self-describing credential.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub async fn find(db: &PgPool, token: &str) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT token, user_id, expires_at
            FROM sessions
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(session)
    }

    pub async fn insert(
        db: &PgPool,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn extend(
        db: &PgPool,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE sessions SET expires_at = $2 WHERE token = $1"#)
            .bind(token)
            .bind(expires_at)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, token: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM sessions WHERE token = $1"#)
            .bind(token)
            .execute(db)
            .await?;
        Ok(())
    }
}

pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(SESSION_TTL)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

pub fn needs_renewal(expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    expires_at - now < RENEWAL_THRESHOLD
}

/// Create a session for the user and return the cookie to set.
pub async fn issue(state: &AppState, user_id: Uuid) -> Result<Cookie<'static>, ApiError> {
    let token = token::generate();
    let expires_at = OffsetDateTime::now_utc() + SESSION_TTL;
    Session::insert(&state.db, &token, user_id, expires_at).await?;
    debug!(%user_id, "session issued");
    Ok(session_cookie(&token, state.config.cookie_secure))
}

/// Resolve the request's session cookie to a user id. Near-expiry sessions
/// are renewed in place (same token, fresh TTL) and the returned jar
/// carries the re-issued cookie.
pub async fn authenticate(
    state: &AppState,
    jar: CookieJar,
) -> Result<(Uuid, CookieJar), ApiError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(ApiError::Unauthorized("No session"));
    };
    let token = cookie.value().to_string();

    let Some(session) = Session::find(&state.db, &token).await? else {
        return Err(ApiError::Unauthorized("Invalid session"));
    };

    let now = OffsetDateTime::now_utc();
    if session.expires_at <= now {
        // Logically invalid already; the purge is just tidying.
        if let Err(e) = Session::delete(&state.db, &token).await {
            warn!(error = %e, "failed to purge expired session");
        }
        return Err(ApiError::Unauthorized("Session expired"));
    }

    if needs_renewal(session.expires_at, now) {
        let new_expiry = now + SESSION_TTL;
        Session::extend(&state.db, &token, new_expiry).await?;
        debug!(user_id = %session.user_id, "session renewed");
        let jar = jar.add(session_cookie(&token, state.config.cookie_secure));
        return Ok((session.user_id, jar));
    }

    Ok((session.user_id, jar))
}

/// Drop the session row for the presented token (if any) and clear the
/// cookie. Revoking twice, or with no cookie at all, is a no-op.
pub async fn revoke(state: &AppState, jar: CookieJar) -> Result<CookieJar, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token = cookie.value().to_string();
        Session::delete(&state.db, &token).await?;
        debug!("session revoked");
    }
    Ok(jar.remove(removal_cookie()))
}
