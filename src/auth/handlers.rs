use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::AppError,
    models::{Claims, LoginReqDto, TokenType, UserSql},
    services::identity,
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and records the refresh token as a session.
async fn open_session(
    pool: &SqlitePool,
    config: &Config,
    user_id: i64,
    username: &str,
    role_id: u8,
) -> Result<LoginResponse, AppError> {
    let token_error = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, user_id, "Failed to sign token");
        AppError::Internal
    };

    let access_token = generate_access_token(
        user_id,
        username.to_string(),
        role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        username.to_string(),
        role_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 422, description = "Username or password missing")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation(
            "username",
            "Username and password are required",
        ));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: user inactive");
            return Err(AppError::AuthenticationFailure);
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::AuthenticationFailure);
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::AuthenticationFailure);
    }

    let tokens = open_session(
        pool.get_ref(),
        &config,
        db_user.id,
        &db_user.username,
        db_user.role_id,
    )
    .await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes a live session. `false` when it was already revoked.
async fn revoke_session(pool: &SqlitePool, session_id: i64) -> Result<bool, sqlx::Error> {
    let done = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() == 1)
}

#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "Session rotated", body = LoginResponse),
        (status = 401, description = "Refresh token invalid, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = refresh_claims(&req, &config).ok_or(AppError::AuthenticationFailure)?;

    let session = sqlx::query_as::<_, (i64, String, u8)>(
        r#"
        SELECT rt.id, u.username, u.role_id
        FROM refresh_tokens rt
        JOIN users u ON u.id = rt.user_id
        WHERE rt.jti = ? AND rt.revoked = 0 AND rt.expires_at > ? AND u.is_active = 1
        "#,
    )
    .bind(&claims.jti)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool.get_ref())
    .await?;

    let Some((session_id, username, role_id)) = session else {
        info!(jti = %claims.jti, "Refresh rejected: session not active");
        return Err(AppError::AuthenticationFailure);
    };

    // a concurrent refresh with the same token may have rotated it already
    if !revoke_session(pool.get_ref(), session_id).await? {
        info!(jti = %claims.jti, "Refresh rejected: session already rotated");
        return Err(AppError::AuthenticationFailure);
    }

    let tokens = open_session(pool.get_ref(), &config, claims.user_id, &username, role_id).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session revoked (also when it did not exist)")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, jti = %claims.jti, "Failed to revoke refresh token");
    } else {
        info!(user_id = claims.user_id, "Logged out");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current identity", body = crate::services::identity::Identity),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, AppError> {
    let identity = identity::identity(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(identity))
}
