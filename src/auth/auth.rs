use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenType;
use crate::{auth::jwt::verify_token, model::role::Role};
use actix_web::http::header::{self, HeaderMap};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// Identity of the caller, resolved per request from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

/// Resolves an `Authorization: Bearer <access token>` header to the caller.
///
/// Refresh tokens are refused here; they only work against `/refresh` and
/// `/logout`.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::InvalidToken("Missing Authorization header"))?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidToken(
            "Authorization header must be `Bearer <token>`",
        ))?;

    let claims = verify_token(token, secret)
        .map_err(|_| AppError::InvalidToken("Invalid or expired token"))?;
    if claims.token_type != TokenType::Access {
        return Err(AppError::InvalidToken("Access token required"));
    }

    let role = Role::from_id(claims.role).ok_or(AppError::InvalidToken("Unknown role"))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // already resolved by auth_middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let resolved = match req.app_data::<Data<Config>>() {
            Some(config) => authenticate(req.headers(), &config.jwt_secret),
            None => {
                tracing::error!("Config missing from app data");
                Err(AppError::Internal)
            }
        };
        ready(resolved)
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::http::header::HeaderValue;

    const SECRET: &str = "test-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    fn rejection(headers: &HeaderMap) -> &'static str {
        match authenticate(headers, SECRET) {
            Err(AppError::InvalidToken(reason)) => reason,
            other => panic!("expected a token rejection, got {other:?}"),
        }
    }

    #[test]
    fn access_token_resolves_the_caller() {
        let token = generate_access_token(7, "rao".into(), Role::Teacher.id(), SECRET, 60).unwrap();
        let user = authenticate(&headers(&format!("Bearer {token}")), SECRET).unwrap();

        assert_eq!(user.user_id, 7);
        assert_eq!(user.username, "rao");
        assert_eq!(user.role, Role::Teacher);
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn unusable_headers_are_rejected_with_a_reason() {
        let access = generate_access_token(7, "rao".into(), Role::Admin.id(), SECRET, 60).unwrap();
        let (refresh, _) =
            generate_refresh_token(7, "rao".into(), Role::Admin.id(), SECRET, 60).unwrap();

        assert_eq!(rejection(&HeaderMap::new()), "Missing Authorization header");
        assert_eq!(
            rejection(&headers(&format!("Token {access}"))),
            "Authorization header must be `Bearer <token>`"
        );
        assert_eq!(
            rejection(&headers(&format!("Bearer {access}x"))),
            "Invalid or expired token"
        );
        assert_eq!(
            rejection(&headers(&format!("Bearer {refresh}"))),
            "Access token required"
        );
    }
}
