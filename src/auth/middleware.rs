use crate::auth::auth::authenticate;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::{debug, error};

/// Guards the protected scope. The resolved caller is stored in the request
/// extensions, where the `AuthUser` extractor picks it up.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let resolved = match req.app_data::<Data<Config>>() {
        Some(config) => authenticate(req.headers(), &config.jwt_secret),
        None => {
            error!("Config missing from app data");
            Err(AppError::Internal)
        }
    };

    match resolved {
        Ok(user) => {
            debug!(user_id = user.user_id, path = req.path(), "Request authenticated");
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(e) => {
            debug!(path = req.path(), reason = %e, "Request refused");
            Ok(req.into_response(e.error_response()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::AuthUser;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::model::role::Role;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use serde_json::Value;

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.username)
    }

    macro_rules! guarded_app {
        ($config:expr) => {
            test::init_service(
                App::new().app_data(web::Data::new($config.clone())).service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .route("/whoami", web::get().to(whoami)),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn refused_requests_get_a_json_401() {
        let config = Config::for_tests();
        let app = guarded_app!(config);
        let (refresh, _) =
            generate_refresh_token(3, "rao".into(), Role::Teacher.id(), &config.jwt_secret, 60)
                .unwrap();

        for header in [None, Some("Basic cmFvOnB3".to_string()), Some(format!("Bearer {refresh}"))] {
            let mut req = test::TestRequest::get().uri("/api/whoami");
            if let Some(value) = header {
                req = req.insert_header(("Authorization", value));
            }
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "invalid_token");
        }
    }

    #[actix_web::test]
    async fn access_token_reaches_the_handler() {
        let config = Config::for_tests();
        let app = guarded_app!(config);
        let access =
            generate_access_token(3, "rao".into(), Role::Teacher.id(), &config.jwt_secret, 60)
                .unwrap();

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"rao"));
    }
}
