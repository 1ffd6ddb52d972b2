use crate::{
    api::{attendance, dashboard, history, standard, student, teacher},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use anyhow::{Context, Result};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Rate limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("Invalid rate limit: {requests_per_min} per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::resource("/login")
            .wrap(limiters.login.clone())
            .route(web::post().to(handlers::login)),
    )
    .service(
        web::resource("/refresh")
            .wrap(limiters.refresh.clone())
            .route(web::post().to(handlers::refresh_token)),
    )
    .service(
        web::resource("/logout")
            .wrap(limiters.login.clone())
            .route(web::post().to(handlers::logout)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .route("/me", web::get().to(handlers::me))
            .route("/dashboard", web::get().to(dashboard::dashboard))
            // /take-attendance
            .route("/take-attendance", web::get().to(attendance::choose_standard))
            // /take-attendance/{standard_id}
            .service(
                web::resource("/take-attendance/{standard_id}")
                    .route(web::get().to(attendance::take_attendance))
                    .route(web::post().to(attendance::submit_attendance)),
            )
            .route("/view-attendance", web::get().to(history::view_attendance))
            .route("/manage-students", web::get().to(student::manage_students))
            .route("/add-student", web::post().to(student::add_student))
            // /edit-student/{id}
            .service(
                web::resource("/edit-student/{id}")
                    .route(web::get().to(student::get_student))
                    .route(web::post().to(student::edit_student)),
            )
            .route("/delete-student/{id}", web::post().to(student::delete_student))
            .service(
                web::resource("/standards")
                    .route(web::get().to(standard::list_standards))
                    .route(web::post().to(standard::create_standard)),
            )
            .route("/teachers", web::post().to(teacher::create_teacher)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::handlers::LoginResponse;
    use crate::db::test_pool;
    use crate::services::identity::ensure_admin;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[actix_web::test]
    async fn protected_routes_sit_behind_login() {
        let pool = test_pool().await;
        ensure_admin(&pool, "admin", "admin-password").await.unwrap();
        let config = Config::for_tests();
        let limiters = Limiters::from_config(&config).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .app_data(web::Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limiters)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/dashboard")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/login")
            .peer_addr(peer())
            .set_json(json!({"username": "admin", "password": "admin-password"}))
            .to_request();
        let tokens: LoginResponse = test::call_and_read_body_json(&app, req).await;

        // refresh tokens are not accepted on protected routes
        let req = test::TestRequest::get()
            .uri("/dashboard")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", tokens.refresh_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/dashboard")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", tokens.access_token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_students"], 0);
    }
}
