use crate::{
    api::{attendance, employee, health, leave},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // Only fails for a zero period or burst, both clamped above.
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Body, query and path extraction failures answer in the `{"error": ...}` shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = build_limiter(config.rate_login_per_min);
    let register_limiter = build_limiter(config.rate_register_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .route("/health", web::get().to(health::health))
            .service(
                web::scope("/auth")
                    .service(
                        web::resource("/login")
                            .wrap(login_limiter)
                            .route(web::post().to(handlers::login)),
                    )
                    .service(
                        web::resource("/register")
                            .wrap(register_limiter)
                            .route(web::post().to(handlers::register)),
                    )
                    .service(
                        web::resource("/verify")
                            .wrap(from_fn(auth_middleware))
                            .route(web::get().to(handlers::verify)),
                    ),
            )
            // Everything below requires a bearer token
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter)
                    .service(
                        web::scope("/attendance")
                            .route("", web::get().to(attendance::history))
                            .route("/clock-in", web::post().to(attendance::clock_in))
                            .route("/clock-out", web::post().to(attendance::clock_out))
                            .route("/today", web::get().to(attendance::today)),
                    )
                    .service(
                        web::scope("/leave")
                            .route("", web::get().to(leave::leave_list))
                            .route("/add", web::post().to(leave::create_leave))
                            .route("/{id}", web::put().to(leave::update_leave_status)),
                    )
                    .service(
                        web::scope("/employees")
                            .route("", web::get().to(employee::list_employees))
                            .route("/{id}", web::put().to(employee::update_employee)),
                    ),
            ),
    );
}
