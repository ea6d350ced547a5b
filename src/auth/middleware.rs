use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(config) = req.app_data::<Data<Config>>() else {
        return Ok(reject(req, ApiError::internal("App config missing")));
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(value) => value,
            Err(_) => {
                let err = ApiError::unauthorized("Invalid Authorization header encoding");
                return Ok(reject(req, err));
            }
        },
        None => return Ok(reject(req, ApiError::unauthorized("No token provided"))),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let err = ApiError::unauthorized("Authorization header must start with Bearer");
            return Ok(reject(req, err));
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Ok(reject(req, ApiError::unauthorized("Invalid or expired token")));
        }
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role: claims.role,
    });

    next.call(req).await
}

fn reject(req: ServiceRequest, err: ApiError) -> ServiceResponse<BoxBody> {
    req.into_response(err.error_response())
}
