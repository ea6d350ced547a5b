use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, is_duplicate_key},
    model::{
        role::Role,
        user::{PROFILE_COLUMNS, User, UserProfile},
    },
    models::{LoginReqDto, RegisterReq},
    utils::email_registry::{EMAILS, normalize},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn issue_token(user: &UserProfile, config: &Config) -> Result<String, ApiError> {
    generate_token(
        user.id,
        user.email.clone(),
        user.role,
        &config.jwt_secret,
        config.token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, user_id = user.id, "Failed to sign token");
        ApiError::internal("Failed to issue token")
    })
}

pub async fn fetch_profile(pool: &MySqlPool, user_id: u64) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Register a new employee account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "token": "eyJhbGciOiJIUzI1NiJ9...",
            "user": { "id": 1, "email": "jane@acme.io", "role": "employee" }
        })),
        (status = 400, description = "Missing fields or email already registered", body = Object, example = json!({
            "error": "User already exists"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all)]
pub async fn register(
    payload: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        non_empty(&payload.name),
        non_empty(&payload.email),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Name, email, and password are required"));
    };
    let email = normalize(email);

    if !EMAILS
        .is_available(&email, pool.get_ref())
        .await
        .map_err(ApiError::database("Registration failed"))?
    {
        info!("Registration rejected: email taken");
        return Err(ApiError::conflict("User already exists"));
    }

    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::internal("Registration failed")
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password, role, phone, company_name, employee_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(hashed)
    .bind(Role::Employee)
    .bind(non_empty(&payload.phone))
    .bind(non_empty(&payload.company_name))
    .bind(non_empty(&payload.employee_id))
    .execute(pool.get_ref())
    .await;

    let user_id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            // Registered while the in-memory index still had no trace of it.
            EMAILS.record(&email).await;
            return Err(ApiError::conflict("User already exists"));
        }
        Err(e) => return Err(ApiError::database("Registration failed")(e)),
    };

    EMAILS.record(&email).await;

    let user = fetch_profile(pool.get_ref(), user_id)
        .await
        .map_err(ApiError::database("Registration failed"))?
        .ok_or_else(|| ApiError::internal("Registration failed"))?;
    let token = issue_token(&user, &config)?;

    info!(user_id, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "token": token,
        "user": user,
    })))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = Object, example = json!({
            "message": "Login successful",
            "token": "eyJhbGciOiJIUzI1NiJ9...",
            "user": { "id": 1, "email": "jane@acme.io", "role": "employee" }
        })),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "error": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip_all)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let (Some(email), Some(password)) = (
        non_empty(&payload.email),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    let email = normalize(email);

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::database("Login failed"))?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            ApiError::unauthorized("Invalid credentials")
        })?;

    if let Err(e) = verify_password(password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let user = UserProfile::from(db_user);
    let token = issue_token(&user, &config)?;

    info!(user_id = user.id, "Login successful");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "token": token,
        "user": user,
    })))
}

/// Resolve the bearer token to the current user
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = Object),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn verify(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let user = fetch_profile(pool.get_ref(), auth.user_id)
        .await
        .map_err(ApiError::database("Token verification failed"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}
