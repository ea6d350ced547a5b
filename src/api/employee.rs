use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::user::{PROFILE_COLUMNS, UserProfile},
    models::UpdateEmployee,
    utils::db_utils::{SqlValue, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};

#[utoipa::path(
    get,
    path = "/api/employees",
    responses(
        (status = 200, description = "All users, newest first, without passwords", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only", body = Object, example = json!({
            "error": "Access denied. Admin only."
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin(pool.get_ref()).await?;

    let employees = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::database("Failed to fetch employees"))?;

    debug!(count = employees.len(), "Fetched employees");

    Ok(HttpResponse::Ok().json(json!({ "employees": employees })))
}

/// Writes the provided department/salary to user `id` and returns the
/// refreshed profile. A missing user is reported before an empty payload.
pub async fn apply_employee_update(
    pool: &MySqlPool,
    id: u64,
    payload: UpdateEmployee,
) -> Result<UserProfile, ApiError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(ApiError::database("Failed to update employee"))?
        > 0;
    if !exists {
        return Err(ApiError::not_found("Employee not found"));
    }

    let department = payload
        .department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let update = build_update_sql(
        "users",
        vec![
            ("department", department.map(SqlValue::String)),
            ("salary", payload.salary.map(SqlValue::F64)),
        ],
        "id",
        id,
    )?;

    execute_update(pool, update)
        .await
        .map_err(ApiError::database("Failed to update employee"))?;

    sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::database("Failed to update employee"))?
    .ok_or_else(|| ApiError::not_found("Employee not found"))
}

/// Update an employee's department and/or salary. Fields left out stay as they are.
#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(
        ("id" = u64, Path, description = "User ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({
            "message": "Employee updated successfully",
            "employee": {
                "id": 3, "name": "Jane Doe", "email": "jane@acme.io",
                "role": "employee", "department": "Engineering", "salary": 52000.0
            }
        })),
        (status = 400, description = "No fields provided"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "error": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin(pool.get_ref()).await?;
    let id = path.into_inner();

    let employee = apply_employee_update(pool.get_ref(), id, payload.into_inner()).await?;

    info!(employee_id = id, by = auth.user_id, "Employee updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully",
        "employee": {
            "id": employee.id,
            "name": employee.name,
            "email": employee.email,
            "role": employee.role,
            "department": employee.department,
            "salary": employee.salary,
        },
    })))
}
