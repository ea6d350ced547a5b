use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        attendance::AttendanceStatus,
        leave::{Leave, LeaveEntry, LeaveStatus, LeaveType, LeaveWithUserRow},
        role::Role,
    },
    models::{CreateLeave, LeaveFilter, UpdateLeaveStatus},
    utils::db_utils::{SqlValue, WhereClause},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use std::str::FromStr;
use tracing::{info, instrument};

const LEAVE_COLUMNS: &str = "id, user_id, type, start_date, end_date, reason, status, created_at";

fn validate_new_leave(payload: &CreateLeave) -> Result<(LeaveType, NaiveDate, NaiveDate), ApiError> {
    let (Some(leave_type), Some(start), Some(end)) =
        (payload.leave_type, payload.start_date, payload.end_date)
    else {
        return Err(ApiError::bad_request("Type, startDate, and endDate are required"));
    };

    if start > end {
        return Err(ApiError::bad_request("Start date must be before end date"));
    }

    Ok((leave_type, start, end))
}

fn parse_status(raw: Option<&str>) -> Result<LeaveStatus, ApiError> {
    raw.and_then(|s| LeaveStatus::from_str(s).ok())
        .ok_or_else(|| ApiError::bad_request("Invalid status"))
}

fn ensure_open(leave: &Leave) -> Result<(), ApiError> {
    if leave.status.is_settled() {
        Err(ApiError::conflict("Leave request has already been processed"))
    } else {
        Ok(())
    }
}

async fn find_leave(pool: &MySqlPool, id: u64) -> Result<Leave, sqlx::Error> {
    sqlx::query_as::<_, Leave>(&format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?"))
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Find-or-create an on-leave attendance row for every day of the leave.
/// Rows that already exist for a day are kept as they are.
async fn mark_days_on_leave(
    tx: &mut Transaction<'_, MySql>,
    leave: &Leave,
) -> Result<usize, sqlx::Error> {
    let mut days = 0;
    for day in leave.days() {
        sqlx::query(
            r#"
            INSERT INTO attendance (user_id, date, status)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE id = id
            "#,
        )
        .bind(leave.user_id)
        .bind(day)
        .bind(AttendanceStatus::OnLeave)
        .execute(&mut **tx)
        .await?;
        days += 1;
    }
    Ok(days)
}

/// Moves a pending request to `status` in one transaction. Approval also
/// marks each day of the request on-leave.
pub async fn settle_leave(
    pool: &MySqlPool,
    leave_id: u64,
    status: LeaveStatus,
) -> Result<Leave, ApiError> {
    let on_db_error = || ApiError::database("Failed to update leave status");

    let mut tx = pool.begin().await.map_err(on_db_error())?;

    let mut leave = sqlx::query_as::<_, Leave>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ? FOR UPDATE"
    ))
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(on_db_error())?
    .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    ensure_open(&leave)?;

    sqlx::query("UPDATE leaves SET status = ? WHERE id = ?")
        .bind(status)
        .bind(leave_id)
        .execute(&mut *tx)
        .await
        .map_err(on_db_error())?;
    leave.status = status;

    if status == LeaveStatus::Approved {
        let days = mark_days_on_leave(&mut tx, &leave)
            .await
            .map_err(on_db_error())?;
        info!(days, user_id = leave.user_id, "Attendance marked on-leave");
    }

    tx.commit().await.map_err(on_db_error())?;

    Ok(leave)
}

/// Submit a leave request for the caller
#[utoipa::path(
    post,
    path = "/api/leave/add",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted",
            "leave": {
                "id": 4, "userId": 3, "type": "sick",
                "startDate": "2024-01-10", "endDate": "2024-01-12",
                "reason": "Flu", "status": "pending"
            }
        })),
        (status = 400, description = "Missing fields or inverted date range", body = Object, example = json!({
            "error": "Start date must be before end date"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "create_leave", skip_all, fields(user_id = auth.user_id))]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, ApiError> {
    let (leave_type, start_date, end_date) = validate_new_leave(&payload)?;
    let reason = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO leaves (user_id, type, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(leave_type)
    .bind(start_date)
    .bind(end_date)
    .bind(reason)
    .bind(LeaveStatus::Pending)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::database("Failed to create leave request"))?;

    let leave = find_leave(pool.get_ref(), result.last_insert_id())
        .await
        .map_err(ApiError::database("Failed to create leave request"))?;

    info!(leave_id = leave.id, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "leave": leave,
    })))
}

/// List leave requests: own for employees, all (optionally by status) for admins
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Leave requests, newest first", body = Object),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) if auth.is_admin() => Some(parse_status(Some(raw))?),
        _ => None,
    };

    // A token minted before a demotion still says admin.
    let admin = auth.is_admin() && auth.stored_role(pool.get_ref()).await? == Role::Admin;

    let filter = if admin {
        WhereClause::new().and_eq(
            "l.status",
            status.map(|s| SqlValue::String(s.as_ref().to_string())),
        )
    } else {
        WhereClause::new().and_eq("l.user_id", Some(SqlValue::U64(auth.user_id)))
    };

    let sql = format!(
        r#"
        SELECT l.id, l.user_id, l.type, l.start_date, l.end_date, l.reason, l.status, l.created_at,
               u.name AS user_name, u.email AS user_email, u.department AS user_department
        FROM leaves l
        JOIN users u ON u.id = l.user_id
        {}
        ORDER BY l.created_at DESC, l.id DESC
        "#,
        filter.to_sql()
    );

    let mut data_q = sqlx::query_as::<_, LeaveWithUserRow>(&sql);
    for value in filter.values {
        data_q = match value {
            SqlValue::U64(v) => data_q.bind(v),
            SqlValue::String(v) => data_q.bind(v),
            SqlValue::F64(v) => data_q.bind(v),
        };
    }

    let rows = data_q
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::database("Failed to fetch leave requests"))?;

    let leaves: Vec<LeaveEntry> = rows.into_iter().map(LeaveEntry::from).collect();

    Ok(HttpResponse::Ok().json(json!({ "leaves": leaves })))
}

/// Approve or reject a leave request (admin)
///
/// Approval marks every day of the request as on-leave in the attendance
/// ledger. Days that already have a row keep it unchanged.
#[utoipa::path(
    put,
    path = "/api/leave/{id}",
    params(
        ("id" = u64, Path, description = "ID of the leave request")
    ),
    request_body = UpdateLeaveStatus,
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({
            "message": "Leave request approved",
            "leave": { "id": 4, "status": "approved" }
        })),
        (status = 400, description = "Invalid status or request already processed", body = Object, example = json!({
            "error": "Invalid status"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "update_leave_status", skip_all, fields(leave_id = *path))]
pub async fn update_leave_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeaveStatus>,
) -> Result<HttpResponse, ApiError> {
    let denied = || ApiError::forbidden("Only admins can update leave status");
    auth.require_admin_or(denied)?;
    let status = parse_status(payload.status.as_deref())?;
    let leave_id = path.into_inner();

    auth.confirm_admin(pool.get_ref(), denied).await?;

    let leave = settle_leave(pool.get_ref(), leave_id, status).await?;

    info!(status = %status, "Leave status updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave request {}", status),
        "leave": leave,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(start: Option<NaiveDate>, end: Option<NaiveDate>) -> CreateLeave {
        CreateLeave {
            leave_type: Some(LeaveType::Sick),
            start_date: start,
            end_date: end,
            reason: None,
        }
    }

    #[test]
    fn accepts_same_day_leave() {
        let (kind, start, end) =
            validate_new_leave(&request(Some(date(2024, 1, 10)), Some(date(2024, 1, 10)))).unwrap();
        assert_eq!(kind, LeaveType::Sick);
        assert_eq!(start, end);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = validate_new_leave(&request(Some(date(2024, 1, 12)), Some(date(2024, 1, 10))))
            .unwrap_err();
        assert_eq!(err.to_string(), "Start date must be before end date");
    }

    #[test]
    fn rejects_missing_dates() {
        let err = validate_new_leave(&request(Some(date(2024, 1, 12)), None)).unwrap_err();
        assert_eq!(err.to_string(), "Type, startDate, and endDate are required");
    }

    #[test]
    fn status_must_be_known() {
        assert_eq!(parse_status(Some("approved")).unwrap(), LeaveStatus::Approved);
        assert_eq!(parse_status(Some("pending")).unwrap(), LeaveStatus::Pending);
        assert!(parse_status(Some("Approved")).is_err());
        assert!(parse_status(Some("cancelled")).is_err());
        assert!(parse_status(None).is_err());
    }

    #[test]
    fn settled_leave_cannot_change() {
        let mut leave = Leave {
            id: 4,
            user_id: 3,
            leave_type: LeaveType::Paid,
            start_date: date(2024, 1, 10),
            end_date: date(2024, 1, 12),
            reason: None,
            status: LeaveStatus::Pending,
            created_at: Utc::now(),
        };
        assert!(ensure_open(&leave).is_ok());

        leave.status = LeaveStatus::Rejected;
        let err = ensure_open(&leave).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
