use crate::{
    auth::auth::AuthUser,
    error::{ApiError, is_duplicate_key},
    model::{
        attendance::{Attendance, AttendanceEntry, AttendanceStatus, AttendanceWithUserRow},
        role::Role,
    },
    utils::db_utils::{SqlValue, WhereClause},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};

const ATTENDANCE_COLUMNS: &str = "id, user_id, date, check_in, check_out, status";

/// What clock-in has to do with today's row.
#[derive(Debug, PartialEq)]
enum ClockInPlan {
    Insert,
    /// Today already has a row without a check-in (e.g. on-leave); claim it.
    Fill(u64),
}

fn plan_clock_in(today: Option<&Attendance>) -> Result<ClockInPlan, ApiError> {
    match today {
        Some(row) if row.check_in.is_some() => Err(ApiError::conflict("Already clocked in today")),
        Some(row) => Ok(ClockInPlan::Fill(row.id)),
        None => Ok(ClockInPlan::Insert),
    }
}

fn plan_clock_out(today: Option<Attendance>) -> Result<Attendance, ApiError> {
    match today {
        None => Err(ApiError::not_found("No attendance record found for today")),
        Some(row) if row.check_out.is_some() => Err(ApiError::conflict("Already clocked out today")),
        Some(row) if row.check_in.is_none() => Err(ApiError::bad_request("Not clocked in today")),
        Some(row) => Ok(row),
    }
}

/// Calendar day and whole-second wall time of `now`.
fn day_and_time(now: NaiveDateTime) -> (NaiveDate, NaiveTime) {
    let time = now.time();
    (now.date(), time.with_nanosecond(0).unwrap_or(time))
}

fn local_now() -> (NaiveDate, NaiveTime) {
    day_and_time(Local::now().naive_local())
}

async fn find_for_day(
    pool: &MySqlPool,
    user_id: u64,
    day: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?"
    ))
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await
}

async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Attendance, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Opens today's row for `user_id` at `now`, or claims an existing row
/// that has no check-in yet.
pub async fn record_clock_in(
    pool: &MySqlPool,
    user_id: u64,
    today: NaiveDate,
    now: NaiveTime,
) -> Result<Attendance, ApiError> {
    let existing = find_for_day(pool, user_id, today)
        .await
        .map_err(ApiError::database("Clock in failed"))?;

    let id = match plan_clock_in(existing.as_ref())? {
        ClockInPlan::Insert => {
            let result = sqlx::query(
                r#"
                INSERT INTO attendance (user_id, date, check_in, status)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(today)
            .bind(now)
            .bind(AttendanceStatus::Present)
            .execute(pool)
            .await;

            match result {
                Ok(done) => done.last_insert_id(),
                // Lost a race with a concurrent clock-in for the same day.
                Err(e) if is_duplicate_key(&e) => {
                    return Err(ApiError::conflict("Already clocked in today"));
                }
                Err(e) => return Err(ApiError::database("Clock in failed")(e)),
            }
        }
        ClockInPlan::Fill(id) => {
            let result = sqlx::query(
                r#"
                UPDATE attendance
                SET check_in = ?, status = ?
                WHERE id = ?
                AND check_in IS NULL
                "#,
            )
            .bind(now)
            .bind(AttendanceStatus::Present)
            .bind(id)
            .execute(pool)
            .await
            .map_err(ApiError::database("Clock in failed"))?;

            if result.rows_affected() == 0 {
                return Err(ApiError::conflict("Already clocked in today"));
            }
            id
        }
    };

    find_by_id(pool, id)
        .await
        .map_err(ApiError::database("Clock in failed"))
}

pub async fn record_clock_out(
    pool: &MySqlPool,
    user_id: u64,
    today: NaiveDate,
    now: NaiveTime,
) -> Result<Attendance, ApiError> {
    let existing = find_for_day(pool, user_id, today)
        .await
        .map_err(ApiError::database("Clock out failed"))?;
    let mut attendance = plan_clock_out(existing)?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(attendance.id)
    .execute(pool)
    .await
    .map_err(ApiError::database("Clock out failed"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Already clocked out today"));
    }
    attendance.check_out = Some(now);

    Ok(attendance)
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    responses(
        (status = 201, description = "Clocked in successfully", body = Object, example = json!({
            "message": "Clocked in successfully",
            "attendance": {
                "id": 12, "userId": 3, "date": "2024-01-10",
                "checkIn": "09:00:00", "checkOut": null, "status": "present"
            }
        })),
        (status = 400, description = "Already clocked in today", body = Object, example = json!({
            "error": "Already clocked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "clock_in", skip_all, fields(user_id = auth.user_id))]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let (today, now) = local_now();
    let attendance = record_clock_in(pool.get_ref(), auth.user_id, today, now).await?;

    info!(attendance_id = attendance.id, "Clocked in");

    Ok(HttpResponse::Created().json(json!({
        "message": "Clocked in successfully",
        "attendance": attendance,
    })))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out successfully", body = Object),
        (status = 400, description = "Already clocked out today", body = Object, example = json!({
            "error": "Already clocked out today"
        })),
        (status = 404, description = "No attendance record for today", body = Object, example = json!({
            "error": "No attendance record found for today"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "clock_out", skip_all, fields(user_id = auth.user_id))]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let (today, now) = local_now();
    let attendance = record_clock_out(pool.get_ref(), auth.user_id, today, now).await?;

    info!(attendance_id = attendance.id, "Clocked out");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Clocked out successfully",
        "attendance": attendance,
    })))
}

/// Today's attendance for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record, or a message when there is none", body = Object, example = json!({
            "attendance": { "message": "No attendance record for today" }
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let (today, _) = local_now();

    let attendance = find_for_day(pool.get_ref(), auth.user_id, today)
        .await
        .map_err(ApiError::database("Failed to fetch today's attendance"))?;

    let body = match attendance {
        Some(row) => json!({ "attendance": row }),
        None => json!({ "attendance": { "message": "No attendance record for today" } }),
    };

    Ok(HttpResponse::Ok().json(body))
}

/// Attendance history: own rows, or everyone's for admins
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Attendance rows, newest day first", body = Object),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let admin = auth.is_admin() && auth.stored_role(pool.get_ref()).await? == Role::Admin;
    let scope = (!admin).then(|| SqlValue::U64(auth.user_id));
    let filter = WhereClause::new().and_eq("a.user_id", scope);

    let sql = format!(
        r#"
        SELECT a.id, a.user_id, a.date, a.check_in, a.check_out, a.status,
               u.name AS user_name, u.email AS user_email, u.department AS user_department
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        {}
        ORDER BY a.date DESC, a.id DESC
        "#,
        filter.to_sql()
    );

    let mut query = sqlx::query_as::<_, AttendanceWithUserRow>(&sql);
    for value in filter.values {
        query = match value {
            SqlValue::U64(v) => query.bind(v),
            SqlValue::String(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
        };
    }

    let rows = query
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::database("Failed to fetch attendance history"))?;

    let attendance: Vec<AttendanceEntry> = rows.into_iter().map(AttendanceEntry::from).collect();

    Ok(HttpResponse::Ok().json(json!({ "attendance": attendance })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(check_in: Option<(u32, u32)>, check_out: Option<(u32, u32)>) -> Attendance {
        let at = |(h, m): (u32, u32)| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        Attendance {
            id: 5,
            user_id: 3,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            check_in: check_in.map(at),
            check_out: check_out.map(at),
            status: if check_in.is_some() {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::OnLeave
            },
        }
    }

    #[test]
    fn first_clock_in_inserts() {
        assert_eq!(plan_clock_in(None).unwrap(), ClockInPlan::Insert);
    }

    #[test]
    fn second_clock_in_same_day_conflicts() {
        let err = plan_clock_in(Some(&row(Some((9, 0)), None))).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Already clocked in today");
    }

    #[test]
    fn clock_in_claims_existing_day_row_without_check_in() {
        assert_eq!(plan_clock_in(Some(&row(None, None))).unwrap(), ClockInPlan::Fill(5));
    }

    #[test]
    fn clock_out_without_row_is_not_found() {
        let err = plan_clock_out(None).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn clock_out_twice_conflicts() {
        let err = plan_clock_out(Some(row(Some((9, 0)), Some((17, 0))))).unwrap_err();
        assert_eq!(err.to_string(), "Already clocked out today");
    }

    #[test]
    fn clock_out_requires_check_in() {
        let err = plan_clock_out(Some(row(None, None))).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn clock_out_after_clock_in_is_allowed() {
        assert_eq!(plan_clock_out(Some(row(Some((9, 0)), None))).unwrap().id, 5);
    }

    #[test]
    fn nine_am_clock_in_renders_whole_seconds() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_milli_opt(9, 0, 0, 437)
            .unwrap();
        let (day, time) = day_and_time(now);

        let attendance = Attendance {
            id: 1,
            user_id: 3,
            date: day,
            check_in: Some(time),
            check_out: None,
            status: AttendanceStatus::Present,
        };
        let json = serde_json::to_value(&attendance).unwrap();

        assert_eq!(json["date"], "2024-01-10");
        assert_eq!(json["checkIn"], "09:00:00");
        assert_eq!(json["checkOut"], serde_json::Value::Null);
        assert_eq!(json["status"], "present");
    }
}
