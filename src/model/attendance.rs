use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::user::UserSummary;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnLeave,
}

text_column!(AttendanceStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 12,
    "userId": 3,
    "date": "2024-01-10",
    "checkIn": "09:00:00",
    "checkOut": null,
    "status": "present"
}))]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
}

/// Attendance row joined with its owner, as read from the history query.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceWithUserRow {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub user_name: String,
    pub user_email: String,
    pub user_department: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceEntry {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub user: UserSummary,
}

impl From<AttendanceWithUserRow> for AttendanceEntry {
    fn from(row: AttendanceWithUserRow) -> Self {
        Self {
            attendance: Attendance {
                id: row.id,
                user_id: row.user_id,
                date: row.date,
                check_in: row.check_in,
                check_out: row.check_out,
                status: row.status,
            },
            user: UserSummary {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
                department: row.user_department,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_leave_uses_kebab_case() {
        assert_eq!(AttendanceStatus::OnLeave.as_ref(), "on-leave");
        assert_eq!(
            serde_json::to_value(AttendanceStatus::OnLeave).unwrap(),
            serde_json::json!("on-leave")
        );
    }

    #[test]
    fn status_reads_from_varchar_column() {
        use sqlx::{MySql, Type};
        let varchar = <String as Type<MySql>>::type_info();
        assert!(<AttendanceStatus as Type<MySql>>::compatible(&varchar));
        assert_eq!("on-leave".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::OnLeave);
    }

    #[test]
    fn history_entry_nests_user_summary() {
        let row = AttendanceWithUserRow {
            id: 7,
            user_id: 3,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            check_in: NaiveTime::from_hms_opt(9, 0, 0),
            check_out: None,
            status: AttendanceStatus::Present,
            user_name: "Jane".into(),
            user_email: "jane@acme.io".into(),
            user_department: Some("Engineering".into()),
        };

        let json = serde_json::to_value(AttendanceEntry::from(row)).unwrap();
        assert_eq!(json["userId"], 3);
        assert_eq!(json["checkIn"], "09:00:00");
        assert_eq!(json["checkOut"], serde_json::Value::Null);
        assert_eq!(json["user"]["email"], "jane@acme.io");
    }
}
