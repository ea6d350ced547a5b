use chrono::{DateTime, NaiveDate, Utc};
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Paid,
    Unpaid,
}

text_column!(LeaveType);

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

text_column!(LeaveStatus);

impl LeaveStatus {
    /// Approved and rejected requests never change again.
    pub fn is_settled(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 4,
    "userId": 3,
    "type": "paid",
    "startDate": "2024-01-10",
    "endDate": "2024-01-12",
    "reason": "Family trip",
    "status": "pending",
    "createdAt": "2024-01-02T08:15:00Z"
}))]
pub struct Leave {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub leave_type: LeaveType,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl Leave {
    /// Every calendar day from `start_date` to `end_date`, both inclusive.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        days_between(self.start_date, self.end_date)
    }
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveWithUserRow {
    pub id: u64,
    pub user_id: u64,
    #[sqlx(rename = "type")]
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub user_email: String,
    pub user_department: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveEntry {
    #[serde(flatten)]
    pub leave: Leave,
    pub user: UserSummary,
}

impl From<LeaveWithUserRow> for LeaveEntry {
    fn from(row: LeaveWithUserRow) -> Self {
        Self {
            leave: Leave {
                id: row.id,
                user_id: row.user_id,
                leave_type: row.leave_type,
                start_date: row.start_date,
                end_date: row.end_date,
                reason: row.reason,
                status: row.status,
                created_at: row.created_at,
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
