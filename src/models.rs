use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{leave::LeaveType, role::Role};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    #[schema(example = "jane@acme.io", format = "email")]
    pub email: Option<String>,
    #[schema(example = "s3cret-pass")]
    pub password: Option<String>,
    #[schema(example = "5551234567")]
    pub phone: Option<String>,
    #[schema(example = "Acme")]
    pub company_name: Option<String>,
    #[schema(example = "ACJA20240001")]
    pub employee_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jane@acme.io", format = "email")]
    pub email: Option<String>,
    #[schema(example = "s3cret-pass")]
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[serde(rename = "type")]
    #[schema(example = "sick")]
    pub leave_type: Option<LeaveType>,
    #[schema(example = "2024-01-10", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2024-01-12", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeaveStatus {
    /// One of `pending`, `approved`, `rejected`
    #[schema(example = "approved")]
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by leave status (admin only)
    #[schema(example = "pending")]
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = 52000.0)]
    pub salary: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// The user's email at issue time
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
}
