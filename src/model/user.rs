use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Full `users` row, including the password hash. Never serialized.
#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub department: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub employee_id: Option<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user, password excluded.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Jane Doe",
    "email": "jane@acme.io",
    "role": "employee",
    "department": "Engineering",
    "salary": 52000.0,
    "phone": "5551234567",
    "employeeId": "ACJA20240001",
    "companyName": "Acme",
    "createdAt": "2024-01-01T09:00:00Z",
    "updatedAt": "2024-01-01T09:00:00Z"
}))]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub employee_id: Option<String>,
    pub company_name: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            department: user.department,
            salary: user.salary,
            phone: user.phone,
            employee_id: user.employee_id,
            company_name: user.company_name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The user fields embedded in attendance and leave listings.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
}

pub const PROFILE_COLUMNS: &str = "id, name, email, role, department, salary, phone, employee_id, company_name, created_at, updated_at";
