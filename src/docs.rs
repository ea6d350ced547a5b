use crate::model::{
    attendance::{Attendance, AttendanceEntry, AttendanceStatus},
    leave::{Leave, LeaveEntry, LeaveStatus, LeaveType},
    role::Role,
    user::{UserProfile, UserSummary},
};
use crate::models::{
    CreateLeave, LeaveFilter, LoginReqDto, RegisterReq, UpdateEmployee, UpdateLeaveStatus,
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::{
    self,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dayflow API",
        version = "1.0.0",
        description = r#"
## Dayflow HR

REST backend for the Dayflow HR dashboards.

### Features
- **Accounts**: register, log in, verify a session token
- **Attendance**: daily clock-in / clock-out, today's status, history
- **Leave**: submit requests; admins approve or reject them, and approval
  marks each day of the request as on-leave
- **Employee directory**: admins list employees and update department/salary

### Security
Every endpoint except health, register and login expects
`Authorization: Bearer <token>`. Admin-only endpoints answer 403 otherwise.

### Errors
Failures are JSON objects of the form `{"error": "message"}`.
"#,
    ),
    paths(
        crate::api::health::health,

        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::verify,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::today,
        crate::api::attendance::history,

        crate::api::leave::create_leave,
        crate::api::leave::leave_list,
        crate::api::leave::update_leave_status,

        crate::api::employee::list_employees,
        crate::api::employee::update_employee
    ),
    components(
        schemas(
            Role,
            UserProfile,
            UserSummary,
            AttendanceStatus,
            Attendance,
            AttendanceEntry,
            LeaveType,
            LeaveStatus,
            Leave,
            LeaveEntry,
            RegisterReq,
            LoginReqDto,
            CreateLeave,
            UpdateLeaveStatus,
            LeaveFilter,
            UpdateEmployee
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Registration, login and token verification"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Employee", description = "Employee directory APIs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();

        for expected in [
            "/api/health",
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/verify",
            "/api/attendance/clock-in",
            "/api/attendance/clock-out",
            "/api/attendance/today",
            "/api/attendance",
            "/api/leave/add",
            "/api/leave",
            "/api/leave/{id}",
            "/api/employees",
            "/api/employees/{id}",
        ] {
            assert!(paths.iter().any(|p| p == expected), "missing {expected}");
        }
    }

    #[test]
    fn declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
