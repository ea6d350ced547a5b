use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Every failure a handler can surface. Rendered as `{"error": message}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    /// The request clashes with the current state of a record.
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Logs the database error and hides it behind a generic message.
    pub fn database(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| {
            tracing::error!(error = %e, "{}", context);
            Self::Internal(context.to_string())
        }
    }
}

/// True only for unique/primary key clashes (MySQL 1062 and friends).
/// SQLSTATE 23000 alone also covers foreign key and NOT NULL violations.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Duplicate state is reported as a plain 400 to match the clients.
            ApiError::BadRequest(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn renders_json_error_body() {
        let resp = ApiError::conflict("Already clocked in today").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "error": "Already clocked in today" }));
    }

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_database_errors_are_not_duplicates() {
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }

    /// Integrity error carrying a MySQL error number; all of them share SQLSTATE 23000.
    #[derive(Debug)]
    struct IntegrityError(u16);

    impl std::fmt::Display for IntegrityError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "integrity constraint violation ({})", self.0)
        }
    }

    impl std::error::Error for IntegrityError {}

    impl sqlx::error::DatabaseError for IntegrityError {
        fn message(&self) -> &str {
            "integrity constraint violation"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23000".into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.0 {
                1062 => sqlx::error::ErrorKind::UniqueViolation,
                1452 => sqlx::error::ErrorKind::ForeignKeyViolation,
                _ => sqlx::error::ErrorKind::NotNullViolation,
            }
        }
    }

    fn integrity(errno: u16) -> sqlx::Error {
        sqlx::Error::Database(Box::new(IntegrityError(errno)))
    }

    #[test]
    fn only_unique_violations_are_duplicates() {
        assert!(is_duplicate_key(&integrity(1062)));
        // Clock-in by a user deleted after their token was issued.
        assert!(!is_duplicate_key(&integrity(1452)));
        assert!(!is_duplicate_key(&integrity(1048)));
    }
}
