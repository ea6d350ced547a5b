use crate::{error::ApiError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};
use sqlx::MySqlPool;

/// The caller, as established by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    /// Role claimed by the token. Only good for early rejection; use
    /// `stored_role` or `require_admin` before granting admin access.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin_or(&self, denied: impl FnOnce() -> ApiError) -> Result<(), ApiError> {
        if self.is_admin() { Ok(()) } else { Err(denied()) }
    }

    /// The caller's role as stored now. Promotions and demotions made after
    /// the token was issued show up here.
    pub async fn stored_role(&self, pool: &MySqlPool) -> Result<Role, ApiError> {
        sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
            .bind(self.user_id)
            .fetch_optional(pool)
            .await
            .map_err(ApiError::database("Failed to verify role"))?
            .ok_or_else(|| ApiError::unauthorized("User no longer exists"))
    }

    /// Passes only when both the token and the stored role say admin.
    pub async fn confirm_admin(
        &self,
        pool: &MySqlPool,
        denied: impl Fn() -> ApiError,
    ) -> Result<(), ApiError> {
        self.require_admin_or(&denied)?;
        match self.stored_role(pool).await? {
            Role::Admin => Ok(()),
            Role::Employee => Err(denied()),
        }
    }

    pub async fn require_admin(&self, pool: &MySqlPool) -> Result<(), ApiError> {
        self.confirm_admin(pool, || ApiError::forbidden("Access denied. Admin only."))
            .await
    }
}
