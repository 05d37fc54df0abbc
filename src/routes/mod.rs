use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dal::session_db;
use crate::error::ApiError;

pub mod agent_route;
pub mod campaign_route;
pub mod default_route;
pub mod gathering_route;
pub mod search_route;

/// Caller resolved from a session token, either `Authorization: Bearer` or
/// `X-Session-Token`. Missing or unknown tokens get a 401.
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(value) = req.headers().get("Authorization") {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim().to_string());
        }
    }
    req.headers()
        .get("X-Session-Token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let pool = req.app_data::<web::Data<PgPool>>().cloned();
        let token = session_token(req);

        Box::pin(async move {
            let pool =
                pool.ok_or_else(|| anyhow::anyhow!("database pool missing from app data"))?;
            let token = token.ok_or(ApiError::Unauthorized)?;
            let user_id = session_db::get_user_id_by_token(&pool, &token)
                .await?
                .ok_or(ApiError::Unauthorized)?;
            Ok(AuthenticatedUser { user_id })
        })
    }
}
